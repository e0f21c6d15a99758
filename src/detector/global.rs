//! 全局检测器单例管理
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use super::detector::FingerprintDetector;
use crate::config::{ConfigManager, GlobalConfig};
use crate::error::{RsFingerError, RsResult};
use crate::response::Response;
use crate::rule::MatchResult;

/// 全局检测器实例
static GLOBAL_DETECTOR: Lazy<Arc<OnceCell<FingerprintDetector>>> =
    Lazy::new(|| Arc::new(OnceCell::new()));

/// 初始化全局检测器（默认配置）
pub async fn init_fingerprint() -> RsResult<()> {
    init_fingerprint_with_config(ConfigManager::get_default()).await
}

/// 带自定义配置初始化全局检测器
/// 已初始化时直接返回，并发调用只会加载一次
pub async fn init_fingerprint_with_config(config: GlobalConfig) -> RsResult<()> {
    GLOBAL_DETECTOR
        .get_or_try_init(|| FingerprintDetector::new(config))
        .await?;
    Ok(())
}

/// 获取全局检测器
pub fn get_global_detector() -> RsResult<&'static FingerprintDetector> {
    GLOBAL_DETECTOR
        .get()
        .ok_or(RsFingerError::DetectorNotInitialized)
}

/// 使用全局检测器扫描单个响应（应用配置中的边界保护）
pub fn scan_response(response: &Response) -> RsResult<Vec<MatchResult>> {
    get_global_detector()?.try_scan(response)
}

pub fn scan_http(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> RsResult<Vec<MatchResult>> {
    get_global_detector()?.scan_http(status, headers, body)
}

pub fn scan_with_hashmap(
    headers: &HashMap<String, Vec<String>>,
    body: &[u8],
) -> RsResult<Vec<MatchResult>> {
    get_global_detector()?.scan_with_hashmap(headers, body)
}
