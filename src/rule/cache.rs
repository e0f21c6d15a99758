//! 指纹库缓存管理
//! 仅处理原始指纹库的本地序列化（MessagePack）和反序列化

use tracing::debug;

use super::model::TemplateCorpus;
use crate::config::GlobalConfig;
use crate::error::{RsFingerError, RsResult};

/// 指纹库缓存管理器
pub struct RuleCacheManager;

impl RuleCacheManager {
    /// 从本地缓存加载指纹库
    pub async fn load_from_cache(config: &GlobalConfig) -> RsResult<TemplateCorpus> {
        let cache_data = tokio::fs::read(&config.cache_path).await?;

        // MessagePack反序列化
        let corpus: TemplateCorpus = rmp_serde::from_slice(&cache_data)
            .map_err(|e| RsFingerError::MsgPackError(format!("反序列化失败：{}", e)))?;

        debug!("缓存文件反序列化成功，模板数：{}", corpus.len());

        Ok(corpus)
    }

    /// 将指纹库缓存到本地
    pub async fn save_to_cache(config: &GlobalConfig, corpus: &TemplateCorpus) -> RsResult<()> {
        // 以map形式写入结构体，字段增减时旧缓存仍可读
        let cache_data = rmp_serde::to_vec_named(corpus)
            .map_err(|e| RsFingerError::MsgPackError(format!("序列化失败：{}", e)))?;

        debug!("指纹库序列化成功，序列化后数据大小：{} 字节", cache_data.len());

        tokio::fs::write(&config.cache_path, cache_data).await?;
        Ok(())
    }

    /// 清除本地缓存
    pub async fn clear_cache(config: &GlobalConfig) -> RsResult<()> {
        let cache_path = &config.cache_path;
        if tokio::fs::try_exists(cache_path).await? {
            tokio::fs::remove_file(cache_path).await?;
        }
        Ok(())
    }
}
