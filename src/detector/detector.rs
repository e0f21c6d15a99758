//! 检测器核心：遍历模板库识别单个响应，输出命中结果
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tracing::debug;

use super::evaluator::{MatchOutcome, TemplateEvaluator};
use crate::compiler::{CompiledTemplate, TemplateCompiler, TemplateSet};
use crate::config::{GlobalConfig, ScanGuard};
use crate::error::{RsFingerError, RsResult};
use crate::response::{Response, ResponseView};
use crate::rule::{MatchResult, RuleLoader};

/// 指纹检测器
/// 模板库加载后只读且通过Arc共享，可以克隆到多个任务中并发扫描
#[derive(Debug, Clone)]
pub struct FingerprintDetector {
    store: Arc<TemplateSet>,
    config: GlobalConfig,
}

impl FingerprintDetector {
    /// 创建检测器（按配置加载并编译指纹库）
    pub async fn new(config: GlobalConfig) -> RsResult<Self> {
        // 加载并编译指纹库
        let store = RuleLoader::load_templates(&config).await?;
        Ok(Self::with_store(store, config))
    }

    /// 直接从JSON文本创建
    pub fn from_json(json: &str, config: GlobalConfig) -> RsResult<Self> {
        Ok(Self::with_store(TemplateCompiler::load(json)?, config))
    }

    pub fn with_store(store: TemplateSet, config: GlobalConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    pub fn store(&self) -> &TemplateSet {
        &self.store
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// 扫描单个响应（无边界保护，不会失败）
    pub fn scan(&self, response: &Response) -> Vec<MatchResult> {
        scan(&self.store, response)
    }

    /// 带边界保护的扫描：响应体超限或超出时间预算时返回错误
    pub fn try_scan(&self, response: &Response) -> RsResult<Vec<MatchResult>> {
        let results = scan_guarded(&self.store, response, &self.config.scan_guard)?;
        if self.config.verbose {
            debug!(
                "扫描完成：模板{}个，命中{}个，响应体{}字节",
                self.store.len(),
                results.len(),
                response.body().len()
            );
        }
        Ok(results)
    }

    /// 扫描reqwest形式的响应（状态码 + HeaderMap + Body）
    pub fn scan_http(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
    ) -> RsResult<Vec<MatchResult>> {
        self.try_scan(&Response::from_header_map(status, headers, body))
    }

    /// 扫描 HashMap<String, Vec<String>> 形式的响应头 + Body
    pub fn scan_with_hashmap(
        &self,
        headers: &HashMap<String, Vec<String>>,
        body: &[u8],
    ) -> RsResult<Vec<MatchResult>> {
        self.try_scan(&Response::from_hashmap(headers, body))
    }
}

/// 扫描入口：按加载顺序判定全部模板，每个命中模板产出一条结果
/// 没有任何命中时返回空列表
pub fn scan(store: &TemplateSet, response: &Response) -> Vec<MatchResult> {
    let view = ResponseView::new(response);
    store
        .iter()
        .filter_map(|template| {
            TemplateEvaluator::evaluate(template, &view).map(|outcome| to_result(template, outcome))
        })
        .collect()
}

/// 带边界保护的扫描
/// 响应体大小在判定前检查；时间预算在两个模板之间检查
pub fn scan_guarded(
    store: &TemplateSet,
    response: &Response,
    guard: &ScanGuard,
) -> RsResult<Vec<MatchResult>> {
    if guard.is_unlimited() {
        return Ok(scan(store, response));
    }

    if let Some(limit) = guard.max_body_bytes {
        let size = response.body().len();
        if size > limit {
            return Err(RsFingerError::InputTooLarge { size, limit });
        }
    }

    let Some(budget) = guard.time_budget else {
        return Ok(scan(store, response));
    };

    let start = Instant::now();
    let view = ResponseView::new(response);
    let mut results = Vec::new();
    for (evaluated, template) in store.iter().enumerate() {
        if start.elapsed() >= budget {
            return Err(RsFingerError::ScanTimeout {
                budget,
                evaluated,
                total: store.len(),
            });
        }
        if let Some(outcome) = TemplateEvaluator::evaluate(template, &view) {
            results.push(to_result(template, outcome));
        }
    }
    debug!("扫描完成，耗时{:?}，命中{}个模板", start.elapsed(), results.len());

    Ok(results)
}

fn to_result(template: &CompiledTemplate, outcome: MatchOutcome) -> MatchResult {
    debug!(
        "模板命中：{}（{}），matcher={:?}",
        template.id, template.name, outcome.matcher_names
    );
    MatchResult {
        template: template.id.clone(),
        name: template.name.clone(),
        matcher_names: outcome.matcher_names,
        tags: template.tags.clone(),
        extractor: outcome.extracted,
    }
}
