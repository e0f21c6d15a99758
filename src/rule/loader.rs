//! 指纹库加载管理器
//! 负责从本地文件、本地缓存或远程拉取原始指纹库

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::cache::RuleCacheManager;
use super::model::{TemplateCorpus, TemplateRecord};
use crate::compiler::{TemplateCompiler, TemplateSet};
use crate::config::GlobalConfig;
use crate::error::{CorpusError, RsFingerError, RsResult};

/// 指纹库文档的两种顶层形态
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CorpusDocument {
    List(Vec<Value>),
    Wrapped { templates: Vec<Value> },
}

/// 指纹库加载管理器
pub struct RuleLoader;

impl RuleLoader {
    /// 加载并编译指纹库（本地文件 > 本地缓存 > 远程拉取）
    /// 缓存或远程指纹库编译后没有任何可用模板时视为加载失败，且不写入缓存
    pub async fn load_templates(config: &GlobalConfig) -> RsResult<TemplateSet> {
        // 1. 显式指定的本地文件，失败直接返回
        if let Some(path) = &config.corpus_path {
            let set = TemplateCompiler::compile(&Self::load_from_file(path).await?);
            if set.is_empty() {
                warn!("指纹库文件 {} 中没有可用模板", path.display());
            }
            return Ok(set);
        }

        // 2. 本地缓存
        match RuleCacheManager::load_from_cache(config).await {
            Ok(corpus) => {
                let set = TemplateCompiler::compile(&corpus);
                if !set.is_empty() {
                    debug!("从本地缓存加载指纹库成功，可用模板{}个", set.len());
                    return Ok(set);
                }
                warn!("本地缓存中没有可用模板，将拉取远程指纹库");
            }
            Err(_) => warn!("本地缓存不存在或损坏，将拉取远程指纹库"),
        }

        // 3. 拉取远程指纹库
        let corpus = Self::fetch_remote(config).await?;
        let set = TemplateCompiler::compile(&corpus);

        // 4. 缓存到本地
        Self::cache_if_usable(config, &corpus, &set).await?;

        Ok(set)
    }

    /// 编译结果可用时写入缓存；全部模板被拒绝时返回错误且不写缓存
    /// 缓存写入失败只记录日志
    pub async fn cache_if_usable(
        config: &GlobalConfig,
        corpus: &TemplateCorpus,
        set: &TemplateSet,
    ) -> RsResult<()> {
        if set.is_empty() {
            let reason = set
                .rejected()
                .first()
                .map(ToString::to_string)
                .unwrap_or_else(|| "指纹库为空".to_string());
            return Err(RsFingerError::RuleLoadError(format!(
                "指纹库中没有可用模板（拒绝{}个），首个原因：{}",
                set.rejected().len(),
                reason
            )));
        }

        if let Err(e) = RuleCacheManager::save_to_cache(config, corpus).await {
            warn!("指纹库缓存到本地失败：{}", e);
        } else {
            debug!("远程指纹库已缓存到本地");
        }
        Ok(())
    }

    /// 读取本地JSON指纹库
    pub async fn load_from_file(path: &Path) -> RsResult<TemplateCorpus> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RsFingerError::RuleLoadError(format!("读取指纹库文件 {} 失败：{}", path.display(), e))
        })?;
        let corpus = Self::parse_corpus(&content)?;
        debug!("从文件 {} 加载指纹库，模板数：{}", path.display(), corpus.len());
        Ok(corpus)
    }

    /// 解析JSON指纹库
    /// 逐条反序列化，单条记录格式错误只拒绝该记录
    pub fn parse_corpus(json: &str) -> RsResult<TemplateCorpus> {
        let values = match serde_json::from_str(json)? {
            CorpusDocument::List(values) => values,
            CorpusDocument::Wrapped { templates } => templates,
        };

        let mut corpus = TemplateCorpus::default();
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<TemplateRecord>(value) {
                Ok(record) => corpus.templates.push(record),
                Err(e) => {
                    let err = CorpusError::Malformed {
                        index,
                        message: e.to_string(),
                    };
                    warn!("跳过格式错误的模板：{}", err);
                    corpus.rejected.push(err);
                }
            }
        }

        Ok(corpus)
    }

    /// 强制拉取远程指纹库（原始URL失败则尝试代理URL）
    pub async fn fetch_remote(config: &GlobalConfig) -> RsResult<TemplateCorpus> {
        let raw_url = Url::parse(&config.corpus_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout))
            .build()?;

        debug!("开始拉取远程指纹库，URL：{}", raw_url);
        let raw_err = match Self::fetch_corpus(&client, raw_url.as_str()).await {
            Ok(corpus) => {
                debug!("成功拉取远程指纹库，模板数：{}", corpus.len());
                return Ok(corpus);
            }
            Err(e) => e,
        };

        let proxy_path = raw_url.as_str().trim_start_matches("https://");
        let fallback_url = format!("{}{}", config.gh_proxy_url, proxy_path);
        warn!("拉取原始URL失败：{}，尝试代理URL：{}", raw_err, fallback_url);

        match Self::fetch_corpus(&client, &fallback_url).await {
            Ok(corpus) => {
                debug!("通过代理成功拉取远程指纹库，模板数：{}", corpus.len());
                Ok(corpus)
            }
            Err(proxy_err) => {
                warn!("代理URL也拉取失败：{}", proxy_err);
                Err(RsFingerError::RuleLoadError(format!(
                    "远程指纹库拉取失败：{}；代理：{}",
                    raw_err, proxy_err
                )))
            }
        }
    }

    async fn fetch_corpus(client: &Client, url: &str) -> RsResult<TemplateCorpus> {
        let response = client
            .get(url)
            .header("User-Agent", concat!("rsfingerprint/", env!("CARGO_PKG_VERSION")))
            .header("Accept-Encoding", "gzip, deflate")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RsFingerError::RuleLoadError(format!(
                "URL {} 返回状态码 {}",
                url,
                response.status()
            )));
        }

        let body = response.text().await?;
        Self::parse_corpus(&body)
    }
}
