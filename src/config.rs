//! 全局配置管理,存储所有可配置项

use std::path::PathBuf;
use std::time::Duration;

/// 默认远程指纹库
pub const DEFAULT_CORPUS_URL: &str =
    "https://raw.githubusercontent.com/0x727/FingerprintHub/main/web_fingerprint_v4.json";

/// 扫描边界保护：限制单次扫描的输入大小与耗时
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanGuard {
    /// 响应体最大字节数
    pub max_body_bytes: Option<usize>,
    /// 单次扫描的最大耗时（在模板之间检查）
    pub time_budget: Option<Duration>,
}

impl ScanGuard {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_body_bytes.is_none() && self.time_budget.is_none()
    }
}

/// 全局配置
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    // 本地指纹库路径（JSON），优先级最高
    pub corpus_path: Option<PathBuf>,
    // 远程指纹库URL
    pub corpus_url: String,
    // 指纹库缓存路径（MessagePack）
    pub cache_path: PathBuf,
    // GitHub代理URL
    pub gh_proxy_url: String,
    // 超时配置（单位：秒）
    pub http_timeout: u64,
    // 是否启用详细日志
    pub verbose: bool,
    // 扫描边界保护
    pub scan_guard: ScanGuard,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            corpus_url: DEFAULT_CORPUS_URL.to_string(),
            cache_path: PathBuf::from("fingerprint_templates.mp"),
            gh_proxy_url: "https://ghfast.top/".to_string(),
            http_timeout: 30,
            verbose: false,
            scan_guard: ScanGuard::default(),
        }
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GlobalConfig::default(),
        }
    }

    pub fn corpus_path(mut self, path: PathBuf) -> Self {
        self.config.corpus_path = Some(path);
        self
    }

    pub fn corpus_url(mut self, url: String) -> Self {
        self.config.corpus_url = url;
        self
    }

    pub fn cache_path(mut self, path: PathBuf) -> Self {
        self.config.cache_path = path;
        self
    }

    pub fn gh_proxy_url(mut self, url: String) -> Self {
        self.config.gh_proxy_url = url;
        self
    }

    pub fn http_timeout(mut self, timeout: u64) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.scan_guard.max_body_bytes = Some(limit);
        self
    }

    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.config.scan_guard.time_budget = Some(budget);
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config
    }
}
