//! rsfingerprint - 基于模板的HTTP响应指纹识别引擎

// 导出全局错误类型
pub use self::error::{CorpusError, RsFingerError, RsResult};

// 导出配置模块
pub use self::config::{ConfigManager, CustomConfigBuilder, GlobalConfig, ScanGuard};

// 导出规则模块核心接口
pub use self::rule::{
    Condition, MatchResult, RuleCacheManager, RuleLoader, TemplateCorpus, TemplateRecord,
};

// 导出响应模型
pub use self::response::{Response, ResponseView};

// 导出工具模块核心接口
pub use self::utils::{HeaderConverter, VersionExtractor};

// 导出编译模块核心接口
pub use self::compiler::{CompiledTemplate, Part, TemplateCompiler, TemplateSet};

// 导出检测模块核心接口
pub use self::detector::{
    FingerprintDetector, init_fingerprint, init_fingerprint_with_config, scan, scan_http,
    scan_response, scan_with_hashmap,
};

// 声明所有子模块
pub mod compiler;
pub mod config;
pub mod detector;
pub mod error;
pub mod response;
pub mod rule;
pub mod utils;
