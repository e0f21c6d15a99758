//! 规则模块：负责指纹库的加载、缓存、数据模型定义
pub mod cache;
pub mod loader;
pub mod match_result;
pub mod model;

// 导出核心接口
pub use self::cache::RuleCacheManager;
pub use self::loader::RuleLoader;
pub use self::match_result::MatchResult;
pub use self::model::{
    Condition, ExtractorRecord, ExtractorType, GroupSelector, MatcherRecord, MatcherType,
    OperatorRecord, TemplateCorpus, TemplateInfo, TemplateRecord,
};
