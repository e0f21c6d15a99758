//! 检测模块：指纹识别核心逻辑
pub mod detector;
pub mod evaluator;
pub mod extractor;
pub mod global;
pub mod matcher;

// 导出核心接口
pub use self::detector::{FingerprintDetector, scan, scan_guarded};
pub use self::evaluator::{MatchOutcome, TemplateEvaluator};
pub use self::extractor::ExtractorEngine;
pub use self::global::{
    get_global_detector, init_fingerprint, init_fingerprint_with_config, scan_http,
    scan_response, scan_with_hashmap,
};
pub use self::matcher::{MatcherEvaluator, MatcherHit};
