//! 全局错误类型定义

use std::io::Error as IoError;
use std::time::Duration;

use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// 单个模板的加载错误
/// 只影响出错的那一个模板，语料库中其余模板照常加载
#[derive(Error, Debug, Clone)]
pub enum CorpusError {
    /// 记录无法映射为模板结构（缺字段/类型错误），此时可能还拿不到id
    #[error("Template #{index} is malformed: {message}")]
    Malformed { index: usize, message: String },

    #[error("Template [{id}] is missing required field `{field}`")]
    MissingField { id: String, field: &'static str },

    #[error("Template [{id}] has an empty matchers list")]
    EmptyMatchers { id: String },

    #[error("Template [{id}] matcher #{index} has no patterns")]
    EmptyPatterns { id: String, index: usize },

    #[error("Template [{id}] extractor #{index} has no patterns or keys")]
    EmptyExtractor { id: String, index: usize },

    #[error("Template [{id}] regex `{pattern}` failed to compile: {source}")]
    InvalidRegex {
        id: String,
        pattern: String,
        #[source]
        source: RegexError,
    },

    #[error("Template [{id}] has an invalid part `{part}`")]
    InvalidPart { id: String, part: String },

    #[error("Template [{id}] has an invalid status code `{value}`")]
    InvalidStatus { id: String, value: String },

    #[error("Template [{id}] extractor #{index} has an invalid group `{group}`")]
    InvalidGroup { id: String, index: usize, group: String },

    #[error("Template [{id}] is defined more than once")]
    DuplicateId { id: String },
}

impl CorpusError {
    /// 出错模板的标识（无id时为记录序号）
    pub fn template_ref(&self) -> String {
        match self {
            CorpusError::Malformed { index, .. } => format!("#{}", index),
            CorpusError::MissingField { id, .. }
            | CorpusError::EmptyMatchers { id }
            | CorpusError::EmptyPatterns { id, .. }
            | CorpusError::EmptyExtractor { id, .. }
            | CorpusError::InvalidRegex { id, .. }
            | CorpusError::InvalidPart { id, .. }
            | CorpusError::InvalidStatus { id, .. }
            | CorpusError::InvalidGroup { id, .. }
            | CorpusError::DuplicateId { id } => id.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RsFingerError {
    // 规则相关错误
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),
    #[error("Corpus load failed: {0}")]
    RuleLoadError(String),

    // 检测相关错误
    #[error("Detector not initialized")]
    DetectorNotInitialized,
    #[error("Response body too large: {size} bytes (limit {limit})")]
    InputTooLarge { size: usize, limit: usize },
    #[error("Scan exceeded time budget {budget:?} after {evaluated}/{total} templates")]
    ScanTimeout {
        budget: Duration,
        evaluated: usize,
        total: usize,
    },
    // 预留给正则引擎等内部不可恢复故障，匹配本身没有错误路径
    #[error("Evaluation failed: {0}")]
    EvaluationError(String),

    // 网络相关错误
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    // 序列化/反序列化错误
    #[error("JSON parse failed: {0}")]
    JsonError(#[from] SerdeJsonError),
    #[error("MessagePack (de)serialization failed: {0}")]
    MsgPackError(String),

    // 基础错误
    #[error("IO failed: {0}")]
    IoError(#[from] IoError),
    #[error("URL parse failed: {0}")]
    UrlError(#[from] UrlParseError),
}

// 全局Result类型
pub type RsResult<T> = Result<T, RsFingerError>;
