//! 编译后模板模型
//! 正则预编译、关键字归一化后的结构，加载后只读

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;

use crate::error::CorpusError;
use crate::rule::Condition;

/// 匹配/提取的目标部位
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Part {
    /// 响应体
    Body,
    /// 全部响应头，按 `Name: value` 逐行拼接
    Headers,
    /// 指定名称的响应头（大小写不敏感）
    Header(String),
    /// 状态码
    Status,
    /// 响应体 + 全部响应头值
    All,
}

impl FromStr for Part {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some((prefix, name)) = trimmed.split_once(':') {
            let name = name.trim();
            if prefix.trim().eq_ignore_ascii_case("header") && !name.is_empty() {
                return Ok(Part::Header(name.to_string()));
            }
            return Err(s.to_string());
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "body" => Ok(Part::Body),
            "header" | "headers" => Ok(Part::Headers),
            "status" | "status_code" => Ok(Part::Status),
            "all" | "response" => Ok(Part::All),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Body => f.write_str("body"),
            Part::Headers => f.write_str("header"),
            Part::Header(name) => write!(f, "header:{}", name),
            Part::Status => f.write_str("status"),
            Part::All => f.write_str("all"),
        }
    }
}

/// 关键字列表（大小写不敏感时已预先转小写）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordList {
    pub words: Vec<String>,
    pub case_sensitive: bool,
}

impl WordList {
    pub fn new(words: &[String], case_sensitive: bool) -> Self {
        let words = if case_sensitive {
            words.to_vec()
        } else {
            words.iter().map(|w| w.to_lowercase()).collect()
        };
        Self {
            words,
            case_sensitive,
        }
    }
}

/// matcher的具体判定方式
#[derive(Debug, Clone)]
pub enum MatcherKind {
    Word(WordList),
    Regex(Vec<Regex>),
    Header(WordList),
    Status(Vec<u16>),
    FaviconHash(Vec<String>),
}

impl MatcherKind {
    pub fn pattern_count(&self) -> usize {
        match self {
            MatcherKind::Word(w) | MatcherKind::Header(w) => w.words.len(),
            MatcherKind::Regex(r) => r.len(),
            MatcherKind::Status(s) => s.len(),
            MatcherKind::FaviconHash(h) => h.len(),
        }
    }
}

/// 编译后的matcher
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    pub name: Option<String>,
    pub part: Part,
    pub kind: MatcherKind,
    pub condition: Condition,
    pub negate: bool,
    pub internal: bool,
    /// 报告全部命中的pattern；否则 or 条件下只报告第一个
    pub match_all: bool,
}

/// 提取时取哪一部分
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractGroup {
    Whole,
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone)]
pub enum ExtractorKind {
    Regex {
        patterns: Vec<Regex>,
        group: ExtractGroup,
        template: Option<String>,
    },
    /// keys 已归一化：小写，`_` 替换为 `-`
    KVal { keys: Vec<String> },
    /// JSONPath 表达式，目标部位不是合法JSON时不产出值
    Json { paths: Vec<String> },
}

/// 编译后的extractor
#[derive(Debug, Clone)]
pub struct CompiledExtractor {
    pub label: String,
    pub part: Part,
    pub kind: ExtractorKind,
}

/// 一组matcher及其extractor，组内按 condition 合并
#[derive(Debug, Clone)]
pub struct OperatorBlock {
    pub condition: Condition,
    pub matchers: Vec<CompiledMatcher>,
    pub extractors: Vec<CompiledExtractor>,
}

/// 编译后的指纹模板
/// 扁平写法只有一组；v4 写法每个 http 项一组，任意一组命中即模板命中
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub blocks: Vec<OperatorBlock>,
}

impl CompiledTemplate {
    pub fn matchers(&self) -> impl Iterator<Item = &CompiledMatcher> {
        self.blocks.iter().flat_map(|b| b.matchers.iter())
    }

    pub fn extractors(&self) -> impl Iterator<Item = &CompiledExtractor> {
        self.blocks.iter().flat_map(|b| b.extractors.iter())
    }
}

/// 模板库：按加载顺序保存通过校验的模板，加载后只读
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: Arc<[CompiledTemplate]>,
    rejected: Arc<[CorpusError]>,
}

impl TemplateSet {
    pub fn new(templates: Vec<CompiledTemplate>, rejected: Vec<CorpusError>) -> Self {
        Self {
            templates: templates.into(),
            rejected: rejected.into(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledTemplate> {
        self.templates.iter()
    }

    pub fn templates(&self) -> &[CompiledTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&CompiledTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 加载时被拒绝的模板及原因
    pub fn rejected(&self) -> &[CorpusError] {
        &self.rejected
    }
}

impl<'a> IntoIterator for &'a TemplateSet {
    type Item = &'a CompiledTemplate;
    type IntoIter = std::slice::Iter<'a, CompiledTemplate>;

    fn into_iter(self) -> Self::IntoIter {
        self.templates.iter()
    }
}
