//! 指纹模板数据模型定义
//! 仅存储模板原始数据，无任何业务逻辑，支持序列化/反序列化

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CorpusError;

/// 逻辑组合方式（matcher之间 / pattern之间）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    #[default]
    #[serde(alias = "OR")]
    Or,
    #[serde(alias = "AND")]
    And,
}

impl Condition {
    /// 按组合方式合并一组布尔结果
    pub fn combine<I: IntoIterator<Item = bool>>(self, outcomes: I) -> bool {
        let mut outcomes = outcomes.into_iter();
        match self {
            Condition::Or => outcomes.any(|x| x),
            Condition::And => outcomes.all(|x| x),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Or => f.write_str("or"),
            Condition::And => f.write_str("and"),
        }
    }
}

/// matcher类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatcherType {
    Word,
    Regex,
    Header,
    Status,
    #[serde(alias = "favicon")]
    FaviconHash,
}

/// extractor类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorType {
    Regex,
    #[serde(alias = "KVal")]
    Kval,
    /// JSONPath 查询
    #[serde(alias = "JSON")]
    Json,
}

/// 提取分组：数字下标或命名分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupSelector {
    Index(usize),
    Name(String),
}

/// 单条matcher定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatcherRecord {
    #[serde(rename = "type", alias = "kind")]
    pub kind: MatcherType,
    #[serde(default)]
    pub part: Option<String>,
    #[serde(
        default,
        alias = "words",
        alias = "regex",
        alias = "status",
        alias = "hash",
        deserialize_with = "string_or_vec"
    )]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default)]
    pub case_sensitive: bool,
    /// nuclei写法，显式为 false 时等同 case-sensitive
    #[serde(default)]
    pub case_insensitive: Option<bool>,
    #[serde(default, alias = "negative")]
    pub negate: bool,
    /// 报告全部命中的pattern，而不只是第一个
    #[serde(default)]
    pub match_all: bool,
    #[serde(default)]
    pub name: Option<String>,
    // 只参与组合判断，不出现在命中列表中
    #[serde(default)]
    pub internal: bool,
}

impl MatcherRecord {
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive || self.case_insensitive == Some(false)
    }
}

/// 单条extractor定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractorRecord {
    #[serde(rename = "type", alias = "kind")]
    pub kind: ExtractorType,
    #[serde(default)]
    pub part: Option<String>,
    #[serde(default, alias = "regex", alias = "json", deserialize_with = "string_or_vec")]
    pub patterns: Vec<String>,
    #[serde(default, alias = "kval", deserialize_with = "string_or_vec")]
    pub key: Vec<String>,
    #[serde(default)]
    pub group: Option<GroupSelector>,
    /// 版本模板，支持 $1 / \1 分组引用
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default, alias = "name")]
    pub label: Option<String>,
}

/// 模板元信息（nuclei / FingerprintHub v4 的 `info` 对象，其余字段忽略）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TemplateInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "comma_separated")]
    pub tags: Vec<String>,
}

/// 一组matcher/extractor（FingerprintHub v4 `http` 数组中的一项）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OperatorRecord {
    #[serde(default)]
    pub matchers_condition: Condition,
    #[serde(default)]
    pub matchers: Vec<MatcherRecord>,
    #[serde(default)]
    pub extractors: Vec<ExtractorRecord>,
}

/// 单个指纹模板定义
/// 同时兼容扁平写法（顶层 name/matchers）与 v4 嵌套写法（info + http）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TemplateRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "comma_separated")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub matchers_condition: Condition,
    #[serde(default)]
    pub matchers: Vec<MatcherRecord>,
    #[serde(default)]
    pub extractors: Vec<ExtractorRecord>,
    #[serde(default)]
    pub info: Option<TemplateInfo>,
    #[serde(default)]
    pub http: Vec<OperatorRecord>,
}

impl TemplateRecord {
    /// 顶层 name 优先，其次 info.name
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.info.as_ref()?.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// 顶层标签在前，info.tags 在后（未去重）
    pub fn all_tags(&self) -> impl Iterator<Item = &String> {
        self.tags
            .iter()
            .chain(self.info.iter().flat_map(|info| info.tags.iter()))
    }

    /// 全部matcher组：顶层扁平写法算一组，`http` 中每项各算一组
    /// 两者都没有时返回一个空组，由编译阶段报告 matchers 为空
    pub fn operator_blocks(&self) -> Vec<(Condition, &[MatcherRecord], &[ExtractorRecord])> {
        let mut blocks = Vec::with_capacity(self.http.len() + 1);
        if !self.matchers.is_empty() || !self.extractors.is_empty() || self.http.is_empty() {
            blocks.push((
                self.matchers_condition,
                self.matchers.as_slice(),
                self.extractors.as_slice(),
            ));
        }
        for block in &self.http {
            blocks.push((
                block.matchers_condition,
                block.matchers.as_slice(),
                block.extractors.as_slice(),
            ));
        }
        blocks
    }
}

/// 原始指纹库（解析后、编译前）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateCorpus {
    pub templates: Vec<TemplateRecord>,
    /// 解析阶段即被拒绝的记录（不写入缓存）
    #[serde(skip)]
    pub rejected: Vec<CorpusError>,
}

impl TemplateCorpus {
    pub fn new(templates: Vec<TemplateRecord>) -> Self {
        Self {
            templates,
            rejected: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// 兼容 "a" / ["a","b"] / [200, 302] 等写法
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Scalar),
        Many(Vec<Scalar>),
        Null(()),
    }

    let to_string = |s: Scalar| match s {
        Scalar::Str(s) => s,
        Scalar::Int(n) => n.to_string(),
    };

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![to_string(s)],
        OneOrMany::Many(v) => v.into_iter().map(to_string).collect(),
        OneOrMany::Null(()) => Vec::new(),
    })
}

/// 标签兼容 "cms,php" 逗号分隔写法
fn comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(string_or_vec(deserializer)?
        .iter()
        .flat_map(|tag| tag.split(','))
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_template_record() {
        let json = r#"{
            "id": "wordpress",
            "name": "WordPress",
            "tags": "cms,php",
            "matchers-condition": "and",
            "matchers": [
                {"type": "word", "part": "header:Set-Cookie", "words": ["PHPSESSID"], "name": "php-session"},
                {"type": "status", "status": [200, 302]}
            ],
            "extractors": [
                {"type": "regex", "part": "body", "regex": "WordPress ([\\d.]+)", "group": 1, "label": "version"}
            ]
        }"#;

        let record: TemplateRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id.as_deref(), Some("wordpress"));
        assert_eq!(record.tags, vec!["cms".to_string(), "php".to_string()]);
        assert_eq!(record.matchers_condition, Condition::And);
        assert_eq!(record.matchers[0].kind, MatcherType::Word);
        assert_eq!(record.matchers[0].patterns, vec!["PHPSESSID".to_string()]);
        assert_eq!(record.matchers[1].patterns, vec!["200".to_string(), "302".to_string()]);
        assert_eq!(record.extractors[0].group, Some(GroupSelector::Index(1)));
        assert_eq!(record.extractors[0].label.as_deref(), Some("version"));
    }

    #[test]
    fn test_defaults() {
        let json = r#"{"id": "x", "name": "X", "matchers": [{"kind": "favicon-hash", "patterns": "abc"}]}"#;
        let record: TemplateRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.matchers_condition, Condition::Or);
        assert!(record.tags.is_empty());
        assert!(record.extractors.is_empty());

        let matcher = &record.matchers[0];
        assert_eq!(matcher.kind, MatcherType::FaviconHash);
        assert_eq!(matcher.condition, Condition::Or);
        assert!(!matcher.case_sensitive);
        assert!(!matcher.negate);
        assert_eq!(matcher.patterns, vec!["abc".to_string()]);
    }

    #[test]
    fn test_single_pattern_keeps_commas() {
        let json = r#"{"type": "regex", "regex": "\\d{1,3}"}"#;
        let record: MatcherRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.patterns, vec![r"\d{1,3}".to_string()]);
    }

    #[test]
    fn test_named_group_selector() {
        let json = r#"{"type": "regex", "regex": ["(?P<ver>\\d+)"], "group": "ver"}"#;
        let record: ExtractorRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.group, Some(GroupSelector::Name("ver".to_string())));
    }

    #[test]
    fn test_parse_nested_v4_record() {
        let json = r#"{
            "id": "nginx",
            "info": {"name": "nginx", "author": "someone", "tags": "detect,tech,nginx", "severity": "info"},
            "http": [
                {"method": "GET", "path": ["{{BaseURL}}/"],
                 "matchers": [{"type": "word", "words": ["nginx"], "part": "header", "case-insensitive": true}]},
                {"method": "GET", "path": ["{{BaseURL}}/favicon.ico"],
                 "matchers": [{"type": "favicon", "hash": ["abc"]}]}
            ]
        }"#;

        let record: TemplateRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.display_name(), Some("nginx"));
        assert_eq!(
            record.all_tags().cloned().collect::<Vec<_>>(),
            vec!["detect".to_string(), "tech".to_string(), "nginx".to_string()]
        );

        let blocks = record.operator_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].1[0].patterns, vec!["nginx".to_string()]);
        assert!(!blocks[0].1[0].is_case_sensitive());
        assert_eq!(blocks[1].1[0].kind, MatcherType::FaviconHash);
    }

    #[test]
    fn test_flat_record_is_single_block() {
        let json = r#"{"id": "x", "name": "X", "matchers": []}"#;
        let record: TemplateRecord = serde_json::from_str(json).unwrap();
        let blocks = record.operator_blocks();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].1.is_empty());
    }

    #[test]
    fn test_explicit_case_insensitive_false() {
        let json = r#"{"type": "word", "words": ["A"], "case-insensitive": false}"#;
        let record: MatcherRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_case_sensitive());
    }

    #[test]
    fn test_condition_combine() {
        assert!(Condition::Or.combine([false, true]));
        assert!(!Condition::Or.combine([false, false]));
        assert!(Condition::And.combine([true, true]));
        assert!(!Condition::And.combine([true, false]));
    }
}
