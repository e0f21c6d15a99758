//! 指纹识别结果

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 单个模板的命中结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatchResult {
    /// 模板ID
    pub template: String,
    pub name: String,
    /// 命中的matcher名称（按matcher顺序，不重复）
    pub matcher_names: Vec<String>,
    /// 命中的关键字 / 正则匹配文本等（不重复）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matcher_words: Vec<String>,
    pub tags: Vec<String>,
    /// label -> 提取值（extractor未提取到内容时为空列表）
    pub extractor: BTreeMap<String, Vec<String>>,
}

impl MatchResult {
    /// 常用的 `version` 提取结果，取第一个值
    pub fn version(&self) -> Option<&str> {
        self.extractor
            .get("version")
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.template, self.name)?;
        if let Some(version) = self.version() {
            write!(f, " {}", version)?;
        }
        if !self.matcher_names.is_empty() {
            write!(f, " ({})", self.matcher_names.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_version() {
        let mut result = MatchResult {
            template: "wordpress".to_string(),
            name: "WordPress".to_string(),
            matcher_names: vec!["generator".to_string()],
            matcher_words: vec!["wordpress".to_string()],
            tags: vec!["cms".to_string()],
            extractor: BTreeMap::new(),
        };
        assert_eq!(result.to_string(), "[wordpress] WordPress (generator)");
        assert!(result.version().is_none());

        result
            .extractor
            .insert("version".to_string(), vec!["5.8.2".to_string()]);
        assert_eq!(result.version(), Some("5.8.2"));
        assert_eq!(result.to_string(), "[wordpress] WordPress 5.8.2 (generator)");
        assert!(result.has_tag("CMS"));
    }

    #[test]
    fn test_serializes_kebab_case() {
        let mut result = MatchResult {
            template: "nginx".to_string(),
            name: "Nginx".to_string(),
            ..MatchResult::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("matcher-names").is_some());
        assert!(json.get("matcher-words").is_none());
        assert_eq!(json["template"], "nginx");

        result.matcher_words.push("nginx".to_string());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["matcher-words"][0], "nginx");
    }
}
