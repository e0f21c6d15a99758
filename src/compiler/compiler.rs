//! 模板编译器核心
//! 负责校验原始模板并预编译为可执行结构，单个模板出错只拒绝该模板

use std::collections::HashSet;
use std::time::Instant;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use super::pattern::{
    CompiledExtractor, CompiledMatcher, CompiledTemplate, ExtractGroup, ExtractorKind,
    MatcherKind, OperatorBlock, Part, TemplateSet, WordList,
};
use crate::error::{CorpusError, RsResult};
use crate::response::normalize_key;
use crate::rule::{
    ExtractorRecord, ExtractorType, GroupSelector, MatcherRecord, MatcherType, RuleLoader,
    TemplateCorpus, TemplateRecord,
};

/// 单条正则编译后程序大小上限
const REGEX_SIZE_LIMIT: usize = 2 * (1 << 20);

/// 模板编译器
pub struct TemplateCompiler;

impl TemplateCompiler {
    /// 解析并编译JSON指纹库
    /// 整个文档不是合法JSON时返回错误，单个模板的问题只记录在 `TemplateSet::rejected`
    pub fn load(json: &str) -> RsResult<TemplateSet> {
        let corpus = RuleLoader::parse_corpus(json)?;
        Ok(Self::compile(&corpus))
    }

    /// 编译指纹库
    pub fn compile(corpus: &TemplateCorpus) -> TemplateSet {
        let start = Instant::now();
        let mut stats = CompileStats::default();
        let mut templates = Vec::with_capacity(corpus.len());
        let mut rejected = corpus.rejected.clone();
        let mut seen_ids = HashSet::new();

        for (index, record) in corpus.templates.iter().enumerate() {
            let compiled = Self::compile_template(index, record).and_then(|template| {
                if seen_ids.insert(template.id.clone()) {
                    Ok(template)
                } else {
                    Err(CorpusError::DuplicateId { id: template.id })
                }
            });

            match compiled {
                Ok(template) => {
                    stats.record(&template);
                    templates.push(template);
                }
                Err(e) => {
                    warn!("模板 [{}] 已拒绝：{}", e.template_ref(), e);
                    rejected.push(e);
                }
            }
        }

        debug!("✅ 模板编译完成，总耗时{:?}", start.elapsed());
        debug!(
            "📊 编译统计：模板{}个（拒绝{}个），word{}条、regex{}条、header{}条、status{}条、favicon{}条，extractor{}个",
            templates.len(),
            rejected.len(),
            stats.word_count,
            stats.regex_count,
            stats.header_count,
            stats.status_count,
            stats.favicon_count,
            stats.extractor_count
        );

        TemplateSet::new(templates, rejected)
    }

    /// 编译单个模板
    pub fn compile_template(
        index: usize,
        record: &TemplateRecord,
    ) -> Result<CompiledTemplate, CorpusError> {
        let id = match record.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(CorpusError::MissingField {
                    id: format!("#{}", index),
                    field: "id",
                });
            }
        };
        let Some(name) = record.display_name().map(str::to_string) else {
            return Err(CorpusError::MissingField { id, field: "name" });
        };

        let mut blocks = Vec::new();
        let mut matcher_index = 0;
        let mut extractor_index = 0;
        for (condition, matchers, extractors) in record.operator_blocks() {
            if matchers.is_empty() {
                return Err(CorpusError::EmptyMatchers { id });
            }
            // 下标在整个模板内连续编号，便于定位出错的matcher/extractor
            let compiled_matchers = matchers
                .iter()
                .enumerate()
                .map(|(i, m)| Self::compile_matcher(&id, matcher_index + i, m))
                .collect::<Result<Vec<_>, _>>()?;
            let compiled_extractors = extractors
                .iter()
                .enumerate()
                .map(|(i, e)| Self::compile_extractor(&id, extractor_index + i, e))
                .collect::<Result<Vec<_>, _>>()?;
            matcher_index += matchers.len();
            extractor_index += extractors.len();

            blocks.push(OperatorBlock {
                condition,
                matchers: compiled_matchers,
                extractors: compiled_extractors,
            });
        }

        let mut tags: Vec<String> = Vec::new();
        for tag in record.all_tags() {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        Ok(CompiledTemplate {
            id,
            name,
            tags,
            blocks,
        })
    }

    fn compile_matcher(
        id: &str,
        index: usize,
        record: &MatcherRecord,
    ) -> Result<CompiledMatcher, CorpusError> {
        let patterns = non_blank(&record.patterns);
        if patterns.is_empty() {
            return Err(CorpusError::EmptyPatterns {
                id: id.to_string(),
                index,
            });
        }

        let default_part = match record.kind {
            MatcherType::Header => Part::Headers,
            MatcherType::Status => Part::Status,
            MatcherType::Word | MatcherType::Regex | MatcherType::FaviconHash => Part::Body,
        };
        let part = Self::parse_part(id, record.part.as_deref(), default_part)?;
        let case_sensitive = record.is_case_sensitive();

        let kind = match record.kind {
            MatcherType::Word => MatcherKind::Word(WordList::new(&patterns, case_sensitive)),
            MatcherType::Header => MatcherKind::Header(WordList::new(&patterns, case_sensitive)),
            MatcherType::Regex => MatcherKind::Regex(Self::compile_regexes(id, &patterns)?),
            MatcherType::Status => MatcherKind::Status(
                patterns
                    .iter()
                    .map(|code| {
                        code.trim().parse::<u16>().map_err(|_| CorpusError::InvalidStatus {
                            id: id.to_string(),
                            value: code.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            MatcherType::FaviconHash => MatcherKind::FaviconHash(
                patterns.iter().map(|h| h.trim().to_ascii_lowercase()).collect(),
            ),
        };

        Ok(CompiledMatcher {
            name: record.name.clone().filter(|n| !n.trim().is_empty()),
            part,
            kind,
            condition: record.condition,
            negate: record.negate,
            internal: record.internal,
            match_all: record.match_all,
        })
    }

    fn compile_extractor(
        id: &str,
        index: usize,
        record: &ExtractorRecord,
    ) -> Result<CompiledExtractor, CorpusError> {
        let label = record
            .label
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| index.to_string());
        let part = Self::parse_part(id, record.part.as_deref(), Part::Body)?;
        let empty = || CorpusError::EmptyExtractor {
            id: id.to_string(),
            index,
        };

        let kind = match record.kind {
            ExtractorType::Regex => {
                let patterns = non_blank(&record.patterns);
                if patterns.is_empty() {
                    return Err(empty());
                }
                let patterns = Self::compile_regexes(id, &patterns)?;
                let group = Self::resolve_group(id, index, record.group.as_ref(), &patterns)?;
                ExtractorKind::Regex {
                    patterns,
                    group,
                    template: record.template.clone().filter(|t| !t.trim().is_empty()),
                }
            }
            ExtractorType::Kval => {
                let keys: Vec<String> = record
                    .key
                    .iter()
                    .chain(record.patterns.iter())
                    .map(|k| normalize_key(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                if keys.is_empty() {
                    return Err(empty());
                }
                ExtractorKind::KVal { keys }
            }
            ExtractorType::Json => {
                let paths: Vec<String> = non_blank(&record.patterns)
                    .iter()
                    .map(|p| p.trim().to_string())
                    .collect();
                if paths.is_empty() {
                    return Err(empty());
                }
                ExtractorKind::Json { paths }
            }
        };

        Ok(CompiledExtractor { label, part, kind })
    }

    /// 校验提取分组：数字分组需在每条正则的分组范围内，命名分组需至少在一条正则中存在
    fn resolve_group(
        id: &str,
        index: usize,
        group: Option<&GroupSelector>,
        patterns: &[Regex],
    ) -> Result<ExtractGroup, CorpusError> {
        let invalid = |g: String| CorpusError::InvalidGroup {
            id: id.to_string(),
            index,
            group: g,
        };

        let group = match group {
            None => return Ok(ExtractGroup::Whole),
            Some(GroupSelector::Index(n)) => ExtractGroup::Index(*n),
            Some(GroupSelector::Name(name)) => match name.trim().parse::<usize>() {
                Ok(n) => ExtractGroup::Index(n),
                Err(_) => ExtractGroup::Name(name.trim().to_string()),
            },
        };

        match group {
            ExtractGroup::Index(0) => Ok(ExtractGroup::Whole),
            ExtractGroup::Index(n) => {
                if patterns.iter().all(|re| n < re.captures_len()) {
                    Ok(ExtractGroup::Index(n))
                } else {
                    Err(invalid(n.to_string()))
                }
            }
            ExtractGroup::Name(name) => {
                let exists = patterns
                    .iter()
                    .any(|re| re.capture_names().flatten().any(|n| n == name));
                if exists {
                    Ok(ExtractGroup::Name(name))
                } else {
                    Err(invalid(name))
                }
            }
            ExtractGroup::Whole => Ok(ExtractGroup::Whole),
        }
    }

    fn parse_part(id: &str, raw: Option<&str>, default: Part) -> Result<Part, CorpusError> {
        match raw {
            None => Ok(default),
            Some(raw) if raw.trim().is_empty() => Ok(default),
            Some(raw) => raw.parse().map_err(|part| CorpusError::InvalidPart {
                id: id.to_string(),
                part,
            }),
        }
    }

    fn compile_regexes(id: &str, patterns: &[String]) -> Result<Vec<Regex>, CorpusError> {
        patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .size_limit(REGEX_SIZE_LIMIT)
                    .build()
                    .map_err(|source| CorpusError::InvalidRegex {
                        id: id.to_string(),
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect()
    }
}

/// 去掉空白pattern，空串会匹配任意内容
fn non_blank(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .filter(|p| !p.trim().is_empty())
        .cloned()
        .collect()
}

/// 编译统计信息
#[derive(Debug, Clone, Default)]
struct CompileStats {
    word_count: usize,
    regex_count: usize,
    header_count: usize,
    status_count: usize,
    favicon_count: usize,
    extractor_count: usize,
}

impl CompileStats {
    fn record(&mut self, template: &CompiledTemplate) {
        for matcher in template.matchers() {
            let count = matcher.kind.pattern_count();
            match matcher.kind {
                MatcherKind::Word(_) => self.word_count += count,
                MatcherKind::Regex(_) => self.regex_count += count,
                MatcherKind::Header(_) => self.header_count += count,
                MatcherKind::Status(_) => self.status_count += count,
                MatcherKind::FaviconHash(_) => self.favicon_count += count,
            }
        }
        self.extractor_count += template.extractors().count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Condition;

    fn record(json: &str) -> TemplateRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_compile_valid_template() {
        let template = TemplateCompiler::compile_template(
            0,
            &record(
                r#"{"id": "wordpress", "name": "WordPress", "tags": ["cms", "cms", "php"],
                    "matchers-condition": "and",
                    "matchers": [
                        {"type": "word", "part": "header:Set-Cookie", "words": ["PHPSESSID"]},
                        {"type": "word", "words": ["WordPress"]}
                    ],
                    "extractors": [{"type": "regex", "regex": "WordPress ([\\d.]+)", "group": 1, "label": "version"}]}"#,
            ),
        )
        .unwrap();

        assert_eq!(template.id, "wordpress");
        assert_eq!(template.tags, vec!["cms".to_string(), "php".to_string()]);
        assert_eq!(template.blocks.len(), 1);
        let block = &template.blocks[0];
        assert_eq!(block.condition, Condition::And);
        assert_eq!(block.matchers[0].part, Part::Header("Set-Cookie".to_string()));
        assert_eq!(block.matchers[1].part, Part::Body);
        assert_eq!(block.extractors[0].label, "version");
        assert!(matches!(
            block.extractors[0].kind,
            ExtractorKind::Regex { group: ExtractGroup::Index(1), .. }
        ));
    }

    #[test]
    fn test_default_parts_per_kind() {
        let template = TemplateCompiler::compile_template(
            0,
            &record(
                r#"{"id": "t", "name": "T", "matchers": [
                    {"type": "header", "words": ["nginx"]},
                    {"type": "status", "status": [200]},
                    {"type": "regex", "regex": "a+"}
                ]}"#,
            ),
        )
        .unwrap();
        let matchers: Vec<&CompiledMatcher> = template.matchers().collect();
        assert_eq!(matchers[0].part, Part::Headers);
        assert_eq!(matchers[1].part, Part::Status);
        assert_eq!(matchers[2].part, Part::Body);
    }

    #[test]
    fn test_rejections() {
        let cases = [
            (r#"{"name": "X", "matchers": [{"type": "word", "words": ["x"]}]}"#, "id"),
            (r#"{"id": "x", "matchers": [{"type": "word", "words": ["x"]}]}"#, "name"),
            (r#"{"id": "x", "name": "X", "matchers": []}"#, "empty-matchers"),
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "word", "words": []}]}"#, "empty-patterns"),
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "regex", "regex": ["("]}]}"#, "regex"),
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "word", "part": "cookie", "words": ["a"]}]}"#, "part"),
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "status", "status": ["ok"]}]}"#, "status"),
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "word", "words": ["a"]}],
                 "extractors": [{"type": "regex", "regex": "(a)", "group": 2}]}"#, "group"),
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "word", "words": ["a"]}],
                 "extractors": [{"type": "kval"}]}"#, "extractor"),
            // 空白pattern等同于没有pattern
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "word", "words": [""]}]}"#, "empty-patterns"),
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "regex", "regex": ["", "  "]}]}"#, "empty-patterns"),
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "word", "words": ["a"]}],
                 "extractors": [{"type": "regex", "regex": [""]}]}"#, "extractor"),
            (r#"{"id": "x", "name": "X", "matchers": [{"type": "word", "words": ["a"]}],
                 "extractors": [{"type": "json", "json": [" "]}]}"#, "extractor"),
            (r#"{"id": "x", "info": {"name": "X"}, "http": [{"matchers": []}]}"#, "empty-matchers"),
        ];

        for (json, expected) in cases {
            let err = TemplateCompiler::compile_template(3, &record(json)).unwrap_err();
            let ok = match (expected, &err) {
                ("id", CorpusError::MissingField { id, field: "id" }) => id == "#3",
                ("name", CorpusError::MissingField { field: "name", .. }) => true,
                ("empty-matchers", CorpusError::EmptyMatchers { .. }) => true,
                ("empty-patterns", CorpusError::EmptyPatterns { index: 0, .. }) => true,
                ("regex", CorpusError::InvalidRegex { .. }) => true,
                ("part", CorpusError::InvalidPart { .. }) => true,
                ("status", CorpusError::InvalidStatus { .. }) => true,
                ("group", CorpusError::InvalidGroup { .. }) => true,
                ("extractor", CorpusError::EmptyExtractor { .. }) => true,
                _ => false,
            };
            assert!(ok, "expected {} but got {:?}", expected, err);
        }
    }

    #[test]
    fn test_bad_template_does_not_abort_corpus() {
        let set = TemplateCompiler::load(
            r#"[
                {"id": "a", "name": "A", "matchers": [{"type": "word", "words": ["a"]}]},
                {"id": "broken", "name": "Broken", "matchers": []},
                {"id": "bad-regex", "name": "Bad", "matchers": [{"type": "regex", "regex": ["[unclosed"]}]},
                {"id": "a", "name": "A again", "matchers": [{"type": "word", "words": ["a"]}]},
                {"id": "b", "name": "B", "matchers": [{"type": "word", "words": ["b"]}]}
            ]"#,
        )
        .unwrap();

        let ids: Vec<&str> = set.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(set.rejected().len(), 3);
        assert!(matches!(set.rejected()[0], CorpusError::EmptyMatchers { .. }));
        assert!(matches!(set.rejected()[1], CorpusError::InvalidRegex { .. }));
        assert!(matches!(set.rejected()[2], CorpusError::DuplicateId { .. }));
    }

    #[test]
    fn test_named_and_numeric_string_groups() {
        let template = TemplateCompiler::compile_template(
            0,
            &record(
                r#"{"id": "t", "name": "T", "matchers": [{"type": "word", "words": ["a"]}],
                    "extractors": [
                        {"type": "regex", "regex": "v(?P<ver>\\d+)", "group": "ver"},
                        {"type": "regex", "regex": "v(\\d+)", "group": "1"},
                        {"type": "kval", "key": ["X_Powered_By"]}
                    ]}"#,
            ),
        )
        .unwrap();

        let extractors = &template.blocks[0].extractors;
        assert!(matches!(
            &extractors[0].kind,
            ExtractorKind::Regex { group: ExtractGroup::Name(n), .. } if n == "ver"
        ));
        assert!(matches!(
            extractors[1].kind,
            ExtractorKind::Regex { group: ExtractGroup::Index(1), .. }
        ));
        assert_eq!(extractors[0].label, "0");
        assert!(matches!(
            &extractors[2].kind,
            ExtractorKind::KVal { keys } if keys == &vec!["x-powered-by".to_string()]
        ));
    }

    #[test]
    fn test_blank_patterns_are_dropped() {
        let template = TemplateCompiler::compile_template(
            0,
            &record(
                r#"{"id": "t", "name": "T", "matchers": [{"type": "word", "words": ["", "nginx", " "]}]}"#,
            ),
        )
        .unwrap();
        assert!(matches!(
            &template.blocks[0].matchers[0].kind,
            MatcherKind::Word(list) if list.words == vec!["nginx".to_string()]
        ));
    }

    #[test]
    fn test_compile_nested_v4_template() {
        let template = TemplateCompiler::compile_template(
            0,
            &record(
                r#"{
                    "id": "nginx",
                    "info": {"name": "nginx", "author": "x", "tags": "detect,tech,nginx"},
                    "http": [
                        {"method": "GET", "path": ["{{BaseURL}}/"],
                         "matchers-condition": "and",
                         "matchers": [
                            {"type": "word", "words": ["nginx"], "part": "header"},
                            {"type": "status", "status": [200]}
                         ],
                         "extractors": [{"type": "json", "json": ["$.version"]}]},
                        {"method": "GET", "path": ["{{BaseURL}}/favicon.ico"],
                         "matchers": [{"type": "favicon", "hash": ["ABC"]}]}
                    ]
                }"#,
            ),
        )
        .unwrap();

        assert_eq!(template.name, "nginx");
        assert_eq!(
            template.tags,
            vec!["detect".to_string(), "tech".to_string(), "nginx".to_string()]
        );
        assert_eq!(template.blocks.len(), 2);
        assert_eq!(template.blocks[0].condition, Condition::And);
        assert_eq!(template.blocks[0].matchers[0].part, Part::Headers);
        assert!(matches!(
            &template.blocks[0].extractors[0].kind,
            ExtractorKind::Json { paths } if paths == &vec!["$.version".to_string()]
        ));
        assert_eq!(template.blocks[1].condition, Condition::Or);
        assert!(matches!(
            &template.blocks[1].matchers[0].kind,
            MatcherKind::FaviconHash(h) if h == &vec!["abc".to_string()]
        ));
    }

    #[test]
    fn test_matcher_index_spans_blocks() {
        let err = TemplateCompiler::compile_template(
            0,
            &record(
                r#"{"id": "x", "info": {"name": "X"}, "http": [
                    {"matchers": [{"type": "word", "words": ["a"]}]},
                    {"matchers": [{"type": "word", "words": [""]}]}
                ]}"#,
            ),
        )
        .unwrap_err();
        assert!(matches!(err, CorpusError::EmptyPatterns { index: 1, .. }));
    }
}
