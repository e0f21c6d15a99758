//! matcher判定：单个matcher对一个响应的布尔结果

use crate::compiler::{CompiledMatcher, MatcherKind, WordList};
use crate::response::{Response, ResponseView};
use crate::rule::Condition;

/// 单个matcher的判定结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatcherHit {
    pub matched: bool,
    /// 命中的关键字 / 正则匹配文本 / 状态码 / favicon哈希
    /// 取反的matcher和未命中时为空
    pub words: Vec<String>,
}

/// matcher判定器
pub struct MatcherEvaluator;

impl MatcherEvaluator {
    /// 判定单个matcher：逐个pattern判定，按condition合并，最后应用negate
    /// 目标部位缺失时按空串处理，不会失败
    pub fn evaluate(matcher: &CompiledMatcher, view: &ResponseView<'_>) -> bool {
        Self::evaluate_words(matcher, view).matched
    }

    /// 判定并报告命中的pattern
    /// or 条件下未设置 match_all 时在第一个命中处停止，只报告一个
    pub fn evaluate_words(matcher: &CompiledMatcher, view: &ResponseView<'_>) -> MatcherHit {
        match &matcher.kind {
            MatcherKind::Word(words) | MatcherKind::Header(words) => {
                Self::match_words(words, matcher, view)
            }
            MatcherKind::Regex(patterns) => {
                let text = view.resolve(&matcher.part);
                Self::combine(
                    matcher,
                    patterns
                        .iter()
                        .map(|re| re.find(&text).map(|m| m.as_str().to_string())),
                )
            }
            MatcherKind::Status(codes) => {
                let status = view.response().status();
                Self::combine(
                    matcher,
                    codes
                        .iter()
                        .map(|code| (status == Some(*code)).then(|| code.to_string())),
                )
            }
            MatcherKind::FaviconHash(hashes) => {
                let known = view.response().favicon_hashes();
                Self::combine(
                    matcher,
                    hashes.iter().map(|hash| {
                        known
                            .iter()
                            .any(|h| h.trim().eq_ignore_ascii_case(hash))
                            .then(|| hash.clone())
                    }),
                )
            }
        }
    }

    /// 便捷接口：对单个响应直接判定
    pub fn matches(matcher: &CompiledMatcher, response: &Response) -> bool {
        Self::evaluate(matcher, &ResponseView::new(response))
    }

    fn match_words(words: &WordList, matcher: &CompiledMatcher, view: &ResponseView<'_>) -> MatcherHit {
        // 大小写不敏感时关键字已在编译阶段转小写
        let text = if words.case_sensitive {
            view.resolve(&matcher.part)
        } else {
            view.resolve_lower(&matcher.part)
        };
        Self::combine(
            matcher,
            words
                .words
                .iter()
                .map(|word| text.contains(word.as_str()).then(|| word.clone())),
        )
    }

    fn combine<I>(matcher: &CompiledMatcher, hits: I) -> MatcherHit
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let mut words = Vec::new();
        let mut missed = false;
        for hit in hits {
            match (hit, matcher.condition) {
                (Some(word), Condition::Or) => {
                    words.push(word);
                    if !matcher.match_all {
                        break;
                    }
                }
                (Some(word), Condition::And) => words.push(word),
                (None, Condition::And) => {
                    missed = true;
                    break;
                }
                (None, Condition::Or) => {}
            }
        }

        let outcome = match matcher.condition {
            Condition::Or => !words.is_empty(),
            Condition::And => !missed,
        };
        let matched = outcome != matcher.negate;
        if !matched || matcher.negate {
            words.clear();
        }
        MatcherHit { matched, words }
    }
}
