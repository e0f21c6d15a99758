//! 模板判定：运行模板全部matcher并合并，命中后执行提取

use std::collections::BTreeMap;

use super::extractor::ExtractorEngine;
use super::matcher::{MatcherEvaluator, MatcherHit};
use crate::compiler::{CompiledMatcher, CompiledTemplate, OperatorBlock};
use crate::response::ResponseView;

/// 模板命中时的产出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// 命中的具名、非internal matcher名称（matcher顺序，不重复）
    pub matcher_names: Vec<String>,
    /// 命中的非internal matcher报告的pattern（不重复）
    pub matcher_words: Vec<String>,
    pub extracted: BTreeMap<String, Vec<String>>,
}

/// 模板判定器
pub struct TemplateEvaluator;

impl TemplateEvaluator {
    /// 判定单个模板；任意一组matcher命中即模板命中，未命中返回None
    /// 名称、pattern和提取结果只来自命中的组
    pub fn evaluate(template: &CompiledTemplate, view: &ResponseView<'_>) -> Option<MatchOutcome> {
        let mut outcome = MatchOutcome::default();
        let mut matched = false;

        for block in &template.blocks {
            if let Some(hits) = Self::evaluate_block(block, view) {
                matched = true;
                outcome.merge_hits(&block.matchers, hits);
                for (label, values) in ExtractorEngine::extract(&block.extractors, view) {
                    outcome.extracted.entry(label).or_default().extend(values);
                }
            }
        }

        matched.then_some(outcome)
    }

    fn evaluate_block(block: &OperatorBlock, view: &ResponseView<'_>) -> Option<Vec<MatcherHit>> {
        // 不短路：每个matcher都要判定，才能完整报告命中的matcher
        let hits: Vec<MatcherHit> = block
            .matchers
            .iter()
            .map(|matcher| MatcherEvaluator::evaluate_words(matcher, view))
            .collect();

        block
            .condition
            .combine(hits.iter().map(|hit| hit.matched))
            .then_some(hits)
    }
}

impl MatchOutcome {
    fn merge_hits(&mut self, matchers: &[CompiledMatcher], hits: Vec<MatcherHit>) {
        for (matcher, hit) in matchers.iter().zip(hits) {
            if !hit.matched || matcher.internal {
                continue;
            }
            if let Some(name) = &matcher.name {
                if !self.matcher_names.contains(name) {
                    self.matcher_names.push(name.clone());
                }
            }
            for word in hit.words {
                if !self.matcher_words.contains(&word) {
                    self.matcher_words.push(word);
                }
            }
        }
    }
}
