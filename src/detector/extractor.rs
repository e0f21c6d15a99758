//! 提取引擎：模板命中后从响应中提取结构化的值（版本号等）

use std::collections::BTreeMap;

use jsonpath_rust::JsonPath;
use regex::Captures;
use serde_json::Value;
use tracing::debug;

use crate::compiler::{CompiledExtractor, ExtractGroup, ExtractorKind};
use crate::response::{Response, ResponseView};
use crate::utils::VersionExtractor;

/// 提取引擎
pub struct ExtractorEngine;

impl ExtractorEngine {
    /// 依次运行全部extractor，结果按label归并
    /// 每个label都会出现在结果中，没有提取到内容时为空列表；同名label的结果追加到同一列表
    pub fn extract(
        extractors: &[CompiledExtractor],
        view: &ResponseView<'_>,
    ) -> BTreeMap<String, Vec<String>> {
        let mut extracted: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for extractor in extractors {
            let values = match &extractor.kind {
                ExtractorKind::Regex {
                    patterns,
                    group,
                    template,
                } => {
                    let text = view.resolve(&extractor.part);
                    let mut values = Vec::new();
                    for re in patterns {
                        for captures in re.captures_iter(&text) {
                            // 零长度匹配不产出值
                            if let Some(value) = Self::select(&captures, group, template.as_deref())
                                .filter(|v| !v.is_empty())
                            {
                                values.push(value);
                            }
                        }
                    }
                    values
                }
                ExtractorKind::KVal { keys } => Self::kval(keys, view.response()),
                ExtractorKind::Json { paths } => Self::json(paths, &view.resolve(&extractor.part)),
            };

            extracted
                .entry(extractor.label.clone())
                .or_default()
                .extend(values);
        }

        extracted
    }

    /// 单次匹配的取值：有模板时按模板格式化，否则取指定分组（未参与匹配的分组不产出值）
    fn select(captures: &Captures<'_>, group: &ExtractGroup, template: Option<&str>) -> Option<String> {
        if let Some(template) = template {
            return VersionExtractor::extract(template, captures);
        }
        let matched = match group {
            ExtractGroup::Whole => captures.get(0),
            ExtractGroup::Index(index) => captures.get(*index),
            ExtractGroup::Name(name) => captures.name(name),
        };
        matched.map(|m| m.as_str().to_string())
    }

    /// 按key查找响应头，原样返回值；没有任何响应头命中时回退到Set-Cookie中的cookie
    fn kval(keys: &[String], response: &Response) -> Vec<String> {
        keys.iter()
            .flat_map(|key| response.kval_values(key))
            .map(str::to_string)
            .collect()
    }

    /// JSONPath查询；字符串原样返回，其余值按JSON文本返回
    /// 目标部位不是合法JSON或路径无效时不产出值
    fn json(paths: &[String], text: &str) -> Vec<String> {
        let Ok(document) = serde_json::from_str::<Value>(text) else {
            return Vec::new();
        };
        let mut values = Vec::new();
        for path in paths {
            match document.query(path) {
                Ok(found) => values.extend(found.into_iter().map(|value| match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })),
                Err(e) => debug!("JSONPath {} 查询失败：{}", path, e),
            }
        }
        values
    }
}
