//! Header格式转换工具
//! 不同Header格式与响应头有序列表之间的转换

use std::collections::HashMap;
use std::time::Instant;

use reqwest::header::HeaderMap;
use tracing::{debug, warn};

/// 单个响应最多保留的响应头条数
const MAX_HEADERS: usize = 1000;

/// Header转换工具
pub struct HeaderConverter;

impl HeaderConverter {
    /// 将HeaderMap转换为有序的 (名称, 值) 列表，保持HeaderMap的迭代顺序
    pub fn to_pairs(header_map: &HeaderMap) -> Vec<(String, String)> {
        let start = Instant::now();
        let mut pairs = Vec::with_capacity(header_map.len());

        for (key, value) in header_map.iter() {
            if pairs.len() >= MAX_HEADERS {
                warn!("Header数量超过{}条，其余忽略", MAX_HEADERS);
                break;
            }
            // 非可见ASCII的值按有损UTF-8保留
            let value_str = match value.to_str() {
                Ok(v) => v.to_string(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            };
            pairs.push((key.as_str().to_string(), value_str));
        }

        debug!(
            "Header转换完成，耗时{:?}，生成{}条记录",
            start.elapsed(),
            pairs.len()
        );

        pairs
    }

    /// 将HashMap<String, Vec<String>>展开为有序列表
    /// HashMap本身无序，按名称排序以保证结果稳定
    pub fn from_hashmap(hashmap: &HashMap<String, Vec<String>>) -> Vec<(String, String)> {
        let mut names: Vec<&String> = hashmap.keys().collect();
        names.sort();

        names
            .into_iter()
            .flat_map(|name| {
                hashmap[name]
                    .iter()
                    .map(move |value| (name.clone(), value.clone()))
            })
            .take(MAX_HEADERS)
            .collect()
    }

    /// 将有序列表归并为 HashMap<小写名称, Vec<值>>
    pub fn to_hashmap(pairs: &[(String, String)]) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in pairs {
            map.entry(key.to_lowercase()).or_default().push(value.clone());
        }
        map
    }
}
