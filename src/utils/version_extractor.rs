//! 版本提取工具模块
//! 负责从正则捕获结果中，根据提取模板格式化出结构化的值（通常是版本号）
//! 支持 \1/\2 或 $1/$2 两种分组引用格式，自动过滤无效结果

use regex::Captures;

/// 版本提取工具类
pub struct VersionExtractor;

impl VersionExtractor {
    /// 从正则捕获结果中按模板提取值
    ///
    /// # 参数
    /// - `template`: 提取模板，支持 \1/\2 或 $1/$2 分组引用
    /// - `captures`: 正则捕获结果
    ///
    /// # 返回值
    /// - `Some(String)`: 替换后的有效值
    /// - `None`: 模板为空、没有发生替换、结果为空或残留占位符
    pub fn extract(template: &str, captures: &Captures) -> Option<String> {
        if template.trim().is_empty() {
            return None;
        }

        let mut value = template.to_string();
        // 标记是否发生过有效的分组替换（避免无替换却返回模板本身）
        let mut replaced = false;

        // 倒序替换，避免 $1 先于 $10 被替换
        for group_index in (1..captures.len()).rev() {
            let placeholder_backslash = format!("\\{}", group_index);
            let placeholder_dollar = format!("${}", group_index);
            if !value.contains(&placeholder_backslash) && !value.contains(&placeholder_dollar) {
                continue;
            }

            let matched = captures
                .get(group_index)
                .map(|m| m.as_str().trim())
                .unwrap_or("");
            if !matched.is_empty() {
                replaced = true;
            }
            value = value.replace(&placeholder_backslash, matched);
            value = value.replace(&placeholder_dollar, matched);
        }

        let value = value.trim().to_string();
        let is_valid = replaced && !value.is_empty() && !value.contains('\\') && !value.contains('$');
        is_valid.then_some(value)
    }
}
