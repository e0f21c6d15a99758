//! 待识别的HTTP响应，以及单次扫描内使用的归一化视图

use std::borrow::Cow;
use std::collections::HashMap;

use once_cell::unsync::OnceCell;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::compiler::Part;
use crate::utils::HeaderConverter;

/// HTTP响应：响应体 + 可选状态码 + 有序响应头（名称大小写不敏感，允许重复）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    body: String,
    status: Option<u16>,
    headers: Vec<(String, String)>,
    // 调用方预先计算好的 favicon 哈希（md5 / mmh3）
    favicon_hashes: Vec<String>,
}

impl Response {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// 非UTF-8响应体按有损方式转换
    pub fn from_bytes(body: &[u8]) -> Self {
        Self::new(String::from_utf8_lossy(body))
    }

    /// 从reqwest的状态码与HeaderMap构建
    pub fn from_header_map(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Self {
        Self::from_bytes(body)
            .with_status(status.as_u16())
            .with_headers(HeaderConverter::to_pairs(headers))
    }

    /// 从 HashMap<String, Vec<String>> 形式的响应头构建
    pub fn from_hashmap(headers: &HashMap<String, Vec<String>>, body: &[u8]) -> Self {
        Self::from_bytes(body).with_headers(HeaderConverter::from_hashmap(headers))
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_favicon_hash(mut self, hash: impl Into<String>) -> Self {
        self.favicon_hashes.push(hash.into());
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn favicon_hashes(&self) -> &[String] {
        &self.favicon_hashes
    }

    /// 指定名称的全部响应头值（名称大小写不敏感，保持原顺序）
    pub fn header_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(k, _)| k.trim().eq_ignore_ascii_case(name.trim()))
            .map(|(_, v)| v.as_str())
    }

    /// Set-Cookie 中指定名称的cookie值（按 `normalize_key` 比较名称）
    pub fn cookie_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        let key = normalize_key(name);
        self.header_values("set-cookie").filter_map(move |cookie| {
            let (k, v) = cookie.split(';').next()?.split_once('=')?;
            (normalize_key(k) == key).then(|| v.trim())
        })
    }

    /// kval查找：先按归一化键名匹配响应头，没有任何响应头命中时回退到cookie
    pub fn kval_values(&self, key: &str) -> Vec<&str> {
        let normalized = normalize_key(key);
        let headers: Vec<&str> = self
            .headers
            .iter()
            .filter(|(k, _)| normalize_key(k) == normalized)
            .map(|(_, v)| v.as_str())
            .collect();
        if headers.is_empty() {
            self.cookie_values(key).collect()
        } else {
            headers
        }
    }
}

/// kval键名归一化：大小写不敏感，`_` 等同于 `-`
pub(crate) fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('_', "-")
}

/// 单次扫描使用的响应视图
/// 惰性缓存各部位文本及其小写形式，只在一次扫描内存活
pub struct ResponseView<'a> {
    response: &'a Response,
    status_text: String,
    header_block: OnceCell<String>,
    all_text: OnceCell<String>,
    lower_body: OnceCell<String>,
    lower_header_block: OnceCell<String>,
    lower_all: OnceCell<String>,
}

impl<'a> ResponseView<'a> {
    pub fn new(response: &'a Response) -> Self {
        Self {
            response,
            status_text: response.status.map(|s| s.to_string()).unwrap_or_default(),
            header_block: OnceCell::new(),
            all_text: OnceCell::new(),
            lower_body: OnceCell::new(),
            lower_header_block: OnceCell::new(),
            lower_all: OnceCell::new(),
        }
    }

    pub fn response(&self) -> &'a Response {
        self.response
    }

    /// 解析目标部位文本；部位不存在时返回空串
    pub fn resolve(&self, part: &Part) -> Cow<'_, str> {
        match part {
            Part::Body => Cow::Borrowed(self.response.body()),
            Part::Headers => Cow::Borrowed(self.header_block()),
            Part::Header(name) => self.named_header(name),
            Part::Status => Cow::Borrowed(self.status_text.as_str()),
            Part::All => Cow::Borrowed(self.all_text()),
        }
    }

    /// 解析目标部位的小写文本（大小写不敏感的关键字匹配使用）
    pub fn resolve_lower(&self, part: &Part) -> Cow<'_, str> {
        match part {
            Part::Body => Cow::Borrowed(
                self.lower_body
                    .get_or_init(|| self.response.body().to_lowercase())
                    .as_str(),
            ),
            Part::Headers => Cow::Borrowed(
                self.lower_header_block
                    .get_or_init(|| self.header_block().to_lowercase())
                    .as_str(),
            ),
            Part::Header(name) => Cow::Owned(self.named_header(name).to_lowercase()),
            Part::Status => Cow::Borrowed(self.status_text.as_str()),
            Part::All => Cow::Borrowed(
                self.lower_all
                    .get_or_init(|| self.all_text().to_lowercase())
                    .as_str(),
            ),
        }
    }

    fn named_header(&self, name: &str) -> Cow<'_, str> {
        let mut values = self.response.header_values(name);
        match (values.next(), values.next()) {
            (None, _) => Cow::Borrowed(""),
            (Some(first), None) => Cow::Borrowed(first),
            (Some(first), Some(second)) => {
                let mut joined = format!("{}, {}", first, second);
                for value in values {
                    joined.push_str(", ");
                    joined.push_str(value);
                }
                Cow::Owned(joined)
            }
        }
    }

    fn header_block(&self) -> &str {
        self.header_block.get_or_init(|| {
            self.response
                .headers()
                .iter()
                .map(|(k, v)| format!("{}: {}\r\n", k, v))
                .collect()
        })
    }

    fn all_text(&self) -> &str {
        self.all_text.get_or_init(|| {
            let mut text = self.response.body().to_string();
            for (_, value) in self.response.headers() {
                text.push('\n');
                text.push_str(value);
            }
            text
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Response {
        Response::new("<html>Hello</html>")
            .with_status(200)
            .with_header("Server", "nginx/1.18.0")
            .with_header("Set-Cookie", "PHPSESSID=abc; path=/")
            .with_header("set-cookie", "lang=en")
    }

    #[test]
    fn test_resolve_parts() {
        let response = sample();
        let view = ResponseView::new(&response);

        assert_eq!(view.resolve(&Part::Body), "<html>Hello</html>");
        assert_eq!(view.resolve(&Part::Status), "200");
        assert_eq!(view.resolve(&Part::Header("server".to_string())), "nginx/1.18.0");
        assert_eq!(
            view.resolve(&Part::Header("SET-COOKIE".to_string())),
            "PHPSESSID=abc; path=/, lang=en"
        );
        assert_eq!(
            view.resolve(&Part::All),
            "<html>Hello</html>\nnginx/1.18.0\nPHPSESSID=abc; path=/\nlang=en"
        );
        assert!(view.resolve(&Part::Headers).contains("Server: nginx/1.18.0\r\n"));
        assert_eq!(view.resolve_lower(&Part::Body), "<html>hello</html>");
    }

    #[test]
    fn test_absent_parts_resolve_empty() {
        let response = Response::default();
        let view = ResponseView::new(&response);
        assert_eq!(view.resolve(&Part::Body), "");
        assert_eq!(view.resolve(&Part::Status), "");
        assert_eq!(view.resolve(&Part::Header("Server".to_string())), "");
        assert_eq!(view.resolve(&Part::Headers), "");
        assert_eq!(view.resolve_lower(&Part::All), "");
    }

    #[test]
    fn test_cookie_values() {
        let response = sample();
        assert_eq!(response.cookie_values("phpsessid").collect::<Vec<_>>(), vec!["abc"]);
        assert_eq!(response.cookie_values("lang").collect::<Vec<_>>(), vec!["en"]);
        assert!(response.cookie_values("missing").next().is_none());
    }

    #[test]
    fn test_kval_values_normalize_keys() {
        let response = Response::new("")
            .with_header("X_Powered_By", "PHP/8.1")
            .with_header("Set-Cookie", "CSRF-Token=t1; Path=/")
            .with_header("Set-Cookie", "csrf_token=t2");
        assert_eq!(response.kval_values("x-powered-by"), vec!["PHP/8.1"]);
        assert_eq!(response.kval_values("X_POWERED_BY"), vec!["PHP/8.1"]);
        // cookie名与header名使用同一套归一化
        assert_eq!(response.cookie_values("csrf_token").collect::<Vec<_>>(), vec!["t1", "t2"]);
        assert_eq!(response.kval_values("csrf-token"), vec!["t1", "t2"]);
        assert!(response.kval_values("missing").is_empty());
    }

    #[test]
    fn test_from_header_map() {
        let mut headers = HeaderMap::new();
        headers.insert("server", "Apache".parse().unwrap());
        let response = Response::from_header_map(StatusCode::NOT_FOUND, &headers, b"gone");
        assert_eq!(response.status(), Some(404));
        assert_eq!(response.body(), "gone");
        assert_eq!(response.header_values("Server").collect::<Vec<_>>(), vec!["Apache"]);
    }
}
