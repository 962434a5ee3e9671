use bytes::Bytes;
use std::collections::HashMap;

/// HTTP verbs the client supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Immutable HTTP request value. Header keys are unique and
/// compared case-insensitively on the wire; `Content-Type: application/json`
/// is the implicit default unless the caller sets one explicitly.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            method,
            url: url.into(),
            headers,
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Characters that must not appear at the end of a URL we send on the
    /// wire.
    const FORBIDDEN_TRAILING_CHARS: &'static [char] =
        &['<', '>', '#', '%', '{', '}', '|', '\\', '^', '~', '[', ']', '`'];

    pub fn is_url_well_formed(url: &str) -> bool {
        !url.ends_with(Request::FORBIDDEN_TRAILING_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_content_type_is_json() {
        let req = Request::new(Method::Post, "http://h/");
        assert_eq!(req.headers.get("Content-Type").unwrap(), "application/json");
    }

    #[test]
    fn with_header_overrides_default() {
        let req = Request::new(Method::Post, "http://h/")
            .with_header("Content-Type", "application/octet-stream");
        assert_eq!(req.headers.get("Content-Type").unwrap(), "application/octet-stream");
    }

    #[test]
    fn url_hygiene_rejects_forbidden_trailing_chars() {
        assert!(Request::is_url_well_formed("http://h/ok"));
        assert!(!Request::is_url_well_formed("http://h/bad#"));
        assert!(!Request::is_url_well_formed("http://h/bad["));
        assert!(!Request::is_url_well_formed("http://h/bad`"));
    }
}
