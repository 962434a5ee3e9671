use bytes::Bytes;
use http::HeaderMap;

/// A completed HTTP exchange. The success path — a completed exchange is
/// surfaced regardless of HTTP status code — is represented by returning
/// `Ok(Response)` from
/// [`crate::http::HttpClient::send`] for *any* completed exchange; only
/// transport/socket-level failures produce an `Err`. Callers inspect
/// [`Response::status`] to distinguish 204/409/other.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Case-insensitive header lookup with surrounding whitespace trimmed;
    /// an absent header yields the empty string.
    pub fn header(&self, name: &str) -> String {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    pub fn is_no_content(&self) -> bool {
        self.status == 204
    }

    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_header(name: &str, value: &str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            http::HeaderValue::from_str(value).unwrap(),
        );
        Response {
            status: 200,
            headers,
            body: Bytes::new(),
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = response_with_header("Upload-Offset", "  42  ");
        assert_eq!(response.header("upload-offset"), "42");
        assert_eq!(response.header("UPLOAD-OFFSET"), "42");
    }

    #[test]
    fn absent_header_yields_empty_string() {
        let response = response_with_header("Upload-Offset", "42");
        assert_eq!(response.header("Upload-Length"), "");
    }
}
