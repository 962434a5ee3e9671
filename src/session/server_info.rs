use std::collections::HashMap;

use crate::http::Response;

/// Capability fields read off an `OPTIONS` discovery response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInformation {
    pub fields: HashMap<String, String>,
}

const CAPABILITY_HEADERS: &[&str] = &[
    "Upload-Offset",
    "Upload-Length",
    "Tus-Resumable",
    "Tus-Version",
    "Tus-Extension",
    "Tus-Max-Size",
];

impl ServerInformation {
    pub fn from_response(response: &Response) -> Self {
        let mut fields = HashMap::new();
        for name in CAPABILITY_HEADERS {
            let value = response.header(name);
            if !value.is_empty() {
                fields.insert((*name).to_string(), value);
            }
        }
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderName, HeaderValue};

    fn response_with(headers: &[(&str, &str)]) -> Response {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        Response {
            status: 204,
            headers: map,
            body: Bytes::new(),
        }
    }

    #[test]
    fn extracts_only_known_capability_headers() {
        let response = response_with(&[
            ("Tus-Resumable", "1.0.0"),
            ("Tus-Version", "1.0.0"),
            ("Tus-Extension", "creation,expiration"),
            ("X-Unrelated", "ignored"),
        ]);
        let info = ServerInformation::from_response(&response);
        assert_eq!(info.get("Tus-Resumable"), Some("1.0.0"));
        assert_eq!(info.get("Tus-Extension"), Some("creation,expiration"));
        assert_eq!(info.get("X-Unrelated"), None);
    }
}
