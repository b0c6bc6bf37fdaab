//! Routing key extraction.
//!
//! The routing key is the first non-empty value of, in order:
//! the configured query parameter, the configured header, the default key.

use axum::body::Body;
use axum::http::{HeaderName, Request};
use url::form_urlencoded;

use crate::config::SessionConfig;

/// Ordered fallback chain producing a routing key for every request.
#[derive(Debug, Clone)]
pub struct SessionKeyExtractor {
    query_param: String,
    header: HeaderName,
    default_key: String,
}

impl SessionKeyExtractor {
    pub fn new(config: &SessionConfig) -> Self {
        let header = HeaderName::from_bytes(config.header.to_ascii_lowercase().as_bytes())
            .unwrap_or_else(|_| {
                tracing::warn!(header = %config.header, "Invalid session header name, using x-session-id");
                HeaderName::from_static("x-session-id")
            });
        Self {
            query_param: config.query_param.clone(),
            header,
            default_key: config.default_key.clone(),
        }
    }

    /// Derive the routing key for a request.
    pub fn extract(&self, request: &Request<Body>) -> String {
        self.from_query(request.uri().query())
            .or_else(|| {
                request
                    .headers()
                    .get(&self.header)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.default_key.clone())
    }

    fn from_query(&self, query: Option<&str>) -> Option<String> {
        form_urlencoded::parse(query?.as_bytes())
            .find(|(name, _)| name == self.query_param.as_str())
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }
}

impl Default for SessionKeyExtractor {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, header: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = header {
            builder = builder.header("x-session-id", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_default_when_absent() {
        let extractor = SessionKeyExtractor::default();
        assert_eq!(extractor.extract(&request("/api/container/health", None)), "default");
        assert_eq!(extractor.extract(&request("/x?other=1", None)), "default");
    }

    #[test]
    fn test_query_wins_over_header() {
        let extractor = SessionKeyExtractor::default();
        let req = request("/x?session=from-query", Some("from-header"));
        assert_eq!(extractor.extract(&req), "from-query");
    }

    #[test]
    fn test_header_used_without_query() {
        let extractor = SessionKeyExtractor::default();
        assert_eq!(extractor.extract(&request("/x", Some("abc123"))), "abc123");
    }

    #[test]
    fn test_empty_values_fall_through() {
        let extractor = SessionKeyExtractor::default();
        assert_eq!(extractor.extract(&request("/x?session=", Some("abc"))), "abc");
        assert_eq!(extractor.extract(&request("/x?session=", Some(""))), "default");
    }

    #[test]
    fn test_query_value_is_decoded() {
        let extractor = SessionKeyExtractor::default();
        assert_eq!(extractor.extract(&request("/x?a=1&session=cart%2042", None)), "cart 42");
    }

    #[test]
    fn test_custom_sources() {
        let extractor = SessionKeyExtractor::new(&SessionConfig {
            query_param: "tenant".into(),
            header: "X-Tenant".into(),
            default_key: "shared".into(),
        });
        let req = Request::builder()
            .uri("/x")
            .header("x-tenant", "acme")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extractor.extract(&req), "acme");
        assert_eq!(extractor.extract(&request("/x?session=ignored", None)), "shared");
    }
}
