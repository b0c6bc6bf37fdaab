//! Backend instance handle.
//!
//! # Responsibilities
//! - Represent a single backend instance reachable over HTTP
//! - Forward requests to it, streaming bodies in both directions
//! - Enforce max concurrent request limits
//! - Track how many names are bound to it (for least-sessions placement)

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::uri::{Authority, InvalidUri, PathAndQuery, Scheme};
use axum::http::{Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::observability::metrics;
use crate::selector::{ForwardError, InstanceHandle};

/// A backend instance.
#[derive(Debug)]
pub struct HttpInstance {
    name: String,
    /// The address of the instance.
    pub addr: SocketAddr,
    /// Pre-calculated authority for URI rewriting.
    authority: Authority,
    /// Maximum concurrent forwarded requests.
    pub max_connections: usize,
    /// Number of requests currently in flight.
    active_connections: AtomicUsize,
    /// Number of names currently bound to this instance.
    bound_sessions: AtomicUsize,
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
}

impl HttpInstance {
    /// Create a new instance handle sharing the given client.
    pub fn new(
        name: impl Into<String>,
        addr: SocketAddr,
        max_connections: usize,
        client: Client<HttpConnector, Body>,
        upstream_timeout: Duration,
    ) -> Result<Self, InvalidUri> {
        let authority = Authority::from_str(&addr.to_string())?;
        Ok(Self {
            name: name.into(),
            addr,
            authority,
            max_connections,
            active_connections: AtomicUsize::new(0),
            bound_sessions: AtomicUsize::new(0),
            client,
            upstream_timeout,
        })
    }

    /// Get the current number of in-flight requests.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get the number of names bound to this instance.
    pub fn bound_sessions(&self) -> usize {
        self.bound_sessions.load(Ordering::Relaxed)
    }

    pub(crate) fn bind_session(&self) {
        self.bound_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unbind_session(&self) {
        self.bound_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// Try to reserve a request slot. Returns `None` at the connection limit.
    pub fn try_acquire(&self) -> Option<ConnectionGuard<'_>> {
        let mut prev = self.active_connections.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_connections {
                return None;
            }
            match self.active_connections.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(ConnectionGuard { instance: self })
    }

    /// Point the request at this instance, keeping its path and query.
    fn upstream_uri(&self, uri: Uri) -> Result<Uri, ForwardError> {
        let mut parts = uri.into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts).map_err(|e| ForwardError::InvalidUri(e.to_string()))
    }
}

#[async_trait]
impl InstanceHandle for HttpInstance {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let _guard = self.try_acquire().ok_or_else(|| ForwardError::Saturated {
            instance: self.name.clone(),
            limit: self.max_connections,
        })?;

        let (mut parts, body) = request.into_parts();
        parts.uri = self.upstream_uri(parts.uri)?;
        // Instances speak HTTP/1.1 regardless of the inbound protocol.
        parts.version = Version::HTTP_11;

        let active = self.active_connections();
        metrics::record_instance_load(&self.name, active);
        tracing::debug!(instance = %self.name, uri = %parts.uri, active, "Forwarding request");

        let response: Response<Incoming> = tokio::time::timeout(
            self.upstream_timeout,
            self.client.request(Request::from_parts(parts, body)),
        )
        .await
        .map_err(|_| ForwardError::Timeout {
            instance: self.name.clone(),
            timeout: self.upstream_timeout,
        })?
        .map_err(|source| ForwardError::Upstream {
            instance: self.name.clone(),
            source,
        })?;

        Ok(response.map(Body::new))
    }
}

/// A RAII guard that holds one request slot on an instance.
#[derive(Debug)]
pub struct ConnectionGuard<'a> {
    instance: &'a HttpInstance,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.instance.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) fn test_instance(
    name: &str,
    addr: &str,
    max_connections: usize,
) -> std::sync::Arc<HttpInstance> {
    use hyper_util::rt::TokioExecutor;

    let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
    std::sync::Arc::new(
        HttpInstance::new(
            name,
            addr.parse().unwrap(),
            max_connections,
            client,
            Duration::from_secs(5),
        )
        .unwrap(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_limit() {
        let instance = test_instance("a", "127.0.0.1:8080", 2);

        let g1 = instance.try_acquire().unwrap();
        let g2 = instance.try_acquire().unwrap();
        assert_eq!(instance.active_connections(), 2);
        assert!(instance.try_acquire().is_none());

        drop(g1);
        assert_eq!(instance.active_connections(), 1);
        assert!(instance.try_acquire().is_some());
        drop(g2);
        assert_eq!(instance.active_connections(), 0);
    }

    #[test]
    fn test_upstream_uri_keeps_path_and_query() {
        let instance = test_instance("a", "127.0.0.1:8080", 1);

        let uri = instance.upstream_uri("/foo/bar?x=1".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8080/foo/bar?x=1");

        let uri = instance
            .upstream_uri("https://edge.example.com/health".parse().unwrap())
            .unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8080/health");
    }

    #[tokio::test]
    async fn test_saturated_instance_rejects() {
        let instance = test_instance("busy", "127.0.0.1:9", 1);
        let _held = instance.try_acquire().unwrap();

        let err = instance
            .fetch(Request::new(Body::empty()))
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Saturated { limit: 1, .. }));
    }
}
