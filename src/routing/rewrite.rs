//! Request rewriting.
//!
//! # Responsibilities
//! - Compute the target path once the route prefix is removed
//! - Rebuild the request on the same origin with the new path
//! - Preserve method, headers, query string and body stream
//!
//! # Design Decisions
//! - An empty remainder becomes "/", never an empty path
//! - The body is moved, not buffered

use axum::body::Body;
use axum::http::uri::{InvalidUriParts, PathAndQuery};
use axum::http::{Request, Uri};
use thiserror::Error;

/// The rewritten path could not form a valid URI.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid rewritten path '{path}': {source}")]
    Path {
        path: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("invalid rewritten uri: {0}")]
    Uri(#[from] InvalidUriParts),
}

/// Path to forward once the prefix is gone.
pub fn target_path(remainder: &str) -> &str {
    if remainder.is_empty() {
        "/"
    } else {
        remainder
    }
}

/// Replace the request's path with `path`, keeping everything else.
pub fn rewrite_request(request: Request<Body>, path: &str) -> Result<Request<Body>, RewriteError> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = match parts.uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let path_and_query =
        PathAndQuery::try_from(path_and_query.as_str()).map_err(|source| RewriteError::Path {
            path: path_and_query.clone(),
            source,
        })?;

    let mut uri_parts = parts.uri.into_parts();
    uri_parts.path_and_query = Some(path_and_query);
    parts.uri = Uri::from_parts(uri_parts)?;

    Ok(Request::from_parts(parts, body))
}
