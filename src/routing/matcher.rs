//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix on segment boundaries (case-sensitive)
//! - Compute the path left after removing the prefix
//!
//! # Design Decisions
//! - "/api/container" matches "/api/container" and "/api/container/x",
//!   never "/api/containers"
//! - A root prefix matches everything and strips nothing
//! - No regex to guarantee O(n) matching

/// Matches the request path against a prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    /// Normalized prefix without a trailing slash; empty for the root prefix.
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// The normalized prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the remainder of `path` after the prefix, if the prefix matches.
    /// The remainder is empty or starts with '/'.
    pub fn remainder<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Returns true if the path falls under this prefix.
    pub fn matches(&self, path: &str) -> bool {
        self.remainder(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api/container");

        assert!(matcher.matches("/api/container"));
        assert!(matcher.matches("/api/container/"));
        assert!(matcher.matches("/api/container/health"));
        assert!(!matcher.matches("/api/containers"));
        assert!(!matcher.matches("/api"));
        assert!(!matcher.matches("/images"));
        // case-sensitive
        assert!(!matcher.matches("/API/container"));
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let matcher = PathPrefixMatcher::new("/app/");
        assert_eq!(matcher.prefix(), "/app");
        assert_eq!(matcher.remainder("/app/x"), Some("/x"));
        assert_eq!(matcher.remainder("/app"), Some(""));
    }

    #[test]
    fn test_root_prefix_matches_everything() {
        let matcher = PathPrefixMatcher::new("/");
        assert_eq!(matcher.prefix(), "");
        assert_eq!(matcher.remainder("/anything/at/all"), Some("/anything/at/all"));
        assert_eq!(matcher.remainder("/"), Some("/"));
    }
}
