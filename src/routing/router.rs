//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Explicit NoMatch rather than silent default

use std::sync::Arc;

use crate::config::{RouteConfig, SelectionPolicy};
use crate::routing::matcher::PathPrefixMatcher;
use crate::routing::rewrite::target_path;

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub matcher: PathPrefixMatcher,
    pub strip_prefix: bool,
    pub policy: SelectionPolicy,
    pub priority: u32,
}

impl Route {
    pub fn from_config(config: RouteConfig) -> Self {
        Self {
            matcher: PathPrefixMatcher::new(config.path_prefix),
            name: config.name,
            strip_prefix: config.strip_prefix,
            policy: config.policy,
            priority: config.priority,
        }
    }

    /// Path to forward for `path`, or `None` if this route does not match it.
    pub fn target_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let remainder = self.matcher.remainder(path)?;
        if self.strip_prefix {
            Some(target_path(remainder))
        } else {
            Some(path)
        }
    }

    /// One line of the endpoint index, e.g. `GET /lb - Load balance across 3 container instances`.
    pub fn describe(&self) -> String {
        let prefix = match self.matcher.prefix() {
            "" => "/",
            prefix => prefix,
        };
        let what = match &self.policy {
            SelectionPolicy::Session => "Route to the container instance bound to the session".to_string(),
            SelectionPolicy::Named { instance } => format!("Route to the '{}' instance", instance),
            SelectionPolicy::Singleton => "Get a single container instance".to_string(),
            SelectionPolicy::Random { max_instances } => {
                format!("Load balance across {} container instances", max_instances)
            }
        };
        format!("GET {} - {}", prefix, what)
    }
}

/// Immutable, priority-ordered route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    /// Compile routes, highest priority first. Equal priorities keep config order.
    pub fn from_config(configs: Vec<RouteConfig>) -> Self {
        let mut routes: Vec<Arc<Route>> = configs
            .into_iter()
            .map(|c| Arc::new(Route::from_config(c)))
            .collect();
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes }
    }

    /// First route whose prefix matches `path`.
    pub fn match_path(&self, path: &str) -> Option<Arc<Route>> {
        self.routes.iter().find(|r| r.matcher.matches(path)).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Plain-text listing of the routable endpoints.
    pub fn index(&self) -> String {
        if self.is_empty() {
            return "No endpoints configured".to_string();
        }
        let mut index = String::from("Available endpoints:");
        for route in &self.routes {
            index.push('\n');
            index.push_str(&route.describe());
        }
        index
    }
}
