//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the container router.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Where the routing key comes from.
    pub session: SessionConfig,

    /// Route definitions mapping path prefixes to selection policies.
    pub routes: Vec<RouteConfig>,

    /// Backend instance pool.
    pub registry: RegistryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Static asset fallback for unrouted paths.
    pub assets: AssetsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            session: SessionConfig::default(),
            routes: vec![RouteConfig {
                name: "container".to_string(),
                path_prefix: "/api/container".to_string(),
                strip_prefix: true,
                priority: 0,
                policy: SelectionPolicy::Session,
            }],
            registry: RegistryConfig::default(),
            timeouts: TimeoutConfig::default(),
            assets: AssetsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Routing key sources, consulted in order.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Query parameter checked first.
    pub query_param: String,

    /// Header checked when the query parameter is absent or empty.
    pub header: String,

    /// Key used when neither source yields a value.
    pub default_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            query_param: "session".to_string(),
            header: "x-session-id".to_string(),
            default_key: "default".to_string(),
        }
    }
}

/// Route configuration mapping a path prefix to an instance selection policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match. "/" matches every path.
    pub path_prefix: String,

    /// Remove the prefix before forwarding.
    #[serde(default = "default_strip_prefix")]
    pub strip_prefix: bool,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// How a backend instance is chosen for this route.
    #[serde(flatten)]
    pub policy: SelectionPolicy,
}

fn default_strip_prefix() -> bool {
    true
}

/// Instance selection policy for a route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// By-name resolution keyed by the request's routing key.
    Session,
    /// By-name resolution with a fixed instance name.
    Named { instance: String },
    /// The single well-known default instance.
    Singleton,
    /// Uniform choice among up to `max_instances` instances.
    Random { max_instances: usize },
}

impl SelectionPolicy {
    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::Session => "session",
            SelectionPolicy::Named { .. } => "named",
            SelectionPolicy::Singleton => "singleton",
            SelectionPolicy::Random { .. } => "random",
        }
    }
}

/// Backend instance pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Instances names can be bound to.
    pub instances: Vec<InstanceConfig>,

    /// How an unseen name is placed onto an instance.
    pub placement: PlacementStrategy,

    /// Maximum number of live name bindings.
    pub max_sessions: usize,

    /// Idle time after which a binding lapses (0 = never).
    pub sleep_after_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            instances: vec![InstanceConfig {
                name: "local".to_string(),
                address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_instance_conns(),
            }],
            placement: PlacementStrategy::RoundRobin,
            max_sessions: 10_000,
            sleep_after_secs: 600, // 10 minutes
        }
    }
}

/// A backend instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    /// Unique instance identifier.
    pub name: String,

    /// Instance address (e.g., "127.0.0.1:8080").
    pub address: String,

    /// Maximum concurrent forwarded requests.
    #[serde(default = "default_max_instance_conns")]
    pub max_connections: usize,
}

fn default_max_instance_conns() -> usize {
    100
}

/// Placement strategy for new bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    #[default]
    RoundRobin,
    LeastSessions,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for resolving an instance handle, in milliseconds.
    pub resolve_ms: u64,

    /// Deadline for receiving the instance's response headers, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            resolve_ms: 1000,
            upstream_secs: 30,
        }
    }
}

/// Static asset fallback.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory served for unrouted paths. Unrouted paths 404 when unset.
    pub dir: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
