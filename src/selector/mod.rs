//! Instance selection subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → SelectionPolicy + routing key
//!     → select() (deadline around resolution)
//!     → InstanceRegistry:
//!         - resolve_by_name (session affinity, named instances)
//!         - resolve_singleton (well-known default instance)
//!         - resolve_random (random-of-N, no affinity)
//!     → registry.rs (bind name to instance, placement for new names)
//!         - round_robin.rs (rotate through instances)
//!         - least_sessions.rs (instance with fewest bound names)
//!     → Return InstanceHandle or SelectorError
//! ```
//!
//! # Design Decisions
//! - The registry is an injected capability, never ambient state
//! - Singleton and random-of-N reduce to by-name resolution over reserved names
//! - Resolution always has a deadline
//! - Instance lifecycle (start/sleep/stop) is not managed here

pub mod instance;
pub mod least_sessions;
pub mod registry;
pub mod round_robin;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use rand::Rng;
use thiserror::Error;

use crate::config::SelectionPolicy;
use crate::observability::metrics;

pub use instance::HttpInstance;
pub use registry::PoolRegistry;

/// Name resolved by the singleton policy.
pub const SINGLETON_INSTANCE: &str = "singleton";

/// Name resolved for slot `index` of a random-of-N pool.
pub fn pool_instance_name(index: usize) -> String {
    format!("instance-{}", index)
}

/// Failure to produce an instance handle.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("no backend instances are registered")]
    NoInstances,

    #[error("instance capacity exhausted ({limit} live sessions)")]
    CapacityExhausted { limit: usize },

    #[error("random selection requires a pool of at least one instance")]
    EmptyPool,

    #[error("instance resolution timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Unavailable(String),
}

/// Failure while delivering a request to an instance or reading its response.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("instance '{instance}' is at its limit of {limit} concurrent requests")]
    Saturated { instance: String, limit: usize },

    #[error("invalid upstream uri: {0}")]
    InvalidUri(String),

    #[error("instance '{instance}' did not respond within {timeout:?}")]
    Timeout { instance: String, timeout: Duration },

    #[error("request to instance '{instance}' failed: {source}")]
    Upstream {
        instance: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },
}

/// An opaque reference to a live compute instance.
#[async_trait]
pub trait InstanceHandle: Send + Sync + fmt::Debug {
    /// Identifier of the instance behind this handle.
    fn name(&self) -> &str;

    /// Deliver a request and return the instance's response unmodified.
    async fn fetch(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError>;
}

/// Strategy for placing a newly seen name onto one of the instances.
pub trait Placement: Send + Sync + fmt::Debug {
    /// Pick an instance, or `None` when there is nothing to pick from.
    fn place(&self, instances: &[Arc<HttpInstance>]) -> Option<Arc<HttpInstance>>;
}

/// Capability for resolving instance handles.
#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    /// Resolve (creating if absent) the instance bound to `name`.
    /// The same name resolves to the same instance while its binding is alive.
    async fn resolve_by_name(&self, name: &str) -> Result<Arc<dyn InstanceHandle>, SelectorError>;

    /// Resolve the well-known default instance.
    async fn resolve_singleton(&self) -> Result<Arc<dyn InstanceHandle>, SelectorError> {
        self.resolve_by_name(SINGLETON_INSTANCE).await
    }

    /// Resolve one of up to `max_instances` instances, chosen uniformly at random.
    async fn resolve_random(
        &self,
        max_instances: usize,
    ) -> Result<Arc<dyn InstanceHandle>, SelectorError> {
        if max_instances == 0 {
            return Err(SelectorError::EmptyPool);
        }
        let index = rand::thread_rng().gen_range(0..max_instances);
        self.resolve_by_name(&pool_instance_name(index)).await
    }
}

/// Resolve a handle for `routing_key` under `policy`, giving up after `deadline`.
pub async fn select(
    registry: &dyn InstanceRegistry,
    policy: &SelectionPolicy,
    routing_key: &str,
    deadline: Duration,
) -> Result<Arc<dyn InstanceHandle>, SelectorError> {
    let resolution = async {
        match policy {
            SelectionPolicy::Session => registry.resolve_by_name(routing_key).await,
            SelectionPolicy::Named { instance } => registry.resolve_by_name(instance).await,
            SelectionPolicy::Singleton => registry.resolve_singleton().await,
            SelectionPolicy::Random { max_instances } => {
                registry.resolve_random(*max_instances).await
            }
        }
    };

    let result = match tokio::time::timeout(deadline, resolution).await {
        Ok(result) => result,
        Err(_) => Err(SelectorError::Timeout(deadline)),
    };

    metrics::record_resolution(policy.as_str(), result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct NamedHandle(String);

    #[async_trait]
    impl InstanceHandle for NamedHandle {
        fn name(&self) -> &str {
            &self.0
        }

        async fn fetch(&self, _request: Request<Body>) -> Result<Response<Body>, ForwardError> {
            Ok(Response::new(Body::empty()))
        }
    }

    /// Records every name it is asked to resolve.
    #[derive(Default)]
    struct RecordingRegistry {
        names: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InstanceRegistry for RecordingRegistry {
        async fn resolve_by_name(
            &self,
            name: &str,
        ) -> Result<Arc<dyn InstanceHandle>, SelectorError> {
            self.names.lock().unwrap().push(name.to_string());
            Ok(Arc::new(NamedHandle(name.to_string())))
        }
    }

    struct StalledRegistry;

    #[async_trait]
    impl InstanceRegistry for StalledRegistry {
        async fn resolve_by_name(
            &self,
            _name: &str,
        ) -> Result<Arc<dyn InstanceHandle>, SelectorError> {
            std::future::pending().await
        }
    }

    const DEADLINE: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_policies_map_to_names() {
        let registry = RecordingRegistry::default();

        select(&registry, &SelectionPolicy::Session, "abc123", DEADLINE).await.unwrap();
        select(
            &registry,
            &SelectionPolicy::Named { instance: "app".into() },
            "abc123",
            DEADLINE,
        )
        .await
        .unwrap();
        select(&registry, &SelectionPolicy::Singleton, "abc123", DEADLINE).await.unwrap();

        let names = registry.names.lock().unwrap().clone();
        assert_eq!(names, vec!["abc123", "app", SINGLETON_INSTANCE]);
    }

    #[tokio::test]
    async fn test_random_of_one_is_stable() {
        let registry = RecordingRegistry::default();
        let policy = SelectionPolicy::Random { max_instances: 1 };

        for _ in 0..10 {
            let handle = select(&registry, &policy, "ignored", DEADLINE).await.unwrap();
            assert_eq!(handle.name(), "instance-0");
        }
    }

    #[tokio::test]
    async fn test_random_stays_within_bound() {
        let registry = RecordingRegistry::default();

        for _ in 0..50 {
            registry.resolve_random(3).await.unwrap();
        }

        let names = registry.names.lock().unwrap().clone();
        assert!(names
            .iter()
            .all(|n| n == "instance-0" || n == "instance-1" || n == "instance-2"));
    }

    #[tokio::test]
    async fn test_random_of_zero_is_an_error() {
        let registry = RecordingRegistry::default();
        let err = registry.resolve_random(0).await.unwrap_err();
        assert!(matches!(err, SelectorError::EmptyPool));
    }

    #[tokio::test]
    async fn test_resolution_deadline() {
        let deadline = Duration::from_millis(20);
        let err = select(&StalledRegistry, &SelectionPolicy::Session, "k", deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, SelectorError::Timeout(d) if d == deadline));
    }
}
