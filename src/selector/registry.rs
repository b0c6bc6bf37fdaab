//! Instance pool registry.
//!
//! # Responsibilities
//! - Own the configured backend instances
//! - Bind names (routing keys, reserved names) to instances
//! - Place unseen names with the configured strategy
//! - Let idle bindings lapse after the sleep window
//! - Cap the number of live bindings

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::{PlacementStrategy, RegistryConfig, TimeoutConfig};
use crate::observability::metrics;
use crate::selector::{
    least_sessions::LeastSessions, round_robin::RoundRobin, HttpInstance, InstanceHandle,
    InstanceRegistry, Placement, SelectorError,
};

/// A name's current instance and when it was last resolved.
#[derive(Debug)]
struct SessionBinding {
    instance: Arc<HttpInstance>,
    /// Milliseconds since the registry epoch.
    last_used_ms: AtomicU64,
}

impl SessionBinding {
    fn touch(&self, now_ms: u64) {
        self.last_used_ms.store(now_ms, Ordering::Relaxed);
    }

    fn is_expired(&self, now_ms: u64, sleep_after: Option<Duration>) -> bool {
        match sleep_after {
            Some(window) => {
                let idle = now_ms.saturating_sub(self.last_used_ms.load(Ordering::Relaxed));
                u128::from(idle) > window.as_millis()
            }
            None => false,
        }
    }
}

/// Registry over a fixed pool of HTTP instances.
#[derive(Debug)]
pub struct PoolRegistry {
    instances: Vec<Arc<HttpInstance>>,
    placement: Box<dyn Placement>,
    bindings: DashMap<String, SessionBinding>,
    /// Live binding count; kept separately so it can be read under a shard lock.
    live: AtomicUsize,
    max_sessions: usize,
    sleep_after: Option<Duration>,
    epoch: Instant,
}

impl PoolRegistry {
    /// Create a registry over the given instances.
    pub fn new(
        instances: Vec<Arc<HttpInstance>>,
        placement: Box<dyn Placement>,
        max_sessions: usize,
        sleep_after: Option<Duration>,
    ) -> Self {
        Self {
            instances,
            placement,
            bindings: DashMap::new(),
            live: AtomicUsize::new(0),
            max_sessions,
            sleep_after,
            epoch: Instant::now(),
        }
    }

    /// Create a registry from configuration.
    pub fn from_config(config: &RegistryConfig, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);
        let upstream_timeout = Duration::from_secs(timeouts.upstream_secs);

        let mut instances = Vec::with_capacity(config.instances.len());
        for instance in &config.instances {
            let addr = match instance.address.parse() {
                Ok(addr) => addr,
                Err(_) => {
                    tracing::warn!(name = %instance.name, address = %instance.address, "Invalid instance address");
                    continue;
                }
            };
            match HttpInstance::new(
                instance.name.clone(),
                addr,
                instance.max_connections,
                client.clone(),
                upstream_timeout,
            ) {
                Ok(handle) => instances.push(Arc::new(handle)),
                Err(e) => {
                    tracing::warn!(name = %instance.name, error = %e, "Invalid instance authority");
                }
            }
        }

        let placement: Box<dyn Placement> = match config.placement {
            PlacementStrategy::RoundRobin => Box::new(RoundRobin::new()),
            PlacementStrategy::LeastSessions => Box::new(LeastSessions::new()),
        };

        let sleep_after = match config.sleep_after_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let registry = Self::new(instances, placement, config.max_sessions, sleep_after);
        tracing::info!(
            instances = registry.instances().len(),
            placement = ?config.placement,
            max_sessions = config.max_sessions,
            sleep_after = ?sleep_after,
            "Instance registry ready"
        );
        registry
    }

    /// All instances in the pool.
    pub fn instances(&self) -> &[Arc<HttpInstance>] {
        &self.instances
    }

    /// Number of live name bindings.
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Reserve one binding slot. Returns `false` at the session cap.
    fn try_reserve(&self) -> bool {
        let mut live = self.live.load(Ordering::Acquire);
        loop {
            if live >= self.max_sessions {
                return false;
            }
            match self.live.compare_exchange_weak(
                live,
                live + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(x) => live = x,
            }
        }
    }

    fn release(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }

    /// Drop every binding that has been idle past the sleep window.
    fn purge_expired(&self, now_ms: u64) {
        if self.sleep_after.is_none() {
            return;
        }
        self.bindings.retain(|name, binding| {
            if binding.is_expired(now_ms, self.sleep_after) {
                tracing::debug!(name = %name, instance = %binding.instance.name(), "Session binding lapsed");
                binding.instance.unbind_session();
                self.release();
                false
            } else {
                true
            }
        });
        metrics::record_live_sessions(self.live_sessions());
    }

    /// Resolve the instance bound to `name`, binding it if needed.
    fn bind(&self, name: &str) -> Result<Arc<HttpInstance>, SelectorError> {
        let now = self.now_ms();

        if let Some(binding) = self.bindings.get(name) {
            if !binding.is_expired(now, self.sleep_after) {
                binding.touch(now);
                return Ok(binding.instance.clone());
            }
        }

        self.purge_expired(now);

        match self.bindings.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                // Bound concurrently by another request.
                let binding = entry.get();
                binding.touch(now);
                Ok(binding.instance.clone())
            }
            Entry::Vacant(entry) => {
                // Other shards bind concurrently, so the slot is reserved before placement.
                if !self.try_reserve() {
                    tracing::warn!(name = %name, limit = self.max_sessions, "Session capacity exhausted");
                    return Err(SelectorError::CapacityExhausted {
                        limit: self.max_sessions,
                    });
                }
                let Some(instance) = self.placement.place(&self.instances) else {
                    self.release();
                    return Err(SelectorError::NoInstances);
                };

                instance.bind_session();
                metrics::record_live_sessions(self.live_sessions());
                tracing::debug!(name = %name, instance = %instance.name(), "Session bound");

                entry.insert(SessionBinding {
                    instance: instance.clone(),
                    last_used_ms: AtomicU64::new(now),
                });
                Ok(instance)
            }
        }
    }
}

#[async_trait]
impl InstanceRegistry for PoolRegistry {
    async fn resolve_by_name(&self, name: &str) -> Result<Arc<dyn InstanceHandle>, SelectorError> {
        let instance: Arc<dyn InstanceHandle> = self.bind(name)?;
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    use crate::selector::instance::test_instance;

    fn pool(max_sessions: usize, sleep_after: Option<Duration>) -> PoolRegistry {
        PoolRegistry::new(
            vec![
                test_instance("a", "127.0.0.1:8080", 10),
                test_instance("b", "127.0.0.1:8081", 10),
            ],
            Box::new(RoundRobin::new()),
            max_sessions,
            sleep_after,
        )
    }

    #[tokio::test]
    async fn test_same_name_same_instance() {
        let registry = pool(10, None);

        let first = registry.resolve_by_name("abc123").await.unwrap();
        let second = registry.resolve_by_name("abc123").await.unwrap();
        assert_eq!(first.name(), second.name());
        assert_eq!(registry.live_sessions(), 1);
    }

    #[tokio::test]
    async fn test_new_names_spread_across_pool() {
        let registry = pool(10, None);

        let first = registry.resolve_by_name("one").await.unwrap();
        let second = registry.resolve_by_name("two").await.unwrap();
        assert_ne!(first.name(), second.name());

        let counts: Vec<usize> = registry.instances().iter().map(|i| i.bound_sessions()).collect();
        assert_eq!(counts, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_singleton_is_stable() {
        let registry = pool(10, None);

        let first = registry.resolve_singleton().await.unwrap();
        // unrelated names must not move the singleton
        registry.resolve_by_name("other").await.unwrap();
        let second = registry.resolve_singleton().await.unwrap();
        assert_eq!(first.name(), second.name());
    }

    #[tokio::test]
    async fn test_capacity_exhausted() {
        let registry = pool(2, None);

        registry.resolve_by_name("one").await.unwrap();
        registry.resolve_by_name("two").await.unwrap();
        let err = registry.resolve_by_name("three").await.unwrap_err();
        assert!(matches!(err, SelectorError::CapacityExhausted { limit: 2 }));

        // existing bindings still resolve at capacity
        assert!(registry.resolve_by_name("one").await.is_ok());
    }

    #[tokio::test]
    async fn test_idle_binding_lapses() {
        let registry = pool(10, Some(Duration::from_millis(20)));

        let first = registry.resolve_by_name("abc").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let second = registry.resolve_by_name("abc").await.unwrap();

        // round-robin moved on, so the rebinding lands elsewhere
        assert_ne!(first.name(), second.name());
        assert_eq!(registry.live_sessions(), 1);
        let counts: Vec<usize> = registry.instances().iter().map(|i| i.bound_sessions()).collect();
        assert_eq!(counts, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_lapsed_bindings_free_capacity() {
        let registry = pool(1, Some(Duration::from_millis(20)));

        registry.resolve_by_name("one").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(registry.resolve_by_name("two").await.is_ok());
        assert_eq!(registry.live_sessions(), 1);
    }

    #[test]
    fn test_session_cap_holds_under_contention() {
        const THREADS: usize = 16;

        for round in 0..50 {
            let registry = Arc::new(pool(1, None));
            let barrier = Arc::new(Barrier::new(THREADS));

            let workers: Vec<_> = (0..THREADS)
                .map(|t| {
                    let registry = registry.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        registry.bind(&format!("session-{}-{}", round, t)).is_ok()
                    })
                })
                .collect();

            let bound = workers
                .into_iter()
                .map(|w| w.join().unwrap())
                .filter(|ok| *ok)
                .count();

            assert_eq!(bound, 1, "round {}", round);
            assert_eq!(registry.live_sessions(), 1);
            assert_eq!(registry.bindings.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let registry = PoolRegistry::new(Vec::new(), Box::new(RoundRobin::new()), 10, None);
        let err = registry.resolve_by_name("abc").await.unwrap_err();
        assert!(matches!(err, SelectorError::NoInstances));
        assert_eq!(registry.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_from_config_skips_bad_addresses() {
        let mut config = RegistryConfig::default();
        config.instances.push(crate::config::InstanceConfig {
            name: "broken".into(),
            address: "nowhere".into(),
            max_connections: 1,
        });
        let registry = PoolRegistry::from_config(&config, &TimeoutConfig::default());
        assert_eq!(registry.instances().len(), 1);
    }
}
