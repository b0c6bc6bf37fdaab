//! Least-sessions placement strategy.

use std::sync::Arc;

use crate::selector::{HttpInstance, Placement};

/// Least-sessions placement.
/// Selects the instance with the fewest names currently bound to it.
#[derive(Debug, Default)]
pub struct LeastSessions;

impl LeastSessions {
    pub fn new() -> Self {
        Self
    }
}

impl Placement for LeastSessions {
    fn place(&self, instances: &[Arc<HttpInstance>]) -> Option<Arc<HttpInstance>> {
        // In case of tie, the first one is selected (stability)
        instances
            .iter()
            .min_by_key(|instance| instance.bound_sessions())
            .cloned()
    }
}
