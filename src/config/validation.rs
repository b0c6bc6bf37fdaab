//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check instance addresses and uniqueness
//! - Validate route prefixes and policy parameters
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{RouterConfig, SelectionPolicy};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid listener bind address '{0}'")]
    BindAddress(String),

    #[error("registry has no instances")]
    NoInstances,

    #[error("duplicate instance name '{0}'")]
    DuplicateInstance(String),

    #[error("instance '{name}' has invalid address '{address}'")]
    InstanceAddress { name: String, address: String },

    #[error("instance '{0}' allows zero connections")]
    ZeroConnections(String),

    #[error("registry.max_sessions must be greater than zero")]
    ZeroSessions,

    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("route '{name}' prefix '{prefix}' must start with '/'")]
    RoutePrefix { name: String, prefix: String },

    #[error("route '{0}' uses the named policy with an empty instance name")]
    EmptyInstanceName(String),

    #[error("route '{0}' uses the random policy with max_instances = 0")]
    EmptyRandomPool(String),

    #[error("session.{0} must not be empty")]
    EmptySessionField(&'static str),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.session.query_param.is_empty() {
        errors.push(ValidationError::EmptySessionField("query_param"));
    }
    if config.session.header.is_empty() {
        errors.push(ValidationError::EmptySessionField("header"));
    }
    if config.session.default_key.is_empty() {
        errors.push(ValidationError::EmptySessionField("default_key"));
    }

    if config.registry.instances.is_empty() {
        errors.push(ValidationError::NoInstances);
    }
    if config.registry.max_sessions == 0 {
        errors.push(ValidationError::ZeroSessions);
    }

    let timeouts = [
        ("connect_secs", config.timeouts.connect_secs),
        ("resolve_ms", config.timeouts.resolve_ms),
        ("upstream_secs", config.timeouts.upstream_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(field));
        }
    }

    let mut instance_names = HashSet::new();
    for instance in &config.registry.instances {
        if !instance_names.insert(instance.name.as_str()) {
            errors.push(ValidationError::DuplicateInstance(instance.name.clone()));
        }
        if instance.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InstanceAddress {
                name: instance.name.clone(),
                address: instance.address.clone(),
            });
        }
        if instance.max_connections == 0 {
            errors.push(ValidationError::ZeroConnections(instance.name.clone()));
        }
    }

    let mut route_names = HashSet::new();
    for route in &config.routes {
        if !route_names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::RoutePrefix {
                name: route.name.clone(),
                prefix: route.path_prefix.clone(),
            });
        }
        match &route.policy {
            SelectionPolicy::Named { instance } if instance.is_empty() => {
                errors.push(ValidationError::EmptyInstanceName(route.name.clone()));
            }
            SelectionPolicy::Random { max_instances: 0 } => {
                errors.push(ValidationError::EmptyRandomPool(route.name.clone()));
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
