//! Session-affine container router library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod selector;
pub mod workload;

pub use config::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
