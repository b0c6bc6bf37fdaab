//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → [routing layer picks route, key and target path]
//!     → [selector resolves an instance handle]
//!     → instance response streamed back, or
//!     → response.rs (failure → JSON 500)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ErrorBody, RouteError, ROUTE_FAILURE};
pub use server::{AppState, HttpServer};
