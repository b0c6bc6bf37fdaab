//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query, headers)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate path prefix)
//!     → session.rs (derive routing key)
//!     → rewrite.rs (strip prefix, rebuild request)
//!     → Return: matched Route + rewritten request, or NoMatch
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[]
//!     → Sort by priority
//!     → Compile matchers
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled ahead of time, immutable once built
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by priority)
//! - Routing key extraction is total: it always yields a key

pub mod matcher;
pub mod rewrite;
pub mod router;
pub mod session;

pub use router::{Route, RouteTable};
pub use session::SessionKeyExtractor;
