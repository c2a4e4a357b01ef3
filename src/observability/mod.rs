//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle events
//!     → logging.rs (Logger, caller-supplied LogFn; default forwards to tracing)
//!     → metrics.rs (bind / serve / shutdown counters)
//!
//! tonic, h2 and tower events
//!     → rpc_log.rs (RpcLogLayer) → the same Logger
//! ```
//!
//! # Design Decisions
//! - Internal diagnostics use `tracing` with structured fields
//! - Metrics are no-ops until the caller installs a recorder

pub mod logging;
pub mod metrics;
pub mod rpc_log;

pub use logging::{Level, LogFn, Logger};
pub use rpc_log::RpcLogLayer;
