//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Server descriptor
//!     → listener.rs (resolve / bind / chmod → ServerListener)
//!     → accept loop (lifecycle::serve)
//!     → tls.rs (optional rustls handshake with client auth policy)
//!     → connection.rs (live connection accounting for drain)
//!     → hyper connection driving the caller's router
//! ```
//!
//! # Design Decisions
//! - Listeners are shared by `Arc` between serve tasks and close
//! - TLS material is loaded once per serve loop, not per connection

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{BindError, Io, Listener, ServerListener};
pub use tls::TlsSetupError;
