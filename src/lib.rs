//! Multi-transport listener supervisor.
//!
//! Binds a declarative list of TCP and UNIX-socket listen targets, attaches
//! HTTP routers or gRPC routes to them, and stops them together with one
//! bounded graceful shutdown.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::{Descriptor, Kind, Server, Servers};
pub use lifecycle::{ServeOptions, Shutdown};
pub use net::ServerListener;
