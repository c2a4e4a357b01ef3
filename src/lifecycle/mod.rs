//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Listen (listen.rs):
//!     Servers<Server> → one bind task per descriptor → Servers<ServerListener> + errors
//!
//! Serve (serve.rs):
//!     bound HTTP / gRPC entries → accept loops → first failure cancels the rest
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGINT/SIGTERM/SIGQUIT → cancel lifetime → stop accepting → drain (deadline)
//!
//! Close (close.rs):
//!     drop listeners, remove UNIX socket files
//! ```
//!
//! # Design Decisions
//! - Per-descriptor failures at bind time are collected, never fatal
//! - One deadline bounds each drain and the wait after a failure

pub mod close;
pub mod listen;
pub mod options;
pub mod serve;
pub mod shutdown;
pub mod signals;

pub use close::CloseError;
pub use options::{ReflectionFn, ServeOptions, ShutdownTimeoutFn};
pub use serve::ServeError;
pub use shutdown::Shutdown;
