//! Listen-target descriptors.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize, two-pass kind probe per record)
//!     → Servers::interpolate (path rewriting, e.g. ${VAR})
//!     → Servers::defaultize (Defaults + first-of-kind Fallbacks)
//!     → Servers::validate (semantic checks, first error wins)
//!     → lifecycle::listen
//! ```
//!
//! # Design Decisions
//! - Descriptors are a closed enum: `Server::{Inet, Unix}`
//! - Defaults are an explicit value, never process globals
//! - Validation separates syntactic (serde) from semantic checks

pub mod base;
pub mod defaults;
pub mod dump;
pub mod duration;
pub mod error;
pub mod inet;
pub mod iter;
pub mod kind;
pub mod loader;
pub mod server;
pub mod servers;
pub mod tls;
pub mod unix;
pub mod validation;

pub use base::{GrpcConfig, HttpConfig, PprofConfig, ServerBase};
pub use defaults::{Defaults, Fallbacks};
pub use dump::DumpCtx;
pub use error::ConfigError;
pub use inet::ServerInet;
pub use iter::Iter;
pub use kind::{Kind, Protocol};
pub use server::{Descriptor, Server};
pub use servers::Servers;
pub use tls::{ClientAuth, ClientAuthTlsConfig, ClientAuthType, TlsConfig, TlsVersion};
pub use unix::{ServerUnix, SocketMode};
pub use validation::{FsProbe, RealFs, ValidationError};
