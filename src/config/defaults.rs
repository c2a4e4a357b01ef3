//! Process-wide default values applied by `defaultize`.

use std::time::Duration;

use crate::config::tls::{ClientAuthType, TlsVersion};
use crate::config::unix::SocketMode;

pub const DEFAULT_READ_HEADER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PPROF_PREFIX: &str = "/debug/pprof";
pub const DEFAULT_TLS_VERSION: TlsVersion = TlsVersion::Tls13;
pub const DEFAULT_CLIENT_AUTH_TYPE: ClientAuthType = ClientAuthType::RequireAndVerifyClientCert;
pub const DEFAULT_PREFER_SERVER_CIPHER_SUITES: bool = true;
pub const DEFAULT_SOCKET_FILE_MODE: SocketMode = SocketMode::new(0o666);
pub const DEFAULT_UNIX_CHMOD_GRACE: Duration = Duration::from_secs(1);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Immutable set of defaults threaded through descriptor defaulting and
/// the listen phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub read_header_timeout: Duration,
    pub pprof_prefix: String,
    pub tls_version: TlsVersion,
    pub client_auth_type: ClientAuthType,
    pub prefer_server_cipher_suites: bool,
    pub socket_file_mode: SocketMode,
    /// Pause between the permissive and the final chmod of a UNIX socket.
    pub unix_chmod_grace: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            read_header_timeout: DEFAULT_READ_HEADER_TIMEOUT,
            pprof_prefix: DEFAULT_PPROF_PREFIX.to_string(),
            tls_version: DEFAULT_TLS_VERSION,
            client_auth_type: DEFAULT_CLIENT_AUTH_TYPE,
            prefer_server_cipher_suites: DEFAULT_PREFER_SERVER_CIPHER_SUITES,
            socket_file_mode: DEFAULT_SOCKET_FILE_MODE,
            unix_chmod_grace: DEFAULT_UNIX_CHMOD_GRACE,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Process-level fallbacks for the first INET and first UNIX descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallbacks {
    pub inet_host: String,
    pub inet_port: u16,
    pub unix_addr: String,
}

impl Default for Fallbacks {
    fn default() -> Self {
        Self {
            inet_host: "0.0.0.0".to_string(),
            inet_port: 80,
            unix_addr: String::new(),
        }
    }
}
