//! OS listeners and the bind phase.
//!
//! # Responsibilities
//! - Resolve and bind INET descriptors, honoring `tcp4` / `tcp6`
//! - Bind UNIX descriptors: stale socket removal, two-step chmod
//! - Pair each bound listener with its descriptor ([`ServerListener`])
//!
//! # Design Decisions
//! - The socket is chmod'ed to `0777` first and narrowed to the configured
//!   mode after a grace interval
//! - Any UNIX failure after bind closes the listener and removes the file

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};

use crate::config::inet::ServerInet;
use crate::config::server::{Descriptor, Server};
use crate::config::unix::ServerUnix;
use crate::observability::Logger;

const TEMPORARY_SOCKET_MODE: u32 = 0o777;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("no {network} address found for {addr}")]
    NoAddress { addr: String, network: String },

    #[error("listen {network} {addr}: {source}")]
    Listen {
        network: String,
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("chmod {path:?} to {mode:04o}: {source}")]
    Chmod {
        path: PathBuf,
        mode: u32,
        #[source]
        source: io::Error,
    },

    #[error("bind task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Accepted byte stream.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Io for T {}

#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    /// Accepts one connection, returning the stream and a printable peer.
    pub async fn accept(&self) -> io::Result<(Box<dyn Io>, String)> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                let _ = stream.set_nodelay(true);
                Ok((Box::new(stream), peer.to_string()))
            }
            Listener::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok((Box::new(stream), "unix".to_string()))
            }
        }
    }

    pub fn local_addr(&self) -> io::Result<String> {
        match self {
            Listener::Tcp(listener) => Ok(listener.local_addr()?.to_string()),
            Listener::Unix(listener) => Ok(listener
                .local_addr()?
                .as_pathname()
                .map(|path| path.display().to_string())
                .unwrap_or_default()),
        }
    }
}

/// A bound listener paired with the descriptor it was created from.
#[derive(Debug, Clone)]
pub struct ServerListener {
    pub server: Server,
    pub listener: Arc<Listener>,
}

impl ServerListener {
    pub fn new(server: Server, listener: Listener) -> Self {
        Self {
            server,
            listener: Arc::new(listener),
        }
    }
}

impl Descriptor for ServerListener {
    fn server(&self) -> &Server {
        &self.server
    }

    fn bound(&self) -> Option<&ServerListener> {
        Some(self)
    }
}

impl fmt::Display for ServerListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.server.log_prefix(), self.server.addr())
    }
}

/// Binds one descriptor.
///
/// An INET port of `0` is replaced in the returned descriptor by the port
/// the kernel assigned.
pub async fn bind(server: Server, grace: Duration, log: &Logger) -> Result<ServerListener, BindError> {
    match server {
        Server::Inet(mut inet) => {
            let listener = bind_inet(&inet).await?;
            if inet.port == 0 {
                if let Ok(local) = listener.local_addr() {
                    inet.set_port(local.port());
                }
            }
            Ok(ServerListener::new(Server::Inet(inet), Listener::Tcp(listener)))
        }
        Server::Unix(unix) => {
            let listener = bind_unix(&unix, grace, log).await?;
            Ok(ServerListener::new(Server::Unix(unix), Listener::Unix(listener)))
        }
    }
}

fn accepts(network: &str, addr: &SocketAddr) -> bool {
    match network {
        "tcp4" => addr.is_ipv4(),
        "tcp6" => addr.is_ipv6(),
        _ => true,
    }
}

async fn bind_inet(inet: &ServerInet) -> Result<TcpListener, BindError> {
    let network = inet.base.network().to_string();
    let addr = inet.addr();

    let candidates: Vec<SocketAddr> = if inet.host.is_empty() {
        let unspecified = if network == "tcp6" {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, inet.port))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, inet.port))
        };
        vec![unspecified]
    } else {
        tokio::net::lookup_host((inet.host.as_str(), inet.port))
            .await
            .map_err(|source| BindError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .filter(|candidate| accepts(&network, candidate))
            .collect()
    };

    let Some(target) = candidates.first().copied() else {
        return Err(BindError::NoAddress { addr, network });
    };

    let listener = TcpListener::bind(target)
        .await
        .map_err(|source| BindError::Listen {
            network: network.clone(),
            addr: addr.clone(),
            source,
        })?;

    tracing::debug!(address = %target, network = %network, "TCP listener bound");
    Ok(listener)
}

async fn chmod(path: &Path, mode: u32) -> Result<(), BindError> {
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|source| BindError::Chmod {
            path: path.to_path_buf(),
            mode,
            source,
        })
}

async fn bind_unix(unix: &ServerUnix, grace: Duration, log: &Logger) -> Result<UnixListener, BindError> {
    let path = Path::new(&unix.path);

    match tokio::fs::remove_file(path).await {
        Ok(()) => log.debug(&format!("UNIX removed stale socket {}", unix.path)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => log.warn(&format!("UNIX could not remove {}: {err}", unix.path)),
    }

    let listener = UnixListener::bind(path).map_err(|source| BindError::Listen {
        network: unix.base.network().to_string(),
        addr: unix.path.clone(),
        source,
    })?;

    let mode = unix.socket_file_mode.perm();
    let result = async {
        chmod(path, TEMPORARY_SOCKET_MODE).await?;
        tokio::time::sleep(grace).await;
        chmod(path, mode).await
    }
    .await;

    if let Err(err) = result {
        drop(listener);
        let _ = tokio::fs::remove_file(path).await;
        return Err(err);
    }

    log.info(&format!(
        "UNIX chmod OK (:addr {} :perms {} :cmd \"chmod {:o} {}\")",
        unix.path, unix.socket_file_mode, mode, unix.path
    ));
    Ok(listener)
}
