//! Close phase.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;

use crate::config::server::Server;
use crate::config::servers::Servers;
use crate::net::listener::ServerListener;

#[derive(Debug, Error)]
pub enum CloseError {
    #[error("listener {addr} is still held by a serve task")]
    InUse { addr: String },

    #[error("remove unix socket {path:?}: {source}")]
    RemoveSocket {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Servers<ServerListener> {
    /// Closes every listener concurrently and removes UNIX socket files.
    /// Only failures are returned.
    pub async fn close(self) -> Vec<CloseError> {
        join_all(self.into_iter().map(close_one))
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect()
    }
}

async fn close_one(bound: ServerListener) -> Result<(), CloseError> {
    let ServerListener { server, listener } = bound;

    let listener = Arc::try_unwrap(listener).map_err(|_| CloseError::InUse { addr: server.addr() })?;
    drop(listener);

    if let Server::Unix(unix) = &server {
        match tokio::fs::remove_file(&unix.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CloseError::RemoveSocket {
                    path: PathBuf::from(&unix.path),
                    source,
                })
            }
        }
    }

    tracing::debug!(addr = %server.addr(), "Listener closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::kind::Kind;
    use crate::config::unix::ServerUnix;
    use crate::net::listener::bind;
    use crate::observability::Logger;
    use std::time::Duration;

    async fn unix_listener(path: &std::path::Path) -> ServerListener {
        let mut unix = ServerUnix {
            path: path.display().to_string(),
            ..ServerUnix::default()
        };
        unix.base.kind = Kind::UNIX.with(Kind::HTTP);
        bind(Server::Unix(unix), Duration::ZERO, &Logger::discard())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn close_removes_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sock");
        let bound = unix_listener(&path).await;
        assert!(path.exists());

        let errors = Servers::from(vec![bound]).close().await;
        assert!(errors.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn shared_listener_is_reported_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let bound = unix_listener(&dir.path().join("b.sock")).await;
        let _held = Arc::clone(&bound.listener);

        let errors = Servers::from(vec![bound]).close().await;
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CloseError::InUse { .. }));
    }
}
