//! Serve phase: one accept loop per bound descriptor, supervised together.
//!
//! # Responsibilities
//! - Attach the caller's router to every bound HTTP or gRPC listener
//! - Wrap INET streams in TLS when the descriptor asks for it
//! - Stop accepting on cancellation and drain connections within the deadline
//! - Cancel the siblings of the first failing loop and report that failure
//!
//! # Design Decisions
//! - One `CancellationToken`, a child of the caller's lifetime, governs all loops
//! - Accept errors raised after cancellation are not failures
//! - A loop releases its listener as soon as it stops accepting, so `close`
//!   succeeds even while connections are still draining
//! - A descriptor carrying both HTTP and gRPC belongs to `serve_http`; one
//!   listener never feeds two accept loops

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use axum_server::accept::Accept;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::defaults::Defaults;
use crate::config::kind::{Kind, Protocol};
use crate::config::server::Server;
use crate::config::servers::Servers;
use crate::lifecycle::options::ServeOptions;
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::{Io, ServerListener};
use crate::net::tls::TlsSetupError;
use crate::observability::metrics;

/// Pause after the process runs out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("{protocol} server ({addr}): TLS setup failed: {source}")]
    Tls {
        protocol: Protocol,
        addr: String,
        #[source]
        source: TlsSetupError,
    },

    #[error("{protocol} server ({addr}): accept failed: {source}")]
    Accept {
        protocol: Protocol,
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{protocol} server ({addr}): listener closed")]
    Closed { protocol: Protocol, addr: String },

    #[error("serve task failed: {0}")]
    Task(#[from] JoinError),
}

impl ServeError {
    /// Listener closed while shutting down.
    pub fn is_closed(&self) -> bool {
        matches!(self, ServeError::Closed { .. })
    }
}

impl Servers<ServerListener> {
    /// Serves every bound HTTP descriptor with the router built by
    /// `new_router`, until the lifetime in `opts` is cancelled or a loop
    /// fails.
    pub async fn serve_http<F>(&self, new_router: F, opts: &ServeOptions) -> Result<(), ServeError>
    where
        F: Fn(&Server) -> Router,
    {
        let mut entries = Vec::new();
        self.iter().filter_http().filter_listener().for_each(|bound| {
            let router = with_diagnostics(&bound.server, new_router(&bound.server), &opts.defaults);
            entries.push((bound.clone(), router.layer(TraceLayer::new_for_http())));
        });

        supervise(Protocol::Http, entries, opts).await
    }

    /// Serves every bound gRPC descriptor with the routes built by
    /// `new_routes`. Descriptors with `grpc.reflection` get the reflection
    /// service from `opts` added.
    ///
    /// Descriptors that also carry HTTP are skipped: their listener is
    /// served by [`serve_http`](Self::serve_http).
    pub async fn serve_rpc<F>(&self, new_routes: F, opts: &ServeOptions) -> Result<(), ServeError>
    where
        F: Fn(&Server) -> tonic::service::Routes,
    {
        let mut entries = Vec::new();
        self.iter().filter_grpc().filter_listener().for_each(|bound| {
            if bound.server.kind().has(Kind::HTTP) {
                opts.log.warn(&format!(
                    "{} gRPC server ({}) is also HTTP; left to the HTTP server",
                    bound.server.log_prefix(),
                    bound.server.addr()
                ));
                return;
            }

            let mut routes = new_routes(&bound.server);

            if bound.server.base().grpc.reflection {
                match &opts.reflection {
                    Some(add_reflection) => routes = add_reflection(routes),
                    None => opts.log.warn(&format!(
                        "{} gRPC server ({}) asks for reflection but none is configured",
                        bound.server.log_prefix(),
                        bound.server.addr()
                    )),
                }
            }

            let router = routes.into_axum_router().layer(TraceLayer::new_for_grpc());
            entries.push((bound.clone(), router));
        });

        supervise(Protocol::Grpc, entries, opts).await
    }
}

/// Serves the descriptor dump at the pprof prefix when enabled. The
/// caller's router handles every other request, including its own route at
/// the same path, which the dump shadows.
fn with_diagnostics(server: &Server, router: Router, defaults: &Defaults) -> Router {
    let pprof = &server.base().pprof;
    if !pprof.enable {
        return router;
    }

    let dump = server.dump_to_string(defaults);
    Router::new()
        .route(&pprof.prefix, get(move || std::future::ready(dump.clone())))
        .fallback_service(router)
}

async fn supervise(
    protocol: Protocol,
    entries: Vec<(ServerListener, Router)>,
    opts: &ServeOptions,
) -> Result<(), ServeError> {
    let lifetime = opts.lifetime.child_token();
    let _stop_on_return = lifetime.clone().drop_guard();

    let mut tasks = JoinSet::new();
    for (bound, router) in entries {
        tasks.spawn(serve_listener(protocol, bound, router, opts.clone(), lifetime.clone()));
    }

    let mut first = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(ServeError::from).and_then(|result| result) {
            Ok(()) => {}
            Err(err) if err.is_closed() => tracing::debug!(error = %err, "Serve loop stopped"),
            Err(err) => {
                first = Some(err);
                break;
            }
        }
    }

    let Some(err) = first else {
        return Ok(());
    };

    metrics::record_serve_error(protocol);
    opts.log.error(&err.to_string());
    lifetime.cancel();

    let deadline = opts.shutdown_deadline();
    let rest = async {
        while let Some(joined) = tasks.join_next().await {
            match joined.map_err(ServeError::from).and_then(|result| result) {
                Err(later) if !later.is_closed() => opts.log.error(&later.to_string()),
                _ => {}
            }
        }
    };

    if tokio::time::timeout(deadline, rest).await.is_err() {
        opts.log.warn(&format!(
            "{protocol} servers did not stop within {deadline:?}; leaving them behind"
        ));
        metrics::record_shutdown_timeout(protocol);
        tasks.detach_all();
    }

    Err(err)
}

fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// EMFILE / ENFILE.
fn is_fd_exhaustion(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(23) | Some(24))
}

async fn serve_listener(
    protocol: Protocol,
    bound: ServerListener,
    router: Router,
    opts: ServeOptions,
    lifetime: CancellationToken,
) -> Result<(), ServeError> {
    let ServerListener { server, listener } = bound;
    let addr = server.addr();
    let prefix = server.log_prefix();

    let tls = match &server {
        Server::Inet(inet) => inet
            .new_tls_config(&opts.defaults, protocol)
            .map_err(|source| ServeError::Tls {
                protocol,
                addr: addr.clone(),
                source,
            })?,
        Server::Unix(_) => None,
    };
    let acceptor = tls.map(|config| Arc::new(RustlsAcceptor::new(RustlsConfig::from_config(config))));

    let read_header_timeout = server.base().http.read_header_timeout;
    let tracker = ConnectionTracker::new();

    opts.log.info(&format!("{prefix} {protocol} server starting on {addr}"));

    loop {
        let accepted = tokio::select! {
            _ = lifetime.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(err) if is_connection_error(&err) => continue,
            Err(err) if is_fd_exhaustion(&err) => {
                opts.log.error(&format!("{prefix} {protocol} server ({addr}) accept: {err}"));
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
            Err(_) if lifetime.is_cancelled() => {
                return Err(ServeError::Closed { protocol, addr });
            }
            Err(source) => return Err(ServeError::Accept { protocol, addr, source }),
        };

        metrics::record_connection(protocol);
        let guard = tracker.track();
        tracing::trace!(connection_id = %guard.id(), peer = %peer, "Connection accepted");

        tokio::spawn(serve_connection(
            stream,
            acceptor.clone(),
            router.clone(),
            read_header_timeout,
            lifetime.clone(),
            guard,
        ));
    }
    drop(listener);

    let deadline = opts.shutdown_deadline();
    if tokio::time::timeout(deadline, tracker.wait_idle()).await.is_err() {
        opts.log.warn(&format!(
            "{prefix} {protocol} server (:addr {addr}) shutdown timed out after {deadline:?} with {} open connections",
            tracker.active_count()
        ));
        metrics::record_shutdown_timeout(protocol);
    } else {
        opts.log.info(&format!("{prefix} {protocol} server (:addr {addr}) shutdown OK"));
    }

    Ok(())
}

async fn serve_connection(
    stream: Box<dyn Io>,
    acceptor: Option<Arc<RustlsAcceptor>>,
    router: Router,
    read_header_timeout: Duration,
    lifetime: CancellationToken,
    guard: ConnectionGuard,
) {
    match acceptor {
        Some(acceptor) => match acceptor.accept(stream, ()).await {
            Ok((stream, ())) => drive(stream, router, read_header_timeout, lifetime, &guard).await,
            Err(err) => tracing::debug!(connection_id = %guard.id(), error = %err, "TLS handshake failed"),
        },
        None => drive(stream, router, read_header_timeout, lifetime, &guard).await,
    }
}

async fn drive<S>(
    stream: S,
    router: Router,
    read_header_timeout: Duration,
    lifetime: CancellationToken,
    guard: &ConnectionGuard,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut builder = auto::Builder::new(TokioExecutor::new());
    if !read_header_timeout.is_zero() {
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(read_header_timeout);
    }

    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = lifetime.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(err) = result {
        tracing::debug!(connection_id = %guard.id(), error = %err, "Connection ended with error");
    }
}
