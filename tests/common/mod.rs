//! Shared utilities for the lifecycle integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use muxlisten::config::{Defaults, Fallbacks, Server, Servers};
use muxlisten::lifecycle::ServeOptions;
use muxlisten::observability::{Level, Logger};

pub type Lines = Arc<Mutex<Vec<(Level, String)>>>;

pub fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

/// Logger that records every line.
pub fn capture_logger() -> (Logger, Lines) {
    let lines: Lines = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&lines);
    let logger = Logger::from_fn(move |level, message| {
        captured.lock().unwrap().push((level, message.to_string()));
    });
    (logger, lines)
}

pub fn logged(lines: &Lines, needle: &str) -> bool {
    lines
        .lock()
        .unwrap()
        .iter()
        .any(|(_, line)| line.contains(needle))
}

pub fn test_defaults() -> Defaults {
    Defaults {
        unix_chmod_grace: Duration::from_millis(10),
        shutdown_timeout: Duration::from_secs(2),
        ..Defaults::default()
    }
}

pub fn test_opts(lifetime: CancellationToken, log: Logger) -> ServeOptions {
    ServeOptions::new()
        .with_defaults(test_defaults())
        .with_shutdown_timeout(Duration::from_secs(2))
        .with_lifetime(lifetime)
        .with_logger(log)
}

/// Decodes and defaultizes; INET port `0` is kept so the kernel picks one.
pub fn descriptors(json: &str) -> Servers {
    let mut servers: Servers = serde_json::from_str(json).unwrap();
    let fallbacks = Fallbacks {
        inet_host: "127.0.0.1".to_string(),
        inet_port: 0,
        unix_addr: String::new(),
    };
    servers.defaultize(&fallbacks, &test_defaults());
    servers
}

pub fn hello_router(server: &Server) -> Router {
    let reply = format!("hello from {}", server.addr());
    Router::new().route("/", get(move || std::future::ready(reply.clone())))
}

/// `/slow` signals `entered`, then stays in flight for longer than any test.
pub fn slow_router(entered: Arc<Notify>) -> impl Fn(&Server) -> Router {
    move |_| {
        let entered = Arc::clone(&entered);
        Router::new().route(
            "/slow",
            get(move || {
                let entered = Arc::clone(&entered);
                async move {
                    entered.notify_one();
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "late"
                }
            }),
        )
    }
}

pub fn inet_port(server: &Server) -> u16 {
    server.as_inet().map(|inet| inet.port).unwrap_or_default()
}

/// Plain HTTP/1.1 GET over a UNIX socket; returns the raw response.
pub async fn unix_get(path: &Path, uri: &str) -> String {
    let mut stream = UnixStream::connect(path).await.unwrap();
    let request = format!("GET {uri} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}
