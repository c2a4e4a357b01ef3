//! Bind phase: one task per descriptor.

use tokio::task::JoinSet;

use crate::config::kind::Kind;
use crate::config::server::Server;
use crate::config::servers::Servers;
use crate::lifecycle::options::ServeOptions;
use crate::net::listener::{self, BindError, ServerListener};
use crate::observability::metrics;

fn transport(server: &Server) -> &'static str {
    if server.kind().has(Kind::UNIX) {
        "unix"
    } else {
        "inet"
    }
}

impl Servers<Server> {
    /// Binds every descriptor concurrently.
    ///
    /// Failures do not stop the other binds: the caller gets the bound
    /// subset, in configuration order, together with every error.
    pub async fn listen(&self, opts: &ServeOptions) -> (Servers<ServerListener>, Vec<BindError>) {
        let grace = opts.defaults.unix_chmod_grace;
        let mut tasks = JoinSet::new();

        for (index, server) in self.as_slice().iter().cloned().enumerate() {
            let log = opts.log.clone();
            tasks.spawn(async move {
                let transport = transport(&server);
                (index, transport, listener::bind(server, grace, &log).await)
            });
        }

        let mut bound = Vec::with_capacity(self.len());
        let mut errors = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, transport, Ok(server_listener))) => {
                    metrics::record_bind(transport, true);
                    opts.log.info(&format!(
                        "listen OK: {} {} ({transport})",
                        server_listener.server.log_prefix(),
                        server_listener.server.addr()
                    ));
                    bound.push((index, server_listener));
                }
                Ok((index, transport, Err(err))) => {
                    metrics::record_bind(transport, false);
                    opts.log.error(&format!("listen failed: {err}"));
                    errors.push((index, err));
                }
                Err(err) => errors.push((usize::MAX, BindError::Task(err))),
            }
        }

        bound.sort_by_key(|(index, _)| *index);
        errors.sort_by_key(|(index, _)| *index);

        (
            bound.into_iter().map(|(_, server_listener)| server_listener).collect(),
            errors.into_iter().map(|(_, err)| err).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::{Defaults, Fallbacks};
    use crate::config::server::Descriptor;
    use crate::observability::{Level, Logger};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn quick_opts() -> ServeOptions {
        let mut defaults = Defaults::default();
        defaults.unix_chmod_grace = Duration::from_millis(5);
        ServeOptions::new()
            .with_defaults(defaults)
            .with_logger(Logger::discard())
    }

    #[tokio::test]
    async fn partial_failure_keeps_order_and_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let json = format!(
            r#"[
                {{"kind": ["inet", "http"], "host": "127.0.0.1", "port": 0}},
                {{"kind": ["unix", "http"], "addr": "/nonexistent-muxlisten-dir/a.sock"}},
                {{"kind": ["unix", "grpc"], "addr": {:?}}}
            ]"#,
            dir.path().join("rpc.sock").display().to_string()
        );
        let mut servers: Servers = serde_json::from_str(&json).unwrap();
        servers.defaultize(&Fallbacks::default(), &Defaults::default());

        let (bound, errors) = servers.listen(&quick_opts()).await;

        assert_eq!(bound.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], BindError::Listen { .. }));

        let kinds: Vec<Kind> = bound.as_slice().iter().map(|entry| entry.kind()).collect();
        assert_eq!(kinds, vec![Kind::INET.with(Kind::HTTP), Kind::UNIX.with(Kind::GRPC)]);
        assert_eq!(bound.iter().filter_listener().len(), 2);

        assert!(bound.close().await.is_empty());
    }

    #[tokio::test]
    async fn bind_outcomes_reach_the_logger() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let opts = quick_opts().with_logger(Logger::from_fn(move |level, message| {
            captured.lock().unwrap().push((level, message.to_string()));
        }));

        let mut servers: Servers = serde_json::from_str(
            r#"[
                {"kind": ["inet", "http"], "host": "127.0.0.1", "port": 0},
                {"kind": ["unix", "http"], "addr": "/nonexistent-muxlisten-dir/b.sock"}
            ]"#,
        )
        .unwrap();
        servers.defaultize(&Fallbacks::default(), &Defaults::default());

        let (bound, _) = servers.listen(&opts).await;
        let port = bound.as_slice()[0].server.as_inet().unwrap().port;

        let lines = lines.lock().unwrap().clone();
        let bound_line = (Level::Info, format!("listen OK: TCP 127.0.0.1:{port} (inet)"));
        assert!(lines.contains(&bound_line), "{lines:?}");
        assert!(
            lines
                .iter()
                .any(|(level, line)| *level == Level::Error && line.starts_with("listen failed: ")),
            "{lines:?}"
        );

        assert!(bound.close().await.is_empty());
    }

    #[tokio::test]
    async fn empty_collection_binds_nothing() {
        let servers: Servers = Servers::new();
        let (bound, errors) = servers.listen(&quick_opts()).await;
        assert!(bound.is_empty());
        assert!(errors.is_empty());
    }
}
