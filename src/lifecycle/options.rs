//! Caller-supplied knobs for listen / serve.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::defaults::Defaults;
use crate::observability::Logger;

pub type ShutdownTimeoutFn = Arc<dyn Fn() -> Duration + Send + Sync>;

/// Adds a reflection service to the routes of descriptors with
/// `grpc.reflection` enabled.
pub type ReflectionFn = Arc<dyn Fn(tonic::service::Routes) -> tonic::service::Routes + Send + Sync>;

#[derive(Clone)]
pub struct ServeOptions {
    /// Drain deadline, asked for every time a shutdown starts.
    pub shutdown_timeout: ShutdownTimeoutFn,
    pub log: Logger,
    /// Base lifetime; cancelling it stops every serve loop.
    pub lifetime: CancellationToken,
    pub reflection: Option<ReflectionFn>,
    pub defaults: Defaults,
}

impl ServeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown_timeout(self, timeout: Duration) -> Self {
        self.with_shutdown_timeout_fn(move || timeout)
    }

    pub fn with_shutdown_timeout_fn(mut self, f: impl Fn() -> Duration + Send + Sync + 'static) -> Self {
        self.shutdown_timeout = Arc::new(f);
        self
    }

    pub fn with_logger(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    pub fn with_lifetime(mut self, lifetime: CancellationToken) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_reflection(
        mut self,
        f: impl Fn(tonic::service::Routes) -> tonic::service::Routes + Send + Sync + 'static,
    ) -> Self {
        self.reflection = Some(Arc::new(f));
        self
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn shutdown_deadline(&self) -> Duration {
        (self.shutdown_timeout)()
    }
}

impl Default for ServeOptions {
    fn default() -> Self {
        let defaults = Defaults::default();
        let timeout = defaults.shutdown_timeout;
        Self {
            shutdown_timeout: Arc::new(move || timeout),
            log: Logger::tracing(),
            lifetime: CancellationToken::new(),
            reflection: None,
            defaults,
        }
    }
}

impl fmt::Debug for ServeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeOptions")
            .field("shutdown_timeout", &self.shutdown_deadline())
            .field("lifetime", &self.lifetime)
            .field("reflection", &self.reflection.is_some())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
