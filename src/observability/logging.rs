//! Leveled log callback used by the lifecycle.
//!
//! # Design Decisions
//! - The caller owns the sink; nothing here installs a subscriber
//! - The default sink forwards to `tracing` at the mapped level

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

pub type LogFn = Arc<dyn Fn(Level, &str) + Send + Sync>;

/// Cloneable handle around a [`LogFn`].
#[derive(Clone)]
pub struct Logger {
    sink: LogFn,
}

impl Logger {
    pub fn new(sink: LogFn) -> Self {
        Self { sink }
    }

    pub fn from_fn(f: impl Fn(Level, &str) + Send + Sync + 'static) -> Self {
        Self { sink: Arc::new(f) }
    }

    /// Forwards every line to `tracing`.
    pub fn tracing() -> Self {
        Self::from_fn(forward_to_tracing)
    }

    pub fn discard() -> Self {
        Self::from_fn(|_, _| {})
    }

    pub fn sink(&self) -> LogFn {
        Arc::clone(&self.sink)
    }

    pub fn log(&self, level: Level, message: &str) {
        (self.sink)(level, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    pub fn critical(&self, message: &str) {
        self.log(Level::Critical, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

fn forward_to_tracing(level: Level, message: &str) {
    match level {
        Level::Debug => tracing::debug!(target: "muxlisten", "{message}"),
        Level::Info => tracing::info!(target: "muxlisten", "{message}"),
        Level::Warn => tracing::warn!(target: "muxlisten", "{message}"),
        Level::Error => tracing::error!(target: "muxlisten", "{message}"),
        Level::Critical => tracing::error!(target: "muxlisten", critical = true, "{message}"),
    }
}
