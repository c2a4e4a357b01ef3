//! Bridges events from the RPC stack into a [`Logger`].

use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::observability::logging::{Level, Logger};

const RPC_TARGETS: [&str; 3] = ["tonic", "h2", "tower"];

fn is_rpc_target(target: &str) -> bool {
    RPC_TARGETS.iter().any(|root| {
        target == *root
            || target
                .strip_prefix(root)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

/// `tracing_subscriber` layer forwarding `tonic`, `h2` and `tower` events at
/// or above `min_level` to the logger.
///
/// The logger must not emit `tracing` events itself: events raised while a
/// subscriber is dispatching are dropped.
#[derive(Debug, Clone)]
pub struct RpcLogLayer {
    logger: Logger,
    min_level: Level,
}

impl RpcLogLayer {
    pub fn new(logger: Logger, min_level: Level) -> Self {
        Self { logger, min_level }
    }
}

impl<S: Subscriber> Layer<S> for RpcLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !is_rpc_target(meta.target()) {
            return;
        }

        let level = Level::from(meta.level());
        if level < self.min_level {
            return;
        }

        let mut line = LineVisitor::default();
        event.record(&mut line);
        self.logger
            .log(level, &format!("{}: {}{}", meta.target(), line.message, line.fields));
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
