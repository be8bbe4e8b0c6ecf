//! Bridge from `tracing` events into a [`Logger`]'s sinks.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::global::default_logger;
use crate::logger::Logger;
use crate::record::{Caller, Record};
use crate::severity::Severity;

/// Diagnostics about the logger itself; routing them back into it could loop.
const INTERNAL_TARGETS: [&str; 2] = ["fanlog_logging", "fanlog_scheduler"];

enum Target {
    Global,
    Fixed(Arc<Logger>),
}

/// A `tracing_subscriber` layer that delivers every event through a logger's fanout.
pub struct LoggerLayer {
    target: Target,
}

impl LoggerLayer {
    /// Route to whatever [`default_logger`] returns at the time of each event.
    pub fn global() -> Self {
        Self {
            target: Target::Global,
        }
    }

    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            target: Target::Fixed(logger),
        }
    }

    fn logger(&self) -> &Logger {
        match &self.target {
            Target::Global => default_logger().as_ref(),
            Target::Fixed(logger) => logger.as_ref(),
        }
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_internal(meta.target()) {
            return;
        }

        let level = severity_of(meta.level());
        let logger = self.logger();
        if !logger.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let caller = meta
            .file()
            .zip(meta.line())
            .map(|(file, line)| Caller { file, line });
        let mut record = Record::new(level, logger.context())
            .with_caller(caller)
            .with_fields(visitor.fields);
        if let Some(message) = visitor.message {
            record = record.with_message(message);
        }
        logger.dispatch(&record);
    }
}

/// Install a global `tracing` subscriber that feeds the process-wide logger.
///
/// Returns `false` if another subscriber is already installed.
pub fn init_tracing_bridge() -> bool {
    tracing_subscriber::registry()
        .with(LoggerLayer::global())
        .try_init()
        .is_ok()
}

fn is_internal(target: &str) -> bool {
    INTERNAL_TARGETS.iter().any(|crate_name| {
        target
            .strip_prefix(crate_name)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

fn severity_of(level: &Level) -> Severity {
    if *level == Level::ERROR {
        Severity::Error
    } else if *level == Level::WARN {
        Severity::Warn
    } else if *level == Level::INFO {
        Severity::Info
    } else {
        Severity::Debug
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, Value)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, Value::from(format!("{value:?}")));
    }
}
