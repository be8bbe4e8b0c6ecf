use tracing::warn;

use crate::record::Record;
use crate::severity::Severity;
use crate::sink::Sink;

/// Outcome of delivering one record. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub accepted: usize,
    pub failed: usize,
}

/// Fixed, ordered set of sinks. Each record goes to every sink whose filter accepts it.
///
/// A failing sink is reported and skipped; it never prevents delivery to the others
/// and its error never reaches the caller.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Box<dyn Sink>>,
}

impl Fanout {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Whether any sink would accept a record at `level`.
    pub fn enabled(&self, level: Severity) -> bool {
        self.sinks.iter().any(|s| s.enabled(level))
    }

    pub fn deliver(&self, record: &Record<'_>) -> Delivery {
        let mut delivery = Delivery::default();
        for sink in &self.sinks {
            if !sink.enabled(record.severity()) {
                continue;
            }
            match sink.accept(record) {
                Ok(()) => delivery.accepted += 1,
                Err(e) => {
                    delivery.failed += 1;
                    warn!(sink = sink.name(), error = %e, "Log sink rejected record");
                }
            }
        }
        delivery
    }

    /// Flush every sink. Returns the number that failed.
    pub fn flush(&self) -> usize {
        let mut failed = 0;
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                failed += 1;
                warn!(sink = sink.name(), error = %e, "Log sink flush failed");
            }
        }
        failed
    }
}
