use crate::severity::Severity;

/// Per-sink threshold: a record passes when its severity is at or above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFilter {
    threshold: Severity,
}

impl LevelFilter {
    pub const fn at_least(threshold: Severity) -> Self {
        Self { threshold }
    }

    /// Fixed filter for the error file; ignores the global minimum.
    pub const fn errors_only() -> Self {
        Self::at_least(Severity::Error)
    }

    pub const fn threshold(&self) -> Severity {
        self.threshold
    }

    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.threshold
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::at_least(Severity::Debug)
    }
}
