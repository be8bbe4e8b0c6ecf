//! Logger settings read once from the environment at construction time.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::severity::Severity;

/// Global minimum severity for the console and primary file sinks.
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
/// Any non-empty value disables the console sink.
pub const STDOUT_OFF_VAR: &str = "LOG_STDOUT_OFF";
/// Presence disables ANSI colors on the console sink.
pub const NO_COLOR_VAR: &str = "NO_COLOR";

pub const DEFAULT_LOG_DIR: &str = "./logs/";
pub const LOG_FILE_NAME: &str = "log_json.log";
pub const ERROR_LOG_FILE_NAME: &str = "log_json_err.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub min_level: Severity,
    pub stdout_enabled: bool,
    pub color: bool,
    pub log_dir: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            min_level: Severity::Debug,
            stdout_enabled: true,
            color: false,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl LogSettings {
    /// Settings from the process environment. Colors also require stdout to be a terminal.
    pub fn from_env() -> Self {
        let mut settings = Self::from_lookup(|name| std::env::var(name).ok());
        settings.color = settings.color && std::io::stdout().is_terminal();
        settings
    }

    /// Settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            min_level: Severity::from_env_value(lookup(LOG_LEVEL_VAR).as_deref()),
            stdout_enabled: lookup(STDOUT_OFF_VAR).is_none_or(|v| v.is_empty()),
            color: lookup(NO_COLOR_VAR).is_none(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }

    /// Use `dir` for the log files. An empty path keeps the default directory.
    pub fn with_log_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        if !dir.as_os_str().is_empty() {
            self.log_dir = dir.to_path_buf();
        }
        self
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    pub fn error_log_file(&self) -> PathBuf {
        self.log_dir.join(ERROR_LOG_FILE_NAME)
    }
}
