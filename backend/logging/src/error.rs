use thiserror::Error;

/// Errors raised by sinks, encoders and file rotation.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("log file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record of {len} bytes exceeds maximum file size of {max} bytes")]
    RecordTooLarge { len: usize, max: u64 },

    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Returned when a level name is not one of DEBUG, INFO, WARN, ERROR or FATAL.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown severity: {0}")]
pub struct ParseSeverityError(pub String);

pub type Result<T> = std::result::Result<T, LogError>;
