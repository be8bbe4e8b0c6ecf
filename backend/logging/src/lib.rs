//! Process-wide structured logger for fanlog services.
//!
//! Every record fans out to a colorized console line on stdout, a JSON line in
//! `log_json.log`, and, for Error and above, a JSON line in `log_json_err.log`.
//! Both files rotate when they reach their size limit and once a day at midnight.

pub mod config;
pub mod encoder;
pub mod error;
pub mod fanout;
pub mod file;
pub mod filter;
pub mod global;
pub mod layer;
pub mod logger;
mod macros;
pub mod record;
pub mod severity;
pub mod sink;

pub use config::LogSettings;
pub use encoder::{ConsoleEncoder, Encoder, JsonEncoder};
pub use error::{LogError, ParseSeverityError, Result};
pub use fanout::{Delivery, Fanout};
pub use file::{Retention, RotatingFileSink, RotationPolicy};
pub use filter::LevelFilter;
pub use global::{custom_default_logger, default_logger, install_default_logger, is_customized};
pub use layer::{LoggerLayer, init_tracing_bridge};
pub use logger::{FatalHook, Logger, LoggerBuilder};
pub use record::{Caller, Identity, Record, StaticContext, to_value};
pub use severity::Severity;
pub use sink::{MemoryWriter, Sink, SinkWriter, StdoutWriter, WriterSink};
