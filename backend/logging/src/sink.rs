//! Sinks: an encoder, a level filter and one or more writers.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crate::encoder::{ConsoleEncoder, Encoder, JsonEncoder};
use crate::error::{LogError, Result};
use crate::file::RotatingFileSink;
use crate::filter::LevelFilter;
use crate::record::Record;
use crate::severity::Severity;

/// Destination for fully encoded records. Each call carries exactly one record.
pub trait SinkWriter: Send + Sync {
    fn write_record(&self, bytes: &[u8]) -> Result<()>;

    fn flush(&self) -> Result<()>;
}

/// A configured destination in the fanout.
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    fn enabled(&self, level: Severity) -> bool;

    /// Encode and write one record. Only called when `enabled` returned true.
    fn accept(&self, record: &Record<'_>) -> Result<()>;

    fn flush(&self) -> Result<()>;
}

/// Process standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutWriter;

impl SinkWriter for StdoutWriter {
    fn write_record(&self, bytes: &[u8]) -> Result<()> {
        io::stdout().lock().write_all(bytes)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        io::stdout().flush()?;
        Ok(())
    }
}

/// In-memory writer, handy for capturing console output.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl SinkWriter for MemoryWriter {
    fn write_record(&self, bytes: &[u8]) -> Result<()> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Encodes once and hands the same bytes to every writer.
pub struct WriterSink {
    name: String,
    filter: LevelFilter,
    encoder: Box<dyn Encoder>,
    writers: Vec<Arc<dyn SinkWriter>>,
}

impl WriterSink {
    pub fn new(
        name: impl Into<String>,
        filter: LevelFilter,
        encoder: impl Encoder + 'static,
        writer: Arc<dyn SinkWriter>,
    ) -> Self {
        Self {
            name: name.into(),
            filter,
            encoder: Box::new(encoder),
            writers: vec![writer],
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn SinkWriter>) -> Self {
        self.writers.push(writer);
        self
    }

    /// Human-readable lines gated by the global minimum.
    pub fn console(filter: LevelFilter, writer: Arc<dyn SinkWriter>, color: bool) -> Self {
        Self::new("console", filter, ConsoleEncoder::new(color), writer)
    }

    /// JSON lines gated by the global minimum.
    pub fn file(filter: LevelFilter, file: Arc<RotatingFileSink>) -> Self {
        Self::new("file", filter, JsonEncoder, file)
    }

    /// JSON lines for Error and above, whatever the global minimum.
    pub fn error_file(file: Arc<RotatingFileSink>) -> Self {
        Self::new("error_file", LevelFilter::errors_only(), JsonEncoder, file)
    }

    pub fn filter(&self) -> LevelFilter {
        self.filter
    }
}

impl Sink for WriterSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self, level: Severity) -> bool {
        self.filter.enabled(level)
    }

    fn accept(&self, record: &Record<'_>) -> Result<()> {
        let mut buf = Vec::with_capacity(256);
        self.encoder.encode(record, &mut buf)?;

        let mut first_error: Option<LogError> = None;
        for writer in &self.writers {
            if let Err(e) = writer.write_record(&buf) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush(&self) -> Result<()> {
        let mut first_error: Option<LogError> = None;
        for writer in &self.writers {
            if let Err(e) = writer.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
