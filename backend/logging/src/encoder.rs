//! Record encoders: a human-oriented console line and a JSON line for files.

use std::io::Write;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use serde_json::Value;

use crate::error::Result;
use crate::record::{CALLER_KEY, Record, TIMESTAMP_KEY};
use crate::severity::Severity;

/// Key holding the capitalized level in structured output.
pub const LEVEL_KEY: &str = "log_level";
/// Key holding the optional free-text message in structured output.
pub const MESSAGE_KEY: &str = "msg";

const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const MAGENTA: &str = "\x1b[35m";

/// Turns a record into the bytes a sink writes. Output ends with a newline.
pub trait Encoder: Send + Sync {
    fn encode(&self, record: &Record<'_>, buf: &mut Vec<u8>) -> Result<()>;
}

/// Tab-separated console line: timestamp, level, caller, message, then `key=value` pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleEncoder {
    color: bool,
}

impl ConsoleEncoder {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn level_color(level: Severity) -> &'static str {
        match level {
            Severity::Debug => MAGENTA,
            Severity::Info => BLUE,
            Severity::Warn => YELLOW,
            Severity::Error | Severity::Fatal => RED,
        }
    }
}

impl Encoder for ConsoleEncoder {
    fn encode(&self, record: &Record<'_>, buf: &mut Vec<u8>) -> Result<()> {
        let mut columns: Vec<String> = Vec::with_capacity(5);

        if let Some(ts) = record.timestamp_text() {
            columns.push(ts);
        }

        let level = record.severity();
        if self.color {
            columns.push(format!("{}{}{RESET}", Self::level_color(level), level.as_str()));
        } else {
            columns.push(level.as_str().to_string());
        }

        if let Some(caller) = record.caller_text() {
            columns.push(caller);
        }
        if let Some(msg) = record.message() {
            columns.push(console_message(msg));
        }

        let mut pairs: Vec<String> = record
            .identity_fields()
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}={}", console_text(v)))
            .collect();
        pairs.extend(
            record
                .fields()
                .iter()
                .map(|(k, v)| format!("{}={}", console_text(k), console_value(v))),
        );
        if !pairs.is_empty() {
            columns.push(pairs.join(" "));
        }

        writeln!(buf, "{}", columns.join("\t"))?;
        Ok(())
    }
}

/// Messages stay readable unless they would break the line.
fn console_message(s: &str) -> String {
    if s.contains(char::is_control) {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}

fn console_text(s: &str) -> String {
    let needs_quotes = |c: char| c.is_whitespace() || c.is_control() || c == '=' || c == '"';
    if s.is_empty() || s.contains(needs_quotes) {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}

fn console_value(value: &Value) -> String {
    match value {
        Value::String(s) => console_text(s),
        other => other.to_string(),
    }
}

/// One JSON object per line with `log_level` first and fields in call order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, record: &Record<'_>, buf: &mut Vec<u8>) -> Result<()> {
        serde_json::to_writer(&mut *buf, &JsonLine(record))?;
        buf.push(b'\n');
        Ok(())
    }
}

struct JsonLine<'r, 'a>(&'r Record<'a>);

impl Serialize for JsonLine<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let record = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(LEVEL_KEY, record.severity().as_str())?;
        if let Some(msg) = record.message() {
            map.serialize_entry(MESSAGE_KEY, msg)?;
        }
        if let Some(ts) = record.timestamp_text() {
            map.serialize_entry(TIMESTAMP_KEY, &ts)?;
        }
        if let Some(caller) = record.caller_text() {
            map.serialize_entry(CALLER_KEY, &caller)?;
        }
        for (key, value) in record.identity_fields() {
            map.serialize_entry(key, value)?;
        }
        for (key, value) in record.fields() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
