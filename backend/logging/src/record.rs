//! Structured log records and the static context attached to each of them.

use std::fmt;
use std::panic::Location;

use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;
use serde_json::Value;

use crate::severity::Severity;

pub const TIMESTAMP_KEY: &str = "timestamp";
pub const CALLER_KEY: &str = "caller";
pub const SERVICE_ID_KEY: &str = "service.id";
pub const APP_NAME_KEY: &str = "app_name";
pub const VERSION_KEY: &str = "service.version";
pub const MODULE_KEY: &str = "module";

/// Who is logging. Empty strings until the facade is customized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub service_id: String,
    pub app_name: String,
    pub version: String,
    /// Only set by an explicit customization.
    pub module: Option<String>,
}

/// Fields attached to every record a logger emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticContext {
    pub identity: Identity,
    pub include_timestamp: bool,
    pub include_caller: bool,
}

impl StaticContext {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            include_timestamp: true,
            include_caller: true,
        }
    }
}

impl Default for StaticContext {
    fn default() -> Self {
        Self::new(Identity::default())
    }
}

/// Source location of a log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub file: &'static str,
    pub line: u32,
}

impl Caller {
    #[track_caller]
    pub fn here() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One log entry. Built per call, handed to the fanout by reference, then dropped.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    severity: Severity,
    message: Option<String>,
    fields: Vec<(String, Value)>,
    context: &'a StaticContext,
    timestamp: DateTime<Local>,
    caller: Option<Caller>,
}

impl<'a> Record<'a> {
    pub fn new(severity: Severity, context: &'a StaticContext) -> Self {
        Self {
            severity,
            message: None,
            fields: Vec::new(),
            context,
            timestamp: Local::now(),
            caller: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_fields(mut self, fields: Vec<(String, Value)>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_caller(mut self, caller: Option<Caller>) -> Self {
        self.caller = caller;
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// User-supplied pairs, in call order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn context(&self) -> &StaticContext {
        self.context
    }

    pub fn timestamp(&self) -> &DateTime<Local> {
        &self.timestamp
    }

    /// RFC 3339 timestamp, or `None` when the context disables it.
    pub fn timestamp_text(&self) -> Option<String> {
        self.context
            .include_timestamp
            .then(|| self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false))
    }

    /// `file:line`, or `None` when unknown or disabled by the context.
    pub fn caller_text(&self) -> Option<String> {
        if !self.context.include_caller {
            return None;
        }
        self.caller.map(|c| c.to_string())
    }

    /// Service identity fields in emission order; `module` only when customized.
    pub fn identity_fields(&self) -> Vec<(&'static str, &str)> {
        let identity = &self.context.identity;
        let mut out = vec![
            (SERVICE_ID_KEY, identity.service_id.as_str()),
            (APP_NAME_KEY, identity.app_name.as_str()),
            (VERSION_KEY, identity.version.as_str()),
        ];
        if let Some(module) = &identity.module {
            out.push((MODULE_KEY, module.as_str()));
        }
        out
    }
}

/// Convert any serializable value into a record field value.
///
/// Values serde cannot represent become a descriptive string instead of failing the call.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| Value::String(format!("<unserializable: {e}>")))
}

/// Keys are used verbatim when they are strings, otherwise as their JSON text.
pub(crate) fn key_text(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
