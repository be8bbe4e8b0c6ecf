//! The logger: validates key-value input, builds records and hands them to the fanout.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use fanlog_scheduler::RotationScheduler;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::LogSettings;
use crate::fanout::{Delivery, Fanout};
use crate::file::{RotatingFileSink, RotationPolicy};
use crate::filter::LevelFilter;
use crate::record::{Caller, Identity, Record, StaticContext, key_text};
use crate::severity::Severity;
use crate::sink::{SinkWriter, StdoutWriter, WriterSink};

/// Runs after a Fatal record has been delivered and every sink flushed.
pub type FatalHook = Arc<dyn Fn() + Send + Sync>;

pub struct Logger {
    fanout: Fanout,
    context: StaticContext,
    files: Vec<Arc<RotatingFileSink>>,
    fatal_hook: FatalHook,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("sinks", &self.fanout.sink_names())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub fn builder(settings: LogSettings) -> LoggerBuilder {
        LoggerBuilder::new(settings)
    }

    /// Log alternating keys and values.
    ///
    /// An empty or odd-length `keyvals` is a usage error: a single Warn record
    /// describing the input is emitted instead and the call still returns normally.
    /// A Fatal record terminates the process after the sinks are flushed.
    #[track_caller]
    pub fn log(&self, level: Severity, keyvals: Vec<Value>) {
        let caller = Caller::here();

        if keyvals.is_empty() || keyvals.len() % 2 != 0 {
            let record = Record::new(Severity::Warn, &self.context)
                .with_caller(Some(caller))
                .with_message(format!(
                    "Keyvalues must appear in pairs: {}",
                    Value::Array(keyvals)
                ));
            self.fanout.deliver(&record);
            return;
        }

        let mut fields = Vec::with_capacity(keyvals.len() / 2);
        let mut iter = keyvals.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            fields.push((key_text(key), value));
        }

        let record = Record::new(level, &self.context)
            .with_caller(Some(caller))
            .with_fields(fields);
        self.dispatch(&record);
    }

    #[track_caller]
    pub fn debug(&self, keyvals: Vec<Value>) {
        self.log(Severity::Debug, keyvals);
    }

    #[track_caller]
    pub fn info(&self, keyvals: Vec<Value>) {
        self.log(Severity::Info, keyvals);
    }

    #[track_caller]
    pub fn warn(&self, keyvals: Vec<Value>) {
        self.log(Severity::Warn, keyvals);
    }

    #[track_caller]
    pub fn error(&self, keyvals: Vec<Value>) {
        self.log(Severity::Error, keyvals);
    }

    #[track_caller]
    pub fn fatal(&self, keyvals: Vec<Value>) {
        self.log(Severity::Fatal, keyvals);
    }

    /// Log a single `msg` field.
    #[track_caller]
    pub fn message(&self, level: Severity, msg: impl fmt::Display) {
        self.log(level, vec![Value::from("msg"), Value::from(msg.to_string())]);
    }

    /// Deliver an already built record, honouring Fatal termination.
    pub fn dispatch(&self, record: &Record<'_>) -> Delivery {
        let delivery = self.fanout.deliver(record);
        if record.severity() == Severity::Fatal {
            self.terminate();
        }
        delivery
    }

    fn terminate(&self) {
        let failed = self.sync();
        if failed > 0 {
            error!(failed, "Some sinks failed to flush before fatal exit");
        }
        (self.fatal_hook)();
    }

    /// Whether any sink would accept a record at `level`.
    pub fn enabled(&self, level: Severity) -> bool {
        self.fanout.enabled(level)
    }

    /// Rotate every file sink now. Returns the number of failures.
    pub fn rotate(&self) -> usize {
        let mut failed = 0;
        for file in &self.files {
            if let Err(e) = file.rotate() {
                failed += 1;
                warn!(file = file.name(), error = %e, "Rotation failed");
            }
        }
        failed
    }

    /// Flush every sink. Returns the number of failures.
    pub fn sync(&self) -> usize {
        self.fanout.flush()
    }

    pub fn context(&self) -> &StaticContext {
        &self.context
    }

    pub fn identity(&self) -> &Identity {
        &self.context.identity
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.fanout.sink_names()
    }

    pub fn log_files(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.path()).collect()
    }
}

/// Assembles the console, file and error-file sinks from [`LogSettings`].
pub struct LoggerBuilder {
    settings: LogSettings,
    identity: Identity,
    policy: RotationPolicy,
    console: Option<Arc<dyn SinkWriter>>,
    fatal_hook: Option<FatalHook>,
    scheduled_rotation: bool,
}

impl LoggerBuilder {
    pub fn new(settings: LogSettings) -> Self {
        Self {
            settings,
            identity: Identity::default(),
            policy: RotationPolicy::default(),
            console: None,
            fatal_hook: None,
            scheduled_rotation: true,
        }
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn rotation_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace standard output as the console destination.
    pub fn console_writer(mut self, writer: Arc<dyn SinkWriter>) -> Self {
        self.console = Some(writer);
        self
    }

    /// Replace the default `exit(1)` that follows a Fatal record.
    pub fn fatal_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.fatal_hook = Some(Arc::new(hook));
        self
    }

    /// Do not start the daily rotation thread.
    pub fn without_scheduled_rotation(mut self) -> Self {
        self.scheduled_rotation = false;
        self
    }

    pub fn build(self) -> Logger {
        let settings = self.settings;
        let file = RotatingFileSink::shared(settings.log_file(), self.policy.clone());
        let error_file = RotatingFileSink::shared(settings.error_log_file(), self.policy);

        let global = LevelFilter::at_least(settings.min_level);
        let mut fanout = Fanout::default();
        if settings.stdout_enabled {
            let writer = self.console.unwrap_or_else(|| Arc::new(StdoutWriter));
            fanout.push(Box::new(WriterSink::console(global, writer, settings.color)));
        }
        fanout.push(Box::new(WriterSink::file(global, Arc::clone(&file))));
        fanout.push(Box::new(WriterSink::error_file(Arc::clone(&error_file))));

        let files = vec![file, error_file];
        if self.scheduled_rotation {
            start_daily_rotation(&files);
        }

        debug!(
            log_dir = %settings.log_dir.display(),
            min_level = %settings.min_level,
            stdout = settings.stdout_enabled,
            "Logger constructed"
        );

        Logger {
            fanout,
            context: StaticContext::new(self.identity),
            files,
            fatal_hook: self
                .fatal_hook
                .unwrap_or_else(|| Arc::new(exit_process) as FatalHook),
        }
    }
}

fn exit_process() {
    std::process::exit(1)
}

/// Schedules the files no other logger has scheduled yet.
fn start_daily_rotation(files: &[Arc<RotatingFileSink>]) {
    let unscheduled: Vec<_> = files.iter().filter(|f| f.claim_scheduling()).collect();
    if unscheduled.is_empty() {
        debug!("Log files already scheduled for daily rotation");
        return;
    }

    let mut scheduler = match RotationScheduler::daily() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Daily rotation disabled");
            return;
        }
    };
    for file in unscheduled {
        scheduler.register(Arc::clone(file) as Arc<dyn fanlog_scheduler::Rotatable>);
    }
    if let Err(e) = scheduler.spawn() {
        error!(error = %e, "Failed to start rotation scheduler");
    }
}
