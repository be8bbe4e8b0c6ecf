//! The process-wide logger.
//!
//! A default logger with empty identity fields is built on first use. The first
//! call to [`custom_default_logger`] (or [`install_default_logger`]) replaces it;
//! every later call is rejected without building anything.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::{Lazy, OnceCell};
use tracing::{debug, info};

use crate::config::LogSettings;
use crate::logger::{Logger, LoggerBuilder};
use crate::record::Identity;

static DEFAULT_LOGGER: Lazy<Arc<Logger>> =
    Lazy::new(|| Arc::new(LoggerBuilder::new(LogSettings::from_env()).build()));
static CUSTOM_LOGGER: OnceCell<Arc<Logger>> = OnceCell::new();
static CUSTOMIZED: AtomicBool = AtomicBool::new(false);

/// The customized logger if one was installed, otherwise the default one.
pub fn default_logger() -> &'static Arc<Logger> {
    CUSTOM_LOGGER
        .get()
        .unwrap_or_else(|| Lazy::force(&DEFAULT_LOGGER))
}

/// Whether a customization has already claimed the process-wide slot.
pub fn is_customized() -> bool {
    CUSTOMIZED.load(Ordering::Acquire)
}

/// Install a logger writing under `log_path` (`./logs/` when empty) with the given identity.
///
/// Only the first call in the process has any effect; it returns `true`. Later calls
/// return `false` and leave the installed logger untouched.
pub fn custom_default_logger(
    log_path: impl AsRef<Path>,
    service_id: &str,
    app_name: &str,
    version: &str,
    module: &str,
) -> bool {
    let log_path = log_path.as_ref();
    install_default_logger(|| {
        let settings = LogSettings::from_env().with_log_dir(log_path);
        LoggerBuilder::new(settings)
            .identity(Identity {
                service_id: service_id.to_string(),
                app_name: app_name.to_string(),
                version: version.to_string(),
                module: Some(module.to_string()),
            })
            .build()
    })
}

/// One-shot installation of an arbitrary logger. `build` only runs for the winning call.
pub fn install_default_logger(build: impl FnOnce() -> Logger) -> bool {
    if CUSTOMIZED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("Default logger already customized, ignoring");
        return false;
    }

    let logger = Arc::new(build());
    info!(identity = ?logger.identity(), "Default logger customized");
    CUSTOM_LOGGER.set(logger).is_ok()
}
