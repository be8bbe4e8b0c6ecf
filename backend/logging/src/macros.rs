// Key-value logging macros. Each argument may be any `Serialize` value.

/// Log alternating keys and values at `level`.
///
/// ```ignore
/// log_kv!(Severity::Warn, "retries", 3, "peer", addr);
/// log_kv!(@logger my_logger, Severity::Info, "phase", "warmup");
/// ```
#[macro_export]
macro_rules! log_kv {
    (@logger $logger:expr, $level:expr $(, $kv:expr)* $(,)?) => {
        $logger.log($level, ::std::vec![$($crate::to_value(&$kv)),*])
    };
    ($level:expr $(, $kv:expr)* $(,)?) => {
        $crate::log_kv!(@logger $crate::default_logger(), $level $(, $kv)*)
    };
}

/// ```ignore
/// log_debug!("cache", "miss", "key", key);
/// ```
#[macro_export]
macro_rules! log_debug {
    (@logger $logger:expr $(, $kv:expr)* $(,)?) => {
        $crate::log_kv!(@logger $logger, $crate::Severity::Debug $(, $kv)*)
    };
    ($($kv:expr),* $(,)?) => {
        $crate::log_kv!($crate::Severity::Debug $(, $kv)*)
    };
}

#[macro_export]
macro_rules! log_info {
    (@logger $logger:expr $(, $kv:expr)* $(,)?) => {
        $crate::log_kv!(@logger $logger, $crate::Severity::Info $(, $kv)*)
    };
    ($($kv:expr),* $(,)?) => {
        $crate::log_kv!($crate::Severity::Info $(, $kv)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    (@logger $logger:expr $(, $kv:expr)* $(,)?) => {
        $crate::log_kv!(@logger $logger, $crate::Severity::Warn $(, $kv)*)
    };
    ($($kv:expr),* $(,)?) => {
        $crate::log_kv!($crate::Severity::Warn $(, $kv)*)
    };
}

#[macro_export]
macro_rules! log_error {
    (@logger $logger:expr $(, $kv:expr)* $(,)?) => {
        $crate::log_kv!(@logger $logger, $crate::Severity::Error $(, $kv)*)
    };
    ($($kv:expr),* $(,)?) => {
        $crate::log_kv!($crate::Severity::Error $(, $kv)*)
    };
}

/// Logs at Fatal, flushes every sink, then terminates the process.
#[macro_export]
macro_rules! log_fatal {
    (@logger $logger:expr $(, $kv:expr)* $(,)?) => {
        $crate::log_kv!(@logger $logger, $crate::Severity::Fatal $(, $kv)*)
    };
    ($($kv:expr),* $(,)?) => {
        $crate::log_kv!($crate::Severity::Fatal $(, $kv)*)
    };
}
