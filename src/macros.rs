/// Logs a diagnostic message under the `bosun_metrics` target.
macro_rules! bosun_debug {
    ($($arg:tt)*) => {
        ::log::debug!(target: "bosun_metrics", $($arg)*)
    };
}

/// Logs a warning under the `bosun_metrics` target.
macro_rules! bosun_warn {
    ($($arg:tt)*) => {
        ::log::warn!(target: "bosun_metrics", $($arg)*)
    };
}
