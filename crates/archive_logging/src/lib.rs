#![deny(missing_docs)]
//! Logging front end for the archive harvester workspace.
//!
//! Library crates log through the `harvest_*` macros and never install a
//! logger themselves; the binary does that once at startup. The macros go
//! through the `log` re-export below, so callers do not need their own `log`
//! dependency.

#[doc(hidden)]
pub use log as __log;

/// Trace-level message: per-request chatter.
#[macro_export]
macro_rules! harvest_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!($($arg)*);
    }};
}

/// Debug-level message: per-page decisions such as the extraction strategy
/// that matched.
#[macro_export]
macro_rules! harvest_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!($($arg)*);
    }};
}

/// Info-level message: issue and job milestones.
#[macro_export]
macro_rules! harvest_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!($($arg)*);
    }};
}

/// Warn-level message: a page, frame or image was skipped.
#[macro_export]
macro_rules! harvest_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!($($arg)*);
    }};
}

/// Error-level message: output or progress could not be written.
#[macro_export]
macro_rules! harvest_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!($($arg)*);
    }};
}

/// Installs a terminal logger for tests; a second call is a no-op.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Every test binary calls this, often several times.
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);
}
