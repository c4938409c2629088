#![deny(missing_docs)]
//! Shared logging utilities for the renamer workspace.
//!
//! This crate provides the `renamer_*` logging macros used across the codebase,
//! the job-tagged `job_*` variants used by the background worker, and a
//! minimal test initializer for the global logger.

/// Log target used by every job-tagged macro.
///
/// Filtering on this target isolates the per-file trail of a rename job
/// (attempts, fallbacks, renames, reverts) from the rest of the output.
pub const JOB_TARGET: &str = "renamer::job";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! renamer_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! renamer_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! renamer_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! renamer_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! renamer_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Logs a debug-level message prefixed with `[job N]` under [`JOB_TARGET`].
#[macro_export]
macro_rules! job_debug {
    ($job:expr, $($arg:tt)*) => {{
        log::debug!(target: $crate::JOB_TARGET, "[job {}] {}", $job, format_args!($($arg)*));
    }};
}

/// Logs an info-level message prefixed with `[job N]` under [`JOB_TARGET`].
#[macro_export]
macro_rules! job_info {
    ($job:expr, $($arg:tt)*) => {{
        log::info!(target: $crate::JOB_TARGET, "[job {}] {}", $job, format_args!($($arg)*));
    }};
}

/// Logs a warn-level message prefixed with `[job N]` under [`JOB_TARGET`].
#[macro_export]
macro_rules! job_warn {
    ($job:expr, $($arg:tt)*) => {{
        log::warn!(target: $crate::JOB_TARGET, "[job {}] {}", $job, format_args!($($arg)*));
    }};
}

/// Logs an error-level message prefixed with `[job N]` under [`JOB_TARGET`].
#[macro_export]
macro_rules! job_error {
    ($job:expr, $($arg:tt)*) => {{
        log::error!(target: $crate::JOB_TARGET, "[job {}] {}", $job, format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
