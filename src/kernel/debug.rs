// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Logging and Diagnostics
//!
//! Logging macros and the fatal-error path of the dispatch core.
//!
//! # Features
//!
//! - **Log levels**: Trace, Debug, Info, Warning, Error, Fatal
//! - **Backend**: Messages are handed to the `log` facade when the
//!   `logging` feature is enabled; the board support package installs the
//!   logger. Without the feature the macros still type-check their
//!   arguments and print nothing.
//! - **Fatal errors**: Broken invariants are reported through
//!   [`internal_error`], which never returns.
//!
//! # Usage
//!
//! ```rust,ignore
//! log_trace!("enqueue: thread={} queue={}", thread, queue);
//! log_error!("scheduler {} has no processor", scheduler);
//!
//! // Raise the threshold at run time
//! log_set_min_level(LogLevel::Warning);
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// Log levels
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace-level logging (very verbose)
    Trace = 0,

    /// Debug-level logging (verbose)
    Debug = 1,

    /// Informational logging
    Info = 2,

    /// Warning-level logging
    Warning = 3,

    /// Error-level logging
    Error = 4,

    /// Fatal errors (the system stops)
    Fatal = 5,
}

impl LogLevel {
    /// Get the log level name as a string
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warning,
            4 => LogLevel::Error,
            _ => LogLevel::Fatal,
        }
    }

    #[cfg(feature = "logging")]
    fn to_log(self) -> log::Level {
        match self {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error | LogLevel::Fatal => log::Level::Error,
        }
    }
}

/// Global minimum log level
///
/// Only messages at or above this level are forwarded.
static MIN_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Trace as u8);

/// Set the minimum log level
///
/// # Arguments
///
/// * `level` - Minimum log level to forward
pub fn log_set_min_level(level: LogLevel) {
    MIN_LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Get the current minimum log level
pub fn log_get_min_level() -> LogLevel {
    LogLevel::from_raw(MIN_LOG_LEVEL.load(Ordering::Relaxed))
}

/// Print a formatted message at a specific log level
///
/// # Arguments
///
/// * `level` - Log level for this message
/// * `args` - Format arguments
#[inline]
pub fn log_print(level: LogLevel, args: fmt::Arguments) {
    if level < log_get_min_level() {
        return;
    }

    #[cfg(feature = "logging")]
    log::log!(target: "rustux::score", level.to_log(), "{}", args);

    #[cfg(not(feature = "logging"))]
    let _ = args;
}

/// Log a trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Trace, format_args!($($arg)*));
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Debug, format_args!($($arg)*));
    };
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Info, format_args!($($arg)*));
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Warning, format_args!($($arg)*));
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::kernel::debug::log_print($crate::kernel::debug::LogLevel::Error, format_args!($($arg)*));
    };
}

/// ============================================================================
/// Fatal Errors
/// ============================================================================

/// Internal consistency violations
///
/// Each variant names the invariant a caller broke. None of them is
/// recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    /// A thread handle does not name a live thread
    StaleThread,

    /// A thread queue handle does not name a live queue
    StaleQueue,

    /// A scheduler handle is out of range
    InvalidScheduler,

    /// A scheduler operation on a thread not eligible there
    IneligibleScheduler,

    /// A thread is not in the state the operation requires
    InvalidState,

    /// Extraction of a thread that waits on no thread queue
    NotWaiting,

    /// A priority node is missing from the aggregation that should hold it
    MissingNode,

    /// A processor index is out of range
    InvalidProcessor,
}

impl FatalError {
    /// Get the fatal code name as a string
    pub fn as_str(self) -> &'static str {
        match self {
            FatalError::StaleThread => "stale thread handle",
            FatalError::StaleQueue => "stale thread queue handle",
            FatalError::InvalidScheduler => "invalid scheduler",
            FatalError::IneligibleScheduler => "thread not eligible on scheduler",
            FatalError::InvalidState => "invalid thread state",
            FatalError::NotWaiting => "thread is not waiting",
            FatalError::MissingNode => "priority node missing",
            FatalError::InvalidProcessor => "invalid processor",
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report a broken invariant and stop
///
/// # Arguments
///
/// * `error` - The violated invariant
/// * `args` - Context for the report
#[cold]
#[inline(never)]
pub fn internal_error(error: FatalError, args: fmt::Arguments) -> ! {
    log_print(LogLevel::Fatal, format_args!("internal error: {}: {}", error, args));
    panic!("internal error: {}: {}", error, args);
}

// ============================================================================
// Tests
// ============================================================================
