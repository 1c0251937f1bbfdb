//! # symres Utilities
//!
//! Logging setup shared by the symres workspace.
//!
//! Library crates only emit `tracing` events; binaries pick a subscriber with
//! [`init_logging`] or [`init_file_logging`], and tests call
//! [`init_test_logging`] so log output is captured per test.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_file_logging, init_logging, init_logging_with_level, init_test_logging, LogFormat, LogGuard, LogLevel,
    LoggingError,
};
pub use tracing::{debug, error, info, trace, warn};
