//! # Emmy Utilities
//!
//! Logging shared by the injected engine and the `emmy` CLI.
//!
//! The CLI logs to the console like any other tool. The engine lives inside
//! somebody else's process, whose stdout is not ours to write to, so it logs
//! to a per-process file instead (see [`init_logging_to_file`]).

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    engine_log_path, init_logging, init_logging_to_file, init_logging_with_level, LogFormat, LogLevel, LoggingError,
};
pub use tracing::{debug, error, info, trace, warn};
