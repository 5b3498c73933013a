//! Error types for the setupcheck CLI.
//!
//! These are the run-level errors: anything that stops the tool before or
//! outside per-head verification. Per-head verification failures are not
//! errors in this sense; they are recorded as [`crate::outcome::Failure`]
//! values and never cross head boundaries.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can abort a verification run or a single tool invocation.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// A required external tool is not installed.
    #[error("required tool {tool} not found; {hint}")]
    MissingTool {
        /// Executable name that could not be spawned.
        tool: String,
        /// Where to obtain the tool.
        hint: &'static str,
    },

    /// The executable could not be found when spawning it.
    #[error("{tool}: command not found")]
    ToolNotFound {
        /// Executable name that could not be spawned.
        tool: String,
    },

    /// An external tool did not exit within the configured deadline.
    #[error("{tool} timed out after {seconds} seconds")]
    ToolTimeout {
        /// Executable name that was killed.
        tool: String,
        /// Deadline that elapsed.
        seconds: u64,
    },

    /// The configuration file could not be read.
    #[error("cannot read configuration {path}: {source}")]
    ConfigRead {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid configuration {path}: {reason}")]
    ConfigParse {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A path given on the command line does not exist or is unusable.
    #[error("invalid input {path}: {reason}")]
    InvalidInput {
        /// The offending path.
        path: Utf8PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// Failed to write the report.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying write error.
        #[source]
        source: std::io::Error,
    },

    /// The JSON report could not be produced.
    #[error("failed to serialise report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// What was expected versus what was received.
        message: String,
    },
}

/// Result type alias using [`VerifyError`].
pub type Result<T> = std::result::Result<T, VerifyError>;
