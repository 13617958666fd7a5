//! Infrastructure errors and test failure outcomes.
//!
//! [`Error`] covers the harness itself (I/O, serialization, configuration).
//! [`Failure`] is what a test body, wait or assertion returns when the test
//! cannot continue; it is the only thing the case runner inspects to decide on
//! retries and the final status.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Errors that can occur while driving the harness.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file is missing or invalid.
    #[error("invalid config {}: {message}", path.display())]
    Config {
        /// Offending file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// Screen capture failed.
    #[error("screen capture failed: {0}")]
    Capture(String),

    /// Image encoding or decoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A suite run was requested while another one is in progress.
    #[error("a test run is already in progress")]
    Busy,

    /// Invalid harness state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Print helpful hints for common errors.
pub fn print_hints(err: &Error) {
    match err {
        Error::Config { .. } => {
            eprintln!("hint: config files are RON; every field is optional, e.g.");
            eprintln!("      (reports_dir: \"test-reports\", max_retries: 1, hotkey: \"f9\")");
        }
        Error::Busy => {
            eprintln!("hint: wait for the current run to finish or abort it before starting another");
        }
        Error::Capture(_) => {
            eprintln!("hint: the screen capture capability returned no image; check the host surface");
        }
        Error::Image(_) | Error::Json(_) | Error::Io(_) | Error::InvalidState(_) => {}
    }
}

/// Category of a [`Failure`], used by `raises` checks and status mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A check did not hold.
    Assertion,
    /// A bounded wait or the case deadline elapsed.
    Timeout,
    /// An external stop was requested.
    Cancelled,
    /// Any other error raised by test code.
    Other,
}

/// Why a test body stopped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Failure {
    /// A check did not hold. The message already includes the screenshot path.
    #[error("{message}")]
    Assertion {
        /// Composed failure message.
        message: String,
        /// Screenshot captured when the check failed.
        screenshot: Option<PathBuf>,
    },

    /// A bounded wait or the case deadline elapsed.
    #[error("{what} timed out after {seconds:.2}s")]
    Timeout {
        /// What was being waited on.
        what: String,
        /// The bound that elapsed, in seconds.
        seconds: f64,
    },

    /// The enclosing execution scope was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Any other error raised by test code.
    #[error("{0}")]
    Other(String),
}

impl Failure {
    /// Build an [`Failure::Other`] from any message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Category of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Assertion { .. } => FailureKind::Assertion,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Other(_) => FailureKind::Other,
        }
    }

    /// Whether the case runner may re-run the body after this failure.
    ///
    /// Timeouts and cancellations are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Assertion { .. } | Self::Other(_))
    }

    /// Screenshot attached to an assertion failure.
    pub fn screenshot(&self) -> Option<&Path> {
        match self {
            Self::Assertion { screenshot, .. } => screenshot.as_deref(),
            _ => None,
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Result alias for test code.
pub type Outcome<T> = std::result::Result<T, Failure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_assertions_and_errors_retry() {
        let assertion = Failure::Assertion {
            message: "nope".into(),
            screenshot: None,
        };
        assert!(assertion.is_retryable());
        assert!(Failure::other("io").is_retryable());
        assert!(!Failure::Cancelled.is_retryable());
        assert!(
            !Failure::Timeout {
                what: "wait_until".into(),
                seconds: 1.0
            }
            .is_retryable()
        );
    }

    #[test]
    fn timeout_message_names_the_wait() {
        let f = Failure::Timeout {
            what: "wait_until".into(),
            seconds: 2.5,
        };
        assert_eq!(f.to_string(), "wait_until timed out after 2.50s");
        assert_eq!(f.kind(), FailureKind::Timeout);
    }
}
