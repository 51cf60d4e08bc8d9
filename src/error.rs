//! Error type shared by the library and the `finstat` binary.
//!
//! Every failure carries an explicit [`ErrorKind`] so callers (retry/abort
//! controllers, the CLI exit path) can branch on the category instead of
//! matching message text.

use serde::Serialize;
use thiserror::Error;

/// Failure category attached at the point of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A numerical capability this build or configuration does not provide.
    CapabilityUnavailable,
    /// Fewer observations than a procedure's stated minimum.
    InsufficientData,
    /// Missing fields, unparseable values, invalid settings.
    MalformedInput,
    /// A numerical procedure failed (singular system, non-finite likelihood, ...).
    Computation,
    /// Reading or writing files.
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CapabilityUnavailable => "capability_unavailable",
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::Computation => "computation",
            ErrorKind::Io => "io",
        }
    }
}

#[derive(Clone, Error)]
pub enum AppError {
    #[error("{capability} is unavailable: {reason}")]
    CapabilityUnavailable {
        capability: &'static str,
        reason: String,
    },

    #[error("Insufficient data for {context}: {actual} < {required}")]
    InsufficientData {
        context: String,
        required: usize,
        actual: usize,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl AppError {
    pub fn insufficient(context: impl Into<String>, required: usize, actual: usize) -> Self {
        AppError::InsufficientData {
            context: context.into(),
            required,
            actual,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        AppError::MalformedInput(message.into())
    }

    pub fn computation(message: impl Into<String>) -> Self {
        AppError::Computation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::CapabilityUnavailable { .. } => ErrorKind::CapabilityUnavailable,
            AppError::InsufficientData { .. } => ErrorKind::InsufficientData,
            AppError::MalformedInput(_) => ErrorKind::MalformedInput,
            AppError::Computation(_) => ErrorKind::Computation,
            AppError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::MalformedInput | ErrorKind::Io => 2,
            ErrorKind::InsufficientData => 3,
            ErrorKind::Computation => 4,
            ErrorKind::CapabilityUnavailable => 5,
        }
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind())
            .field("exit_code", &self.exit_code())
            .field("message", &self.to_string())
            .finish()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::MalformedInput(format!("CSV parse error: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedInput(format!("JSON parse error: {err}"))
    }
}
