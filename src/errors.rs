/*!
 * Error types for the fragtrans service.
 *
 * This module contains custom error types for the different layers of the
 * service, using the thiserror crate for ergonomic error definitions:
 * - `RunnerError`: the external tool could not be run at all
 * - `ExtractionError`: the tool ran but its output could not be mapped to items
 * - `ServiceError`: request-level failures surfaced to the caller
 */

use serde::Serialize;
use thiserror::Error;

/// Maximum number of characters of raw tool output kept for diagnostics
pub const EXCERPT_MAX_CHARS: usize = 400;

/// Errors that can occur when spawning or driving the external tool process
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The program could not be found on PATH
    #[error("command `{program}` not found")]
    NotFound {
        /// Program that was looked up
        program: String,
    },

    /// The program exists but could not be started
    #[error("failed to start `{program}`: {message}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        message: String,
    },

    /// The scoped working directory could not be created
    #[error("failed to create working directory: {0}")]
    WorkDir(String),

    /// Waiting on or reading from the process failed
    #[error("I/O error while running `{program}`: {message}")]
    Io {
        /// Program being run
        program: String,
        /// Underlying OS error
        message: String,
    },
}

/// Errors produced by the output extractor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// Every recovery strategy was exhausted without yielding a single row
    #[error("no structured translation result found in tool output (tail: {excerpt:?})")]
    NoStructuredResult {
        /// Bounded tail of the raw output
        excerpt: String,
    },
}

/// Request-level errors returned by the batch orchestrator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The request contained no valid items
    #[error("{0}")]
    BadRequest(String),

    /// The external tool is missing or not authenticated
    #[error("{0}")]
    ServiceUnavailable(String),

    /// The external tool did not finish in time
    #[error("{0}")]
    UpstreamTimeout(String),

    /// The external tool failed without usable output
    #[error("{0}")]
    UpstreamFailure(String),

    /// The tool output could not be parsed by any strategy
    #[error("{0}")]
    ParseFailure(String),
}

impl ServiceError {
    /// Stable, wire-level name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad-request",
            Self::ServiceUnavailable(_) => "service-unavailable",
            Self::UpstreamTimeout(_) => "upstream-timeout",
            Self::UpstreamFailure(_) => "upstream-failure",
            Self::ParseFailure(_) => "parse-failure",
        }
    }

    /// Wire representation: `{"error": {"kind": .., "message": ..}}`
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                kind: self.kind().to_string(),
                message: self.to_string(),
            },
        }
    }
}

/// Serialized error envelope
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Error kind and human-readable message
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

impl From<RunnerError> for ServiceError {
    fn from(error: RunnerError) -> Self {
        Self::UpstreamFailure(error.to_string())
    }
}

/// Keep the last `max_chars` characters of `text`, on a char boundary
pub fn tail_excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    let skip = count - max_chars;
    let tail: String = trimmed.chars().skip(skip).collect();
    format!("…{}", tail)
}
