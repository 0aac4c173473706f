// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by the codec, the registry and the client.
//!
//! Two channels coexist:
//!
//! - **Misuse / codec errors** (empty variable, missing bit index, unsupported
//!   shape, read-only write, ...) are always returned as `Err` and never retried.
//! - **Device outcomes** travel inside an [`OperationResult`]. They only become an
//!   `Err(Error::Operation(..))` through [`OperationResult::into_result`] when the
//!   registry is configured to fail loudly.

use crate::result::OperationResult;
use crate::transport::Status;

/// Errors returned by tagscan operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Misuse
    // ========================================================================
    /// Variable key was empty or whitespace.
    EmptyVariable,
    /// No tag is registered under this variable.
    UnknownVariable(String),
    /// Boolean access requested without a bit index.
    MissingBitIndex,
    /// Index outside the valid range (bit index or array element).
    IndexOutOfRange { index: usize, max: usize },
    /// Write attempted on a read-only tag.
    ReadOnlyViolation(String),
    /// Operation on a tag or group that has already been disposed.
    Disposed(String),

    // ========================================================================
    // Codec
    // ========================================================================
    /// Value shape the codec cannot marshal.
    UnsupportedType(String),
    /// Value does not match the declared type.
    TypeMismatch { expected: String, found: String },
    /// Fixed string longer than the device allows.
    StringTooLong { len: usize, max: usize },
    /// Fixed string empty or whitespace-only.
    EmptyString,
    /// Buffer too small for the requested access.
    BufferTooSmall { need: usize, have: usize },
    /// Buffer contents could not be decoded.
    InvalidData(String),

    // ========================================================================
    // Device / runtime
    // ========================================================================
    /// Device operation finished with an error status (raised on request).
    Operation(OperationResult),
    /// Transport refused to create a handle.
    Create(Status),
    /// Transport call on a live handle failed.
    Transport(Status),
    /// Asynchronous probe was cancelled.
    Cancelled,

    // ========================================================================
    // Configuration
    // ========================================================================
    /// Invalid configuration value.
    Config(String),
    /// I/O error (config file loading).
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::EmptyVariable => write!(f, "Variable name is empty"),
            Error::UnknownVariable(v) => write!(f, "Unknown variable: {}", v),
            Error::MissingBitIndex => write!(f, "Boolean access requires a bit index"),
            Error::IndexOutOfRange { index, max } => {
                write!(f, "Index {} out of range (max {})", index, max)
            }
            Error::ReadOnlyViolation(tag) => write!(f, "Tag {} is read-only", tag),
            Error::Disposed(what) => write!(f, "{} has been disposed", what),
            Error::UnsupportedType(t) => write!(f, "Unsupported type: {}", t),
            Error::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            Error::StringTooLong { len, max } => {
                write!(f, "String length {} exceeds maximum {}", len, max)
            }
            Error::EmptyString => write!(f, "String is empty or whitespace"),
            Error::BufferTooSmall { need, have } => {
                write!(f, "Buffer too small: need {} bytes, have {}", need, have)
            }
            Error::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Error::Operation(result) => write!(
                f,
                "Operation on {} failed: {}",
                result.variable(),
                result.status()
            ),
            Error::Create(status) => write!(f, "Tag creation failed: {}", status),
            Error::Transport(status) => write!(f, "Transport call failed: {}", status),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenient alias for results using the crate `Error`.
pub type Result<T> = core::result::Result<T, Error>;

/// Reject empty or whitespace-only variable keys.
pub(crate) fn check_variable(variable: &str) -> Result<()> {
    if variable.trim().is_empty() {
        return Err(Error::EmptyVariable);
    }
    Ok(())
}
