// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for reading terrain source data

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for source data operations
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors that can occur while reading DEM or polygon source files
#[derive(Error, Debug)]
pub enum ParseError {
    /// Source file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Header fields missing or unparsable
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Body content does not match the expected layout
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Stream ended before all declared values were read
    #[error("Truncated data: expected {expected} values, found {found}")]
    Truncated { expected: usize, found: usize },

    /// Requested input mode is not available
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Create a new header error
    pub fn header(msg: impl Into<String>) -> Self {
        ParseError::InvalidHeader(msg.into())
    }

    /// Create a new format error
    pub fn format(msg: impl Into<String>) -> Self {
        ParseError::InvalidFormat(msg.into())
    }

    /// Create an unsupported-mode error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        ParseError::Unsupported(msg.into())
    }

    /// Whether this error came from the filesystem rather than the content
    pub fn is_io(&self) -> bool {
        matches!(self, ParseError::FileNotFound(_) | ParseError::Io(_))
    }
}
