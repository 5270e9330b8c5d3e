// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for tile construction

use std::fmt;
use terra_model::ParseError;
use thiserror::Error;

/// Tile construction result type
pub type Result<T> = std::result::Result<T, Error>;

/// Tile construction errors
///
/// Everything except [`Error::Config`] is fatal for one tile only.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error while reading or writing tile files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DEM or polygon source could not be read
    #[error("Source error: {0}")]
    Source(#[from] ParseError),

    /// Malformed data that is not a source file (shared-edge files, grids)
    #[error("Format error: {0}")]
    Format(String),

    /// Triangulation engine could not resolve the constraints
    #[error("Degenerate triangulation: {0}")]
    DegenerateTriangulation(String),

    /// Generated mesh violates a structural invariant
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Invalid configuration or usage; aborts a whole run
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// Create a degenerate triangulation error
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Error::DegenerateTriangulation(msg.into())
    }

    /// Create an integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        Error::Integrity(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Operator-facing classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Source(e) if e.is_io() => ErrorKind::Io,
            Error::Source(_) => ErrorKind::Format,
            Error::Format(_) | Error::Serialization(_) => ErrorKind::Format,
            Error::DegenerateTriangulation(_) => ErrorKind::DegenerateTriangulation,
            Error::Integrity(_) => ErrorKind::Integrity,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether this error must stop a batch run instead of one tile
    pub fn aborts_run(&self) -> bool {
        self.kind() == ErrorKind::Config
    }
}

/// Coarse error classes printed in per-tile diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Format,
    DegenerateTriangulation,
    Integrity,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Io => "IOError",
            ErrorKind::Format => "FormatError",
            ErrorKind::DegenerateTriangulation => "DegenerateTriangulationError",
            ErrorKind::Integrity => "IntegrityError",
            ErrorKind::Config => "ConfigError",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kind_classification() {
        let missing: Error = ParseError::FileNotFound(PathBuf::from("x.dem")).into();
        assert_eq!(missing.kind(), ErrorKind::Io);

        let truncated: Error = ParseError::Truncated {
            expected: 4,
            found: 1,
        }
        .into();
        assert_eq!(truncated.kind(), ErrorKind::Format);

        assert_eq!(
            Error::degenerate("collinear").kind(),
            ErrorKind::DegenerateTriangulation
        );
        assert!(Error::config("bad").aborts_run());
        assert!(!Error::integrity("orphan node").aborts_run());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::Integrity.to_string(), "IntegrityError");
        assert_eq!(ErrorKind::Io.to_string(), "IOError");
    }
}
