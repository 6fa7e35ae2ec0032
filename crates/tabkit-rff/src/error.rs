//! Error types for tabkit-rff.

use std::io;

use thiserror::Error;

/// Errors that can occur while fitting, applying, or persisting a
/// random Fourier feature transform.
#[derive(Error, Debug)]
pub enum RffError {
    /// A user-supplied argument or configuration value is invalid.
    #[error("Invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidArgument {
        parameter: String,
        value: String,
        reason: String,
    },

    /// The data handed to the transform does not match what it was fit on.
    #[error("Schema mismatch for column '{column}': expected {expected}, got {got}")]
    SchemaMismatch {
        column: String,
        expected: String,
        got: String,
    },

    /// A persisted model could not be decoded.
    #[error("Model decode error: {0}")]
    Decode(String),

    /// The configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl RffError {
    /// Shorthand for [`RffError::InvalidArgument`].
    pub fn invalid_argument(
        parameter: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`RffError::SchemaMismatch`].
    pub fn schema_mismatch(
        column: impl Into<String>,
        expected: impl ToString,
        got: impl ToString,
    ) -> Self {
        Self::SchemaMismatch {
            column: column.into(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// Shorthand for [`RffError::Decode`].
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

/// Truncated streams surface as decode errors, everything else as I/O.
impl From<io::Error> for RffError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            RffError::Decode("truncated model stream".to_string())
        } else {
            RffError::Io(err)
        }
    }
}

impl From<toml::de::Error> for RffError {
    fn from(err: toml::de::Error) -> Self {
        RffError::Config(err.to_string())
    }
}

/// Result type for random Fourier feature operations.
pub type Result<T> = std::result::Result<T, RffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let err = RffError::invalid_argument("new_dim", 0, "must be positive");
        let msg = err.to_string();
        assert!(msg.contains("new_dim"));
        assert!(msg.contains("'0'"));
        assert!(msg.contains("positive"));
    }

    #[test]
    fn test_schema_mismatch_display() {
        let err = RffError::schema_mismatch("features", 2, 3);
        let msg = err.to_string();
        assert!(msg.contains("features"));
        assert!(msg.contains("expected 2"));
        assert!(msg.contains("got 3"));
    }

    #[test]
    fn test_eof_maps_to_decode() {
        let err: RffError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, RffError::Decode(_)));

        let err: RffError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, RffError::Io(_)));
    }
}
