//! Error types for sealnote core.

use thiserror::Error;

/// Wire-format errors: a field could not be decoded, or decoded to the wrong size.
///
/// These are distinct from a signature that decodes fine but does not verify,
/// which is reported as a plain `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("{field}: malformed base64: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("{field}: expected {expected} bytes, got {actual}")]
    Size {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field}: expected at least {min} bytes, got {actual}")]
    TooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },
}

impl FormatError {
    /// The request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            FormatError::Decode { field, .. }
            | FormatError::Size { field, .. }
            | FormatError::TooShort { field, .. } => field,
        }
    }
}

/// Request validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("unsupported hmac type: {0}")]
    UnsupportedHmacType(String),

    #[error("unsupported encryption type: {0}")]
    UnsupportedEncryptionType(String),

    #[error("{field}: expected {expected} characters, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Format(#[from] FormatError),
}
