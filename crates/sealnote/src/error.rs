//! Error types for the service layer.

use sealnote_core::{FormatError, NoteId, UserId, ValidationError};
use sealnote_store::StoreError;
use thiserror::Error;

/// Errors that can occur during service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request failed validation before anything touched storage.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// A base64 field did not decode, or decoded to the wrong size.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Well-formed, but the signature does not verify.
    #[error("signature invalid")]
    SignatureInvalid,

    /// The stored chain of a note fails hash linkage. Terminal for the note.
    #[error("chain of note {note_id} broken at block {position}")]
    ChainBroken { note_id: NoteId, position: usize },

    /// The first block of a note does not carry the genesis marker.
    #[error("first block must link to the genesis marker")]
    NotGenesis,

    /// The new block does not link to the current tail of the note.
    #[error("block does not link to the tail of note {note_id}")]
    StaleTail { note_id: NoteId },

    /// The block timestamp is too far from the server clock or before the tail.
    #[error("timestamp rejected: {0}")]
    TimestampRejected(String),

    #[error("challenge not found")]
    ChallengeNotFound,

    #[error("challenge expired")]
    ChallengeExpired,

    #[error("challenge already used")]
    ChallengeAlreadyUsed,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("note not found: {0}")]
    NoteNotFound(NoteId),

    /// Minting or resolving a session credential failed.
    #[error("session error: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::DuplicateEmail,
            other => Self::Store(other),
        }
    }
}

/// Coarse classification of a [`ServiceError`], stable across variants.
///
/// An HTTP layer maps these onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller sent something malformed.
    InvalidInput,
    /// Authentication failed or the credential is unusable.
    Unauthorized,
    NotFound,
    /// The request is well-formed but conflicts with stored state.
    Conflict,
    Internal,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_)
            | Self::Format(_)
            | Self::NotGenesis
            | Self::TimestampRejected(_) => ErrorKind::InvalidInput,
            Self::SignatureInvalid
            | Self::ChallengeNotFound
            | Self::ChallengeExpired
            | Self::ChallengeAlreadyUsed
            | Self::Session(_) => ErrorKind::Unauthorized,
            Self::UserNotFound(_) | Self::NoteNotFound(_) => ErrorKind::NotFound,
            Self::ChainBroken { .. } | Self::StaleTail { .. } | Self::DuplicateEmail => {
                ErrorKind::Conflict
            }
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
