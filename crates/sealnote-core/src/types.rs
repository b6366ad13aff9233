//! Strong type definitions for sealnote.
//!
//! Identifiers are newtypes so a note id can never be passed where a user id
//! is expected. Algorithm tags are closed enums rather than free strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Identifier of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl UserId {
    /// Get the raw value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a note, scoped to its owner.
///
/// Allocated per user as `max(existing) + 1`, so the first note of every
/// user is note 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub u32);

impl NoteId {
    /// The id given to a user's first note.
    pub const FIRST: Self = Self(1);

    /// Get the raw value.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The id that follows this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a persisted login challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(pub u64);

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// MAC algorithm the client uses over note plaintext.
///
/// Opaque to the server except for session-token issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HmacType {
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
    #[serde(rename = "hmac-sha512")]
    HmacSha512,
}

impl HmacType {
    pub const fn as_str(self) -> &'static str {
        match self {
            HmacType::HmacSha256 => "hmac-sha256",
            HmacType::HmacSha512 => "hmac-sha512",
        }
    }
}

impl FromStr for HmacType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hmac-sha256" => Ok(HmacType::HmacSha256),
            "hmac-sha512" => Ok(HmacType::HmacSha512),
            other => Err(ValidationError::UnsupportedHmacType(other.to_string())),
        }
    }
}

impl fmt::Display for HmacType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symmetric cipher the client uses for note content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionType {
    #[serde(rename = "aes-128-cbc")]
    Aes128Cbc,
    #[serde(rename = "aes-128-ctr")]
    Aes128Ctr,
}

impl EncryptionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            EncryptionType::Aes128Cbc => "aes-128-cbc",
            EncryptionType::Aes128Ctr => "aes-128-ctr",
        }
    }
}

impl FromStr for EncryptionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aes-128-cbc" => Ok(EncryptionType::Aes128Cbc),
            "aes-128-ctr" => Ok(EncryptionType::Aes128Ctr),
            other => Err(ValidationError::UnsupportedEncryptionType(other.to_string())),
        }
    }
}

impl fmt::Display for EncryptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_id_next() {
        assert_eq!(NoteId::FIRST.next(), NoteId(2));
        assert_eq!(NoteId(41).next().get(), 42);
    }

    #[test]
    fn test_algorithm_tags_parse() {
        assert_eq!("hmac-sha512".parse::<HmacType>().unwrap(), HmacType::HmacSha512);
        assert_eq!(
            "aes-128-ctr".parse::<EncryptionType>().unwrap(),
            EncryptionType::Aes128Ctr
        );
        assert!(matches!(
            "hmac-md5".parse::<HmacType>(),
            Err(ValidationError::UnsupportedHmacType(s)) if s == "hmac-md5"
        ));
        assert!("AES-128-CBC".parse::<EncryptionType>().is_err());
    }

    #[test]
    fn test_algorithm_tags_serde_names() {
        let json = serde_json::to_string(&HmacType::HmacSha256).unwrap();
        assert_eq!(json, "\"hmac-sha256\"");
        let enc: EncryptionType = serde_json::from_str("\"aes-128-cbc\"").unwrap();
        assert_eq!(enc, EncryptionType::Aes128Cbc);
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId(7).to_string(), "7");
    }
}
