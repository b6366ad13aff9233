//! Users, challenges and the request/response shapes around them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time;
use crate::types::{ChallengeId, EncryptionType, HmacType, NoteId, UserId};

/// A registered account.
///
/// Holds no long-term secret: only the public key and the salts the client
/// needs to re-derive its own keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Lower-cased, unique.
    pub email: String,
    /// Ed25519 public key, base64 of 32 bytes.
    pub public_key: String,
    pub login_salt: String,
    pub encryption_salt: String,
    pub hmac_salt: String,
    pub hmac_type: HmacType,
    pub encryption_type: EncryptionType,
}

/// Registration request as received from a client. Not yet validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub public_key: String,
    pub login_salt: String,
    pub encryption_salt: String,
    pub hmac_salt: String,
    pub hmac_type: String,
    pub encryption_type: String,
}

/// A validated, normalized user ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub public_key: String,
    pub login_salt: String,
    pub encryption_salt: String,
    pub hmac_salt: String,
    pub hmac_type: HmacType,
    pub encryption_type: EncryptionType,
}

impl NewUser {
    /// Attach the id assigned by storage.
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            public_key: self.public_key,
            login_salt: self.login_salt,
            encryption_salt: self.encryption_salt,
            hmac_salt: self.hmac_salt,
            hmac_type: self.hmac_type,
            encryption_type: self.encryption_type,
        }
    }
}

/// A persisted one-time login challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: ChallengeId,
    pub user_id: UserId,
    /// 32 random bytes, base64.
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    /// Expired once `now` is strictly past `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A challenge about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChallenge {
    pub user_id: UserId,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Body of a challenge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub email: String,
}

/// Response to a challenge request.
///
/// Identical in shape for known and unknown emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedChallenge {
    pub challenge: String,
    pub login_salt: String,
    #[serde(with = "time::rfc3339_secs")]
    pub expires_at: DateTime<Utc>,
}

/// Body of a login request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    /// The challenge value, 44 base64 characters.
    pub challenge: String,
    /// Signature over the decoded challenge, 88 base64 characters.
    pub signature: String,
}

/// The latest title of a note, for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTitle {
    pub note_id: NoteId,
    pub cipher_title: String,
    pub iv_title: String,
    #[serde(with = "time::rfc3339_secs")]
    pub timestamp: DateTime<Utc>,
}
