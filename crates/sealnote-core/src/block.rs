//! Block: one immutable, signed entry in a note's history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::signed_message_from_parts;
use crate::chain::block_hash;
use crate::crypto::Keypair;
use crate::time;

/// The `prev_hash` of every note's first block: 32 zero bytes, base64.
pub const GENESIS_PREV_HASH: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// A block as it travels on the wire and sits in storage.
///
/// All payload fields are opaque base64 text produced by the client. The
/// server only ever compares, concatenates and hashes them; it never decodes
/// the encrypted content.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hash of the preceding block, or [`GENESIS_PREV_HASH`].
    pub prev_hash: String,
    /// IV for the body ciphertext.
    pub iv: String,
    /// IV for the title ciphertext.
    pub iv_title: String,
    pub cipher_title: String,
    pub ciphertext: String,
    /// Client MAC over the plaintext.
    pub mac: String,
    /// Ed25519 signature over [`crate::canonical::signed_message`].
    pub signature: String,
    #[serde(with = "time::rfc3339_secs")]
    pub timestamp: DateTime<Utc>,
}

impl Block {
    /// Content hash of this block; the next block's `prev_hash`.
    pub fn hash(&self) -> String {
        block_hash(self)
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash == GENESIS_PREV_HASH
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prev: String = self.prev_hash.chars().take(12).collect();
        f.debug_struct("Block")
            .field("prev_hash", &format_args!("{prev}..."))
            .field("timestamp", &time::format_rfc3339(&self.timestamp))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Builder for signing blocks on the client side.
///
/// # Example
///
/// ```
/// use sealnote_core::{BlockBuilder, Keypair};
///
/// let keypair = Keypair::generate();
/// let first = BlockBuilder::genesis()
///     .ciphertext("Y2lwaGVy")
///     .sign(&keypair);
/// let second = BlockBuilder::after(&first)
///     .ciphertext("bW9yZQ==")
///     .sign(&keypair);
/// assert_eq!(second.prev_hash, first.hash());
/// ```
#[derive(Debug, Clone)]
pub struct BlockBuilder {
    prev_hash: String,
    iv: String,
    iv_title: String,
    cipher_title: String,
    ciphertext: String,
    mac: String,
    timestamp: DateTime<Utc>,
}

impl BlockBuilder {
    /// Start a block on top of an arbitrary `prev_hash`.
    pub fn new(prev_hash: impl Into<String>) -> Self {
        Self {
            prev_hash: prev_hash.into(),
            iv: String::new(),
            iv_title: String::new(),
            cipher_title: String::new(),
            ciphertext: String::new(),
            mac: String::new(),
            timestamp: time::truncate(Utc::now()),
        }
    }

    /// Start the first block of a new note.
    pub fn genesis() -> Self {
        Self::new(GENESIS_PREV_HASH)
    }

    /// Start the block that follows `prev`.
    pub fn after(prev: &Block) -> Self {
        Self::new(prev.hash())
    }

    pub fn iv(mut self, iv: impl Into<String>) -> Self {
        self.iv = iv.into();
        self
    }

    pub fn iv_title(mut self, iv_title: impl Into<String>) -> Self {
        self.iv_title = iv_title.into();
        self
    }

    pub fn cipher_title(mut self, cipher_title: impl Into<String>) -> Self {
        self.cipher_title = cipher_title.into();
        self
    }

    pub fn ciphertext(mut self, ciphertext: impl Into<String>) -> Self {
        self.ciphertext = ciphertext.into();
        self
    }

    pub fn mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = mac.into();
        self
    }

    /// Set the timestamp. Sub-second precision is dropped.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = time::truncate(timestamp);
        self
    }

    /// Sign and build the block.
    pub fn sign(self, keypair: &Keypair) -> Block {
        let message = signed_message_from_parts(
            &self.prev_hash,
            &self.iv,
            &self.iv_title,
            &self.cipher_title,
            &self.ciphertext,
            &self.mac,
            &self.timestamp,
        );
        let signature = keypair.sign(&message).to_base64();

        Block {
            prev_hash: self.prev_hash,
            iv: self.iv,
            iv_title: self.iv_title,
            cipher_title: self.cipher_title,
            ciphertext: self.ciphertext,
            mac: self.mac,
            signature,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_genesis_builder() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let block = BlockBuilder::genesis().timestamp(ts()).sign(&kp);
        assert!(block.is_genesis());
        assert_eq!(block.signature.len(), 88);
    }

    #[test]
    fn test_after_links_to_previous() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let first = BlockBuilder::genesis().ciphertext("YQ==").timestamp(ts()).sign(&kp);
        let second = BlockBuilder::after(&first).ciphertext("Yg==").sign(&kp);
        assert!(!second.is_genesis());
        assert_eq!(second.prev_hash, first.hash());
    }

    #[test]
    fn test_builder_is_deterministic() {
        let kp = Keypair::from_seed(&[9u8; 32]);
        let make = || {
            BlockBuilder::genesis()
                .iv("aXY=")
                .iv_title("aXZ0")
                .cipher_title("dGl0bGU=")
                .ciphertext("Ym9keQ==")
                .mac("bWFj")
                .timestamp(ts())
                .sign(&kp)
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn test_wire_shape() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let block = BlockBuilder::genesis().iv("aXY=").timestamp(ts()).sign(&kp);
        let json = serde_json::to_value(&block).unwrap();

        assert_eq!(json["prev_hash"], GENESIS_PREV_HASH);
        assert_eq!(json["iv"], "aXY=");
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");

        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_debug_hides_payload() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let block = BlockBuilder::genesis().ciphertext("c2VjcmV0").sign(&kp);
        let debug = format!("{block:?}");
        assert!(!debug.contains("c2VjcmV0"));
        assert!(debug.contains("ciphertext_len: 8"));
    }
}
