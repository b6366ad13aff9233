//! Canonical byte encodings of a block.
//!
//! A block has two encodings that must never be confused:
//!
//! - **Hash input**: a compact JSON object with every field in a fixed
//!   order. Its SHA-256 is the next block's `prev_hash`. The browser client
//!   computes the same digest over `JSON.stringify` output, so string
//!   escaping follows ECMAScript exactly.
//! - **Signed message**: the raw concatenation
//!   `prev_hash || iv || iv_title || cipher_title || ciphertext || mac || timestamp`.
//!   The signature itself is not part of it.
//!
//! Field order is written out by hand below; nothing here iterates a map.

use chrono::{DateTime, Utc};

use crate::block::Block;
use crate::time::format_rfc3339;

/// Object keys of the hash input, in encoding order.
mod keys {
    pub const PREV_HASH: &str = "prev_hash";
    pub const IV: &str = "iv";
    pub const IV_TITLE: &str = "iv_title";
    pub const CIPHER_TITLE: &str = "cipher_title";
    pub const CIPHERTEXT: &str = "ciphertext";
    pub const MAC: &str = "mac";
    pub const SIGNATURE: &str = "signature";
    pub const TIMESTAMP: &str = "timestamp";
}

/// Encode a block to the bytes its content hash is computed over.
pub fn hash_input_bytes(block: &Block) -> Vec<u8> {
    let timestamp = format_rfc3339(&block.timestamp);

    let entries: [(&str, &str); 8] = [
        (keys::PREV_HASH, &block.prev_hash),
        (keys::IV, &block.iv),
        (keys::IV_TITLE, &block.iv_title),
        (keys::CIPHER_TITLE, &block.cipher_title),
        (keys::CIPHERTEXT, &block.ciphertext),
        (keys::MAC, &block.mac),
        (keys::SIGNATURE, &block.signature),
        (keys::TIMESTAMP, &timestamp),
    ];

    let capacity = entries.iter().map(|(k, v)| k.len() + v.len() + 6).sum::<usize>() + 2;
    let mut buf = Vec::with_capacity(capacity);
    encode_object(&mut buf, &entries);
    buf
}

/// Construct the message a block's signature covers.
pub fn signed_message(block: &Block) -> Vec<u8> {
    signed_message_from_parts(
        &block.prev_hash,
        &block.iv,
        &block.iv_title,
        &block.cipher_title,
        &block.ciphertext,
        &block.mac,
        &block.timestamp,
    )
}

/// Construct the signed message from individual fields.
///
/// Used when signing, before a [`Block`] exists.
pub fn signed_message_from_parts(
    prev_hash: &str,
    iv: &str,
    iv_title: &str,
    cipher_title: &str,
    ciphertext: &str,
    mac: &str,
    timestamp: &DateTime<Utc>,
) -> Vec<u8> {
    let timestamp = format_rfc3339(timestamp);
    let parts = [prev_hash, iv, iv_title, cipher_title, ciphertext, mac, timestamp.as_str()];

    let mut buf = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        buf.extend_from_slice(part.as_bytes());
    }
    buf
}

/// Encode `{"k":"v",...}` with no whitespace, entries in the given order.
fn encode_object(buf: &mut Vec<u8>, entries: &[(&str, &str)]) {
    buf.push(b'{');
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        encode_text(buf, key);
        buf.push(b':');
        encode_text(buf, value);
    }
    buf.push(b'}');
}

/// Encode a JSON string literal with ECMAScript `JSON.stringify` escaping.
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    buf.push(b'"');
    for &b in s.as_bytes() {
        match b {
            b'"' => buf.extend_from_slice(b"\\\""),
            b'\\' => buf.extend_from_slice(b"\\\\"),
            0x08 => buf.extend_from_slice(b"\\b"),
            0x0c => buf.extend_from_slice(b"\\f"),
            b'\n' => buf.extend_from_slice(b"\\n"),
            b'\r' => buf.extend_from_slice(b"\\r"),
            b'\t' => buf.extend_from_slice(b"\\t"),
            0x00..=0x1f => {
                buf.extend_from_slice(b"\\u00");
                buf.push(HEX[(b >> 4) as usize]);
                buf.push(HEX[(b & 0x0f) as usize]);
            }
            // Multi-byte UTF-8 passes through untouched.
            _ => buf.push(b),
        }
    }
    buf.push(b'"');
}
