//! Detached signature verification over base64 wire values.
//!
//! Both entry points separate two outcomes:
//!
//! - `Err(FormatError)`: an input is not valid base64, or the key or
//!   signature decodes to the wrong size.
//! - `Ok(false)`: everything decoded, but the signature does not verify.

use crate::block::Block;
use crate::canonical::signed_message;
use crate::crypto::{decode_base64, Ed25519PublicKey, Ed25519Signature};
use crate::error::FormatError;

/// Verify a signature over a base64 message, e.g. a login challenge.
///
/// The message is decoded first; the signature covers the raw bytes, not the
/// base64 text.
pub fn verify_signature(public_key: &str, message: &str, signature: &str) -> Result<bool, FormatError> {
    let public_key = Ed25519PublicKey::from_base64(public_key)?;
    let message = decode_base64("message", message)?;
    let signature = Ed25519Signature::from_base64(signature)?;

    Ok(public_key.verify(&message, &signature))
}

/// Verify a block's signature over its signed message.
pub fn verify_block_signature(public_key: &str, block: &Block) -> Result<bool, FormatError> {
    let public_key = Ed25519PublicKey::from_base64(public_key)?;
    let signature = Ed25519Signature::from_base64(&block.signature)?;

    Ok(public_key.verify(&signed_message(block), &signature))
}
