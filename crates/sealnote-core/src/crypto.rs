//! Cryptographic primitives for sealnote.
//!
//! Wraps Ed25519 signing, SHA-256 hashing and the OS random source with
//! strong types. Everything on the wire is standard, padded base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::FormatError;

/// Encode bytes as standard base64.
pub fn encode_base64(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

/// Decode a standard base64 field.
pub fn decode_base64(field: &'static str, value: &str) -> Result<Vec<u8>, FormatError> {
    STANDARD
        .decode(value)
        .map_err(|source| FormatError::Decode { field, source })
}

/// Decode a base64 field that must hold exactly `N` bytes.
pub fn decode_exact<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N], FormatError> {
    let bytes = decode_base64(field, value)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| FormatError::Size {
        field,
        expected: N,
        actual,
    })
}

/// Fill `N` bytes from the operating system's CSPRNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// `N` random bytes, base64 encoded.
pub fn random_base64<const N: usize>() -> String {
    encode_base64(random_bytes::<N>())
}

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Compute the SHA-256 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to base64, the form digests take on the wire.
    pub fn to_base64(&self) -> String {
        encode_base64(self.0)
    }

    /// Parse from base64.
    pub fn from_base64(field: &'static str, s: &str) -> Result<Self, FormatError> {
        decode_exact::<32>(field, s).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The all-zero digest. Its base64 form is the genesis marker.
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encode_base64(self.0)
    }

    /// Parse from base64; must decode to exactly 32 bytes.
    pub fn from_base64(s: &str) -> Result<Self, FormatError> {
        decode_exact::<32>("public_key", s).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a detached signature over a message.
    ///
    /// Bytes that are not a valid curve point simply fail to verify.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = Signature::from_bytes(&signature.0);
        verifying_key.verify(message, &sig).is_ok()
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encode_base64(self.0)
    }

    /// Parse from base64; must decode to exactly 64 bytes.
    pub fn from_base64(s: &str) -> Result<Self, FormatError> {
        decode_exact::<64>("signature", s).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

/// A signing keypair.
///
/// The server never holds one for a user; this exists for clients, tools
/// and tests that need to produce blocks and login signatures.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Sign a base64 challenge the way a login client does: over its decoded bytes.
    pub fn sign_challenge(&self, challenge: &str) -> Result<Ed25519Signature, FormatError> {
        let message = decode_base64("challenge", challenge)?;
        Ok(self.sign(&message))
    }

    /// Get the raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"hello world");

        assert!(keypair.public_key().verify(b"hello world", &signature));
        assert!(!keypair.public_key().verify(b"hello worlD", &signature));
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        let kp1 = Keypair::from_seed(&seed);
        let kp2 = Keypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.seed(), seed);
    }

    #[test]
    fn test_sha256_known_answer() {
        assert_eq!(
            Sha256Hash::hash(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_zero_hash_base64() {
        assert_eq!(
            Sha256Hash::ZERO.to_base64(),
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="
        );
    }

    #[test]
    fn test_decode_exact_reports_size() {
        let err = Ed25519PublicKey::from_base64(&encode_base64([1u8; 31])).unwrap_err();
        assert_eq!(
            err,
            FormatError::Size {
                field: "public_key",
                expected: 32,
                actual: 31
            }
        );
    }

    #[test]
    fn test_decode_rejects_malformed_base64() {
        let err = Ed25519Signature::from_base64("not base64!").unwrap_err();
        assert!(matches!(err, FormatError::Decode { field: "signature", .. }));
    }

    #[test]
    fn test_random_base64_shape() {
        let a = random_base64::<32>();
        let b = random_base64::<32>();
        assert_eq!(a.len(), 44);
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_curve_point_does_not_verify() {
        // y = 2 has no square root on the curve, so decompression fails.
        let mut bytes = [0u8; 32];
        bytes[0] = 2;
        let bogus = Ed25519PublicKey::from_bytes(bytes);
        let sig = Keypair::generate().sign(b"m");
        assert!(!bogus.verify(b"m", &sig));
    }
}
