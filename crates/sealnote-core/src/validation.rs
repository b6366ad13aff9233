//! Request validation: explicit required fields and format constraints per operation.

use crate::block::Block;
use crate::crypto::{decode_base64, decode_exact, Sha256Hash};
use crate::error::{FormatError, ValidationError};
use crate::models::{LoginRequest, NewUser, Registration};
use crate::types::{EncryptionType, HmacType};

/// Base64 length of a 32-byte challenge value.
pub const CHALLENGE_B64_LEN: usize = 44;

/// Base64 length of a 64-byte Ed25519 signature.
pub const SIGNATURE_B64_LEN: usize = 88;

/// Minimum decoded size of each registration salt.
pub const MIN_SALT_BYTES: usize = 32;

/// Lower-case and trim an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// An email must contain both `@` and `.`.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Validate a registration request and produce a normalized [`NewUser`].
pub fn validate_registration(req: &Registration) -> Result<NewUser, ValidationError> {
    // 1. Required text fields
    require("name", &req.name)?;
    require("public_key", &req.public_key)?;
    require("login_salt", &req.login_salt)?;
    require("encryption_salt", &req.encryption_salt)?;
    require("hmac_salt", &req.hmac_salt)?;

    // 2. Email shape
    let email = normalize_email(&req.email);
    validate_email(&email)?;

    // 3. Algorithm tags from the closed sets
    let hmac_type: HmacType = req.hmac_type.parse()?;
    let encryption_type: EncryptionType = req.encryption_type.parse()?;

    // 4. Key material sizes
    decode_exact::<32>("public_key", &req.public_key)?;
    require_min_bytes("login_salt", &req.login_salt, MIN_SALT_BYTES)?;
    require_min_bytes("encryption_salt", &req.encryption_salt, MIN_SALT_BYTES)?;
    require_min_bytes("hmac_salt", &req.hmac_salt, MIN_SALT_BYTES)?;

    Ok(NewUser {
        name: req.name.trim().to_string(),
        email,
        public_key: req.public_key.clone(),
        login_salt: req.login_salt.clone(),
        encryption_salt: req.encryption_salt.clone(),
        hmac_salt: req.hmac_salt.clone(),
        hmac_type,
        encryption_type,
    })
}

/// Check a login request's shape before anything touches storage.
pub fn validate_login_request(req: &LoginRequest) -> Result<(), ValidationError> {
    validate_email(&normalize_email(&req.email))?;
    require_len("challenge", &req.challenge, CHALLENGE_B64_LEN)?;
    require_len("signature", &req.signature, SIGNATURE_B64_LEN)?;
    Ok(())
}

/// Check that every block field is present and `prev_hash` is a digest.
///
/// Signature decoding is left to signature verification so a bad signature
/// is reported as such.
pub fn validate_block(block: &Block) -> Result<(), ValidationError> {
    require("prev_hash", &block.prev_hash)?;
    require("iv", &block.iv)?;
    require("iv_title", &block.iv_title)?;
    require("cipher_title", &block.cipher_title)?;
    require("ciphertext", &block.ciphertext)?;
    require("mac", &block.mac)?;
    require("signature", &block.signature)?;

    Sha256Hash::from_base64("prev_hash", &block.prev_hash)?;
    Ok(())
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn require_len(field: &'static str, value: &str, expected: usize) -> Result<(), ValidationError> {
    if value.len() != expected {
        return Err(ValidationError::InvalidLength {
            field,
            expected,
            actual: value.len(),
        });
    }
    Ok(())
}

fn require_min_bytes(field: &'static str, value: &str, min: usize) -> Result<(), FormatError> {
    let actual = decode_base64(field, value)?.len();
    if actual < min {
        return Err(FormatError::TooShort { field, min, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockBuilder, GENESIS_PREV_HASH};
    use crate::crypto::{encode_base64, Keypair};

    fn registration() -> Registration {
        Registration {
            name: "Ada".into(),
            email: "  Ada@Example.COM ".into(),
            public_key: Keypair::from_seed(&[1u8; 32]).public_key().to_base64(),
            login_salt: encode_base64([1u8; 32]),
            encryption_salt: encode_base64([2u8; 32]),
            hmac_salt: encode_base64([3u8; 64]),
            hmac_type: "hmac-sha256".into(),
            encryption_type: "aes-128-cbc".into(),
        }
    }

    #[test]
    fn test_valid_registration_normalizes_email() {
        let user = validate_registration(&registration()).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.hmac_type, HmacType::HmacSha256);
        assert_eq!(user.encryption_type, EncryptionType::Aes128Cbc);
    }

    #[test]
    fn test_email_needs_at_and_dot() {
        for bad in ["ada.example.com", "ada@example", "@"] {
            let mut req = registration();
            req.email = bad.into();
            assert_eq!(validate_registration(&req), Err(ValidationError::InvalidEmail));
        }
    }

    #[test]
    fn test_unknown_algorithms_rejected() {
        let mut req = registration();
        req.hmac_type = "hmac-sha1".into();
        assert!(matches!(
            validate_registration(&req),
            Err(ValidationError::UnsupportedHmacType(_))
        ));

        let mut req = registration();
        req.encryption_type = "aes-256-gcm".into();
        assert!(matches!(
            validate_registration(&req),
            Err(ValidationError::UnsupportedEncryptionType(_))
        ));
    }

    #[test]
    fn test_short_salt_rejected() {
        let mut req = registration();
        req.encryption_salt = encode_base64([0u8; 31]);
        assert_eq!(
            validate_registration(&req),
            Err(ValidationError::Format(FormatError::TooShort {
                field: "encryption_salt",
                min: 32,
                actual: 31
            }))
        );
    }

    #[test]
    fn test_public_key_must_be_32_bytes() {
        let mut req = registration();
        req.public_key = encode_base64([0u8; 33]);
        assert!(matches!(
            validate_registration(&req),
            Err(ValidationError::Format(FormatError::Size { field: "public_key", .. }))
        ));
    }

    #[test]
    fn test_malformed_salt_is_decode_error() {
        let mut req = registration();
        req.hmac_salt = "!!not-base64!!".into();
        assert!(matches!(
            validate_registration(&req),
            Err(ValidationError::Format(FormatError::Decode { field: "hmac_salt", .. }))
        ));
    }

    #[test]
    fn test_missing_name() {
        let mut req = registration();
        req.name = "   ".into();
        assert_eq!(validate_registration(&req), Err(ValidationError::MissingField("name")));
    }

    #[test]
    fn test_login_lengths() {
        let ok = LoginRequest {
            email: "a@b.c".into(),
            challenge: "A".repeat(44),
            signature: "A".repeat(88),
        };
        assert!(validate_login_request(&ok).is_ok());

        let mut short = ok.clone();
        short.challenge.pop();
        assert_eq!(
            validate_login_request(&short),
            Err(ValidationError::InvalidLength {
                field: "challenge",
                expected: 44,
                actual: 43
            })
        );

        let mut long = ok;
        long.signature.push('A');
        assert!(matches!(
            validate_login_request(&long),
            Err(ValidationError::InvalidLength { field: "signature", .. })
        ));
    }

    #[test]
    fn test_block_required_fields() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let full = BlockBuilder::genesis()
            .iv("aXY=")
            .iv_title("aXZ0")
            .cipher_title("dA==")
            .ciphertext("Yg==")
            .mac("bQ==")
            .sign(&kp);
        assert!(validate_block(&full).is_ok());

        let mut missing = full.clone();
        missing.mac.clear();
        assert_eq!(validate_block(&missing), Err(ValidationError::MissingField("mac")));

        let mut bad_prev = full;
        bad_prev.prev_hash = GENESIS_PREV_HASH[..40].to_string();
        assert!(matches!(validate_block(&bad_prev), Err(ValidationError::Format(_))));
    }
}
