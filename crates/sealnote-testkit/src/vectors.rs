//! Golden test vectors for deterministic verification.
//!
//! The browser client and the server must agree byte for byte on the hash
//! input, the signed message and the resulting digests. These vectors pin
//! those bytes. Signatures are deterministic Ed25519, so every output below
//! follows from the seed and the field values alone.

use sealnote_core::time::parse_rfc3339;
use sealnote_core::{
    hash_input_bytes, signed_message, verify_signature, Block, BlockBuilder, Keypair,
    GENESIS_PREV_HASH,
};

/// A block built from fixed inputs, with its expected encodings.
#[derive(Debug, Clone)]
pub struct BlockVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for deterministic key generation.
    pub seed: [u8; 32],
    pub prev_hash: &'static str,
    pub iv: &'static str,
    pub iv_title: &'static str,
    pub cipher_title: &'static str,
    pub ciphertext: &'static str,
    pub mac: &'static str,
    /// RFC3339, second precision.
    pub timestamp: &'static str,

    pub expected_public_key: &'static str,
    pub expected_signed_message: &'static str,
    pub expected_signature: &'static str,
    pub expected_hash_input: &'static str,
    pub expected_hash: &'static str,
}

impl BlockVector {
    pub fn keypair(&self) -> Keypair {
        Keypair::from_seed(&self.seed)
    }

    /// Build and sign the block this vector describes.
    pub fn block(&self) -> Block {
        let timestamp = parse_rfc3339(self.timestamp).expect("vector timestamp is RFC3339");
        BlockBuilder::new(self.prev_hash)
            .iv(self.iv)
            .iv_title(self.iv_title)
            .cipher_title(self.cipher_title)
            .ciphertext(self.ciphertext)
            .mac(self.mac)
            .timestamp(timestamp)
            .sign(&self.keypair())
    }
}

/// A login challenge signed with a fixed key.
#[derive(Debug, Clone)]
pub struct ChallengeVector {
    pub name: &'static str,
    pub seed: [u8; 32],
    /// Base64 of 32 bytes.
    pub challenge: &'static str,
    /// Signature over the decoded challenge bytes.
    pub expected_signature: &'static str,
}

/// Get all block vectors. The second extends the first.
pub fn block_vectors() -> Vec<BlockVector> {
    vec![
        BlockVector {
            name: "genesis block",
            seed: [0x01; 32],
            prev_hash: GENESIS_PREV_HASH,
            iv: "AAECAwQFBgcICQoLDA0ODw==",
            iv_title: "EBESExQVFhcYGRobHB0eHw==",
            cipher_title: "dGl0bGU=",
            ciphertext: "aGVsbG8gd29ybGQ=",
            mac: "bWFjLXRhZw==",
            timestamp: "2024-05-01T12:00:00Z",
            expected_public_key: "iojj3XQJ8ZX9UtstPLpdcspnCb8dlBIb83SIAbQPb1w=",
            expected_signed_message: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=AAECAwQFBgcICQoLDA0ODw==EBESExQVFhcYGRobHB0eHw==dGl0bGU=aGVsbG8gd29ybGQ=bWFjLXRhZw==2024-05-01T12:00:00Z",
            expected_signature: "AIJ+oFkTicBIxsZ2iOmIcH7vhA9n5QzAFEBw+577Myk26Kh9a8HyJEiRgz9YvGERJ+CqDk7MEzUVKFG4thQZAw==",
            expected_hash_input: r#"{"prev_hash":"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=","iv":"AAECAwQFBgcICQoLDA0ODw==","iv_title":"EBESExQVFhcYGRobHB0eHw==","cipher_title":"dGl0bGU=","ciphertext":"aGVsbG8gd29ybGQ=","mac":"bWFjLXRhZw==","signature":"AIJ+oFkTicBIxsZ2iOmIcH7vhA9n5QzAFEBw+577Myk26Kh9a8HyJEiRgz9YvGERJ+CqDk7MEzUVKFG4thQZAw==","timestamp":"2024-05-01T12:00:00Z"}"#,
            expected_hash: "wq/9pR2KiVye5xFSen2zMDlw/Qdgf/J6/TpGAgmKHmA=",
        },
        BlockVector {
            name: "second block",
            seed: [0x01; 32],
            prev_hash: "wq/9pR2KiVye5xFSen2zMDlw/Qdgf/J6/TpGAgmKHmA=",
            iv: "AAECAwQFBgcICQoLDA0ODw==",
            iv_title: "EBESExQVFhcYGRobHB0eHw==",
            cipher_title: "dGl0bGU=",
            ciphertext: "c2Vjb25kIGVkaXQ=",
            mac: "bWFjLXRhZw==",
            timestamp: "2024-05-01T12:00:30Z",
            expected_public_key: "iojj3XQJ8ZX9UtstPLpdcspnCb8dlBIb83SIAbQPb1w=",
            expected_signed_message: "wq/9pR2KiVye5xFSen2zMDlw/Qdgf/J6/TpGAgmKHmA=AAECAwQFBgcICQoLDA0ODw==EBESExQVFhcYGRobHB0eHw==dGl0bGU=c2Vjb25kIGVkaXQ=bWFjLXRhZw==2024-05-01T12:00:30Z",
            expected_signature: "lV9EQGAEQqUZppscTJcM+qQxa/h8vKh6eBvwZ+H9r2nldqJVy90e6JmvRQRBwlDg7PFUxPbM8+mJ+cPNZDrvCw==",
            expected_hash_input: r#"{"prev_hash":"wq/9pR2KiVye5xFSen2zMDlw/Qdgf/J6/TpGAgmKHmA=","iv":"AAECAwQFBgcICQoLDA0ODw==","iv_title":"EBESExQVFhcYGRobHB0eHw==","cipher_title":"dGl0bGU=","ciphertext":"c2Vjb25kIGVkaXQ=","mac":"bWFjLXRhZw==","signature":"lV9EQGAEQqUZppscTJcM+qQxa/h8vKh6eBvwZ+H9r2nldqJVy90e6JmvRQRBwlDg7PFUxPbM8+mJ+cPNZDrvCw==","timestamp":"2024-05-01T12:00:30Z"}"#,
            expected_hash: "7xj8/ppP+idnyLo7mm89iLPnwxLTSxNCecehBC6yKCU=",
        },
        BlockVector {
            name: "text needing JSON escapes",
            seed: [0x03; 32],
            prev_hash: GENESIS_PREV_HASH,
            iv: "aXY=",
            iv_title: "aXZ0",
            cipher_title: "quote \" backslash \\ nl \n tab \t ctl \u{1} é",
            ciphertext: "Y2lwaGVy",
            mac: "bWFj",
            timestamp: "2024-05-01T12:01:00Z",
            expected_public_key: "7UkoxijRwsbq6QM4kFmVYSlZJzpcY/k2NsFGFKyHN9E=",
            expected_signed_message: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=aXY=aXZ0quote \" backslash \\ nl \n tab \t ctl \u{1} éY2lwaGVybWFj2024-05-01T12:01:00Z",
            expected_signature: "3WDGhFsbMMX1Gy8vH4kSidEB7NtuKwSoB9saCQcqnL7K2qyF8aHYJeOKwZuTmtKzv58CnznI3ee7SYs/C3rjDA==",
            expected_hash_input: r#"{"prev_hash":"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=","iv":"aXY=","iv_title":"aXZ0","cipher_title":"quote \" backslash \\ nl \n tab \t ctl \u0001 é","ciphertext":"Y2lwaGVy","mac":"bWFj","signature":"3WDGhFsbMMX1Gy8vH4kSidEB7NtuKwSoB9saCQcqnL7K2qyF8aHYJeOKwZuTmtKzv58CnznI3ee7SYs/C3rjDA==","timestamp":"2024-05-01T12:01:00Z"}"#,
            expected_hash: "K0R8tRK3Yf29Ee4sfETH53Awi0BZJN0ICET2h26jjf4=",
        },
    ]
}

/// Get all challenge vectors.
pub fn challenge_vectors() -> Vec<ChallengeVector> {
    vec![ChallengeVector {
        name: "sequential challenge bytes",
        seed: [0x01; 32],
        challenge: "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=",
        expected_signature: "uX383bUMPHE5Ba0wkGYZ0F7+3QTnE75teZqFhrJ3WzTVYXe8RkCfuctdJHCUxyjX5SdzQQ2CbUnCjsD/7eJTAg==",
    }]
}

/// Check one block vector, returning a description of the first mismatch.
pub fn check_block_vector(vector: &BlockVector) -> Result<(), String> {
    let keypair = vector.keypair();
    let block = vector.block();

    let checks: [(&str, String, &str); 5] = [
        ("public key", keypair.public_key().to_base64(), vector.expected_public_key),
        (
            "signed message",
            String::from_utf8_lossy(&signed_message(&block)).into_owned(),
            vector.expected_signed_message,
        ),
        ("signature", block.signature.clone(), vector.expected_signature),
        (
            "hash input",
            String::from_utf8_lossy(&hash_input_bytes(&block)).into_owned(),
            vector.expected_hash_input,
        ),
        ("hash", block.hash(), vector.expected_hash),
    ];

    for (what, actual, expected) in checks {
        if actual != expected {
            return Err(format!(
                "{}: {what} mismatch\n  expected: {expected}\n  actual:   {actual}",
                vector.name
            ));
        }
    }
    Ok(())
}

/// Check one challenge vector.
pub fn check_challenge_vector(vector: &ChallengeVector) -> Result<(), String> {
    let keypair = Keypair::from_seed(&vector.seed);
    let signature = keypair
        .sign_challenge(vector.challenge)
        .map_err(|e| format!("{}: {e}", vector.name))?
        .to_base64();
    if signature != vector.expected_signature {
        return Err(format!(
            "{}: signature mismatch\n  expected: {}\n  actual:   {signature}",
            vector.name, vector.expected_signature
        ));
    }

    let public_key = keypair.public_key().to_base64();
    match verify_signature(&public_key, vector.challenge, vector.expected_signature) {
        Ok(true) => Ok(()),
        other => Err(format!("{}: expected signature to verify, got {other:?}", vector.name)),
    }
}

/// Verify all golden vectors, returning every failure.
pub fn verify_all_vectors() -> Vec<String> {
    let blocks = block_vectors();
    let challenges = challenge_vectors();

    blocks
        .iter()
        .map(check_block_vector)
        .chain(challenges.iter().map(check_challenge_vector))
        .filter_map(Result::err)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        let failures = verify_all_vectors();
        assert!(failures.is_empty(), "golden vector failures:\n{}", failures.join("\n"));
    }

    #[test]
    fn test_second_vector_extends_first() {
        let vectors = block_vectors();
        assert_eq!(vectors[1].prev_hash, vectors[0].expected_hash);
        assert!(sealnote_core::verify_chain(&[vectors[0].block(), vectors[1].block()]));
    }
}
