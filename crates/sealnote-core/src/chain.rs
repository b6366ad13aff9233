//! Hash chaining of a note's blocks.
//!
//! Each block commits to its predecessor through `prev_hash`. The first
//! block commits to the genesis marker. Any change to a stored block changes
//! its hash and therefore breaks the link from its successor.

use crate::block::{Block, GENESIS_PREV_HASH};
use crate::canonical::hash_input_bytes;
use crate::crypto::Sha256Hash;

/// Compute the content hash of a block: base64(SHA-256(hash input)).
pub fn block_hash(block: &Block) -> String {
    Sha256Hash::hash(&hash_input_bytes(block)).to_base64()
}

/// Where and why a chain stopped linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    /// Index of the first block whose `prev_hash` is wrong.
    pub position: usize,
    /// What `prev_hash` should have been.
    pub expected: String,
    /// What it actually was.
    pub found: String,
}

/// Find the first broken link in a chain ordered by ascending timestamp.
///
/// Returns `None` for a valid chain, including the empty chain.
pub fn find_break(blocks: &[Block]) -> Option<ChainBreak> {
    let first = blocks.first()?;
    if first.prev_hash != GENESIS_PREV_HASH {
        return Some(ChainBreak {
            position: 0,
            expected: GENESIS_PREV_HASH.to_string(),
            found: first.prev_hash.clone(),
        });
    }

    blocks.windows(2).enumerate().find_map(|(i, pair)| {
        let expected = block_hash(&pair[0]);
        (pair[1].prev_hash != expected).then(|| ChainBreak {
            position: i + 1,
            expected,
            found: pair[1].prev_hash.clone(),
        })
    })
}

/// Verify hash linkage and the genesis marker.
pub fn verify_chain(blocks: &[Block]) -> bool {
    find_break(blocks).is_none()
}

/// Summary of a chain audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub length: usize,
    /// Hash of the last block; what the next block must carry as `prev_hash`.
    pub tail_hash: Option<String>,
    pub broken: Option<ChainBreak>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.broken.is_none()
    }
}

/// Verify a chain and report its length, tail hash and first break.
pub fn audit_chain(blocks: &[Block]) -> ChainReport {
    ChainReport {
        length: blocks.len(),
        tail_hash: blocks.last().map(block_hash),
        broken: find_break(blocks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockBuilder;
    use crate::crypto::Keypair;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    const FIELDS: [&str; 8] = [
        "prev_hash",
        "iv",
        "iv_title",
        "cipher_title",
        "ciphertext",
        "mac",
        "signature",
        "timestamp",
    ];

    fn mutate(block: &mut Block, field: &str, edit: &str) {
        match field {
            "prev_hash" => block.prev_hash.push_str(edit),
            "iv" => block.iv.push_str(edit),
            "iv_title" => block.iv_title.push_str(edit),
            "cipher_title" => block.cipher_title.push_str(edit),
            "ciphertext" => block.ciphertext.push_str(edit),
            "mac" => block.mac.push_str(edit),
            "signature" => block.signature.push_str(edit),
            "timestamp" => block.timestamp += Duration::seconds(edit.len() as i64),
            other => panic!("unknown field {other}"),
        }
    }

    /// Where a change to `field` of block `index` is first noticed. A new
    /// `prev_hash` breaks the block's own link; anything else changes its
    /// hash and breaks the link of the block after it.
    fn expected_break(field: &str, index: usize) -> usize {
        if field == "prev_hash" {
            index
        } else {
            index + 1
        }
    }

    fn build_chain(len: usize) -> Vec<Block> {
        let kp = Keypair::from_seed(&[3u8; 32]);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut blocks: Vec<Block> = Vec::with_capacity(len);
        for i in 0..len {
            let builder = match blocks.last() {
                Some(prev) => BlockBuilder::after(prev),
                None => BlockBuilder::genesis(),
            };
            blocks.push(
                builder
                    .ciphertext(format!("body-{i}"))
                    .timestamp(start + Duration::seconds(i as i64))
                    .sign(&kp),
            );
        }
        blocks
    }

    #[test]
    fn test_empty_chain_is_valid() {
        assert!(verify_chain(&[]));
        let report = audit_chain(&[]);
        assert_eq!(report.length, 0);
        assert_eq!(report.tail_hash, None);
    }

    #[test]
    fn test_built_chain_is_valid_for_every_prefix() {
        let chain = build_chain(6);
        for n in 0..=chain.len() {
            assert!(verify_chain(&chain[..n]), "prefix of length {n} should verify");
        }
    }

    #[test]
    fn test_single_block_needs_genesis() {
        let kp = Keypair::from_seed(&[3u8; 32]);
        let orphan = BlockBuilder::new(Sha256Hash::hash(b"x").to_base64()).sign(&kp);
        let brk = find_break(std::slice::from_ref(&orphan)).unwrap();
        assert_eq!(brk.position, 0);
        assert_eq!(brk.expected, GENESIS_PREV_HASH);
    }

    #[test]
    fn test_single_block_content_is_not_checked() {
        let mut chain = build_chain(1);
        chain[0].ciphertext = "anything".to_string();
        chain[0].signature = "garbage".to_string();
        assert!(verify_chain(&chain));
    }

    #[test]
    fn test_tampering_breaks_the_following_link() {
        let mut chain = build_chain(5);
        chain[1].ciphertext.push('!');

        let brk = find_break(&chain).unwrap();
        assert_eq!(brk.position, 2);
        assert!(verify_chain(&chain[..2]));
        for n in 3..=chain.len() {
            assert!(!verify_chain(&chain[..n]));
        }
    }

    #[test]
    fn test_tampered_timestamp_breaks_chain() {
        let mut chain = build_chain(3);
        chain[0].timestamp = chain[0].timestamp + Duration::seconds(1);
        assert_eq!(find_break(&chain).unwrap().position, 1);
    }

    #[test]
    fn test_every_field_is_covered_by_the_link() {
        let chain = build_chain(4);
        for field in FIELDS {
            let mut tampered = chain.clone();
            mutate(&mut tampered[1], field, "x");

            let brk = find_break(&tampered).unwrap_or_else(|| panic!("{field} not detected"));
            assert_eq!(brk.position, expected_break(field, 1), "{field}");
            assert!(verify_chain(&tampered[..brk.position]), "{field}");
        }
    }

    proptest! {
        #[test]
        fn any_edit_to_a_non_final_block_is_detected(
            field in 0..FIELDS.len(),
            index in 0usize..4,
            edit in r#"[A-Za-z0-9+/="\\\n é]{1,8}"#,
        ) {
            let mut chain = build_chain(5);
            let field = FIELDS[field];
            mutate(&mut chain[index], field, &edit);

            let brk = find_break(&chain);
            prop_assert_eq!(brk.map(|b| b.position), Some(expected_break(field, index)));
        }
    }

    #[test]
    fn test_audit_reports_tail() {
        let chain = build_chain(3);
        let report = audit_chain(&chain);
        assert!(report.is_valid());
        assert_eq!(report.length, 3);
        assert_eq!(report.tail_hash.as_deref(), Some(chain[2].hash().as_str()));
    }

    #[test]
    fn test_block_hash_shape() {
        let chain = build_chain(1);
        let h = block_hash(&chain[0]);
        assert_eq!(h.len(), 44);
        assert!(h.ends_with('='));
    }
}
