//! Proptest generators for property-based testing.

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use sealnote_core::crypto::encode_base64;
use sealnote_core::{Block, BlockBuilder, Keypair, GENESIS_PREV_HASH};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a non-empty base64 field encoding up to `max_len` bytes.
pub fn base64_field(max_len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(any::<u8>(), 1..=max_len.max(1)).prop_map(|bytes| encode_base64(bytes))
}

/// Generate a 32-byte digest in base64, as carried in `prev_hash`.
pub fn digest() -> impl Strategy<Value = String> {
    any::<[u8; 32]>().prop_map(|bytes| encode_base64(bytes))
}

/// Generate a whole-second timestamp between 2000 and 2100.
pub fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..4_102_444_800).prop_map(|secs| {
        DateTime::from_timestamp(secs, 0).expect("timestamp in range")
    })
}

/// Generate arbitrary text, including characters that need JSON escaping.
pub fn text() -> impl Strategy<Value = String> {
    any::<String>()
}

/// Generate an email address that passes validation.
pub fn email() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,11}@[a-z]{1,10}\\.[a-z]{2,4}".prop_map(String::from)
}

/// Parameters for generating a block.
#[derive(Debug, Clone)]
pub struct BlockParams {
    pub keypair: Keypair,
    pub iv: String,
    pub iv_title: String,
    pub cipher_title: String,
    pub ciphertext: String,
    pub mac: String,
    pub timestamp: DateTime<Utc>,
}

impl Arbitrary for BlockParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            keypair(),
            base64_field(16),
            base64_field(16),
            base64_field(64),
            base64_field(512),
            base64_field(64),
            timestamp(),
        )
            .prop_map(
                |(keypair, iv, iv_title, cipher_title, ciphertext, mac, timestamp)| BlockParams {
                    keypair,
                    iv,
                    iv_title,
                    cipher_title,
                    ciphertext,
                    mac,
                    timestamp,
                },
            )
            .boxed()
    }
}

/// Build and sign a block on top of `prev_hash` from params.
pub fn block_from_params(prev_hash: &str, params: &BlockParams) -> Block {
    BlockBuilder::new(prev_hash)
        .iv(params.iv.clone())
        .iv_title(params.iv_title.clone())
        .cipher_title(params.cipher_title.clone())
        .ciphertext(params.ciphertext.clone())
        .mac(params.mac.clone())
        .timestamp(params.timestamp)
        .sign(&params.keypair)
}

/// Generate a valid chain of 1 to `max_len` blocks signed by one key.
pub fn chain(max_len: usize) -> impl Strategy<Value = (Keypair, Vec<Block>)> {
    (
        keypair(),
        prop::collection::vec(base64_field(128), 1..=max_len.max(1)),
        timestamp(),
    )
        .prop_map(|(keypair, texts, start)| {
            let mut blocks: Vec<Block> = Vec::with_capacity(texts.len());
            for (i, text) in texts.iter().enumerate() {
                let prev = blocks.last().map_or_else(|| GENESIS_PREV_HASH.to_string(), Block::hash);
                let block = BlockBuilder::new(prev)
                    .iv(encode_base64([i as u8; 16]))
                    .iv_title(encode_base64([!(i as u8); 16]))
                    .cipher_title(encode_base64(format!("title {i}")))
                    .ciphertext(text.clone())
                    .mac(encode_base64([0xaa; 32]))
                    .timestamp(start + chrono::Duration::seconds(i as i64))
                    .sign(&keypair);
                blocks.push(block);
            }
            (keypair, blocks)
        })
}
