//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: users with deterministic keys
//! and builders for valid note chains.

use chrono::{DateTime, Duration, TimeZone, Utc};

use sealnote_core::crypto::encode_base64;
use sealnote_core::{
    Block, BlockBuilder, EncryptionType, HmacType, Keypair, LoginRequest, NewUser, Registration,
};

/// A fixed instant tests can pin their clocks to.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid fixed instant")
}

/// A client identity: a keypair plus the salts it registers with.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub name: String,
    pub email: String,
    pub keypair: Keypair,
    /// Drives salt derivation so two users never share salts.
    seed: u8,
}

impl TestUser {
    /// Create a user with a keypair derived from `seed`.
    pub fn new(seed: u8, email: &str) -> Self {
        Self {
            name: format!("User {seed}"),
            email: email.to_string(),
            keypair: Keypair::from_seed(&[seed; 32]),
            seed,
        }
    }

    /// `n` distinct users, `user0@example.com` onward.
    pub fn many(n: u8) -> Vec<Self> {
        (0..n)
            .map(|i| Self::new(i.wrapping_add(1), &format!("user{i}@example.com")))
            .collect()
    }

    pub fn public_key(&self) -> String {
        self.keypair.public_key().to_base64()
    }

    pub fn login_salt(&self) -> String {
        self.salt(0x10)
    }

    fn salt(&self, tag: u8) -> String {
        encode_base64([self.seed ^ tag; 32])
    }

    /// The registration request this user's client would send.
    pub fn registration(&self) -> Registration {
        Registration {
            name: self.name.clone(),
            email: self.email.clone(),
            public_key: self.public_key(),
            login_salt: self.login_salt(),
            encryption_salt: self.salt(0x20),
            hmac_salt: self.salt(0x30),
            hmac_type: HmacType::HmacSha256.as_str().to_string(),
            encryption_type: EncryptionType::Aes128Cbc.as_str().to_string(),
        }
    }

    /// The validated form of [`registration`](Self::registration), for
    /// seeding a store directly.
    pub fn new_user(&self) -> NewUser {
        NewUser {
            name: self.name.clone(),
            email: self.email.to_lowercase(),
            public_key: self.public_key(),
            login_salt: self.login_salt(),
            encryption_salt: self.salt(0x20),
            hmac_salt: self.salt(0x30),
            hmac_type: HmacType::HmacSha256,
            encryption_type: EncryptionType::Aes128Cbc,
        }
    }

    /// Sign `challenge` and wrap it in a login request.
    pub fn login_request(&self, challenge: &str) -> LoginRequest {
        let signature = self
            .keypair
            .sign_challenge(challenge)
            .expect("challenge is base64");
        LoginRequest {
            email: self.email.clone(),
            challenge: challenge.to_string(),
            signature: signature.to_base64(),
        }
    }
}

/// Fill every field of a block with placeholder ciphertext derived from `text`.
pub fn filled(builder: BlockBuilder, text: &str, at: DateTime<Utc>) -> BlockBuilder {
    builder
        .iv(encode_base64([0x11; 16]))
        .iv_title(encode_base64([0x22; 16]))
        .cipher_title(encode_base64(format!("title of {text}")))
        .ciphertext(encode_base64(text))
        .mac(encode_base64([0x33; 32]))
        .timestamp(at)
}

/// Builds a valid chain of blocks for one note, signed by one key.
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    keypair: Keypair,
    next_at: DateTime<Utc>,
    step: Duration,
    blocks: Vec<Block>,
}

impl ChainBuilder {
    /// Start a chain whose first block is stamped `start`.
    pub fn new(keypair: Keypair, start: DateTime<Utc>) -> Self {
        Self {
            keypair,
            next_at: start,
            step: Duration::seconds(1),
            blocks: Vec::new(),
        }
    }

    /// Set the time between consecutive blocks. Zero yields equal timestamps.
    pub fn step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Build the next block without adding it to the chain.
    pub fn peek(&self, text: &str) -> Block {
        let builder = match self.blocks.last() {
            Some(tail) => BlockBuilder::after(tail),
            None => BlockBuilder::genesis(),
        };
        filled(builder, text, self.next_at).sign(&self.keypair)
    }

    /// Build the next block and add it to the chain.
    pub fn push(&mut self, text: &str) -> Block {
        let block = self.peek(text);
        self.blocks.push(block.clone());
        self.next_at += self.step;
        block
    }

    /// Build a chain of `n` blocks.
    pub fn build(mut self, n: usize) -> Vec<Block> {
        for i in 0..n {
            self.push(&format!("edit {i}"));
        }
        self.blocks
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}
