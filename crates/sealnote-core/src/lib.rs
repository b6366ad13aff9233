//! # sealnote core
//!
//! Pure primitives for sealnote: blocks, canonical encoding, hash chaining
//! and signature verification.
//!
//! This crate contains no I/O, no storage, no networking. Every function is
//! deterministic over its inputs (apart from the explicit random helpers in
//! [`crypto`]) and safe to call from any number of threads.
//!
//! ## Key Types
//!
//! - [`Block`] - One immutable, signed entry in a note's history
//! - [`BlockBuilder`] - Client-side construction and signing of blocks
//! - [`User`], [`Challenge`] - Account and one-time login challenge records
//! - [`UserId`], [`NoteId`], [`ChallengeId`] - Typed identifiers
//!
//! ## Verification
//!
//! - [`block_hash`] / [`verify_chain`] - Hash linkage from the genesis marker
//! - [`verify_signature`] / [`verify_block_signature`] - Detached Ed25519 checks
//!
//! The byte layouts both rely on live in [`canonical`].

pub mod block;
pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod models;
pub mod signature;
pub mod time;
pub mod types;
pub mod validation;

pub use block::{Block, BlockBuilder, GENESIS_PREV_HASH};
pub use canonical::{hash_input_bytes, signed_message};
pub use chain::{audit_chain, block_hash, find_break, verify_chain, ChainBreak, ChainReport};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, Sha256Hash};
pub use error::{FormatError, ValidationError};
pub use models::{
    Challenge, ChallengeRequest, IssuedChallenge, LoginRequest, NewChallenge, NewUser, NoteTitle,
    Registration, User,
};
pub use signature::{verify_block_signature, verify_signature};
pub use types::{ChallengeId, EncryptionType, HmacType, NoteId, UserId};
pub use validation::{validate_block, validate_login_request, validate_registration};
