//! # sealnote testkit
//!
//! Testing utilities for sealnote.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed blocks and challenges with the exact bytes and digests a client must reproduce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Test users with deterministic keys, and chain builders
//!
//! ## Golden Vectors
//!
//! ```rust
//! use sealnote_testkit::vectors::{block_vectors, verify_all_vectors};
//!
//! assert!(verify_all_vectors().is_empty());
//! for vector in block_vectors() {
//!     assert_eq!(vector.block().hash(), vector.expected_hash);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealnote_testkit::generators::{block_from_params, BlockParams};
//!
//! proptest! {
//!     #[test]
//!     fn hash_is_deterministic(params: BlockParams) {
//!         let b1 = block_from_params(sealnote_core::GENESIS_PREV_HASH, &params);
//!         let b2 = block_from_params(sealnote_core::GENESIS_PREV_HASH, &params);
//!         prop_assert_eq!(b1.hash(), b2.hash());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use sealnote_testkit::fixtures::{epoch, ChainBuilder, TestUser};
//!
//! let user = TestUser::new(1, "ada@example.com");
//! let chain = ChainBuilder::new(user.keypair.clone(), epoch()).build(3);
//! assert!(sealnote_core::verify_chain(&chain));
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{epoch, ChainBuilder, TestUser};
pub use generators::{block_from_params, BlockParams};
pub use vectors::{block_vectors, challenge_vectors, verify_all_vectors, BlockVector, ChallengeVector};
