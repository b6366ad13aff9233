//! # sealnote store
//!
//! Persistence for sealnote: users, login challenges and note blocks, behind
//! repository traits with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The service talks to storage only through [`UserRepository`],
//! [`ChallengeRepository`] and [`BlockRepository`], bundled as [`Store`].
//! The primary implementation is [`SqliteStore`], with [`MemoryStore`] for
//! tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealnote_store::{SqliteStore, UserRepository};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("sealnote.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let user = store.user_by_email("ada@example.com").await.unwrap();
//!     assert!(user.is_none());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **One consumer per challenge**: `delete_challenge` reports `true` to exactly one caller
//! - **No forks**: at most one block per `(user, note, prev_hash)`; losers get [`InsertResult::Conflict`]
//! - **Atomic note ids**: allocation and first insert happen in one transaction

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{BlockRepository, ChallengeRepository, InsertResult, Store, UserRepository};
