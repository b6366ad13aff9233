//! # sealnote
//!
//! The service layer of an end-to-end-encrypted notes backend. Clients
//! encrypt locally; the server stores opaque ciphertext in per-note hash
//! chains and authenticates users by challenge-response over Ed25519, never
//! seeing a long-term secret.
//!
//! ## Overview
//!
//! - **Challenges**: one-time random values a client signs to log in
//! - **Login**: signature check, atomic challenge consumption, session issue
//! - **Ledger**: signed blocks appended to a note only on top of a verified chain
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealnote::{Sealnote, ServiceConfig};
//! use sealnote::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("sealnote.db").unwrap();
//!     let service = Sealnote::new(store, ServiceConfig::from_env());
//!
//!     // The response looks the same whether or not the account exists.
//!     let issued = service.issue_challenge("ada@example.com").await.unwrap();
//!     assert_eq!(issued.challenge.len(), 44);
//!
//!     // Expired challenges are removed by an external scheduler calling:
//!     let removed = service.sweep_expired().await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `sealnote::core` - Blocks, canonical encoding, chain and signature checks
//! - `sealnote::store` - Repository traits, SQLite and in-memory stores

pub mod auth;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod service;
pub mod session;

// Re-export component crates
pub use sealnote_core as core;
pub use sealnote_store as store;

pub use auth::{Authenticator, LoginOutcome};
pub use challenge::ChallengeManager;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServiceConfig;
pub use error::{ErrorKind, Result, ServiceError};
pub use ledger::Ledger;
pub use service::Sealnote;
pub use session::{JwtSessionIssuer, SessionIssuer, SessionToken};

// Re-export commonly used core types
pub use sealnote_core::{
    Block, BlockBuilder, ChainReport, IssuedChallenge, Keypair, LoginRequest, NoteId, NoteTitle,
    Registration, User, UserId,
};
