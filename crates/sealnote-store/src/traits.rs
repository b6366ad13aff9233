//! Repository traits: the abstract interface for sealnote persistence.
//!
//! The service layer is storage-agnostic. Implementations include SQLite
//! (primary) and in-memory (for tests). Every implementation must honor the
//! atomicity notes on each method; the service relies on them for its
//! concurrency guarantees.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sealnote_core::{
    Block, Challenge, ChallengeId, NewChallenge, NewUser, NoteId, NoteTitle, User, UserId,
};

use crate::error::Result;

/// Result of appending a block to a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Block was stored as the new tail.
    Inserted,
    /// Another block of the same note already links to this `prev_hash`.
    ///
    /// Appending would fork the chain, so nothing was written.
    Conflict {
        /// The contested `prev_hash`.
        prev_hash: String,
    },
}

/// Persistence of user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and return its id.
    ///
    /// Fails with [`crate::StoreError::DuplicateEmail`] if the email is taken.
    async fn create_user(&self, user: &NewUser) -> Result<UserId>;

    /// Look up a user by (already normalized) email.
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up a user by id.
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>>;

    /// Delete a user together with its challenges and note blocks.
    ///
    /// Atomic. Returns `false` if the user did not exist.
    async fn delete_user(&self, id: UserId) -> Result<bool>;
}

/// Persistence of one-time login challenges.
#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    /// Persist a new challenge and return its id.
    async fn create_challenge(&self, challenge: &NewChallenge) -> Result<ChallengeId>;

    /// Find a live challenge by value, joined to its owner by email.
    async fn challenge_by_value_and_email(
        &self,
        value: &str,
        email: &str,
    ) -> Result<Option<Challenge>>;

    /// Atomically delete a challenge if it is still present.
    ///
    /// Returns `true` only for the single call that actually removed the
    /// row; concurrent or repeated calls return `false`.
    async fn delete_challenge(&self, id: ChallengeId) -> Result<bool>;

    /// Delete every challenge whose `expires_at` is before `now`.
    ///
    /// Idempotent. Returns the number of rows removed by this call.
    async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Persistence of note blocks.
///
/// A note has no row of its own; it is the set of blocks sharing
/// `(user_id, note_id)`. Chains are returned ordered by timestamp ascending,
/// ties broken by insertion order.
#[async_trait]
pub trait BlockRepository: Send + Sync {
    /// The most recent block of a note.
    async fn latest_for_note(&self, user_id: UserId, note_id: NoteId) -> Result<Option<Block>>;

    /// Every block of a note, oldest first. Empty if the note does not exist.
    async fn chain_for_note(&self, user_id: UserId, note_id: NoteId) -> Result<Vec<Block>>;

    /// Append a block to an existing note.
    ///
    /// Enforces at most one block per `(user_id, note_id, prev_hash)`; a
    /// second block linking to the same predecessor yields
    /// [`InsertResult::Conflict`]. Fails with [`crate::StoreError::NotFound`]
    /// if the note has no blocks.
    async fn append_block(
        &self,
        user_id: UserId,
        note_id: NoteId,
        block: &Block,
    ) -> Result<InsertResult>;

    /// Allocate the next note id for the user and store its first block.
    ///
    /// Allocation (`max(note_id) + 1`) and insertion are one atomic unit.
    /// Fails with [`crate::StoreError::NotFound`] if the user does not exist.
    async fn create_note_with_first_block(&self, user_id: UserId, block: &Block) -> Result<NoteId>;

    /// Delete every block of a note.
    ///
    /// Fails with [`crate::StoreError::NotFound`] if the note had no blocks.
    async fn delete_all_for_note(&self, user_id: UserId, note_id: NoteId) -> Result<()>;

    /// Title fields of the latest block of each of the user's notes, by note id.
    async fn note_titles(&self, user_id: UserId) -> Result<Vec<NoteTitle>>;
}

/// Everything the service needs from storage.
pub trait Store: UserRepository + ChallengeRepository + BlockRepository {}

impl<T: UserRepository + ChallengeRepository + BlockRepository> Store for T {}
