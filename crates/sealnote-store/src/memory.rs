//! In-memory implementation of the repository traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sealnote_core::{
    Block, Challenge, ChallengeId, NewChallenge, NewUser, NoteId, NoteTitle, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::traits::{BlockRepository, ChallengeRepository, InsertResult, UserRepository};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// write operation holds the write lock for its whole duration, which makes
/// each one atomic.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: BTreeMap<UserId, User>,
    last_user_id: u32,

    challenges: HashMap<ChallengeId, Challenge>,
    last_challenge_id: u64,

    /// Blocks per note, in insertion order.
    notes: BTreeMap<(UserId, NoteId), Vec<Block>>,
}

impl MemoryStoreInner {
    fn note_range(&self, user_id: UserId) -> impl Iterator<Item = (&NoteId, &Vec<Block>)> {
        self.notes
            .range((user_id, NoteId(0))..=(user_id, NoteId(u32::MAX)))
            .map(|((_, note_id), blocks)| (note_id, blocks))
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Overwrite a stored block in place, bypassing every check.
    ///
    /// Exists so tests can simulate tampering with storage.
    pub fn tamper_block(
        &self,
        user_id: UserId,
        note_id: NoteId,
        index: usize,
        f: impl FnOnce(&mut Block),
    ) -> Result<()> {
        let mut inner = self.write()?;
        let block = inner
            .notes
            .get_mut(&(user_id, note_id))
            .and_then(|blocks| blocks.get_mut(index))
            .ok_or_else(|| StoreError::NotFound(format!("block {index} of note {note_id}")))?;
        f(block);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// The latest block: greatest timestamp, last inserted among equals.
fn latest(blocks: &[Block]) -> Option<&Block> {
    blocks.iter().max_by_key(|b| b.timestamp)
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<UserId> {
        let mut inner = self.write()?;

        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        inner.last_user_id += 1;
        let id = UserId(inner.last_user_id);
        inner.users.insert(id, user.clone().into_user(id));
        Ok(id)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner.users.get(&id).cloned())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut inner = self.write()?;

        if inner.users.remove(&id).is_none() {
            return Ok(false);
        }
        inner.challenges.retain(|_, c| c.user_id != id);
        inner.notes.retain(|(user_id, _), _| *user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ChallengeRepository for MemoryStore {
    async fn create_challenge(&self, challenge: &NewChallenge) -> Result<ChallengeId> {
        let mut inner = self.write()?;

        if !inner.users.contains_key(&challenge.user_id) {
            return Err(StoreError::NotFound(format!("user {}", challenge.user_id)));
        }
        if inner.challenges.values().any(|c| c.value == challenge.value) {
            return Err(StoreError::InvalidData("duplicate challenge value".into()));
        }

        inner.last_challenge_id += 1;
        let id = ChallengeId(inner.last_challenge_id);
        inner.challenges.insert(
            id,
            Challenge {
                id,
                user_id: challenge.user_id,
                value: challenge.value.clone(),
                expires_at: challenge.expires_at,
                used: false,
                created_at: challenge.created_at,
            },
        );
        Ok(id)
    }

    async fn challenge_by_value_and_email(
        &self,
        value: &str,
        email: &str,
    ) -> Result<Option<Challenge>> {
        let inner = self.read()?;

        let found = inner.challenges.values().find(|c| {
            c.value == value
                && inner
                    .users
                    .get(&c.user_id)
                    .is_some_and(|u| u.email == email)
        });
        Ok(found.cloned())
    }

    async fn delete_challenge(&self, id: ChallengeId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.challenges.remove(&id).is_some())
    }

    async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.write()?;

        let before = inner.challenges.len();
        inner.challenges.retain(|_, c| !c.is_expired(now));
        Ok((before - inner.challenges.len()) as u64)
    }
}

#[async_trait]
impl BlockRepository for MemoryStore {
    async fn latest_for_note(&self, user_id: UserId, note_id: NoteId) -> Result<Option<Block>> {
        let inner = self.read()?;
        Ok(inner
            .notes
            .get(&(user_id, note_id))
            .and_then(|blocks| latest(blocks))
            .cloned())
    }

    async fn chain_for_note(&self, user_id: UserId, note_id: NoteId) -> Result<Vec<Block>> {
        let inner = self.read()?;

        let mut chain = inner
            .notes
            .get(&(user_id, note_id))
            .cloned()
            .unwrap_or_default();
        // Stable: insertion order survives among equal timestamps.
        chain.sort_by_key(|b| b.timestamp);
        Ok(chain)
    }

    async fn append_block(
        &self,
        user_id: UserId,
        note_id: NoteId,
        block: &Block,
    ) -> Result<InsertResult> {
        let mut inner = self.write()?;

        let Some(blocks) = inner
            .notes
            .get_mut(&(user_id, note_id))
            .filter(|blocks| !blocks.is_empty())
        else {
            return Err(StoreError::NotFound(format!(
                "note {note_id} of user {user_id}"
            )));
        };
        if blocks.iter().any(|b| b.prev_hash == block.prev_hash) {
            return Ok(InsertResult::Conflict {
                prev_hash: block.prev_hash.clone(),
            });
        }

        blocks.push(block.clone());
        Ok(InsertResult::Inserted)
    }

    async fn create_note_with_first_block(&self, user_id: UserId, block: &Block) -> Result<NoteId> {
        let mut inner = self.write()?;

        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }

        let note_id = inner
            .note_range(user_id)
            .map(|(note_id, _)| *note_id)
            .max()
            .map_or(NoteId::FIRST, NoteId::next);

        inner.notes.insert((user_id, note_id), vec![block.clone()]);
        Ok(note_id)
    }

    async fn delete_all_for_note(&self, user_id: UserId, note_id: NoteId) -> Result<()> {
        let mut inner = self.write()?;

        match inner.notes.remove(&(user_id, note_id)) {
            Some(blocks) if !blocks.is_empty() => Ok(()),
            _ => Err(StoreError::NotFound(format!(
                "note {note_id} of user {user_id}"
            ))),
        }
    }

    async fn note_titles(&self, user_id: UserId) -> Result<Vec<NoteTitle>> {
        let inner = self.read()?;

        Ok(inner
            .note_range(user_id)
            .filter_map(|(note_id, blocks)| {
                latest(blocks).map(|b| NoteTitle {
                    note_id: *note_id,
                    cipher_title: b.cipher_title.clone(),
                    iv_title: b.iv_title.clone(),
                    timestamp: b.timestamp,
                })
            })
            .collect())
    }
}
