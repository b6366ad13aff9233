//! The note ledger: hash-chained, signed, append-only.
//!
//! Every write re-reads and re-verifies the whole stored chain before
//! appending, so tampering with history is caught on the next write. A note
//! whose chain fails verification is frozen: every later append is refused.
//!
//! Writers of the same note are serialized twice over: by an in-process lock
//! per `(user, note)` and by the store refusing a second block with the same
//! `prev_hash`. The second guard covers processes sharing one database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use sealnote_core::time::format_rfc3339;
use sealnote_core::{
    audit_chain, block_hash, find_break, validate_block, verify_block_signature, Block,
    ChainReport, NoteId, NoteTitle, User, UserId, GENESIS_PREV_HASH,
};
use sealnote_store::{InsertResult, Store, StoreError};

use crate::clock::Clock;
use crate::error::{Result, ServiceError};

type NoteKey = (UserId, NoteId);

/// Per-note async locks, dropped once nobody holds or awaits them.
#[derive(Default)]
struct NoteLocks {
    locks: Mutex<HashMap<NoteKey, Arc<AsyncMutex<()>>>>,
}

impl NoteLocks {
    fn handle(&self, key: NoteKey) -> NoteLockHandle<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = Arc::clone(locks.entry(key).or_default());
        NoteLockHandle {
            owner: self,
            key,
            lock,
        }
    }
}

struct NoteLockHandle<'a> {
    owner: &'a NoteLocks,
    key: NoteKey,
    lock: Arc<AsyncMutex<()>>,
}

impl NoteLockHandle<'_> {
    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for NoteLockHandle<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        // The map and this handle are the only owners left.
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 2)
        {
            locks.remove(&self.key);
        }
    }
}

/// Creates, extends, reads and audits notes.
pub struct Ledger<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    max_clock_skew: Duration,
    locks: NoteLocks,
}

impl<S: Store> Ledger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, max_clock_skew: Duration) -> Self {
        Self {
            store,
            clock,
            max_clock_skew,
            locks: NoteLocks::default(),
        }
    }

    /// Start a new note with its first block.
    ///
    /// The block must link to the genesis marker and carry a valid signature
    /// by the user. Returns the allocated note id.
    pub async fn create_note(&self, user_id: UserId, block: &Block) -> Result<NoteId> {
        validate_block(block)?;
        if block.prev_hash != GENESIS_PREV_HASH {
            return Err(ServiceError::NotGenesis);
        }
        self.check_clock_skew(block.timestamp)?;

        let user = self.user(user_id).await?;
        self.check_signature(&user, block)?;

        let note_id = match self.store.create_note_with_first_block(user_id, block).await {
            Ok(note_id) => note_id,
            Err(StoreError::NotFound(_)) => return Err(ServiceError::UserNotFound(user_id)),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(user_id = %user_id, note_id = %note_id, "created note");
        Ok(note_id)
    }

    /// Append a block to an existing note.
    ///
    /// Refused if the stored chain is broken, if the block does not link to
    /// the current tail, if its timestamp precedes the tail, or if its
    /// signature does not verify.
    pub async fn append_block(&self, user_id: UserId, note_id: NoteId, block: &Block) -> Result<()> {
        validate_block(block)?;
        self.check_clock_skew(block.timestamp)?;

        let handle = self.locks.handle((user_id, note_id));
        let _guard = handle.lock().await;

        let user = self.user(user_id).await?;
        let chain = self.verified_chain(user_id, note_id).await?;
        let Some(tail) = chain.last() else {
            return Err(ServiceError::NoteNotFound(note_id));
        };

        if block.prev_hash != block_hash(tail) {
            return Err(ServiceError::StaleTail { note_id });
        }
        if block.timestamp < tail.timestamp {
            return Err(ServiceError::TimestampRejected(format!(
                "{} precedes the tail at {}",
                format_rfc3339(&block.timestamp),
                format_rfc3339(&tail.timestamp)
            )));
        }
        self.check_signature(&user, block)?;

        // The account may be deleted while this append is in flight.
        let inserted = match self.store.append_block(user_id, note_id, block).await {
            Err(StoreError::NotFound(_)) => return Err(ServiceError::NoteNotFound(note_id)),
            other => other?,
        };
        match inserted {
            InsertResult::Inserted => {
                tracing::info!(
                    user_id = %user_id,
                    note_id = %note_id,
                    length = chain.len() + 1,
                    "appended block"
                );
                Ok(())
            }
            InsertResult::Conflict { .. } => {
                tracing::warn!(user_id = %user_id, note_id = %note_id, "lost append race");
                Err(ServiceError::StaleTail { note_id })
            }
        }
    }

    /// The latest block of a note, with its signature re-checked.
    pub async fn read_note(&self, user_id: UserId, note_id: NoteId) -> Result<Block> {
        let block = self
            .store
            .latest_for_note(user_id, note_id)
            .await?
            .ok_or(ServiceError::NoteNotFound(note_id))?;

        let user = self.user(user_id).await?;
        self.check_signature(&user, &block)?;
        Ok(block)
    }

    /// The full history of a note, oldest first.
    pub async fn read_chain(&self, user_id: UserId, note_id: NoteId) -> Result<Vec<Block>> {
        let chain = self.store.chain_for_note(user_id, note_id).await?;
        if chain.is_empty() {
            return Err(ServiceError::NoteNotFound(note_id));
        }
        Ok(chain)
    }

    /// Latest title of each of the user's notes, by note id.
    pub async fn list_titles(&self, user_id: UserId) -> Result<Vec<NoteTitle>> {
        Ok(self.store.note_titles(user_id).await?)
    }

    /// Delete a note and its whole history.
    pub async fn delete_note(&self, user_id: UserId, note_id: NoteId) -> Result<()> {
        let handle = self.locks.handle((user_id, note_id));
        let _guard = handle.lock().await;

        match self.store.delete_all_for_note(user_id, note_id).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, note_id = %note_id, "deleted note");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(ServiceError::NoteNotFound(note_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify a note's chain and report on it without failing on a break.
    pub async fn audit_note(&self, user_id: UserId, note_id: NoteId) -> Result<ChainReport> {
        let chain = self.read_chain(user_id, note_id).await?;
        let report = audit_chain(&chain);
        if let Some(broken) = &report.broken {
            tracing::error!(
                user_id = %user_id,
                note_id = %note_id,
                position = broken.position,
                "note chain is broken"
            );
        }
        Ok(report)
    }

    async fn user(&self, user_id: UserId) -> Result<User> {
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))
    }

    async fn verified_chain(&self, user_id: UserId, note_id: NoteId) -> Result<Vec<Block>> {
        let chain = self.store.chain_for_note(user_id, note_id).await?;
        if let Some(broken) = find_break(&chain) {
            tracing::error!(
                user_id = %user_id,
                note_id = %note_id,
                position = broken.position,
                "refusing append to broken chain"
            );
            return Err(ServiceError::ChainBroken {
                note_id,
                position: broken.position,
            });
        }
        Ok(chain)
    }

    fn check_signature(&self, user: &User, block: &Block) -> Result<()> {
        if !verify_block_signature(&user.public_key, block)? {
            tracing::warn!(user_id = %user.id, "block signature did not verify");
            return Err(ServiceError::SignatureInvalid);
        }
        Ok(())
    }

    fn check_clock_skew(&self, timestamp: DateTime<Utc>) -> Result<()> {
        let now = self.clock.now();
        if (timestamp - now).abs() > self.max_clock_skew {
            return Err(ServiceError::TimestampRejected(format!(
                "{} is too far from server time {}",
                format_rfc3339(&timestamp),
                format_rfc3339(&now)
            )));
        }
        Ok(())
    }
}
