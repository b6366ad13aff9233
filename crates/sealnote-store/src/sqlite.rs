//! SQLite implementation of the repository traits.
//!
//! This is the primary storage backend for sealnote. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, OptionalExtension, TransactionBehavior};

use sealnote_core::{
    Block, Challenge, ChallengeId, NewChallenge, NewUser, NoteId, NoteTitle, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{BlockRepository, ChallengeRepository, InsertResult, UserRepository};

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const BLOCK_COLUMNS: &str =
    "prev_hash, iv, iv_title, cipher_title, ciphertext, mac, signature, timestamp";

const USER_COLUMNS: &str = "id, name, email, public_key, login_salt, encryption_salt, hmac_salt, \
                            hmac_type, encryption_type";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;

        let applied = migration::migrate(&mut conn)?;
        if applied > 0 {
            tracing::info!(applied, "database schema migrated");
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The schema version of the open database.
    pub async fn schema_version(&self) -> Result<u32> {
        self.run(|conn| migration::current_version(conn)).await
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await?
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

fn missing_user(user_id: UserId) -> StoreError {
    StoreError::NotFound(format!("user {user_id}"))
}

fn note_exists(conn: &Connection, user_id: UserId, note_id: NoteId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM blocks WHERE user_id = ?1 AND note_id = ?2)",
        params![user_id.0, note_id.0],
        |row| row.get(0),
    )
}

fn secs_to_datetime(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

fn millis_to_datetime(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

fn parse_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// Helper to convert a row selected with BLOCK_COLUMNS to a Block
fn row_to_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        prev_hash: row.get(0)?,
        iv: row.get(1)?,
        iv_title: row.get(2)?,
        cipher_title: row.get(3)?,
        ciphertext: row.get(4)?,
        mac: row.get(5)?,
        signature: row.get(6)?,
        timestamp: secs_to_datetime(7, row.get(7)?)?,
    })
}

// Helper to convert a row selected with USER_COLUMNS to a User
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        public_key: row.get(3)?,
        login_salt: row.get(4)?,
        encryption_salt: row.get(5)?,
        hmac_salt: row.get(6)?,
        hmac_type: parse_column(7, row.get(7)?)?,
        encryption_type: parse_column(8, row.get(8)?)?,
    })
}

fn row_to_challenge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        id: ChallengeId(row.get::<_, i64>(0)? as u64),
        user_id: UserId(row.get(1)?),
        value: row.get(2)?,
        expires_at: millis_to_datetime(3, row.get(3)?)?,
        used: row.get(4)?,
        created_at: millis_to_datetime(5, row.get(5)?)?,
    })
}

fn insert_block(conn: &Connection, user_id: UserId, note_id: NoteId, block: &Block) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO blocks (user_id, note_id, {BLOCK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            user_id.0,
            note_id.0,
            block.prev_hash,
            block.iv,
            block.iv_title,
            block.cipher_title,
            block.ciphertext,
            block.mac,
            block.signature,
            block.timestamp.timestamp(),
        ],
    )
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn create_user(&self, user: &NewUser) -> Result<UserId> {
        let user = user.clone();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO users (
                    name, email, public_key, login_salt, encryption_salt, hmac_salt,
                    hmac_type, encryption_type, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.name,
                    user.email,
                    user.public_key,
                    user.login_salt,
                    user.encryption_salt,
                    user.hmac_salt,
                    user.hmac_type.as_str(),
                    user.encryption_type.as_str(),
                    Utc::now().timestamp_millis(),
                ],
            );

            match inserted {
                Ok(_) => Ok(UserId(conn.last_insert_rowid() as u32)),
                Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateEmail),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>> {
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.0],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM blocks WHERE user_id = ?1", params![id.0])?;
            tx.execute("DELETE FROM challenges WHERE user_id = ?1", params![id.0])?;
            let removed = tx.execute("DELETE FROM users WHERE id = ?1", params![id.0])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl ChallengeRepository for SqliteStore {
    async fn create_challenge(&self, challenge: &NewChallenge) -> Result<ChallengeId> {
        let challenge = challenge.clone();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO challenges (user_id, challenge_value, expires_at, used, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![
                    challenge.user_id.0,
                    challenge.value,
                    challenge.expires_at.timestamp_millis(),
                    challenge.created_at.timestamp_millis(),
                ],
            );

            match inserted {
                Ok(_) => Ok(ChallengeId(conn.last_insert_rowid() as u64)),
                Err(e) if is_foreign_key_violation(&e) => Err(missing_user(challenge.user_id)),
                Err(e) if is_unique_violation(&e) => {
                    Err(StoreError::InvalidData("duplicate challenge value".into()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn challenge_by_value_and_email(
        &self,
        value: &str,
        email: &str,
    ) -> Result<Option<Challenge>> {
        let value = value.to_string();
        let email = email.to_string();

        self.run(move |conn| {
            conn.query_row(
                "SELECT c.id, c.user_id, c.challenge_value, c.expires_at, c.used, c.created_at
                 FROM challenges c
                 JOIN users u ON u.id = c.user_id
                 WHERE c.challenge_value = ?1 AND u.email = ?2",
                params![value, email],
                row_to_challenge,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_challenge(&self, id: ChallengeId) -> Result<bool> {
        self.run(move |conn| {
            let removed = conn.execute("DELETE FROM challenges WHERE id = ?1", params![id.0 as i64])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> Result<u64> {
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM challenges WHERE expires_at < ?1",
                params![now.timestamp_millis()],
            )?;
            Ok(removed as u64)
        })
        .await
    }
}

#[async_trait]
impl BlockRepository for SqliteStore {
    async fn latest_for_note(&self, user_id: UserId, note_id: NoteId) -> Result<Option<Block>> {
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM blocks
                     WHERE user_id = ?1 AND note_id = ?2
                     ORDER BY timestamp DESC, id DESC
                     LIMIT 1"
                ),
                params![user_id.0, note_id.0],
                row_to_block,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn chain_for_note(&self, user_id: UserId, note_id: NoteId) -> Result<Vec<Block>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BLOCK_COLUMNS} FROM blocks
                 WHERE user_id = ?1 AND note_id = ?2
                 ORDER BY timestamp ASC, id ASC"
            ))?;
            let blocks = stmt
                .query_map(params![user_id.0, note_id.0], row_to_block)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(blocks)
        })
        .await
    }

    async fn append_block(
        &self,
        user_id: UserId,
        note_id: NoteId,
        block: &Block,
    ) -> Result<InsertResult> {
        let block = block.clone();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !note_exists(&tx, user_id, note_id)? {
                return Err(StoreError::NotFound(format!(
                    "note {note_id} of user {user_id}"
                )));
            }

            // Only the (user, note, prev_hash) key is a lost race; anything
            // else is a real failure.
            let result = match insert_block(&tx, user_id, note_id, &block) {
                Ok(_) => InsertResult::Inserted,
                Err(e) if is_unique_violation(&e) => InsertResult::Conflict {
                    prev_hash: block.prev_hash,
                },
                Err(e) => return Err(e.into()),
            };
            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn create_note_with_first_block(&self, user_id: UserId, block: &Block) -> Result<NoteId> {
        let block = block.clone();

        self.run(move |conn| {
            // IMMEDIATE takes the write lock up front so no other connection
            // can allocate the same id between the read and the insert.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let note_id: u32 = tx.query_row(
                "SELECT COALESCE(MAX(note_id), 0) + 1 FROM blocks WHERE user_id = ?1",
                params![user_id.0],
                |row| row.get(0),
            )?;
            match insert_block(&tx, user_id, NoteId(note_id), &block) {
                Ok(_) => {}
                Err(e) if is_foreign_key_violation(&e) => return Err(missing_user(user_id)),
                Err(e) => return Err(e.into()),
            }
            tx.commit()?;
            Ok(NoteId(note_id))
        })
        .await
    }

    async fn delete_all_for_note(&self, user_id: UserId, note_id: NoteId) -> Result<()> {
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM blocks WHERE user_id = ?1 AND note_id = ?2",
                params![user_id.0, note_id.0],
            )?;
            if removed == 0 {
                return Err(StoreError::NotFound(format!(
                    "note {note_id} of user {user_id}"
                )));
            }
            Ok(())
        })
        .await
    }

    async fn note_titles(&self, user_id: UserId) -> Result<Vec<NoteTitle>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT b.note_id, b.cipher_title, b.iv_title, b.timestamp
                 FROM blocks b
                 WHERE b.user_id = ?1
                   AND b.id = (
                       SELECT latest.id FROM blocks latest
                       WHERE latest.user_id = b.user_id AND latest.note_id = b.note_id
                       ORDER BY latest.timestamp DESC, latest.id DESC
                       LIMIT 1
                   )
                 ORDER BY b.note_id",
            )?;
            let titles = stmt
                .query_map(params![user_id.0], |row| {
                    Ok(NoteTitle {
                        note_id: NoteId(row.get(0)?),
                        cipher_title: row.get(1)?,
                        iv_title: row.get(2)?,
                        timestamp: secs_to_datetime(3, row.get(3)?)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(titles)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sealnote_core::{BlockBuilder, EncryptionType, HmacType, Keypair};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            public_key: Keypair::generate().public_key().to_base64(),
            login_salt: "bG9naW4=".into(),
            encryption_salt: "ZW5j".into(),
            hmac_salt: "aG1hYw==".into(),
            hmac_type: HmacType::HmacSha512,
            encryption_type: EncryptionType::Aes128Ctr,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_user_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let new = new_user("a@b.c");
        let id = store.create_user(&new).await.unwrap();

        let by_email = store.user_by_email("a@b.c").await.unwrap().unwrap();
        assert_eq!(by_email, new.clone().into_user(id));
        assert_eq!(store.user_by_id(id).await.unwrap(), Some(by_email));
        assert!(store.user_by_email("nobody@b.c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let store = SqliteStore::open_memory().unwrap();
        store.create_user(&new_user("a@b.c")).await.unwrap();
        let err = store.create_user(&new_user("a@b.c")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_challenge_lifecycle() {
        let store = SqliteStore::open_memory().unwrap();
        let user_id = store.create_user(&new_user("a@b.c")).await.unwrap();

        let live = store
            .create_challenge(&NewChallenge {
                user_id,
                value: "live".into(),
                expires_at: t0() + Duration::minutes(5),
                created_at: t0(),
            })
            .await
            .unwrap();
        store
            .create_challenge(&NewChallenge {
                user_id,
                value: "stale".into(),
                expires_at: t0() - Duration::minutes(1),
                created_at: t0() - Duration::minutes(6),
            })
            .await
            .unwrap();

        let found = store
            .challenge_by_value_and_email("live", "a@b.c")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, live);
        assert_eq!(found.expires_at, t0() + Duration::minutes(5));
        assert!(!found.used);

        assert_eq!(store.delete_expired_challenges(t0()).await.unwrap(), 1);
        assert_eq!(store.delete_expired_challenges(t0()).await.unwrap(), 0);

        assert!(store.delete_challenge(live).await.unwrap());
        assert!(!store.delete_challenge(live).await.unwrap());
        assert!(store
            .challenge_by_value_and_email("live", "a@b.c")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_note_allocation_and_chain() {
        let store = SqliteStore::open_memory().unwrap();
        let kp = Keypair::generate();
        let user = store.create_user(&new_user("a@b.c")).await.unwrap();

        let first = BlockBuilder::genesis().ciphertext("YQ==").timestamp(t0()).sign(&kp);
        let note = store.create_note_with_first_block(user, &first).await.unwrap();
        assert_eq!(note, NoteId(1));

        let second = BlockBuilder::after(&first)
            .ciphertext("Yg==")
            .timestamp(t0() + Duration::seconds(10))
            .sign(&kp);
        assert_eq!(
            store.append_block(user, note, &second).await.unwrap(),
            InsertResult::Inserted
        );

        let fork = BlockBuilder::after(&first).ciphertext("Yw==").sign(&kp);
        assert!(matches!(
            store.append_block(user, note, &fork).await.unwrap(),
            InsertResult::Conflict { .. }
        ));

        let chain = store.chain_for_note(user, note).await.unwrap();
        assert_eq!(chain, vec![first.clone(), second.clone()]);
        assert_eq!(store.latest_for_note(user, note).await.unwrap(), Some(second));

        let other = store.create_note_with_first_block(user, &first).await.unwrap();
        assert_eq!(other, NoteId(2));
    }

    #[tokio::test]
    async fn test_note_titles_and_delete() {
        let store = SqliteStore::open_memory().unwrap();
        let kp = Keypair::generate();
        let user = store.create_user(&new_user("a@b.c")).await.unwrap();

        let first = BlockBuilder::genesis()
            .cipher_title("b2xk")
            .timestamp(t0())
            .sign(&kp);
        let note = store.create_note_with_first_block(user, &first).await.unwrap();
        let renamed = BlockBuilder::after(&first)
            .cipher_title("bmV3")
            .iv_title("aXY=")
            .timestamp(t0() + Duration::seconds(1))
            .sign(&kp);
        store.append_block(user, note, &renamed).await.unwrap();

        let titles = store.note_titles(user).await.unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].note_id, note);
        assert_eq!(titles[0].cipher_title, "bmV3");
        assert_eq!(titles[0].iv_title, "aXY=");

        store.delete_all_for_note(user, note).await.unwrap();
        assert!(matches!(
            store.delete_all_for_note(user, note).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.note_titles(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_note_allocation() {
        let store = Arc::new(SqliteStore::open_memory().unwrap());
        let kp = Keypair::generate();
        let user = store.create_user(&new_user("a@b.c")).await.unwrap();
        let block = BlockBuilder::genesis().sign(&kp);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let block = block.clone();
                tokio::spawn(async move { store.create_note_with_first_block(user, &block).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().0);
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sealnote.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            store.create_user(&new_user("a@b.c")).await.unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.schema_version().await.unwrap(), migration::CURRENT_VERSION);
        assert_eq!(store.user_by_email("a@b.c").await.unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn test_writes_need_existing_user_and_note() {
        let store = SqliteStore::open_memory().unwrap();
        let kp = Keypair::generate();
        let first = BlockBuilder::genesis().timestamp(t0()).sign(&kp);

        // A missing owner is an error, never a lost race
        let err = store.append_block(UserId(999), NoteId(1), &first).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        let err = store
            .create_note_with_first_block(UserId(999), &first)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        let err = store
            .create_challenge(&NewChallenge {
                user_id: UserId(999),
                value: "v".into(),
                expires_at: t0() + Duration::minutes(5),
                created_at: t0(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let user = store.create_user(&new_user("a@b.c")).await.unwrap();
        let err = store.append_block(user, NoteId(1), &first).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.note_titles(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let store = SqliteStore::open_memory().unwrap();
        let kp = Keypair::generate();
        let user = store.create_user(&new_user("a@b.c")).await.unwrap();
        store
            .create_note_with_first_block(user, &BlockBuilder::genesis().sign(&kp))
            .await
            .unwrap();

        assert!(store.delete_user(user).await.unwrap());
        assert!(store.chain_for_note(user, NoteId(1)).await.unwrap().is_empty());
        assert!(store.user_by_id(user).await.unwrap().is_none());
        assert!(!store.delete_user(user).await.unwrap());
    }
}
