//! Shared setup for service integration tests.
//!
//! Every scenario runs against both stores: [`memory_env`] and
//! [`sqlite_env`] (an on-disk database in a temp dir).

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use sealnote::store::{MemoryStore, SqliteStore, Store};
use sealnote::{ManualClock, NoteId, Sealnote, ServiceConfig, User, UserId};
use sealnote_testkit::fixtures::{epoch, TestUser};
use tempfile::TempDir;

/// A service on a manual clock pinned to [`epoch`].
pub struct Env<S: Store> {
    pub service: Arc<Sealnote<S>>,
    pub clock: Arc<ManualClock>,
    db_path: Option<PathBuf>,
    _dir: Option<TempDir>,
}

pub fn config() -> ServiceConfig {
    ServiceConfig {
        session_secret: vec![0x5a; 32],
        ..ServiceConfig::default()
    }
}

/// Route service logs to the test harness. `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn memory_env() -> Env<MemoryStore> {
    init_tracing();
    let clock = Arc::new(ManualClock::new(epoch()));
    let service = Sealnote::with_clock(MemoryStore::new(), config(), clock.clone());
    Env {
        service: Arc::new(service),
        clock,
        db_path: None,
        _dir: None,
    }
}

pub fn sqlite_env() -> Env<SqliteStore> {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sealnote.db");
    let clock = Arc::new(ManualClock::new(epoch()));
    let service = Sealnote::with_clock(SqliteStore::open(&path).unwrap(), config(), clock.clone());
    Env {
        service: Arc::new(service),
        clock,
        db_path: Some(path),
        _dir: Some(dir),
    }
}

impl<S: Store> Env<S> {
    pub async fn register(&self, user: &TestUser) -> User {
        self.service.register_user(&user.registration()).await.unwrap()
    }
}

/// Direct writes to storage that bypass every check.
pub trait Tamper {
    /// Overwrite the ciphertext of the oldest block of a note.
    fn tamper_first_block(&self, user_id: UserId, note_id: NoteId);
}

impl Tamper for Env<MemoryStore> {
    fn tamper_first_block(&self, user_id: UserId, note_id: NoteId) {
        self.service
            .store()
            .tamper_block(user_id, note_id, 0, |b| b.ciphertext = "dGFtcGVyZWQ=".into())
            .unwrap();
    }
}

impl Tamper for Env<SqliteStore> {
    fn tamper_first_block(&self, user_id: UserId, note_id: NoteId) {
        let path = self.db_path.as_ref().unwrap();
        let conn = rusqlite::Connection::open(path).unwrap();
        let updated = conn
            .execute(
                "UPDATE blocks SET ciphertext = 'dGFtcGVyZWQ='
                 WHERE id = (SELECT MIN(id) FROM blocks WHERE user_id = ?1 AND note_id = ?2)",
                rusqlite::params![user_id.get(), note_id.get()],
            )
            .unwrap();
        assert_eq!(updated, 1);
    }
}

/// Run each listed scenario once per store on a multi-threaded runtime.
///
/// A scenario is an `async fn(Env<S>)` generic over the store.
macro_rules! for_each_store {
    ($($scenario:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $scenario() {
                    super::$scenario(super::common::memory_env()).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $scenario() {
                    super::$scenario(super::common::sqlite_env()).await;
                }
            )*
        }
    };
}
pub(crate) use for_each_store;
