//! The service facade: one value wiring every component together.

use std::sync::Arc;

use sealnote_core::{
    Block, ChainReport, IssuedChallenge, LoginRequest, NoteId, NoteTitle, Registration, User,
    UserId,
};
use sealnote_store::{SqliteStore, Store};

use crate::auth::{Authenticator, LoginOutcome};
use crate::challenge::ChallengeManager;
use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::session::{JwtSessionIssuer, SessionIssuer};

/// The sealnote service.
///
/// Owns the store and every component built on it. All dependencies are
/// passed in at construction; nothing is process-global.
pub struct Sealnote<S: Store> {
    store: Arc<S>,
    config: ServiceConfig,
    challenges: Arc<ChallengeManager<S>>,
    auth: Authenticator<S>,
    ledger: Ledger<S>,
}

impl Sealnote<SqliteStore> {
    /// Open the configured SQLite database and build the service on it.
    pub fn open(config: ServiceConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.database_path)?;
        Ok(Self::new(store, config))
    }
}

impl<S: Store> Sealnote<S> {
    /// Create a service on the wall clock with JWT sessions.
    pub fn new(store: S, config: ServiceConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a service on an explicit clock.
    pub fn with_clock(store: S, config: ServiceConfig, clock: Arc<dyn Clock>) -> Self {
        let sessions = Arc::new(JwtSessionIssuer::new(
            &config.session_secret,
            config.session_ttl,
            config.honor_hmac_type,
            clock.clone(),
        ));
        Self::with_parts(store, config, clock, sessions)
    }

    /// Create a service from explicit parts.
    pub fn with_parts(
        store: S,
        config: ServiceConfig,
        clock: Arc<dyn Clock>,
        sessions: Arc<dyn SessionIssuer>,
    ) -> Self {
        let store = Arc::new(store);
        let challenges = Arc::new(ChallengeManager::new(
            store.clone(),
            clock.clone(),
            config.challenge_ttl,
        ));
        let auth = Authenticator::new(store.clone(), challenges.clone(), sessions, clock.clone());
        let ledger = Ledger::new(store.clone(), clock, config.max_clock_skew);

        Self {
            store,
            config,
            challenges,
            auth,
            ledger,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn challenges(&self) -> &ChallengeManager<S> {
        &self.challenges
    }

    pub fn auth(&self) -> &Authenticator<S> {
        &self.auth
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn register_user(&self, registration: &Registration) -> Result<User> {
        self.auth.register_user(registration).await
    }

    pub async fn issue_challenge(&self, email: &str) -> Result<IssuedChallenge> {
        self.challenges.issue(email).await
    }

    pub async fn complete_login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        self.auth.complete_login(request).await
    }

    pub fn resolve_session(&self, token: &str) -> Result<UserId> {
        self.auth.resolve_session(token)
    }

    pub async fn delete_account(&self, user_id: UserId) -> Result<()> {
        self.auth.delete_account(user_id).await
    }

    pub async fn sweep_expired(&self) -> Result<u64> {
        self.challenges.sweep_expired().await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notes
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_note(&self, user_id: UserId, block: &Block) -> Result<NoteId> {
        self.ledger.create_note(user_id, block).await
    }

    pub async fn append_block(&self, user_id: UserId, note_id: NoteId, block: &Block) -> Result<()> {
        self.ledger.append_block(user_id, note_id, block).await
    }

    pub async fn read_note(&self, user_id: UserId, note_id: NoteId) -> Result<Block> {
        self.ledger.read_note(user_id, note_id).await
    }

    pub async fn read_chain(&self, user_id: UserId, note_id: NoteId) -> Result<Vec<Block>> {
        self.ledger.read_chain(user_id, note_id).await
    }

    pub async fn list_titles(&self, user_id: UserId) -> Result<Vec<NoteTitle>> {
        self.ledger.list_titles(user_id).await
    }

    pub async fn delete_note(&self, user_id: UserId, note_id: NoteId) -> Result<()> {
        self.ledger.delete_note(user_id, note_id).await
    }

    pub async fn audit_note(&self, user_id: UserId, note_id: NoteId) -> Result<ChainReport> {
        self.ledger.audit_note(user_id, note_id).await
    }
}
