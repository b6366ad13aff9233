//! Registration and challenge-response login.
//!
//! Login never sees a long-term secret. The client proves possession of its
//! Ed25519 key by signing the decoded bytes of a fresh challenge; the server
//! checks the signature against the registered public key, burns the
//! challenge and mints a session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sealnote_core::validation::{normalize_email, validate_login_request};
use sealnote_core::{validate_registration, verify_signature, LoginRequest, Registration, User, UserId};
use sealnote_store::Store;

use crate::challenge::ChallengeManager;
use crate::clock::Clock;
use crate::error::{Result, ServiceError};
use crate::session::{SessionIssuer, SessionToken};

/// A completed login: the account and its fresh session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub user: User,
    pub session: SessionToken,
}

/// Registers accounts and completes logins.
pub struct Authenticator<S: Store> {
    store: Arc<S>,
    challenges: Arc<ChallengeManager<S>>,
    sessions: Arc<dyn SessionIssuer>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> Authenticator<S> {
    pub fn new(
        store: Arc<S>,
        challenges: Arc<ChallengeManager<S>>,
        sessions: Arc<dyn SessionIssuer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            challenges,
            sessions,
            clock,
        }
    }

    /// Validate and persist a new account.
    pub async fn register_user(&self, registration: &Registration) -> Result<User> {
        let new_user = validate_registration(registration)?;
        let id = self.store.create_user(&new_user).await?;

        tracing::info!(user_id = %id, "registered user");
        Ok(new_user.into_user(id))
    }

    /// Complete a login with a signed challenge.
    ///
    /// A bad signature leaves the challenge in place; only a successful
    /// login consumes it.
    pub async fn complete_login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        // 1. Shape checks, before storage
        validate_login_request(request)?;
        let email = normalize_email(&request.email);

        // 2. Challenge state
        let challenge = self.challenges.lookup(&request.challenge, &email).await?;
        if challenge.is_expired(self.clock.now()) {
            tracing::warn!(challenge_id = %challenge.id, "rejected expired challenge");
            return Err(ServiceError::ChallengeExpired);
        }
        if challenge.used {
            return Err(ServiceError::ChallengeAlreadyUsed);
        }

        // 3. Proof of key possession
        let user = self
            .store
            .user_by_id(challenge.user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(challenge.user_id))?;

        match verify_signature(&user.public_key, &request.challenge, &request.signature) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(user_id = %user.id, "login signature did not verify");
                return Err(ServiceError::SignatureInvalid);
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, field = e.field(), "malformed login signature");
                return Err(ServiceError::SignatureInvalid);
            }
        }

        // 4. Burn the challenge; a concurrent login may have beaten us to it
        if !self.challenges.consume(challenge.id).await? {
            tracing::warn!(challenge_id = %challenge.id, "challenge consumed concurrently");
            return Err(ServiceError::ChallengeAlreadyUsed);
        }

        let session = self.sessions.issue(user.id, user.hmac_type)?;
        tracing::info!(user_id = %user.id, "login completed");

        Ok(LoginOutcome { user, session })
    }

    /// Delete an account with all its challenges and notes.
    pub async fn delete_account(&self, user_id: UserId) -> Result<()> {
        if !self.store.delete_user(user_id).await? {
            return Err(ServiceError::UserNotFound(user_id));
        }

        tracing::info!(user_id = %user_id, "deleted account");
        Ok(())
    }

    /// Resolve a session credential to its user.
    pub fn resolve_session(&self, token: &str) -> Result<UserId> {
        self.sessions.resolve(token)
    }
}
