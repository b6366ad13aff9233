//! One-time login challenges.
//!
//! A challenge is issued, then either consumed by a successful login or
//! swept after it expires. Consumption and sweeping both delete the row, so
//! whichever runs first wins and the other is a no-op.

use std::sync::Arc;

use chrono::Duration;
use sealnote_core::crypto::random_base64;
use sealnote_core::validation::{normalize_email, validate_email};
use sealnote_core::{Challenge, ChallengeId, IssuedChallenge, NewChallenge};
use sealnote_store::Store;

use crate::clock::Clock;
use crate::error::{Result, ServiceError};

/// Random bytes in a challenge value, and in a decoy login salt.
pub const CHALLENGE_BYTES: usize = 32;

/// Issues, looks up, consumes and sweeps login challenges.
pub struct ChallengeManager<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<S: Store> ChallengeManager<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Issue a challenge for `email`.
    ///
    /// Unknown emails get a response of the same shape with a random salt and
    /// nothing persisted, so the response does not reveal whether the account
    /// exists.
    pub async fn issue(&self, email: &str) -> Result<IssuedChallenge> {
        let email = normalize_email(email);
        validate_email(&email)?;

        // Both paths draw the same random material.
        let value = random_base64::<CHALLENGE_BYTES>();
        let decoy_salt = random_base64::<CHALLENGE_BYTES>();
        let now = self.clock.now();
        let expires_at = now + self.ttl;

        // The decoy skips the insert, so it answers one write faster than a
        // real issuance. Hiding that needs a constant-time response in front
        // of this call, not a dummy row here.
        let Some(user) = self.store.user_by_email(&email).await? else {
            tracing::debug!("issued decoy challenge");
            return Ok(IssuedChallenge {
                challenge: value,
                login_salt: decoy_salt,
                expires_at,
            });
        };

        let id = self
            .store
            .create_challenge(&NewChallenge {
                user_id: user.id,
                value: value.clone(),
                expires_at,
                created_at: now,
            })
            .await?;
        tracing::debug!(user_id = %user.id, challenge_id = %id, "issued challenge");

        Ok(IssuedChallenge {
            challenge: value,
            login_salt: user.login_salt,
            expires_at,
        })
    }

    /// Find a challenge by value, bound to the account with `email`.
    pub async fn lookup(&self, value: &str, email: &str) -> Result<Challenge> {
        self.store
            .challenge_by_value_and_email(value, &normalize_email(email))
            .await?
            .ok_or(ServiceError::ChallengeNotFound)
    }

    /// Delete a challenge. Returns `true` only for the caller that removed it.
    pub async fn consume(&self, id: ChallengeId) -> Result<bool> {
        Ok(self.store.delete_challenge(id).await?)
    }

    /// Delete every expired challenge. Returns how many were removed.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let removed = self.store.delete_expired_challenges(self.clock.now()).await?;
        tracing::info!(removed, "swept expired challenges");
        Ok(removed)
    }
}
