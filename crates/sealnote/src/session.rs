//! Session credentials.
//!
//! After a successful login the service mints an opaque bearer credential
//! bound to the user id with an expiry. [`SessionIssuer`] is the seam; the
//! default [`JwtSessionIssuer`] signs JWTs with a shared HMAC secret.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use sealnote_core::time::rfc3339_secs;
use sealnote_core::{HmacType, UserId};

use crate::clock::Clock;
use crate::error::Result;

/// A minted session credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    #[serde(with = "rfc3339_secs")]
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints credentials and resolves them back to a user.
pub trait SessionIssuer: Send + Sync {
    /// Mint a credential for `user_id`.
    ///
    /// `hmac_type` is the algorithm tag the user registered with; issuers
    /// may use it to pick a signing algorithm.
    fn issue(&self, user_id: UserId, hmac_type: HmacType) -> Result<SessionToken>;

    /// Resolve a credential to the user it was minted for.
    ///
    /// Fails for malformed, forged and expired credentials.
    fn resolve(&self, token: &str) -> Result<UserId>;
}

/// JWT claims of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u32,
    pub iat: i64,
    pub exp: i64,
}

/// HMAC-signed JWT sessions.
///
/// Tokens are HS256 unless `honor_hmac_type` is set, in which case users
/// registered with `hmac-sha512` get HS512. Both are accepted on resolve.
pub struct JwtSessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    honor_hmac_type: bool,
    clock: Arc<dyn Clock>,
}

impl JwtSessionIssuer {
    pub fn new(secret: &[u8], ttl: Duration, honor_hmac_type: bool, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            honor_hmac_type,
            clock,
        }
    }

    fn algorithm_for(&self, hmac_type: HmacType) -> Algorithm {
        match hmac_type {
            HmacType::HmacSha512 if self.honor_hmac_type => Algorithm::HS512,
            _ => Algorithm::HS256,
        }
    }
}

impl SessionIssuer for JwtSessionIssuer {
    fn issue(&self, user_id: UserId, hmac_type: HmacType) -> Result<SessionToken> {
        let now = self.clock.now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            user_id: user_id.get(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(self.algorithm_for(hmac_type)), &claims, &self.encoding)?;
        Ok(SessionToken { token, expires_at })
    }

    fn resolve(&self, token: &str) -> Result<UserId> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS512];
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if claims.exp <= self.clock.now().timestamp() {
            return Err(jsonwebtoken::errors::Error::from(JwtErrorKind::ExpiredSignature).into());
        }

        Ok(UserId(claims.user_id))
    }
}
