//! Service configuration loaded from environment variables.
//!
//! Every setting has a default so the service starts with zero
//! configuration for local development. Invalid values are logged and
//! ignored rather than aborting startup.

use std::fmt;
use std::path::PathBuf;

use chrono::Duration;
use sealnote_core::crypto::{decode_base64, random_bytes};

/// Minimum decoded length of the session signing secret.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

/// Service configuration.
#[derive(Clone)]
pub struct ServiceConfig {
    /// SQLite database file.
    /// Env: `SEALNOTE_DATABASE_PATH`
    /// Default: `sealnote.db`
    pub database_path: PathBuf,

    /// Lifetime of a login challenge.
    /// Env: `SEALNOTE_CHALLENGE_TTL_SECS`
    /// Default: 300
    pub challenge_ttl: Duration,

    /// Lifetime of a session credential.
    /// Env: `SEALNOTE_SESSION_TTL_SECS`
    /// Default: 3600
    pub session_ttl: Duration,

    /// HMAC key for session credentials.
    /// Env: `SEALNOTE_SESSION_SECRET` (base64, at least 32 bytes)
    /// Default: random per process, so sessions do not survive a restart.
    pub session_secret: Vec<u8>,

    /// Sign sessions with HS512 for users registered with `hmac-sha512`.
    /// Env: `SEALNOTE_HONOR_HMAC_TYPE` (true/false)
    /// Default: `false`, every session is HS256.
    pub honor_hmac_type: bool,

    /// How far a client-proposed block timestamp may be from the server clock.
    /// Env: `SEALNOTE_MAX_CLOCK_SKEW_SECS`
    /// Default: 300
    pub max_clock_skew: Duration,

    /// Default log filter for binaries. `RUST_LOG` takes precedence.
    /// Env: `SEALNOTE_LOG_LEVEL`
    /// Default: `info`
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("sealnote.db"),
            challenge_ttl: Duration::minutes(5),
            session_ttl: Duration::hours(1),
            session_secret: random_bytes::<MIN_SESSION_SECRET_BYTES>().to_vec(),
            honor_hmac_type: false,
            max_clock_skew: Duration::minutes(5),
            log_level: "info".to_string(),
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("database_path", &self.database_path)
            .field("challenge_ttl", &self.challenge_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("session_secret", &"<redacted>")
            .field("honor_hmac_type", &self.honor_hmac_type)
            .field("max_clock_skew", &self.max_clock_skew)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("SEALNOTE_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(ttl) = seconds(&lookup, "SEALNOTE_CHALLENGE_TTL_SECS") {
            config.challenge_ttl = ttl;
        }

        if let Some(ttl) = seconds(&lookup, "SEALNOTE_SESSION_TTL_SECS") {
            config.session_ttl = ttl;
        }

        match lookup("SEALNOTE_SESSION_SECRET") {
            Some(value) => match parse_secret(&value) {
                Ok(secret) => config.session_secret = secret,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid SEALNOTE_SESSION_SECRET, using a random secret");
                }
            },
            None => {
                tracing::warn!("SEALNOTE_SESSION_SECRET not set, sessions will not survive a restart");
            }
        }

        if let Some(value) = lookup("SEALNOTE_HONOR_HMAC_TYPE") {
            match parse_bool(&value) {
                Some(flag) => config.honor_hmac_type = flag,
                None => tracing::warn!(value = %value, "Invalid SEALNOTE_HONOR_HMAC_TYPE, using default"),
            }
        }

        if let Some(skew) = seconds(&lookup, "SEALNOTE_MAX_CLOCK_SKEW_SECS") {
            config.max_clock_skew = skew;
        }

        if let Some(level) = lookup("SEALNOTE_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<Duration> {
    let value = lookup(name)?;
    match value.trim().parse::<u32>() {
        Ok(secs) if secs > 0 => Some(Duration::seconds(i64::from(secs))),
        _ => {
            tracing::warn!(variable = name, value = %value, "Invalid duration, using default");
            None
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_secret(value: &str) -> Result<Vec<u8>, String> {
    let secret = decode_base64("session_secret", value.trim()).map_err(|e| e.to_string())?;
    if secret.len() < MIN_SESSION_SECRET_BYTES {
        return Err(format!(
            "expected at least {MIN_SESSION_SECRET_BYTES} bytes, got {}",
            secret.len()
        ));
    }
    Ok(secret)
}
