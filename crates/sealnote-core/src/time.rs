//! Timestamp wire format.
//!
//! Every instant crosses the wire as RFC3339 with whole seconds and a `Z`
//! suffix (`2024-05-01T12:00:00Z`). That string is part of both the block
//! hash input and the block signature input, so sub-second precision is
//! dropped as soon as a timestamp enters the system.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Format an instant as RFC3339, second precision, `Z` suffix.
pub fn format_rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse any RFC3339 instant, normalized to UTC and truncated to seconds.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| truncate(ts.with_timezone(&Utc)))
}

/// Drop sub-second precision.
pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(0)
}

/// Serde adapter for `#[serde(with = "...")]` on `DateTime<Utc>` fields.
pub mod rfc3339_secs {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_rfc3339(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_rfc3339(&s).map_err(serde::de::Error::custom)
    }
}
