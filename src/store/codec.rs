//! The single boundary between persisted timestamp text and `DateTime<Utc>`.
//!
//! Timestamps are written as RFC 3339 UTC with microsecond precision and a
//! `Z` suffix. The fixed width keeps stored values byte-comparable, which the
//! renewal compare-and-swap relies on.

use super::StoreError;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Truncate to the precision the store persists.
pub fn normalize_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    normalize_timestamp(ts).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts any RFC 3339 offset and converts to UTC.
pub fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| normalize_timestamp(ts.with_timezone(&Utc)))
        .map_err(|err| StoreError::Corrupt(format!("invalid timestamp {raw:?}: {err}")))
}

pub(super) fn encode_optional(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(encode_timestamp)
}

pub(super) fn decode_optional(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.filter(|value| !value.trim().is_empty())
        .map(decode_timestamp)
        .transpose()
}
