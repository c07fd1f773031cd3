//! Message timestamps.
//!
//! Timestamps are epoch milliseconds in memory. The backend has sent them both
//! as integers and as RFC 3339 strings (`2024-05-01T12:00:00.000Z`), so the
//! deserializer accepts either and normalises to milliseconds. Serialization
//! always writes the integer form.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serializer, de};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(u64),
    Text(String),
}

/// Parse an RFC 3339 string into epoch milliseconds.
///
/// Returns `None` for unparsable input and for instants before the epoch.
pub fn parse_rfc3339(text: &str) -> Option<u64> {
    let parsed = DateTime::parse_from_rfc3339(text).ok()?;
    u64::try_from(parsed.timestamp_millis()).ok()
}

/// Serde `serialize_with` helper.
pub fn serialize<S: Serializer>(millis: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(*millis)
}

/// Serde `deserialize_with` helper.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(millis) => Ok(millis),
        RawTimestamp::Text(text) => parse_rfc3339(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {text}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_iso_string() {
        assert_eq!(parse_rfc3339("1970-01-01T00:00:01.500Z"), Some(1500));
    }

    #[test]
    fn parses_offset_iso_string() {
        assert_eq!(parse_rfc3339("1970-01-01T01:00:02+01:00"), Some(2000));
    }

    #[test]
    fn rejects_pre_epoch_and_garbage() {
        assert_eq!(parse_rfc3339("1969-12-31T23:59:59Z"), None);
        assert_eq!(parse_rfc3339("yesterday"), None);
    }
}
