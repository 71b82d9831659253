//! Provider-style timestamp
//!
//! Stored as `{ "seconds": i64, "nanoseconds": u32 }`. Readers also accept
//! the underscore-prefixed variant, a bare number of epoch seconds and an
//! RFC 3339 string.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_secs(seconds: i64) -> Self {
        Self {
            seconds,
            nanoseconds: 0,
        }
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.seconds, self.nanoseconds)
            .single()
            .unwrap_or_default()
    }

    /// Parse any of the accepted encodings
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(obj) => {
                let seconds = obj
                    .get("seconds")
                    .or_else(|| obj.get("_seconds"))
                    .and_then(number_as_i64)?;
                let nanoseconds = obj
                    .get("nanoseconds")
                    .or_else(|| obj.get("_nanoseconds"))
                    .and_then(JsonValue::as_u64)
                    .map(|n| n.min(999_999_999) as u32)
                    .unwrap_or(0);
                Some(Self {
                    seconds,
                    nanoseconds,
                })
            }
            JsonValue::Number(_) => number_as_i64(value).map(Self::from_secs),
            JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Self::from_datetime(dt.with_timezone(&Utc))),
            _ => None,
        }
    }

    /// Whole days elapsed between this timestamp and `now`
    pub fn days_until(&self, now: DateTime<Utc>) -> i64 {
        (now - self.to_datetime()).num_days()
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({ "seconds": self.seconds, "nanoseconds": self.nanoseconds })
    }
}

fn number_as_i64(value: &JsonValue) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Self::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", value)))
    }
}

/// Deserialize an optional timestamp, treating anything unparsable as absent
pub fn lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Timestamp>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Timestamp::from_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepted_encodings() {
        let expected = Timestamp::from_secs(1_700_000_000);
        assert_eq!(Timestamp::from_json(&json!({ "seconds": 1_700_000_000 })), Some(expected));
        assert_eq!(
            Timestamp::from_json(&json!({ "_seconds": 1_700_000_000, "_nanoseconds": 0 })),
            Some(expected)
        );
        assert_eq!(Timestamp::from_json(&json!(1_700_000_000)), Some(expected));
        assert_eq!(
            Timestamp::from_json(&json!("2023-11-14T22:13:20Z")),
            Some(expected)
        );
        assert_eq!(Timestamp::from_json(&json!(null)), None);
        assert_eq!(Timestamp::from_json(&json!({ "nanoseconds": 5 })), None);
    }

    #[test]
    fn test_lenient_field() {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(default, deserialize_with = "lenient")]
            created_at: Option<Timestamp>,
        }

        let doc: Doc = serde_json::from_value(json!({ "created_at": "garbage" })).unwrap();
        assert!(doc.created_at.is_none());
        let doc: Doc = serde_json::from_value(json!({})).unwrap();
        assert!(doc.created_at.is_none());
        let doc: Doc = serde_json::from_value(json!({ "created_at": { "seconds": 10 } })).unwrap();
        assert_eq!(doc.created_at, Some(Timestamp::from_secs(10)));
    }

    #[test]
    fn test_days_until() {
        let created = Timestamp::from_secs(0);
        let now = Utc.timestamp_opt(86_400 * 91, 0).unwrap();
        assert_eq!(created.days_until(now), 91);
    }
}
