// Identifier normalization for everything ingested from the timing API
//
// The API is backed by a document store and is not consistent about how it
// serializes identifiers: the same meeting may arrive as `1229`, `"1229"` or
// `{"$oid": "1229"}`. Everything is normalized here, once, into canonical key
// types so the rest of the crate never inspects identifier shapes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

/// Wrapper keys used by extended-JSON document identifiers
const WRAPPED_ID_KEYS: [&str; 3] = ["$oid", "$numberLong", "$numberInt"];

macro_rules! key_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = Value::deserialize(deserializer)?;
                normalize_key(&value).map($name).ok_or_else(|| {
                    de::Error::custom(format!("unsupported identifier: {value}"))
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

key_type!(
    /// Canonical identifier of a meeting (race weekend)
    MeetingKey
);
key_type!(
    /// Canonical identifier of a session within a meeting
    SessionKey
);
key_type!(
    /// Driver number, which doubles as the driver identifier
    DriverNumber
);

/// Opaque identifier of a single stored record (e.g. a lap document).
///
/// Unlike the key types this is never used for lookups against the API, so
/// non-numeric document ids are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        normalize_record_id(&value)
            .map(RecordId)
            .ok_or_else(|| de::Error::custom(format!("unsupported record id: {value}")))
    }
}

/// Normalize an identifier that may be a number, a numeric string or a wrapped
/// `{"$oid": ...}` object into a canonical numeric key.
pub fn normalize_key(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0. && f.fract() == 0.)
                .map(|f| f as u64)
        }),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        Value::Object(map) => WRAPPED_ID_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(normalize_key),
        _ => None,
    }
}

/// Normalize a record identifier into its string form.
pub fn normalize_record_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Object(map) => WRAPPED_ID_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(normalize_record_id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_key_shapes() {
        assert_eq!(normalize_key(&json!(1229)), Some(1229));
        assert_eq!(normalize_key(&json!("1229")), Some(1229));
        assert_eq!(normalize_key(&json!(" 44 ")), Some(44));
        assert_eq!(normalize_key(&json!({"$oid": "9158"})), Some(9158));
        assert_eq!(normalize_key(&json!({"$numberLong": "9158"})), Some(9158));
        assert_eq!(normalize_key(&json!(7.0)), Some(7));
    }

    #[test]
    fn test_normalize_key_rejects_non_numeric() {
        assert_eq!(normalize_key(&json!({"$oid": "65f1c0ffee"})), None);
        assert_eq!(normalize_key(&json!(-3)), None);
        assert_eq!(normalize_key(&json!(1.5)), None);
        assert_eq!(normalize_key(&json!(null)), None);
        assert_eq!(normalize_key(&json!([1])), None);
    }

    #[test]
    fn test_key_types_deserialize_from_wrapped_ids() {
        let meeting: MeetingKey = serde_json::from_value(json!({"$oid": "1229"})).unwrap();
        assert_eq!(meeting, MeetingKey(1229));

        let session: SessionKey = serde_json::from_value(json!("9158")).unwrap();
        assert_eq!(session, SessionKey(9158));

        assert!(serde_json::from_value::<DriverNumber>(json!("lewis")).is_err());
    }

    #[test]
    fn test_record_id_keeps_document_ids() {
        let id: RecordId = serde_json::from_value(json!({"$oid": "65f1c0ffee"})).unwrap();
        assert_eq!(id, RecordId("65f1c0ffee".to_string()));

        let id: RecordId = serde_json::from_value(json!(12)).unwrap();
        assert_eq!(id.0, "12");
    }

    #[test]
    fn test_keys_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_value(SessionKey(11)).unwrap(), json!(11));
        assert_eq!(SessionKey(11).to_string(), "11");
    }
}
