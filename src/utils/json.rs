// src/utils/json.rs
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::errors::{TrackingError, TrackingResult};

/// Lower-cases object keys and strips underscores, recursively.
///
/// Backend payloads arrive in camelCase, PascalCase or snake_case depending on
/// the serializer; after normalisation `rideId`, `RideId` and `ride_id` are all
/// `rideid`.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let normalized: Map<String, Value> = map
                .into_iter()
                .map(|(key, value)| (normalize_key(&key), normalize_keys(value)))
                .collect();
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parses a JSON body with case-insensitive property matching.
pub fn from_slice_case_insensitive<T: DeserializeOwned>(body: &[u8]) -> TrackingResult<T> {
    let raw: Value = serde_json::from_slice(body)?;
    Ok(serde_json::from_value(normalize_keys(raw))?)
}

/// `deserialize_with` helper: an explicit JSON `null` becomes `T::default()`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 timestamps and offset-less ISO 8601 (assumed UTC).
pub fn parse_utc_timestamp(raw: &str) -> TrackingResult<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TrackingError::InvalidFormat("empty timestamp".to_string()));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))?;
    Ok(naive.and_utc())
}
