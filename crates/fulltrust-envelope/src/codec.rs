//! Byte-level conversion between JSON text and [`Envelope`] values.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::value::RawValue;
use thiserror::Error;

use crate::{Envelope, Map, Timestamp, Value};

const ROOT_PATH: &str = "$";

/// Errors raised by [`decode`] and [`encode`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bytes were not well-formed JSON.
    #[error("malformed envelope: {source}")]
    Syntax {
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// The top-level value was not an object.
    #[error("envelope must be a JSON object, found {found}")]
    InvalidTopLevel {
        /// JSON kind found at the top level.
        found: &'static str,
    },
    /// An object key was empty or whitespace-only.
    #[error("object at {path} has an empty key")]
    MissingKey {
        /// Location of the offending object.
        path: String,
    },
    /// An object repeated one of its keys.
    #[error("object at {path} repeats key '{key}'")]
    DuplicateKey {
        /// Location of the offending object.
        path: String,
        /// The repeated key.
        key: String,
    },
    /// A token had no representation in the value model.
    #[error("unsupported token at {path}: {token}")]
    UnsupportedToken {
        /// Location of the token.
        path: String,
        /// The token as it appeared in the input.
        token: String,
    },
    /// Serialising an envelope failed.
    #[error("failed to encode envelope: {source}")]
    Encode {
        /// Serialiser failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Decodes a JSON object into an [`Envelope`].
///
/// String tokens that parse as date/time literals become
/// [`Value::Timestamp`]; numbers become [`Value::Integer`] when they fit a
/// signed 64-bit integer and [`Value::Decimal`] otherwise. Numbers are read
/// from their literal digits, never through a binary float.
///
/// # Errors
///
/// Returns [`CodecError::Syntax`] for malformed JSON,
/// [`CodecError::InvalidTopLevel`] when the input is not an object,
/// [`CodecError::MissingKey`] for empty keys at any depth,
/// [`CodecError::DuplicateKey`] when an object repeats a key, and
/// [`CodecError::UnsupportedToken`] for numbers outside the decimal range.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let raw: &RawValue =
        serde_json::from_slice(bytes).map_err(|source| CodecError::Syntax { source })?;
    match raw_kind(raw) {
        "object" => convert_object(raw, ROOT_PATH).map(Envelope::from_map),
        found => Err(CodecError::InvalidTopLevel { found }),
    }
}

/// Decodes JSON text into an [`Envelope`].
///
/// # Errors
///
/// See [`decode`].
pub fn decode_str(text: &str) -> Result<Envelope, CodecError> {
    decode(text.as_bytes())
}

/// Encodes an [`Envelope`] as compact JSON.
///
/// Timestamps are written as ISO 8601 strings and decimals keep their exact
/// digits.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when the serialiser rejects a value.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(envelope).map_err(|source| CodecError::Encode { source })
}

fn convert(raw: &RawValue, path: &str) -> Result<Value, CodecError> {
    match raw_kind(raw) {
        "null" => Ok(Value::Null),
        "bool" => parse_raw::<bool>(raw).map(Value::Bool),
        "string" => {
            let text: String = parse_raw(raw)?;
            Ok(Timestamp::parse(&text).map_or_else(|| Value::String(text), Value::Timestamp))
        }
        "array" => parse_raw::<Vec<&RawValue>>(raw)?
            .into_iter()
            .enumerate()
            .map(|(index, item)| convert(item, &format!("{path}[{index}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "object" => convert_object(raw, path).map(Value::Object),
        _ => convert_number(raw.get().trim(), path),
    }
}

fn convert_object(raw: &RawValue, path: &str) -> Result<Map, CodecError> {
    let Entries(entries) = parse_raw(raw)?;
    let mut map = Map::new();
    for (key, item) in entries {
        if key.trim().is_empty() {
            return Err(CodecError::MissingKey {
                path: path.to_owned(),
            });
        }
        if map.contains_key(&key) {
            return Err(CodecError::DuplicateKey {
                path: path.to_owned(),
                key,
            });
        }
        let value = convert(item, &format!("{path}.{key}"))?;
        map.insert(key, value);
    }
    Ok(map)
}

fn convert_number(literal: &str, path: &str) -> Result<Value, CodecError> {
    if let Ok(integer) = literal.parse::<i64>() {
        return Ok(Value::Integer(integer));
    }
    let parsed = if literal.contains(['e', 'E']) {
        Decimal::from_scientific(&literal.to_ascii_lowercase())
    } else {
        Decimal::from_str(literal)
    };
    parsed.map(Value::Decimal).map_err(|_| CodecError::UnsupportedToken {
        path: path.to_owned(),
        token: literal.to_owned(),
    })
}

/// Reparses an already validated fragment into `T`.
fn parse_raw<'a, T: Deserialize<'a>>(raw: &'a RawValue) -> Result<T, CodecError> {
    serde_json::from_str(raw.get()).map_err(|source| CodecError::Syntax { source })
}

/// Classifies a fragment by its first significant byte.
fn raw_kind(raw: &RawValue) -> &'static str {
    match raw.get().trim_start().as_bytes().first() {
        Some(b'{') => "object",
        Some(b'[') => "array",
        Some(b'"') => "string",
        Some(b't' | b'f') => "bool",
        Some(b'n') => "null",
        _ => "number",
    }
}

/// Object members in wire order, repeats included.
struct Entries<'a>(Vec<(String, &'a RawValue)>);

impl<'de> Deserialize<'de> for Entries<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EntriesVisitor)
    }
}

struct EntriesVisitor;

impl<'de> Visitor<'de> for EntriesVisitor {
    type Value = Entries<'de>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or_default());
        while let Some(entry) = access.next_entry::<String, &'de RawValue>()? {
            entries.push(entry);
        }
        Ok(Entries(entries))
    }
}
