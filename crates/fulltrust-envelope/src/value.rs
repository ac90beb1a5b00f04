//! Dynamically-typed values carried inside envelopes.
//!
//! Decoded objects always have string keys. Numbers prefer the 64-bit
//! integer representation and fall back to a scaled decimal, and string
//! tokens that look like ISO 8601 date/time literals surface as
//! [`Timestamp`] values.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

use crate::Timestamp;

/// Ordered mapping used for object values.
pub type Map = BTreeMap<String, Value>;

/// A single dynamically-typed envelope value.
///
/// # Example
///
/// ```
/// use fulltrust_envelope::Value;
///
/// let value = Value::from(42_i64);
/// assert_eq!(value.as_i64(), Some(42));
/// assert_eq!(value.kind(), "integer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// UTF-8 text that did not parse as a date/time literal.
    String(String),
    /// Whole number representable as a signed 64-bit integer.
    Integer(i64),
    /// Any other number representable as a 96-bit scaled decimal.
    Decimal(Decimal),
    /// Boolean literal.
    Bool(bool),
    /// JSON `null`.
    Null,
    /// String token recognised as an ISO 8601 date/time literal.
    Timestamp(Timestamp),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Nested object keyed by non-empty strings.
    Object(Map),
}

impl Value {
    /// Short lowercase label naming the variant, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Bool(_) => "bool",
            Self::Null => "null",
            Self::Timestamp(_) => "timestamp",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Returns the text when the value is a plain string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Returns the integer when the value is an [`Value::Integer`].
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(number) => Some(*number),
            _ => None,
        }
    }

    /// Returns the boolean when the value is a [`Value::Bool`].
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Returns the timestamp when the value is a [`Value::Timestamp`].
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            Self::Timestamp(timestamp) => Some(timestamp),
            _ => None,
        }
    }

    /// Returns the nested object when the value is a [`Value::Object`].
    #[must_use]
    pub const fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the elements when the value is a [`Value::Array`].
    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(text) => serializer.serialize_str(text),
            Self::Integer(number) => serializer.serialize_i64(*number),
            Self::Decimal(number) => {
                // Emit the exact digits rather than routing through f64.
                let raw = RawValue::from_string(number.to_string()).map_err(S::Error::custom)?;
                raw.serialize(serializer)
            }
            Self::Bool(flag) => serializer.serialize_bool(*flag),
            Self::Null => serializer.serialize_unit(),
            Self::Timestamp(timestamp) => serializer.serialize_str(&timestamp.to_iso8601()),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => serialize_map(map, serializer),
        }
    }
}

pub(crate) fn serialize_map<S: Serializer>(map: &Map, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_map(Some(map.len()))?;
    for (key, value) in map {
        state.serialize_entry(key, value)?;
    }
    state.end()
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self {
        Self::Array(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
