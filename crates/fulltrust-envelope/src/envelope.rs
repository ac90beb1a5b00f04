//! Top-level envelope wrapper with command and correlation helpers.

use serde::{Serialize, Serializer};

use crate::value::{Map, Value, serialize_map};

/// Key naming the command an envelope carries.
pub const COMMAND_KEY: &str = "Arguments";

/// Key carrying the opaque correlation token echoed in replies.
pub const REQUEST_ID_KEY: &str = "RequestID";

/// Key carrying the status code or flag in replies.
pub const SUCCESS_KEY: &str = "Success";

/// A decoded top-level JSON object.
///
/// Envelopes conventionally carry [`COMMAND_KEY`] with a string command
/// name and an optional [`REQUEST_ID_KEY`]. Key order is irrelevant on the
/// wire; entries are kept sorted so encoding is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    fields: Map,
}

impl Envelope {
    /// Creates an empty envelope.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Creates an envelope carrying `command` under [`COMMAND_KEY`].
    #[must_use]
    pub fn with_command(command: impl Into<String>) -> Self {
        Self::new().with(COMMAND_KEY, Value::String(command.into()))
    }

    /// Wraps an existing object map.
    #[must_use]
    pub const fn from_map(fields: Map) -> Self {
        Self { fields }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a field, returning any value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Looks up a field by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the string stored under `key`, when present and textual.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns `true` when `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Raw value stored under [`COMMAND_KEY`].
    ///
    /// The value is returned untyped so callers can distinguish an absent
    /// command from one carried with the wrong type.
    #[must_use]
    pub fn command(&self) -> Option<&Value> {
        self.get(COMMAND_KEY)
    }

    /// Correlation token, when present as a string.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.get_str(REQUEST_ID_KEY)
    }

    /// Copies the correlation token from `request` into this envelope.
    ///
    /// Nothing is inserted when the request carried no string token.
    #[must_use]
    pub fn correlated_with(mut self, request: &Self) -> Self {
        if let Some(token) = request.request_id() {
            self.insert(REQUEST_ID_KEY, token);
        }
        self
    }

    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` when the envelope has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Borrows the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Map {
        &self.fields
    }

    /// Consumes the envelope, yielding its map.
    #[must_use]
    pub fn into_map(self) -> Map {
        self.fields
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_map(&self.fields, serializer)
    }
}

impl From<Envelope> for Value {
    fn from(value: Envelope) -> Self {
        Self::Object(value.fields)
    }
}

impl FromIterator<(String, Value)> for Envelope {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
