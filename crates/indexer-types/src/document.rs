//! Loosely-typed document representation.
//!
//! Source documents arrive as arbitrary JSON objects and leave enriched
//! with extra fields (crawl tags, vectors). [`InputDocument`] wraps a JSON
//! object map and serializes transparently, so a fetched Solr document and
//! a document built by the pipeline are the same thing on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema;

/// A mutable document headed for a destination collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputDocument {
    fields: Map<String, Value>,
}

impl InputDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The document id, if present.
    pub fn id(&self) -> Option<String> {
        self.get_str(schema::ID)
    }

    /// Raw field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field value rendered as a string.
    ///
    /// Strings come back as-is, `null` (and absent fields) as `None`,
    /// anything else in its JSON rendering.
    pub fn get_str(&self, field: &str) -> Option<String> {
        match self.fields.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// Set a field, replacing any existing value.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Whether a field is present (a `null` value still counts as present).
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// All fields, for serialization.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for InputDocument {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
