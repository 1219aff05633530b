//! Caller-visible result of a module run.

use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of a reconciliation: the `changed` flag plus identifying fields.
///
/// Unset fields are omitted rather than emitted as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// Whether the remote state was (or in check mode would be) changed.
    pub changed: bool,
    /// Projected entity fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Outcome {
    /// Creates an outcome without entity fields.
    #[must_use]
    pub fn new(changed: bool) -> Self {
        Self {
            changed,
            fields: Map::new(),
        }
    }

    /// Adds a field. `None` and other null values are skipped.
    #[must_use]
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value)
            && !value.is_null()
        {
            self.fields.insert(key.to_string(), value);
        }
        self
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Renders the outcome as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert(String::from("changed"), Value::Bool(self.changed));
        Value::Object(map)
    }
}
