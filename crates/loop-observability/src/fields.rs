//! Structured log fields
//!
//! `Fields` is an ordered map of field name to JSON value. Inserting a value
//! never fails: anything that cannot be represented as JSON is stored as a
//! string instead.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;

/// Ordered set of structured log fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fields(Map<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Add a field from any value with a JSON conversion
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a field from any `Serialize` value
    ///
    /// Serialization failures are stored as a string describing the value
    /// rather than aborting the log call.
    pub fn with_serialized<T: Serialize + ?Sized>(mut self, key: impl Into<String>, value: &T) -> Self {
        self.0.insert(key.into(), to_safe_value(value));
        self
    }

    /// Add a field using the value's `Display` representation
    pub fn with_display(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.0.insert(key.into(), Value::String(value.to_string()));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Overlay `other` on top of `self`; keys in `other` win
    pub fn extend(&mut self, other: &Fields) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Return a new set with `other` overlaid on a copy of `self`
    pub fn merged(&self, other: &Fields) -> Fields {
        let mut merged = self.clone();
        merged.extend(other);
        merged
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of a field, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Fields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Serialize a value to JSON, coercing failures to a string
pub(crate) fn to_safe_value<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(value) => value,
        Err(err) => Value::String(format!("[unserializable: {}]", err)),
    }
}

/// Build a [`Fields`] set from `key => value` pairs
///
/// ```
/// use loop_observability::fields;
///
/// let fields = fields! { "order_id" => "ord_1", "attempt" => 2 };
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::Fields::new()$(.with($key, $value))+
    };
}
