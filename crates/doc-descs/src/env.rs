//! Insertion-ordered environment variable maps.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Environment variables handed to builds and runs.
///
/// Keys keep their insertion order so descriptions serialize stably.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Env(Mapping);

impl Env {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to a string value, replacing any previous value in place.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.0
            .insert(Value::String(key.to_owned()), Value::String(value.into()));
        self
    }

    /// Sets `key` to an integer value.
    pub fn set_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.0
            .insert(Value::String(key.to_owned()), Value::Number(value.into()));
        self
    }

    /// Builder form of [`Env::set`].
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder form of [`Env::set_int`].
    pub fn with_int(mut self, key: &str, value: i64) -> Self {
        self.set_int(key, value);
        self
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value stored under `key`; integers are not coerced.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Copies every entry of `other` into `self`.
    pub fn extend(&mut self, other: &Env) {
        for (key, value) in other.0.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().filter_map(Value::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the environment has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
