//! Step input and output mappings.

use crate::error::WorkflowError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Ordered, immutable mapping handed to a step.
///
/// Built once with [`StepInput::with`] and then only read. Values are JSON
/// values so text, credentials, paths and flags can share one map.
///
/// # Examples
///
/// ```
/// use speechflow::StepInput;
///
/// let input = StepInput::new()
///     .with("text", "hi")
///     .with("twilio_encoding", false);
///
/// assert_eq!(input.get_str("text"), Some("hi"));
/// assert_eq!(input.get_bool("twilio_encoding"), Some(false));
/// assert_eq!(input.get_str("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepInput(Map<String, Value>);

impl StepInput {
    /// Creates an empty input.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Returns the input with `key` set to `value`.
    ///
    /// If the key already exists, the previous value is replaced.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the input with `key` set only when `value` is present.
    pub fn with_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    /// Returns the raw value for the given key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value for the given key if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns the value for the given key if it is a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Returns `true` if the input contains a value for the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns an iterator over all keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the input has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserializes the input into a typed struct.
    ///
    /// A missing required field or a type mismatch becomes a
    /// [`WorkflowError::Validation`].
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, WorkflowError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| WorkflowError::Validation(format!("invalid input: {e}")))
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for StepInput {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Success payload returned by a step, e.g. `{"media": {"payload": "..."}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepOutput(Map<String, Value>);

impl StepOutput {
    /// Creates an empty output.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Returns the output with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Converts a JSON value into an output. Only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self, WorkflowError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(WorkflowError::Validation(format!(
                "step output must be an object, got {other}"
            ))),
        }
    }

    /// Returns the raw value for the given key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Looks up a nested value with a JSON pointer such as `/media/payload`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let (head, rest) = match pointer.strip_prefix('/') {
            Some(path) => path.split_once('/').unwrap_or((path, "")),
            None => return None,
        };
        let value = self.0.get(head)?;
        if rest.is_empty() {
            Some(value)
        } else {
            value.pointer(&format!("/{rest}"))
        }
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the output and returns it as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for StepOutput {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for StepOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}
