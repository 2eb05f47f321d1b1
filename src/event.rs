use serde::{Deserialize, Serialize};

/// Text submitted at the ingress. Consumed once by the length transform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextEvent {
    pub text: String,
}

impl TextEvent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Derived from exactly one `TextEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LengthEvent {
    pub length: usize,
}

impl LengthEvent {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

/// An event as it travels on a topic. Bindings never touch the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<T> {
    pub key: Option<String>,
    pub value: T,
}

impl<T> Record<T> {
    pub fn keyed(key: impl Into<String>, value: T) -> Self {
        Self {
            key: Some(key.into()),
            value,
        }
    }

    pub fn unkeyed(value: T) -> Self {
        Self { key: None, value }
    }

    /// Swap the value, keep the key.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Record<U> {
        Record {
            key: self.key,
            value: f(self.value),
        }
    }
}
