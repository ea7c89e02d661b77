//! Inbound event envelope.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::command::Decoder;
use crate::error::CdpError;

/// A protocol notification: method name plus the decoder for its `params`.
///
/// Events are registration keys. Two events with the same method compare and
/// hash equal whatever their decoders are.
pub struct Event<T> {
    method: String,
    decode: Decoder<T>,
}

impl<T: DeserializeOwned + 'static> Event<T> {
    pub fn new(method: impl Into<String>) -> Self {
        let method = method.into();
        let name = method.clone();
        Self::with_decoder(method, move |value| {
            serde_json::from_value(value).map_err(|e| CdpError::Decode {
                method: name.clone(),
                message: e.to_string(),
            })
        })
    }
}

impl<T: 'static> Event<T> {
    pub fn with_decoder<F>(method: impl Into<String>, decode: F) -> Self
    where
        F: Fn(Value) -> Result<T, CdpError> + Send + Sync + 'static,
    {
        Self {
            method: method.into(),
            decode: Arc::new(decode),
        }
    }
}

impl<T> Event<T> {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn decode(&self, params: Value) -> Result<T, CdpError> {
        (self.decode)(params)
    }

    pub fn decoder(&self) -> Decoder<T> {
        Arc::clone(&self.decode)
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<T> PartialEq for Event<T> {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
    }
}

impl<T> Eq for Event<T> {}

impl<T> Hash for Event<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("method", &self.method).finish()
    }
}
