//! Outbound command envelope.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::CdpError;

/// Turns a raw JSON payload into a typed value.
pub type Decoder<T> = Arc<dyn Fn(Value) -> Result<T, CdpError> + Send + Sync>;

type Fallback<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A protocol call: method name, params and the decoder for its `result`.
///
/// Commands are immutable once built; the builder-style methods consume and
/// return a new value.
pub struct Command<T> {
    method: String,
    params: Value,
    decode: Decoder<T>,
    /// Set for fire-and-forget methods; produces the result without a reply.
    no_reply: Option<Fallback<T>>,
    target_scoped: bool,
}

impl<T: DeserializeOwned + 'static> Command<T> {
    /// Build a command whose `result` is deserialized with serde.
    ///
    /// `params` should be a JSON object; `Value::Null` is sent as `{}`.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        let method = method.into();
        let name = method.clone();
        Self::with_decoder(method, params, move |value| {
            serde_json::from_value(value).map_err(|e| CdpError::Decode {
                method: name.clone(),
                message: e.to_string(),
            })
        })
    }
}

impl Command<()> {
    /// Build a command whose result carries nothing of interest.
    pub fn void(method: impl Into<String>, params: Value) -> Self {
        Self::with_decoder(method, params, |_| Ok(()))
    }
}

impl<T: 'static> Command<T> {
    /// Build a command with a custom decoder.
    pub fn with_decoder<F>(method: impl Into<String>, params: Value, decode: F) -> Self
    where
        F: Fn(Value) -> Result<T, CdpError> + Send + Sync + 'static,
    {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Self {
            method: method.into(),
            params,
            decode: Arc::new(decode),
            no_reply: None,
            target_scoped: true,
        }
    }

    /// Mark the method as one the browser never replies to.
    ///
    /// Sending it resolves immediately with `T::default()`.
    pub fn does_not_send_response(self) -> Self
    where
        T: Default,
    {
        let fallback: Fallback<T> = Arc::new(T::default);
        Self {
            no_reply: Some(fallback),
            ..self
        }
    }

    /// Mark the command as valid without an attached target session.
    pub fn browser_scoped(self) -> Self {
        Self {
            target_scoped: false,
            ..self
        }
    }
}

impl<T> Command<T> {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn expects_reply(&self) -> bool {
        self.no_reply.is_none()
    }

    pub fn is_target_scoped(&self) -> bool {
        self.target_scoped
    }

    /// Decode a raw `result` payload.
    pub fn decode(&self, value: Value) -> Result<T, CdpError> {
        (self.decode)(value)
    }

    /// Shared handle to the decoder, for callers that outlive the command.
    pub fn decoder(&self) -> Decoder<T> {
        Arc::clone(&self.decode)
    }

    /// The immediate result of a fire-and-forget command, `None` otherwise.
    pub fn unreplied_result(&self) -> Option<T> {
        self.no_reply.as_ref().map(|make| make())
    }
}

impl<T> Clone for Command<T> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            params: self.params.clone(),
            decode: Arc::clone(&self.decode),
            no_reply: self.no_reply.clone(),
            target_scoped: self.target_scoped,
        }
    }
}

impl<T> fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("method", &self.method)
            .field("params", &self.params)
            .field("expects_reply", &self.expects_reply())
            .field("target_scoped", &self.target_scoped)
            .finish()
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
