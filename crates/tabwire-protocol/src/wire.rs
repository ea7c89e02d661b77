//! Wire frames.
//!
//! Outbound: `{"id", "method", "params", "sessionId"?}`, one text frame per
//! call. Inbound frames carry no type tag and are classified by shape.

use serde::Serialize;
use serde_json::Value;

use crate::error::CdpError;
use crate::types::SessionId;

/// Outbound command frame.
#[derive(Debug, Serialize)]
pub struct OutboundFrame<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a SessionId>,
}

impl OutboundFrame<'_> {
    pub fn to_text(&self) -> Result<String, CdpError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Body of a reply frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Result(Value),
    Error(Value),
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Numeric `id` plus `result` or `error`.
    Reply { id: u64, outcome: ReplyOutcome },
    /// String `method`. `params` is `None` when the key is absent.
    Event {
        method: String,
        params: Option<Value>,
        session_id: Option<SessionId>,
    },
    /// Any other shape.
    Unrecognized(Value),
}

impl InboundFrame {
    /// Parse and classify one text frame.
    pub fn parse(text: &str) -> Result<Self, CdpError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::classify(value))
    }

    pub fn classify(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return InboundFrame::Unrecognized(value);
        };

        if let Some(id) = map.get("id").and_then(Value::as_u64) {
            if let Some(error) = map.remove("error") {
                return InboundFrame::Reply {
                    id,
                    outcome: ReplyOutcome::Error(error),
                };
            }
            if let Some(result) = map.remove("result") {
                return InboundFrame::Reply {
                    id,
                    outcome: ReplyOutcome::Result(result),
                };
            }
        }

        if let Some(method) = map.get("method").and_then(Value::as_str) {
            let method = method.to_string();
            let session_id = map
                .get("sessionId")
                .and_then(Value::as_str)
                .map(SessionId::new);
            return InboundFrame::Event {
                method,
                params: map.remove("params"),
                session_id,
            };
        }

        InboundFrame::Unrecognized(Value::Object(map))
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundFrame::Reply { .. } => "reply",
            InboundFrame::Event { .. } => "event",
            InboundFrame::Unrecognized(_) => "unrecognized",
        }
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
