//! # Correlation Envelope
//!
//! The wrapper injected around call arguments so a correlation token can
//! travel across the bus without the receiving handler ever seeing it.
//!
//! ## Wire Shape
//!
//! A correlated call carries exactly one argument: an object with a single
//! namespaced key.
//!
//! ```text
//! [ { "$ipcwatch:correlated": { "token": "<uuid>", "args": [ ... ] } } ]
//! ```
//!
//! Anything else is `Payload::Plain` and is passed through untouched, so
//! decoding an argument list that was never wrapped is the identity.

use crate::entities::CorrelationToken;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Namespaced key marking a correlated envelope.
pub const ENVELOPE_MARKER: &str = "$ipcwatch:correlated";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnvelopeBody {
    token: CorrelationToken,
    args: Vec<Value>,
}

/// Argument list of a call as seen at the serialization boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Arguments sent as-is.
    Plain(Vec<Value>),
    /// Arguments tagged with a correlation token.
    Correlated {
        token: CorrelationToken,
        args: Vec<Value>,
    },
}

impl Payload {
    /// Wrap `args` in an envelope carrying `token`.
    #[must_use]
    pub fn wrap(args: Vec<Value>, token: CorrelationToken) -> Vec<Value> {
        Self::Correlated { token, args }.encode()
    }

    /// Serialize into the argument list that goes on the wire.
    #[must_use]
    pub fn encode(self) -> Vec<Value> {
        match self {
            Self::Plain(args) => args,
            Self::Correlated { token, args } => {
                let body = EnvelopeBody { token, args };
                // EnvelopeBody holds only a UUID and JSON values.
                let body = serde_json::to_value(body).unwrap_or(Value::Null);
                let mut envelope = Map::with_capacity(1);
                envelope.insert(ENVELOPE_MARKER.to_string(), body);
                vec![Value::Object(envelope)]
            }
        }
    }

    /// Classify a received argument list.
    #[must_use]
    pub fn decode(received: Vec<Value>) -> Self {
        match Self::envelope_body(&received) {
            Some(body) => Self::Correlated {
                token: body.token,
                args: body.args,
            },
            None => Self::Plain(received),
        }
    }

    /// Borrowing variant of `decode` for dispatch paths: plain lists are not
    /// copied.
    #[must_use]
    pub fn peel(received: &[Value]) -> (Option<CorrelationToken>, Cow<'_, [Value]>) {
        match Self::envelope_body(received) {
            Some(body) => (Some(body.token), Cow::Owned(body.args)),
            None => (None, Cow::Borrowed(received)),
        }
    }

    /// Whether `received` is a correlated envelope.
    #[must_use]
    pub fn is_envelope(received: &[Value]) -> bool {
        Self::envelope_body(received).is_some()
    }

    /// Split into the token (if any) and the caller's arguments.
    #[must_use]
    pub fn into_parts(self) -> (Option<CorrelationToken>, Vec<Value>) {
        match self {
            Self::Plain(args) => (None, args),
            Self::Correlated { token, args } => (Some(token), args),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<CorrelationToken> {
        match self {
            Self::Plain(_) => None,
            Self::Correlated { token, .. } => Some(*token),
        }
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        match self {
            Self::Plain(args) | Self::Correlated { args, .. } => args,
        }
    }

    fn envelope_body(received: &[Value]) -> Option<EnvelopeBody> {
        let [Value::Object(object)] = received else {
            return None;
        };
        if object.len() != 1 {
            return None;
        }
        let body = object.get(ENVELOPE_MARKER)?;
        serde_json::from_value(body.clone()).ok()
    }
}
