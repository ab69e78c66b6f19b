//! # Webhook Payload Model
//!
//! Inbound DeployDB webhooks carry a deployment id and a service name, plus an
//! open set of additional fields whose shape varies per event kind. The known
//! fields are typed; everything else is kept in an ordered extension bag so it
//! can later be exported into the build environment.

use crate::{event_kind::EventKind, DeploymentId};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Value of a field in the extension bag
///
/// JSON objects become [`PayloadValue::Nested`]; every other JSON value is
/// rendered to text once, at deserialization time:
/// - strings verbatim
/// - numbers and booleans in their JSON form
/// - `null` as an empty string
/// - arrays as compact JSON text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadValue {
    Scalar(String),
    Nested(BTreeMap<String, PayloadValue>),
}

impl PayloadValue {
    /// Create a scalar value
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    /// Get the scalar text, if this is a scalar
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            PayloadValue::Scalar(value) => Some(value),
            PayloadValue::Nested(_) => None,
        }
    }

    /// Get the nested entries, if this is a mapping
    pub fn as_nested(&self) -> Option<&BTreeMap<String, PayloadValue>> {
        match self {
            PayloadValue::Scalar(_) => None,
            PayloadValue::Nested(entries) => Some(entries),
        }
    }
}

impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(entries) => PayloadValue::Nested(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, PayloadValue::from(value)))
                    .collect(),
            ),
            Value::String(text) => PayloadValue::Scalar(text),
            Value::Null => PayloadValue::Scalar(String::new()),
            other => PayloadValue::Scalar(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for PayloadValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(PayloadValue::from)
    }
}

/// Inbound DeployDB webhook
///
/// The event kind is not part of the body. It is assigned from the request's
/// content type with [`TriggerEvent::with_kind`] once the body has been read,
/// after which the event is treated as immutable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TriggerEvent {
    #[serde(default)]
    id: DeploymentId,

    #[serde(default)]
    service: Option<String>,

    #[serde(skip)]
    kind: Option<EventKind>,

    #[serde(flatten)]
    values: BTreeMap<String, PayloadValue>,
}

impl TriggerEvent {
    /// Create an event with no additional fields
    pub fn new(id: DeploymentId, service: Option<String>) -> Self {
        Self {
            id,
            service,
            kind: None,
            values: BTreeMap::new(),
        }
    }

    /// Parse a webhook body
    ///
    /// Any JSON object is accepted, including `{}`.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Assign the event kind resolved from the request
    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Add an additional field
    pub fn with_value(mut self, key: impl Into<String>, value: PayloadValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Deployment this event belongs to
    pub fn id(&self) -> DeploymentId {
        self.id
    }

    /// Name of the deployed service, if the payload carried one
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Event kind, once assigned
    pub fn kind(&self) -> Option<EventKind> {
        self.kind
    }

    /// Every field other than `id` and `service`
    pub fn values(&self) -> &BTreeMap<String, PayloadValue> {
        &self.values
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
