//! Conversion between wire events and native port values.
//!
//! On the wire an [`Event`] is a port name plus a serialized JSON document.
//! Inside a model it is a [`PortValue`]: a port index plus a decoded native
//! value. The batch functions [`decode_all`] and [`encode_all`] never fail as
//! a whole. Each event that cannot be converted is logged and dropped, and
//! the rest of the batch goes through.

use crate::{
    atomic::{PortIndex, PortValue},
    logging::event_dropped,
    port::PortTable,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as Json;

/// A message as seen from outside a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The external port name.
    pub port: String,
    /// The serialized payload.
    pub value: String,
}

impl Event {
    pub fn new(port: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            value: value.into(),
        }
    }

    /// Creates an event by serializing a JSON document.
    pub fn from_value(port: impl Into<String>, value: &Json) -> Self {
        Self::new(port, value.to_string())
    }

    /// Parses the payload as a JSON document.
    pub fn json(&self) -> Result<Json, serde_json::Error> {
        serde_json::from_str(&self.value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("No port is named <{0}>")]
    UnmappedName(String),
    #[error("No port has index {0}")]
    UnmappedIndex(PortIndex),
    #[error("Malformed payload on port <{port}>: {source}")]
    Decode {
        port: String,
        source: serde_json::Error,
    },
    #[error("Could not serialize output on port <{port}>: {source}")]
    Encode {
        port: String,
        source: serde_json::Error,
    },
}

/// Converts a wire event into a native port value.
pub fn decode<V: DeserializeOwned>(ports: &PortTable, event: &Event) -> Result<PortValue<V>, CodecError> {
    let index = ports
        .to_internal(&event.port)
        .ok_or_else(|| CodecError::UnmappedName(event.port.clone()))?;
    let value = serde_json::from_str(&event.value).map_err(|source| CodecError::Decode {
        port: event.port.clone(),
        source,
    })?;
    Ok(PortValue::new(index, value))
}

/// Converts a native port value into a wire event.
pub fn encode<V: Serialize>(ports: &PortTable, output: &PortValue<V>) -> Result<Event, CodecError> {
    let port = ports
        .to_external(output.port)
        .ok_or(CodecError::UnmappedIndex(output.port))?;
    let value = serde_json::to_string(&output.value).map_err(|source| CodecError::Encode {
        port: port.to_string(),
        source,
    })?;
    Ok(Event::new(port, value))
}

/// Decodes every event that can be decoded.
pub fn decode_all<V: DeserializeOwned>(ports: &PortTable, events: &[Event]) -> Vec<PortValue<V>> {
    events
        .iter()
        .filter_map(|event| match decode(ports, event) {
            Ok(value) => Some(value),
            Err(e) => {
                report(&e, &event.port);
                None
            }
        })
        .collect()
}

/// Encodes every output that can be encoded.
pub fn encode_all<V: Serialize>(ports: &PortTable, outputs: &[PortValue<V>]) -> Vec<Event> {
    outputs
        .iter()
        .filter_map(|output| match encode(ports, output) {
            Ok(event) => Some(event),
            Err(e) => {
                let port = ports.to_external(output.port).unwrap_or_default();
                report(&e, port);
                None
            }
        })
        .collect()
}

fn report(error: &CodecError, port: &str) {
    match error {
        CodecError::UnmappedName(_) | CodecError::UnmappedIndex(_) => {
            tracing::debug!("Ignoring event: {}", error)
        }
        CodecError::Decode { .. } | CodecError::Encode { .. } => {
            tracing::warn!("Dropping event: {}", error);
            event_dropped(port, &error.to_string());
        }
    }
}
