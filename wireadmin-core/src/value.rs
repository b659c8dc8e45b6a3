//! Values that travel across a wire.
//!
//! Consumers declare which [`Flavor`]s they accept; acceptance is a plain tag
//! membership test on [`WireValue::flavor`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag naming one kind of [`WireValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    Bool,
    Integer,
    Float,
    Text,
    Bytes,
    Json,
    Envelope,
    Envelopes,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Bool => "bool",
            Flavor::Integer => "integer",
            Flavor::Float => "float",
            Flavor::Text => "text",
            Flavor::Bytes => "bytes",
            Flavor::Json => "json",
            Flavor::Envelope => "envelope",
            Flavor::Envelopes => "envelopes",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value pushed or polled through a wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum WireValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Envelope(Envelope),
    Envelopes(Vec<Envelope>),
}

impl WireValue {
    pub fn flavor(&self) -> Flavor {
        match self {
            WireValue::Bool(_) => Flavor::Bool,
            WireValue::Integer(_) => Flavor::Integer,
            WireValue::Float(_) => Flavor::Float,
            WireValue::Text(_) => Flavor::Text,
            WireValue::Bytes(_) => Flavor::Bytes,
            WireValue::Json(_) => Flavor::Json,
            WireValue::Envelope(_) => Flavor::Envelope,
            WireValue::Envelopes(_) => Flavor::Envelopes,
        }
    }

    /// Numeric view used for the delta attributes of wire filters.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::Integer(n) => Some(*n as f64),
            WireValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_envelope(&self) -> Option<&Envelope> {
        match self {
            WireValue::Envelope(envelope) => Some(envelope),
            _ => None,
        }
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        WireValue::Bool(value)
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        WireValue::Integer(value)
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        WireValue::Float(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::Text(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::Text(value)
    }
}

impl From<Envelope> for WireValue {
    fn from(value: Envelope) -> Self {
        WireValue::Envelope(value)
    }
}

/// A payload labelled with the producer-side item it belongs to and the scope
/// it is published under. Used by aggregating producers that multiplex many
/// items over one wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    value: Box<WireValue>,
    identification: String,
    scope: String,
}

impl Envelope {
    pub fn new(value: WireValue, identification: impl Into<String>, scope: impl Into<String>) -> Self {
        Envelope {
            value: Box::new(value),
            identification: identification.into(),
            scope: scope.into(),
        }
    }

    pub fn value(&self) -> &WireValue {
        &self.value
    }

    pub fn identification(&self) -> &str {
        &self.identification
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}
