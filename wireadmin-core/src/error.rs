use crate::endpoint::Role;
use crate::ids::ServiceId;
use serde::{Deserialize, Serialize};

/// Everything that can go wrong around a wire.
///
/// None of these cross the wire boundary into producer/consumer code or the
/// discovery path; the wire turns them into log lines or exception events.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum WireError {
    #[error("invalid filter `{filter}`: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("producer failed: {0}")]
    Producer(String),

    #[error("consumer failed: {0}")]
    Consumer(String),

    #[error("endpoint panicked: {0}")]
    Panicked(String),

    #[error("more than one {role} registered with pid {pid}")]
    DuplicatePid { role: Role, pid: String },

    #[error("service {0} is not registered")]
    ServiceNotFound(ServiceId),

    #[error("wire {0} not found")]
    WireNotFound(String),

    #[error("invalid wire properties: {0}")]
    InvalidProperties(String),
}

impl WireError {
    pub fn invalid_filter(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        WireError::InvalidFilter {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    pub fn producer(message: impl Into<String>) -> Self {
        WireError::Producer(message.into())
    }

    pub fn consumer(message: impl Into<String>) -> Self {
        WireError::Consumer(message.into())
    }

    /// Build an error from a caught panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        WireError::Panicked(message)
    }
}
