use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Wire admin configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireAdminConfig {
    /// Prepended to the generated UUID of every new wire PID.
    pub wire_pid_prefix: String,
    /// Buffer size of the admin event broadcast channel.
    pub event_capacity: usize,
    /// Whether `WIRE_TRACE` events are fanned out.
    pub trace_events: bool,
    pub log_dir: PathBuf,
    pub log_prefix: String,
}

impl Default for WireAdminConfig {
    fn default() -> Self {
        Self {
            wire_pid_prefix: "wire-".to_string(),
            event_capacity: 1024,
            trace_events: true,
            log_dir: PathBuf::from("logs"),
            log_prefix: "wireadmin".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidVar { key: String, value: String },
}

impl WireAdminConfig {
    pub const ENV_PREFIX: &'static str = "WIREADMIN_";

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }

    /// Read `WIREADMIN_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source, starting from the defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let lookup = |name: &str| {
            let key = format!("{}{}", Self::ENV_PREFIX, name);
            var(&key).map(|value| (key, value))
        };

        if let Some((_, value)) = lookup("WIRE_PID_PREFIX") {
            config.wire_pid_prefix = value;
        }
        if let Some((key, value)) = lookup("EVENT_CAPACITY") {
            config.event_capacity = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidVar { key, value })?;
        }
        if let Some((key, value)) = lookup("TRACE_EVENTS") {
            config.trace_events = parse_bool(&value).ok_or(ConfigError::InvalidVar { key, value })?;
        }
        if let Some((_, value)) = lookup("LOG_DIR") {
            config.log_dir = PathBuf::from(value);
        }
        if let Some((_, value)) = lookup("LOG_PREFIX") {
            config.log_prefix = value;
        }
        config.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        // broadcast::channel panics on a zero capacity
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidVar {
                key: "event_capacity".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(self)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn test_json_overrides_and_defaults() {
        let config = WireAdminConfig::from_json_str(r#"{"wire_pid_prefix": "w:", "trace_events": false}"#).unwrap();
        assert_eq!(config.wire_pid_prefix, "w:");
        assert!(!config.trace_events);
        assert_eq!(config.event_capacity, 1024);
        assert_eq!(config.log_prefix, "wireadmin");
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(matches!(
            WireAdminConfig::from_json_str("{not json"),
            Err(ConfigError::Json(_))
        ));
        assert!(WireAdminConfig::from_json_str(r#"{"event_capacity": 0}"#).is_err());
    }

    #[test]
    fn test_vars() {
        let vars: HashMap<&str, &str> = [
            ("WIREADMIN_EVENT_CAPACITY", "16"),
            ("WIREADMIN_TRACE_EVENTS", "off"),
            ("WIREADMIN_LOG_DIR", "/tmp/wa"),
        ]
        .into_iter()
        .collect();
        let config = WireAdminConfig::from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.event_capacity, 16);
        assert!(!config.trace_events);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/wa"));
        assert_eq!(config.wire_pid_prefix, "wire-");
    }

    #[test]
    fn test_bad_var() {
        let err = WireAdminConfig::from_vars(|k| (k == "WIREADMIN_EVENT_CAPACITY").then(|| "lots".to_string()))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value \"lots\" for WIREADMIN_EVENT_CAPACITY");
    }

    proptest! {
        #[test]
        fn prop_capacity_from_vars(capacity in 1usize..1_000_000, padded in any::<bool>()) {
            let raw = if padded { format!(" {capacity} ") } else { capacity.to_string() };
            let config = WireAdminConfig::from_vars(|k| (k == "WIREADMIN_EVENT_CAPACITY").then(|| raw.clone())).unwrap();
            prop_assert_eq!(config.event_capacity, capacity);
        }
    }
}
