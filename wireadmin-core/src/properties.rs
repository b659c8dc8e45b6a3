use crate::value::{Flavor, WireValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Well-known property and filter attribute names.
pub mod keys {
    /// Wire PID, allocated by the registry.
    pub const WIREADMIN_PID: &str = "wireadmin.pid";
    pub const PRODUCER_PID: &str = "wireadmin.producer.pid";
    pub const CONSUMER_PID: &str = "wireadmin.consumer.pid";
    /// Filter expression evaluated against the `wirevalue.*` attributes.
    pub const FILTER: &str = "wireadmin.filter";
    /// Administrative narrowing of the negotiated scope.
    pub const SCOPE: &str = "wireadmin.scope";

    pub const SERVICE_PID: &str = "service.pid";
    pub const SERVICE_ID: &str = "service.id";
    pub const OBJECT_CLASS: &str = "objectClass";

    pub const PRODUCER_SCOPE: &str = "wireadmin.producer.scope";
    pub const CONSUMER_SCOPE: &str = "wireadmin.consumer.scope";
    pub const CONSUMER_FLAVORS: &str = "wireadmin.consumer.flavors";
    pub const PRODUCER_COMPOSITE: &str = "wireadmin.producer.composite";
    pub const CONSUMER_COMPOSITE: &str = "wireadmin.consumer.composite";
    /// Present when the producer evaluates wire filters itself.
    pub const PRODUCER_FILTERS: &str = "wireadmin.producer.filters";

    pub const WIREVALUE_CURRENT: &str = "wirevalue.current";
    pub const WIREVALUE_PREVIOUS: &str = "wirevalue.previous";
    pub const WIREVALUE_DELTA_ABSOLUTE: &str = "wirevalue.delta.absolute";
    pub const WIREVALUE_DELTA_RELATIVE: &str = "wirevalue.delta.relative";
    pub const WIREVALUE_ELAPSED: &str = "wirevalue.elapsed";

    /// Scope name granting every scope.
    pub const SCOPE_ALL: &str = "*";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    Flavors(Vec<Flavor>),
    Value(WireValue),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// A single string is treated as a one-element list.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            PropertyValue::StringList(list) => Some(list.clone()),
            PropertyValue::String(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }

    pub fn as_flavors(&self) -> Option<&[Flavor]> {
        match self {
            PropertyValue::Flavors(flavors) => Some(flavors),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::StringList(value)
    }
}

impl From<&[&str]> for PropertyValue {
    fn from(value: &[&str]) -> Self {
        PropertyValue::StringList(value.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<Flavor>> for PropertyValue {
    fn from(value: Vec<Flavor>) -> Self {
        PropertyValue::Flavors(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<WireValue> for PropertyValue {
    fn from(value: WireValue) -> Self {
        PropertyValue::Value(value)
    }
}

/// Ordered attribute map shared by service registrations, wire properties and
/// filter evaluation contexts.
pub type PropertyMap = IndexMap<String, PropertyValue>;

/// Immutable snapshot of a wire's properties.
///
/// A wire never edits its snapshot; administrative updates build a new one
/// and swap the `Arc` under the wire lock.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireProperties {
    entries: PropertyMap,
}

impl WireProperties {
    pub fn new(entries: PropertyMap) -> Self {
        Self { entries }
    }

    pub fn builder() -> WirePropertiesBuilder {
        WirePropertiesBuilder::default()
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_str)
    }

    pub fn wire_pid(&self) -> Option<&str> {
        self.get_str(keys::WIREADMIN_PID)
    }

    pub fn producer_pid(&self) -> Option<&str> {
        self.get_str(keys::PRODUCER_PID)
    }

    pub fn consumer_pid(&self) -> Option<&str> {
        self.get_str(keys::CONSUMER_PID)
    }

    pub fn filter(&self) -> Option<&str> {
        self.get_str(keys::FILTER)
    }

    pub fn scope_restriction(&self) -> Option<Vec<String>> {
        self.get(keys::SCOPE).and_then(PropertyValue::as_string_list)
    }

    pub fn entries(&self) -> &PropertyMap {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the snapshot that replaces `self` on an administrative update.
    ///
    /// Wire, producer and consumer PIDs missing from `update` keep their
    /// current values; every other key is taken from `update` only.
    pub fn merged_update(&self, mut update: PropertyMap) -> Arc<WireProperties> {
        for key in [keys::WIREADMIN_PID, keys::PRODUCER_PID, keys::CONSUMER_PID] {
            if !update.contains_key(key) {
                if let Some(previous) = self.entries.get(key) {
                    update.insert(key.to_string(), previous.clone());
                }
            }
        }
        Arc::new(WireProperties::new(update))
    }
}

#[derive(Debug, Default)]
pub struct WirePropertiesBuilder {
    entries: PropertyMap,
}

impl WirePropertiesBuilder {
    pub fn wire_pid(self, pid: impl Into<String>) -> Self {
        self.set(keys::WIREADMIN_PID, pid.into())
    }

    pub fn producer_pid(self, pid: impl Into<String>) -> Self {
        self.set(keys::PRODUCER_PID, pid.into())
    }

    pub fn consumer_pid(self, pid: impl Into<String>) -> Self {
        self.set(keys::CONSUMER_PID, pid.into())
    }

    pub fn filter(self, filter: impl Into<String>) -> Self {
        self.set(keys::FILTER, filter.into())
    }

    pub fn scope(self, scope: Vec<String>) -> Self {
        self.set(keys::SCOPE, scope)
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> WireProperties {
        WireProperties::new(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_keep_their_kind_through_json() {
        let flavors = PropertyValue::from(vec![Flavor::Integer, Flavor::Text]);
        let back: PropertyValue = serde_json::from_str(&serde_json::to_string(&flavors).unwrap()).unwrap();
        assert_eq!(back.as_flavors(), Some(&[Flavor::Integer, Flavor::Text][..]));

        let names = PropertyValue::from(&["integer", "text"][..]);
        let back: PropertyValue = serde_json::from_str(&serde_json::to_string(&names).unwrap()).unwrap();
        assert_eq!(back, names);
        assert_eq!(back.as_flavors(), None);
    }

    #[test]
    fn test_builder_accessors() {
        let props = WireProperties::builder()
            .wire_pid("wire-1")
            .producer_pid("P1")
            .consumer_pid("C1")
            .filter("(wirevalue.elapsed>=100)")
            .scope(vec!["a".into(), "b".into()])
            .build();

        assert_eq!(props.wire_pid(), Some("wire-1"));
        assert_eq!(props.producer_pid(), Some("P1"));
        assert_eq!(props.consumer_pid(), Some("C1"));
        assert_eq!(props.filter(), Some("(wirevalue.elapsed>=100)"));
        assert_eq!(props.scope_restriction(), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(props.len(), 5);
    }

    #[test]
    fn test_merged_update_keeps_missing_pids() {
        let props = WireProperties::builder()
            .wire_pid("wire-1")
            .producer_pid("P1")
            .consumer_pid("C1")
            .filter("(a=b)")
            .build();

        let mut update = PropertyMap::new();
        update.insert(keys::CONSUMER_PID.to_string(), "C2".into());
        update.insert("custom".to_string(), 7i64.into());

        let merged = props.merged_update(update);
        assert_eq!(merged.wire_pid(), Some("wire-1"));
        assert_eq!(merged.producer_pid(), Some("P1"));
        assert_eq!(merged.consumer_pid(), Some("C2"));
        assert_eq!(merged.filter(), None);
        assert_eq!(merged.get("custom"), Some(&PropertyValue::Long(7)));
        // original snapshot untouched
        assert_eq!(props.consumer_pid(), Some("C1"));
    }

    #[test]
    fn test_single_string_reads_as_list() {
        let value = PropertyValue::from("only");
        assert_eq!(value.as_string_list(), Some(vec!["only".to_string()]));
        assert!(PropertyValue::Long(1).as_string_list().is_none());
    }
}
