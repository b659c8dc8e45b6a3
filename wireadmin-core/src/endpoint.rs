use crate::directory::ServiceReference;
use crate::error::WireError;
use crate::ids::ServiceId;
use crate::properties::{keys, PropertyValue, WireProperties};
use crate::value::{Flavor, WireValue};
use crate::wire::Wire;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which side of a wire an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    /// `objectClass` value a registration carries for this role.
    pub fn object_class(&self) -> &'static str {
        match self {
            Role::Producer => "Producer",
            Role::Consumer => "Consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_class())
    }
}

/// Source side of a wire.
///
/// Callbacks receive the wire's property snapshot rather than the wire
/// itself: `polled` runs while the wire is locked and must not call back
/// into that wire.
pub trait Producer: Send + Sync {
    /// Produce the current value for a consumer-initiated poll.
    fn polled(&self, wire: &WireProperties) -> Result<Option<WireValue>, WireError>;

    /// The set of connected wires for this producer changed.
    fn consumers_connected(&self, _wires: &[Wire]) -> Result<(), WireError> {
        Ok(())
    }
}

/// Sink side of a wire.
pub trait Consumer: Send + Sync {
    /// Receive a value pushed by the producer. Runs under the wire lock.
    fn updated(&self, wire: &WireProperties, value: &WireValue) -> Result<(), WireError>;

    /// The set of connected wires for this consumer changed.
    fn producers_connected(&self, _wires: &[Wire]) -> Result<(), WireError> {
        Ok(())
    }
}

/// Capability object behind a directory registration.
#[derive(Clone)]
pub enum Capability {
    Producer(Arc<dyn Producer>),
    Consumer(Arc<dyn Consumer>),
}

impl Capability {
    pub fn role(&self) -> Role {
        match self {
            Capability::Producer(_) => Role::Producer,
            Capability::Consumer(_) => Role::Consumer,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Producer(_) => f.write_str("Capability::Producer(..)"),
            Capability::Consumer(_) => f.write_str("Capability::Consumer(..)"),
        }
    }
}

/// Identity snapshot of a bound endpoint plus the capability acquired for it.
#[derive(Clone)]
pub struct EndpointRef {
    pub pid: String,
    pub service_id: ServiceId,
    pub capability: Capability,
    pub scope: Option<Vec<String>>,
    /// Consumer only; `None` accepts every flavor.
    pub flavors: Option<Vec<Flavor>>,
    pub composite: Option<Vec<String>>,
    /// Producer only; the producer applies wire filters itself.
    pub filters_itself: bool,
    pub reference: ServiceReference,
}

impl EndpointRef {
    pub fn new(reference: ServiceReference, capability: Capability) -> Option<Self> {
        let pid = reference.pid()?.to_string();
        let mut endpoint = EndpointRef {
            pid,
            service_id: reference.id(),
            capability,
            scope: None,
            flavors: None,
            composite: None,
            filters_itself: false,
            reference,
        };
        endpoint.refresh_declarations();
        Some(endpoint)
    }

    pub fn role(&self) -> Role {
        self.capability.role()
    }

    /// Replace the reference snapshot after a `Modified` event.
    pub fn refresh(&mut self, reference: ServiceReference) {
        if let Some(pid) = reference.pid() {
            self.pid = pid.to_string();
        }
        self.reference = reference;
        self.refresh_declarations();
    }

    fn refresh_declarations(&mut self) {
        let (scope_key, composite_key) = match self.role() {
            Role::Producer => (keys::PRODUCER_SCOPE, keys::PRODUCER_COMPOSITE),
            Role::Consumer => (keys::CONSUMER_SCOPE, keys::CONSUMER_COMPOSITE),
        };
        let reference = &self.reference;
        self.scope = reference.get(scope_key).and_then(PropertyValue::as_string_list);
        self.composite = reference.get(composite_key).and_then(PropertyValue::as_string_list);
        self.flavors = match self.role() {
            Role::Consumer => reference
                .get(keys::CONSUMER_FLAVORS)
                .and_then(PropertyValue::as_flavors)
                .map(<[Flavor]>::to_vec),
            Role::Producer => None,
        };
        self.filters_itself =
            self.role() == Role::Producer && reference.get(keys::PRODUCER_FILTERS).is_some();
    }

    pub fn producer(&self) -> Option<&Arc<dyn Producer>> {
        match &self.capability {
            Capability::Producer(p) => Some(p),
            Capability::Consumer(_) => None,
        }
    }

    pub fn consumer(&self) -> Option<&Arc<dyn Consumer>> {
        match &self.capability {
            Capability::Consumer(c) => Some(c),
            Capability::Producer(_) => None,
        }
    }
}

impl fmt::Debug for EndpointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRef")
            .field("pid", &self.pid)
            .field("service_id", &self.service_id)
            .field("role", &self.role())
            .field("scope", &self.scope)
            .field("flavors", &self.flavors)
            .field("composite", &self.composite)
            .field("filters_itself", &self.filters_itself)
            .finish()
    }
}
