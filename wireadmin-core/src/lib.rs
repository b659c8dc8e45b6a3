//! Wire binding between discovered producers and consumers.
//!
//! A [`Wire`] is a long-lived administrative link between one producer PID
//! and one consumer PID. Endpoints come and go through a
//! [`ServiceDirectory`]; the wire binds them when both are present, works
//! out what scopes, flavors and values may cross, and reports its
//! transitions to a [`Registry`].

pub mod directory;
pub mod endpoint;
pub mod error;
pub mod filter;
pub mod ids;
pub mod permission;
pub mod properties;
pub mod registry;
pub mod scope;
pub mod value;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use directory::{InMemoryDirectory, ServiceDirectory, ServiceEvent, ServiceEventKind, ServiceListener, ServiceReference};
pub use endpoint::{Capability, Consumer, EndpointRef, Producer, Role};
pub use error::WireError;
pub use filter::{escape, LdapEvaluator, LdapFilter, Predicate, PredicateEvaluator};
pub use ids::{ServiceId, SubscriptionId};
pub use permission::{AllowAll, ScopeAuthority, ScopeGrants};
pub use properties::{keys, PropertyMap, PropertyValue, WireProperties, WirePropertiesBuilder};
pub use registry::{NotificationEvent, NotificationTarget, Registry, WireEventKind};
pub use scope::{interoperable, NegotiatedScope};
pub use value::{Envelope, Flavor, WireValue};
pub use wire::{Wire, WireContext};
