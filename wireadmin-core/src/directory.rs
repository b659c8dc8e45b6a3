//! Capability discovery: the directory a wire watches for its endpoints.

use crate::endpoint::{Capability, Role};
use crate::error::WireError;
use crate::filter::{LdapEvaluator, Predicate, PredicateEvaluator};
use crate::ids::{ServiceId, ServiceIdAllocator, SubscriptionId, SubscriptionIdAllocator};
use crate::properties::{keys, PropertyMap, PropertyValue};
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Point-in-time view of a registration: instance id plus property snapshot.
#[derive(Debug, Clone)]
pub struct ServiceReference {
    id: ServiceId,
    properties: Arc<PropertyMap>,
}

impl ServiceReference {
    pub fn new(id: ServiceId, properties: PropertyMap) -> Self {
        Self {
            id,
            properties: Arc::new(properties),
        }
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn pid(&self) -> Option<&str> {
        self.get(keys::SERVICE_PID).and_then(PropertyValue::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Role advertised through `objectClass`, if any.
    pub fn role(&self) -> Option<Role> {
        let classes = self.get(keys::OBJECT_CLASS)?.as_string_list()?;
        [Role::Producer, Role::Consumer]
            .into_iter()
            .find(|role| classes.iter().any(|c| c == role.object_class()))
    }
}

impl PartialEq for ServiceReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceReference {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEventKind {
    Registered,
    Unregistering,
    Modified,
}

#[derive(Debug, Clone)]
pub struct ServiceEvent {
    pub kind: ServiceEventKind,
    pub reference: ServiceReference,
}

/// Receives directory events for a subscription.
pub trait ServiceListener: Send + Sync {
    fn service_changed(&self, event: &ServiceEvent);
}

/// The discovery mechanism a wire binds its endpoints through.
///
/// Implementations must not hold internal locks while invoking listeners;
/// a listener may call back into the directory.
pub trait ServiceDirectory: Send + Sync {
    fn subscribe(
        &self,
        predicate: &str,
        listener: Arc<dyn ServiceListener>,
    ) -> Result<SubscriptionId, WireError>;

    /// Replace the predicate of an existing subscription.
    fn refine(&self, subscription: SubscriptionId, predicate: &str) -> Result<(), WireError>;

    fn unsubscribe(&self, subscription: SubscriptionId);

    fn lookup(&self, role: Role, predicate: &str) -> Result<Vec<ServiceReference>, WireError>;

    /// Get the capability behind a reference, counting one use.
    fn acquire(&self, reference: &ServiceReference) -> Option<Capability>;

    fn release(&self, reference: &ServiceReference);
}

struct Registration {
    reference: ServiceReference,
    capability: Capability,
    usage: u32,
}

struct Subscriber {
    predicate: Arc<dyn Predicate>,
    listener: Arc<dyn ServiceListener>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// In-process directory. Events are delivered synchronously on the thread
/// that registers, modifies or unregisters a service.
pub struct InMemoryDirectory {
    service_ids: ServiceIdAllocator,
    subscription_ids: SubscriptionIdAllocator,
    evaluator: Arc<dyn PredicateEvaluator>,
    services: RwLock<IndexMap<ServiceId, Registration>>,
    subscribers: RwLock<IndexMap<SubscriptionId, Subscriber>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::with_evaluator(Arc::new(LdapEvaluator))
    }

    pub fn with_evaluator(evaluator: Arc<dyn PredicateEvaluator>) -> Self {
        Self {
            service_ids: ServiceIdAllocator::new(),
            subscription_ids: SubscriptionIdAllocator::new(),
            evaluator,
            services: RwLock::new(IndexMap::new()),
            subscribers: RwLock::new(IndexMap::new()),
        }
    }

    /// Register a capability. `service.id` and `objectClass` are assigned here
    /// and override whatever `properties` carries for them.
    pub fn register(&self, capability: Capability, properties: PropertyMap) -> ServiceReference {
        let id = self.service_ids.allocate();
        let reference = ServiceReference::new(id, Self::stamp(id, capability.role(), properties));

        write(&self.services).insert(
            id,
            Registration {
                reference: reference.clone(),
                capability,
                usage: 0,
            },
        );
        info!(service = %id, pid = ?reference.pid(), "Registered service");

        self.dispatch(ServiceEventKind::Registered, &reference);
        reference
    }

    /// Replace a registration's properties and emit `Modified`.
    pub fn set_properties(&self, id: ServiceId, properties: PropertyMap) -> Result<ServiceReference, WireError> {
        let reference = {
            let mut services = write(&self.services);
            let registration = services.get_mut(&id).ok_or(WireError::ServiceNotFound(id))?;
            let role = registration.capability.role();
            registration.reference = ServiceReference::new(id, Self::stamp(id, role, properties));
            registration.reference.clone()
        };
        debug!(service = %id, pid = ?reference.pid(), "Modified service");

        self.dispatch(ServiceEventKind::Modified, &reference);
        Ok(reference)
    }

    /// Emit `Unregistering` and then drop the registration.
    pub fn unregister(&self, id: ServiceId) -> Result<(), WireError> {
        let reference = read(&self.services)
            .get(&id)
            .map(|registration| registration.reference.clone())
            .ok_or(WireError::ServiceNotFound(id))?;

        self.dispatch(ServiceEventKind::Unregistering, &reference);

        if let Some(registration) = write(&self.services).shift_remove(&id) {
            if registration.usage > 0 {
                debug!(service = %id, usage = registration.usage, "Unregistered service still in use");
            }
        }
        info!(service = %id, "Unregistered service");
        Ok(())
    }

    /// Outstanding `acquire` count for a registration.
    pub fn usage_count(&self, id: ServiceId) -> u32 {
        read(&self.services).get(&id).map(|r| r.usage).unwrap_or(0)
    }

    pub fn service_count(&self) -> usize {
        read(&self.services).len()
    }

    pub fn subscription_count(&self) -> usize {
        read(&self.subscribers).len()
    }

    fn stamp(id: ServiceId, role: Role, mut properties: PropertyMap) -> PropertyMap {
        properties.insert(keys::SERVICE_ID.to_string(), PropertyValue::Long(id.as_u64() as i64));
        properties.insert(
            keys::OBJECT_CLASS.to_string(),
            PropertyValue::StringList(vec![role.object_class().to_string()]),
        );
        properties
    }

    /// Snapshot matching listeners, then call them with no lock held.
    fn dispatch(&self, kind: ServiceEventKind, reference: &ServiceReference) {
        let listeners: Vec<Arc<dyn ServiceListener>> = read(&self.subscribers)
            .values()
            .filter(|s| s.predicate.matches(reference.properties()))
            .map(|s| s.listener.clone())
            .collect();

        let event = ServiceEvent {
            kind,
            reference: reference.clone(),
        };
        for listener in listeners {
            listener.service_changed(&event);
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDirectory")
            .field("services", &self.service_count())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl ServiceDirectory for InMemoryDirectory {
    fn subscribe(
        &self,
        predicate: &str,
        listener: Arc<dyn ServiceListener>,
    ) -> Result<SubscriptionId, WireError> {
        let predicate = self.evaluator.compile(predicate)?;
        let id = self.subscription_ids.allocate();
        write(&self.subscribers).insert(id, Subscriber { predicate, listener });
        debug!(subscription = %id, "Added directory subscription");
        Ok(id)
    }

    fn refine(&self, subscription: SubscriptionId, predicate: &str) -> Result<(), WireError> {
        let predicate = self.evaluator.compile(predicate)?;
        match write(&self.subscribers).get_mut(&subscription) {
            Some(subscriber) => subscriber.predicate = predicate,
            None => debug!(subscription = %subscription, "Refine on unknown subscription ignored"),
        }
        Ok(())
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        if write(&self.subscribers).shift_remove(&subscription).is_some() {
            debug!(subscription = %subscription, "Removed directory subscription");
        }
    }

    fn lookup(&self, role: Role, predicate: &str) -> Result<Vec<ServiceReference>, WireError> {
        let predicate = self.evaluator.compile(predicate)?;
        Ok(read(&self.services)
            .values()
            .filter(|r| r.capability.role() == role)
            .filter(|r| predicate.matches(r.reference.properties()))
            .map(|r| r.reference.clone())
            .collect())
    }

    fn acquire(&self, reference: &ServiceReference) -> Option<Capability> {
        let mut services = write(&self.services);
        let registration = services.get_mut(&reference.id())?;
        registration.usage += 1;
        Some(registration.capability.clone())
    }

    fn release(&self, reference: &ServiceReference) {
        match write(&self.services).get_mut(&reference.id()) {
            Some(registration) => registration.usage = registration.usage.saturating_sub(1),
            None => warn!(service = %reference.id(), "Release of unknown service"),
        }
    }
}
