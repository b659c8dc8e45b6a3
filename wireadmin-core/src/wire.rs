//! The per-wire binding and data-flow state machine.
//!
//! A [`Wire`] watches the directory for its producer and consumer PIDs,
//! binds them when they appear, negotiates scope and interoperability, and
//! then gates every value pushed through [`Wire::update`] or pulled through
//! [`Wire::poll`].
//!
//! All transitions and data calls on one wire are serialized by a single
//! mutex. Registry notifications raised during a transition are queued in
//! transition order and delivered after the mutex is released, by one
//! thread at a time.

use crate::directory::{ServiceDirectory, ServiceEvent, ServiceEventKind, ServiceListener, ServiceReference};
use crate::endpoint::{EndpointRef, Role};
use crate::error::WireError;
use crate::filter::{escape, LdapEvaluator, Predicate, PredicateEvaluator};
use crate::ids::SubscriptionId;
use crate::permission::{AllowAll, ScopeAuthority};
use crate::properties::{keys, PropertyMap, PropertyValue, WireProperties};
use crate::registry::{NotificationEvent, NotificationTarget, Registry, WireEventKind};
use crate::scope::{interoperable, NegotiatedScope};
use crate::value::{Flavor, WireValue};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Collaborators a wire is constructed with.
#[derive(Clone)]
pub struct WireContext {
    pub directory: Arc<dyn ServiceDirectory>,
    pub evaluator: Arc<dyn PredicateEvaluator>,
    pub authority: Arc<dyn ScopeAuthority>,
    /// Held weakly; the registry owns its wires.
    pub registry: Weak<dyn Registry>,
}

impl WireContext {
    pub fn new(directory: Arc<dyn ServiceDirectory>, registry: Weak<dyn Registry>) -> Self {
        Self {
            directory,
            evaluator: Arc::new(LdapEvaluator),
            authority: Arc::new(AllowAll),
            registry,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn PredicateEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_authority(mut self, authority: Arc<dyn ScopeAuthority>) -> Self {
        self.authority = authority;
        self
    }
}

impl fmt::Debug for WireContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireContext")
            .field("registry_alive", &(self.registry.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

/// Notification raised while locked, delivered once the lock is released.
enum Notice {
    Listeners(WireEventKind, Option<WireError>),
    Endpoints(Vec<(String, NotificationTarget)>),
    Delete,
}

struct WireState {
    properties: Arc<WireProperties>,
    producer: Option<EndpointRef>,
    consumer: Option<EndpointRef>,
    scope: Option<NegotiatedScope>,
    interoperate: bool,
    filter: Option<Arc<dyn Predicate>>,
    last_value: Option<WireValue>,
    last_update: Option<Instant>,
    last_update_time: Option<DateTime<Utc>>,
    valid: bool,
    subscription: Option<SubscriptionId>,
}

impl WireState {
    fn is_connected(&self) -> bool {
        self.valid && self.producer.is_some() && self.consumer.is_some()
    }

    fn flavors(&self) -> Option<&[Flavor]> {
        if !self.is_connected() {
            return None;
        }
        self.consumer.as_ref()?.flavors.as_deref()
    }

    fn is_acceptable(&self, value: &WireValue) -> bool {
        match self.flavors() {
            Some(flavors) => flavors.contains(&value.flavor()),
            None => true,
        }
    }

    fn has_scope(&self, name: &str) -> bool {
        self.scope.as_ref().map(|s| s.has_scope(name)).unwrap_or(true)
    }

    /// Attributes a wire filter is evaluated against.
    fn filter_context(&self, value: &WireValue, now: Instant) -> PropertyMap {
        let mut context = PropertyMap::new();
        context.insert(keys::WIREVALUE_CURRENT.to_string(), PropertyValue::Value(value.clone()));

        if let Some(previous) = &self.last_value {
            context.insert(keys::WIREVALUE_PREVIOUS.to_string(), PropertyValue::Value(previous.clone()));

            if let (Some(current), Some(previous)) = (value.as_f64(), previous.as_f64()) {
                context.insert(
                    keys::WIREVALUE_DELTA_ABSOLUTE.to_string(),
                    PropertyValue::Double((current - previous).abs()),
                );
                context.insert(
                    keys::WIREVALUE_DELTA_RELATIVE.to_string(),
                    PropertyValue::Double((1.0 - previous / current).abs()),
                );
            }
        }

        if let Some(at) = self.last_update {
            let elapsed = now.saturating_duration_since(at).as_millis();
            context.insert(
                keys::WIREVALUE_ELAPSED.to_string(),
                PropertyValue::Long(i64::try_from(elapsed).unwrap_or(i64::MAX)),
            );
        }
        context
    }

    fn endpoints_notice(&self) -> Notice {
        let mut targets = Vec::with_capacity(2);
        if let Some(producer) = &self.producer {
            if let Some(p) = producer.producer() {
                targets.push((producer.pid.clone(), NotificationTarget::Producer(p.clone())));
            }
        }
        if let Some(consumer) = &self.consumer {
            if let Some(c) = consumer.consumer() {
                targets.push((consumer.pid.clone(), NotificationTarget::Consumer(c.clone())));
            }
        }
        Notice::Endpoints(targets)
    }

    fn bound_role(&self, reference: &ServiceReference) -> Option<Role> {
        let id = reference.id();
        if self.producer.as_ref().is_some_and(|e| e.service_id == id) {
            Some(Role::Producer)
        } else if self.consumer.as_ref().is_some_and(|e| e.service_id == id) {
            Some(Role::Consumer)
        } else {
            None
        }
    }
}

/// Notices waiting for delivery, plus whether some thread is delivering.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Notice>,
    draining: bool,
}

struct WireInner {
    context: WireContext,
    state: Mutex<WireState>,
    outbox: Mutex<Outbox>,
}

/// Frees the drain slot when a registry callback unwinds mid-drain.
struct DrainSlot<'a>(&'a Mutex<Outbox>);

impl Drop for DrainSlot<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).draining = false;
        }
    }
}

/// Directory subscription callback; holds the wire weakly.
struct WireListener {
    wire: Weak<WireInner>,
}

impl ServiceListener for WireListener {
    fn service_changed(&self, event: &ServiceEvent) {
        if let Some(inner) = self.wire.upgrade() {
            Wire { inner }.service_changed(event);
        }
    }
}

/// Run an endpoint callback, turning a panic into an error.
fn guarded<T>(call: impl FnOnce() -> Result<T, WireError>) -> Result<T, WireError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(WireError::from_panic(payload)),
    }
}

/// Cheap, cloneable handle to one producer/consumer binding.
#[derive(Clone)]
pub struct Wire {
    inner: Arc<WireInner>,
}

impl Wire {
    /// Create a wire that is valid but not yet started.
    pub fn new(context: WireContext, properties: WireProperties) -> Self {
        Self {
            inner: Arc::new(WireInner {
                context,
                state: Mutex::new(WireState {
                    properties: Arc::new(properties),
                    producer: None,
                    consumer: None,
                    scope: None,
                    interoperate: true,
                    filter: None,
                    last_value: None,
                    last_update: None,
                    last_update_time: None,
                    valid: true,
                    subscription: None,
                }),
                outbox: Mutex::new(Outbox::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WireState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.inner.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition<R>(&self, f: impl FnOnce(&Self, &mut WireState, &mut Vec<Notice>) -> R) -> R {
        let mut notices = Vec::new();
        let result = {
            let mut state = self.lock();
            let result = f(self, &mut *state, &mut notices);
            // enqueue before unlocking so delivery follows transition order
            if !notices.is_empty() {
                self.outbox().queue.extend(notices);
            }
            result
        };
        self.drain();
        result
    }

    /// Deliver queued notices in order. A caller that finds another thread
    /// (or an outer frame of its own) already draining leaves its notices
    /// to that drainer.
    fn drain(&self) {
        {
            let mut outbox = self.outbox();
            if outbox.draining || outbox.queue.is_empty() {
                return;
            }
            outbox.draining = true;
        }
        let _slot = DrainSlot(&self.inner.outbox);
        loop {
            let notice = {
                let mut outbox = self.outbox();
                match outbox.queue.pop_front() {
                    Some(notice) => notice,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            self.deliver(notice);
        }
    }

    fn deliver(&self, notice: Notice) {
        let Some(registry) = self.inner.context.registry.upgrade() else {
            debug!("Registry gone, dropping wire notification");
            return;
        };
        match notice {
            Notice::Listeners(kind, error) => registry.notify_listeners(self, kind, error),
            Notice::Endpoints(targets) => {
                for (pid, target) in targets {
                    let wires = registry.connected_wires(target.role(), &pid);
                    registry.notify_endpoints(NotificationEvent {
                        target,
                        wire: self.clone(),
                        wires,
                    });
                }
            }
            Notice::Delete => registry.delete_wire(self),
        }
    }

    // ---- administrative operations ----

    /// Subscribe to the directory and bind endpoints that are already present.
    pub fn start(&self) {
        self.transition(|wire, state, notices| wire.start_locked(state, notices));
    }

    /// Tear the wire down for good. Idempotent.
    pub fn stop(&self) {
        self.transition(|wire, state, notices| wire.stop_locked(state, notices, true));
    }

    /// Swap in a new property snapshot.
    ///
    /// Missing PID keys keep their current values. A changed producer or
    /// consumer PID rebinds the wire from scratch; anything else only
    /// recomputes scope and filter state and raises `WIRE_UPDATED`.
    pub fn set_properties(&self, properties: PropertyMap) {
        self.transition(|wire, state, notices| {
            if !state.valid {
                debug!("set_properties on deleted wire ignored");
                return;
            }
            let previous = state.properties.clone();
            let next = previous.merged_update(properties);
            let rebind =
                next.producer_pid() != previous.producer_pid() || next.consumer_pid() != previous.consumer_pid();
            state.properties = next;

            if rebind {
                info!(
                    "Wire {:?} redirected to producer {:?} / consumer {:?}, restarting",
                    state.properties.wire_pid(),
                    state.properties.producer_pid(),
                    state.properties.consumer_pid()
                );
                wire.stop_locked(state, notices, false);
                wire.start_locked(state, notices);
                return;
            }

            wire.check_wire_filter(state);
            if state.is_connected() {
                wire.negotiate(state);
                notices.push(state.endpoints_notice());
            }
            notices.push(Notice::Listeners(WireEventKind::WireUpdated, None));
        });
    }

    fn start_locked(&self, state: &mut WireState, notices: &mut Vec<Notice>) {
        if !state.valid {
            debug!("start on deleted wire ignored");
            return;
        }
        if state.subscription.is_some() {
            debug!("Wire {:?} already started", state.properties.wire_pid());
            return;
        }
        let properties = state.properties.clone();
        let (Some(producer_pid), Some(consumer_pid)) = (properties.producer_pid(), properties.consumer_pid()) else {
            warn!("Wire {:?} has no producer or consumer pid, not started", properties.wire_pid());
            return;
        };

        self.update_listener_filter(state);

        for (role, pid) in [(Role::Producer, producer_pid), (Role::Consumer, consumer_pid)] {
            if let Some(reference) = self.single_reference(role, pid, notices) {
                self.service_registered(state, reference, notices);
            }
        }
        debug!("Wire {:?} started", properties.wire_pid());
    }

    fn stop_locked(&self, state: &mut WireState, notices: &mut Vec<Notice>, invalidate: bool) {
        if !state.valid {
            return;
        }
        debug!("Stopping {}", Summary(state));

        if let Some(subscription) = state.subscription.take() {
            self.inner.context.directory.unsubscribe(subscription);
        }
        let was_connected = state.is_connected();
        if invalidate {
            state.valid = false;
        }
        if was_connected {
            notices.push(state.endpoints_notice());
        }

        for endpoint in [state.producer.take(), state.consumer.take()].into_iter().flatten() {
            self.inner.context.directory.release(&endpoint.reference);
        }
        state.scope = None;
        state.interoperate = true;
        state.filter = None;
        state.last_value = None;
        state.last_update = None;
        state.last_update_time = None;
    }

    /// Look up the single registration for `pid`; duplicates delete the wire.
    fn single_reference(&self, role: Role, pid: &str, notices: &mut Vec<Notice>) -> Option<ServiceReference> {
        let predicate = format!("({}={})", keys::SERVICE_PID, escape(pid));
        match self.inner.context.directory.lookup(role, &predicate) {
            Ok(mut references) => {
                if references.len() > 1 {
                    let error = WireError::DuplicatePid {
                        role,
                        pid: pid.to_string(),
                    };
                    warn!("{}; wire not created, unregister the duplicates", error);
                    notices.push(Notice::Delete);
                    return None;
                }
                references.pop()
            }
            Err(e) => {
                warn!("Lookup of {} {} failed: {}", role, pid, e);
                None
            }
        }
    }

    /// Discovery predicate for this wire. Bound instance ids stay matched so
    /// a PID change on a bound endpoint is still observed.
    fn listener_predicate(state: &WireState) -> String {
        let properties = &state.properties;
        let consumer_pid = escape(properties.consumer_pid().unwrap_or_default());
        let producer_pid = escape(properties.producer_pid().unwrap_or_default());

        let mut predicate = format!(
            "(|(&({pid}={consumer_pid})({class}={consumer}))(&({pid}={producer_pid})({class}={producer}))",
            pid = keys::SERVICE_PID,
            class = keys::OBJECT_CLASS,
            consumer = Role::Consumer.object_class(),
            producer = Role::Producer.object_class(),
        );
        for endpoint in [&state.consumer, &state.producer].into_iter().flatten() {
            predicate.push_str(&format!("({}={})", keys::SERVICE_ID, endpoint.service_id.as_u64()));
        }
        predicate.push(')');
        predicate
    }

    fn update_listener_filter(&self, state: &mut WireState) {
        let predicate = Self::listener_predicate(state);
        let directory = &self.inner.context.directory;
        let result = match state.subscription {
            Some(subscription) => directory.refine(subscription, &predicate),
            None => {
                let listener = Arc::new(WireListener {
                    wire: Arc::downgrade(&self.inner),
                });
                directory.subscribe(&predicate, listener).map(|id| {
                    state.subscription = Some(id);
                })
            }
        };
        if let Err(e) = result {
            warn!("Could not subscribe with {}: {}", predicate, e);
        }
    }

    // ---- discovery events ----

    fn service_changed(&self, event: &ServiceEvent) {
        self.transition(|wire, state, notices| {
            if !state.valid || state.subscription.is_none() {
                return;
            }
            let reference = event.reference.clone();
            match event.kind {
                ServiceEventKind::Registered => wire.service_registered(state, reference, notices),
                ServiceEventKind::Unregistering => wire.service_unregistered(state, &reference, notices),
                ServiceEventKind::Modified => wire.service_modified(state, reference, notices),
            }
        });
    }

    fn bind(&self, reference: &ServiceReference, role: Role) -> Option<EndpointRef> {
        let directory = &self.inner.context.directory;
        let capability = directory.acquire(reference)?;
        if capability.role() != role {
            directory.release(reference);
            return None;
        }
        let endpoint = EndpointRef::new(reference.clone(), capability);
        if endpoint.is_none() {
            directory.release(reference);
        }
        endpoint
    }

    fn service_registered(&self, state: &mut WireState, reference: ServiceReference, notices: &mut Vec<Notice>) {
        let Some(pid) = reference.pid() else {
            debug!("Ignoring {} without a pid", reference.id());
            return;
        };
        let properties = state.properties.clone();
        let role = match reference.role() {
            Some(Role::Producer) if Some(pid) == properties.producer_pid() => Role::Producer,
            Some(Role::Consumer) if Some(pid) == properties.consumer_pid() => Role::Consumer,
            _ => {
                debug!("{} ({}) does not belong to wire {:?}", reference.id(), pid, properties.wire_pid());
                return;
            }
        };

        let slot = match role {
            Role::Producer => &mut state.producer,
            Role::Consumer => &mut state.consumer,
        };
        if slot.is_some() {
            debug!("Wire {:?} already has a {}, ignoring {}", properties.wire_pid(), role, reference.id());
            return;
        }
        let Some(endpoint) = self.bind(&reference, role) else {
            debug!("{} vanished before it could be bound", reference.id());
            return;
        };
        debug!("Wire {:?} detected {} {}", properties.wire_pid(), role, pid);
        *slot = Some(endpoint);

        if state.is_connected() {
            self.negotiate(state);
            notices.push(state.endpoints_notice());
            notices.push(Notice::Listeners(WireEventKind::WireConnected, None));
            info!("{} connected", Summary(state));
        } else {
            debug!("Wire {:?} waiting for its peer", properties.wire_pid());
        }

        self.update_listener_filter(state);
        self.check_wire_filter(state);
    }

    fn service_unregistered(&self, state: &mut WireState, reference: &ServiceReference, notices: &mut Vec<Notice>) {
        let was_connected = state.is_connected();
        let released = match state.bound_role(reference) {
            Some(Role::Producer) => state.producer.take(),
            Some(Role::Consumer) => state.consumer.take(),
            None => {
                debug!("Unregistering another endpoint with the same pid, ignoring it");
                return;
            }
        };

        self.update_listener_filter(state);

        if was_connected {
            notices.push(state.endpoints_notice());
            notices.push(Notice::Listeners(WireEventKind::WireDisconnected, None));
            info!("{} disconnected", Summary(state));
        }
        if let Some(endpoint) = released {
            self.inner.context.directory.release(&endpoint.reference);
        }
    }

    fn service_modified(&self, state: &mut WireState, reference: ServiceReference, notices: &mut Vec<Notice>) {
        if let Some(role) = state.bound_role(&reference) {
            let expected = match role {
                Role::Producer => state.properties.producer_pid(),
                Role::Consumer => state.properties.consumer_pid(),
            };
            if reference.pid() != expected {
                debug!("Pid of bound {} changed to {:?}", role, reference.pid());
                self.service_unregistered(state, &reference, notices);
                return;
            }
            let slot = match role {
                Role::Producer => &mut state.producer,
                Role::Consumer => &mut state.consumer,
            };
            if let Some(endpoint) = slot.as_mut() {
                endpoint.refresh(reference.clone());
            }
        }

        if state.producer.is_none() || state.consumer.is_none() {
            self.service_registered(state, reference, notices);
            return;
        }
        if !state.is_connected() {
            return;
        }
        self.negotiate(state);
        self.check_wire_filter(state);
    }

    // ---- negotiation ----

    fn granted(&self, endpoint: &EndpointRef, role: Role) -> Vec<String> {
        let authority = &self.inner.context.authority;
        endpoint
            .scope
            .iter()
            .flatten()
            .filter(|name| authority.is_permitted(&endpoint.reference, name, role))
            .cloned()
            .collect()
    }

    fn negotiate(&self, state: &mut WireState) {
        let (Some(producer), Some(consumer)) = (&state.producer, &state.consumer) else {
            return;
        };
        let scope = NegotiatedScope::negotiate(
            producer.scope.as_deref(),
            self.granted(producer, Role::Producer),
            consumer.scope.as_deref(),
            self.granted(consumer, Role::Consumer),
        )
        .restrict(state.properties.scope_restriction().as_deref());
        let interoperate = interoperable(producer.composite.as_deref(), consumer.composite.as_deref());

        if !interoperate {
            debug!("{} has no common composite identity, data flow blocked", Summary(state));
        }
        state.scope = Some(scope);
        state.interoperate = interoperate;
    }

    fn check_wire_filter(&self, state: &mut WireState) {
        let producer_filters = state.producer.as_ref().map(|p| p.filters_itself);
        let expression = match (producer_filters, state.properties.filter()) {
            (Some(false), Some(expression)) => expression.to_string(),
            _ => {
                state.filter = None;
                return;
            }
        };
        state.filter = match self.inner.context.evaluator.compile(&expression) {
            Ok(predicate) => Some(predicate),
            Err(e) => {
                warn!("{}; filtering won't be made", e);
                None
            }
        };
    }

    // ---- data paths ----

    /// Push a value from the producer to the consumer.
    ///
    /// Silently does nothing unless the wire is connected, interoperable,
    /// the value's flavor is accepted, its envelope scope (if any) is
    /// authorized and the wire filter (if any) matches.
    pub fn update(&self, value: WireValue) {
        self.transition(|_, state, notices| {
            if !state.is_connected() || !state.interoperate || !state.is_acceptable(&value) {
                return;
            }
            if let Some(envelope) = value.as_envelope() {
                if !state.has_scope(envelope.scope()) {
                    debug!("Envelope scope {} not permitted on this wire, silent return", envelope.scope());
                    return;
                }
            }
            if let Some(filter) = &state.filter {
                let context = state.filter_context(&value, Instant::now());
                if !filter.matches(&context) {
                    debug!("{:?} rejected {:?}", filter, value);
                    return;
                }
            }

            let Some(consumer) = state.consumer.as_ref().and_then(|c| c.consumer().cloned()) else {
                return;
            };
            let properties = state.properties.clone();
            if let Err(error) = guarded(|| consumer.updated(&properties, &value)) {
                warn!("Consumer on wire {:?} failed: {}", properties.wire_pid(), error);
                notices.push(Notice::Listeners(WireEventKind::ConsumerException, Some(error)));
                return;
            }

            state.last_value = Some(value);
            state.last_update = Some(Instant::now());
            state.last_update_time = Some(Utc::now());
            notices.push(Notice::Listeners(WireEventKind::WireTrace, None));
        });
    }

    /// Pull the current value from the producer.
    ///
    /// Envelope collections are filtered down to the authorized scopes
    /// unless every scope was accepted during negotiation.
    pub fn poll(&self) -> Option<WireValue> {
        self.transition(|_, state, notices| {
            if !state.is_connected() || !state.interoperate {
                return None;
            }
            let producer = state.producer.as_ref().and_then(|p| p.producer().cloned())?;
            let properties = state.properties.clone();
            let value = match guarded(|| producer.polled(&properties)) {
                Ok(value) => value,
                Err(error) => {
                    warn!("Producer on wire {:?} failed: {}", properties.wire_pid(), error);
                    notices.push(Notice::Listeners(WireEventKind::ProducerException, Some(error)));
                    return None;
                }
            };
            notices.push(Notice::Listeners(WireEventKind::WireTrace, None));

            let value = value?;
            if !state.is_acceptable(&value) && !matches!(value, WireValue::Envelopes(_)) {
                debug!("Polled {} value not accepted by the consumer", value.flavor());
                return None;
            }
            state.last_value = Some(value.clone());

            match (value, &state.scope) {
                (WireValue::Envelopes(envelopes), Some(scope)) if !scope.all_accepted() => Some(WireValue::Envelopes(
                    envelopes.into_iter().filter(|e| scope.has_scope(e.scope())).collect(),
                )),
                (value, _) => Some(value),
            }
        })
    }

    // ---- observers ----

    pub fn wire_pid(&self) -> Option<String> {
        self.lock().properties.wire_pid().map(str::to_string)
    }

    pub fn properties(&self) -> Arc<WireProperties> {
        self.lock().properties.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    pub fn is_valid(&self) -> bool {
        self.lock().valid
    }

    /// Whether the bound endpoints share a composite identity.
    pub fn is_interoperable(&self) -> bool {
        self.lock().interoperate
    }

    /// Negotiated scope names; `None` when unrestricted or not negotiated.
    pub fn scope(&self) -> Option<Vec<String>> {
        self.lock().scope.as_ref().and_then(|s| s.names().map(<[String]>::to_vec))
    }

    pub fn has_scope(&self, name: &str) -> bool {
        self.lock().has_scope(name)
    }

    pub fn last_value(&self) -> Option<WireValue> {
        self.lock().last_value.clone()
    }

    /// Wall-clock time of the last successful `update`.
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.lock().last_update_time
    }

    /// Last value and last update time, read together.
    pub fn last_update(&self) -> (Option<WireValue>, Option<DateTime<Utc>>) {
        let state = self.lock();
        (state.last_value.clone(), state.last_update_time)
    }

    /// Flavors the consumer accepts; `None` if unrestricted or not connected.
    pub fn flavors(&self) -> Option<Vec<Flavor>> {
        self.lock().flavors().map(<[Flavor]>::to_vec)
    }

    pub fn ptr_eq(&self, other: &Wire) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Wire {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Wire {}

struct Summary<'a>(&'a WireState);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let properties = &self.0.properties;
        write!(
            f,
            "Wire[PID={};prodPID={};consPID={};connected={}]",
            properties.wire_pid().unwrap_or("?"),
            properties.producer_pid().unwrap_or("?"),
            properties.consumer_pid().unwrap_or("?"),
            self.0.is_connected()
        )
    }
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        write!(f, "{}", Summary(&state))
    }
}

impl fmt::Debug for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Wire")
            .field("properties", &state.properties)
            .field("producer", &state.producer)
            .field("consumer", &state.consumer)
            .field("scope", &state.scope)
            .field("interoperate", &state.interoperate)
            .field("valid", &state.valid)
            .finish_non_exhaustive()
    }
}
