//! Wire registry: creates, updates and deletes wires and fans their
//! administrative events out to listeners.

use crate::config::WireAdminConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wireadmin_core::{
    keys, AllowAll, LdapEvaluator, NotificationEvent, NotificationTarget, PredicateEvaluator, PropertyMap,
    Registry, Role, ScopeAuthority, ServiceDirectory, Wire, WireContext, WireError, WireEventKind,
    WireProperties,
};

/// One administrative event about one wire.
#[derive(Debug, Clone)]
pub struct WireAdminEvent {
    pub kind: WireEventKind,
    pub wire_pid: Option<String>,
    pub wire: Wire,
    /// Set for the two exception kinds.
    pub error: Option<WireError>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for WireAdminEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.wire_pid.as_deref().unwrap_or("?"))?;
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// Synchronous event callback, selected by a [`WireEventKind`] bit mask.
pub trait WireAdminListener: Send + Sync {
    fn wire_admin_event(&self, event: &WireAdminEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    listener: Arc<dyn WireAdminListener>,
    mask: u32,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of every wire in the process.
///
/// Built inside an `Arc` so the wires it creates can hold it weakly. The wire
/// table lock is never held while calling into a wire.
pub struct WireAdmin {
    config: WireAdminConfig,
    directory: Arc<dyn ServiceDirectory>,
    evaluator: Arc<dyn PredicateEvaluator>,
    authority: Arc<dyn ScopeAuthority>,
    this: Weak<WireAdmin>,
    wires: RwLock<IndexMap<String, Wire>>,
    listeners: DashMap<ListenerId, Registration>,
    next_listener: AtomicU64,
    events: broadcast::Sender<WireAdminEvent>,
}

impl WireAdmin {
    pub fn new(config: WireAdminConfig, directory: Arc<dyn ServiceDirectory>) -> Arc<Self> {
        Self::with_authority(config, directory, Arc::new(AllowAll))
    }

    pub fn with_authority(
        config: WireAdminConfig,
        directory: Arc<dyn ServiceDirectory>,
        authority: Arc<dyn ScopeAuthority>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Arc::new_cyclic(|this| Self {
            config,
            directory,
            evaluator: Arc::new(LdapEvaluator),
            authority,
            this: this.clone(),
            wires: RwLock::new(IndexMap::new()),
            listeners: DashMap::new(),
            next_listener: AtomicU64::new(1),
            events,
        })
    }

    pub fn config(&self) -> &WireAdminConfig {
        &self.config
    }

    fn context(&self) -> WireContext {
        let registry: Weak<dyn Registry> = self.this.clone();
        WireContext::new(self.directory.clone(), registry)
            .with_evaluator(self.evaluator.clone())
            .with_authority(self.authority.clone())
    }

    /// Create and start a wire between two PIDs.
    ///
    /// The PID keys in `properties` are overwritten; the wire PID is
    /// generated.
    pub fn create_wire(
        &self,
        producer_pid: &str,
        consumer_pid: &str,
        properties: PropertyMap,
    ) -> Result<Wire, WireError> {
        if producer_pid.is_empty() || consumer_pid.is_empty() {
            return Err(WireError::InvalidProperties(
                "producer and consumer pids must not be empty".to_string(),
            ));
        }
        let wire_pid = format!("{}{}", self.config.wire_pid_prefix, Uuid::new_v4());

        let mut properties = properties;
        properties.insert(keys::WIREADMIN_PID.to_string(), wire_pid.clone().into());
        properties.insert(keys::PRODUCER_PID.to_string(), producer_pid.into());
        properties.insert(keys::CONSUMER_PID.to_string(), consumer_pid.into());

        let wire = Wire::new(self.context(), WireProperties::new(properties));
        write(&self.wires).insert(wire_pid.clone(), wire.clone());
        info!("Created wire {} ({} -> {})", wire_pid, producer_pid, consumer_pid);

        self.notify_listeners(&wire, WireEventKind::WireCreated, None);
        wire.start();
        Ok(wire)
    }

    /// Replace a wire's properties. Missing PID keys keep their values.
    pub fn update_wire(&self, wire_pid: &str, properties: PropertyMap) -> Result<Wire, WireError> {
        let wire = self
            .get_wire(wire_pid)
            .ok_or_else(|| WireError::WireNotFound(wire_pid.to_string()))?;
        if properties
            .get(keys::WIREADMIN_PID)
            .is_some_and(|pid| pid.as_str() != Some(wire_pid))
        {
            return Err(WireError::InvalidProperties(format!(
                "{} cannot be changed",
                keys::WIREADMIN_PID
            )));
        }
        wire.set_properties(properties);
        debug!("Updated wire {}", wire_pid);
        Ok(wire)
    }

    /// Stop and forget a wire.
    pub fn delete_wire(&self, wire_pid: &str) -> Result<(), WireError> {
        let wire = write(&self.wires)
            .shift_remove(wire_pid)
            .ok_or_else(|| WireError::WireNotFound(wire_pid.to_string()))?;
        self.retire(wire);
        Ok(())
    }

    fn retire(&self, wire: Wire) {
        wire.stop();
        info!("Deleted wire {:?}", wire.wire_pid());
        self.notify_listeners(&wire, WireEventKind::WireDeleted, None);
    }

    pub fn get_wire(&self, wire_pid: &str) -> Option<Wire> {
        read(&self.wires).get(wire_pid).cloned()
    }

    /// Wires whose properties match `filter`, or every wire for `None`.
    pub fn get_wires(&self, filter: Option<&str>) -> Result<Vec<Wire>, WireError> {
        let predicate = filter.map(|f| self.evaluator.compile(f)).transpose()?;
        let wires: Vec<Wire> = read(&self.wires).values().cloned().collect();
        Ok(match predicate {
            Some(predicate) => wires
                .into_iter()
                .filter(|wire| predicate.matches(wire.properties().entries()))
                .collect(),
            None => wires,
        })
    }

    pub fn wire_count(&self) -> usize {
        read(&self.wires).len()
    }

    /// Receive every event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WireAdminEvent> {
        self.events.subscribe()
    }

    pub fn add_listener(&self, listener: Arc<dyn WireAdminListener>, mask: u32) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, Registration { listener, mask });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Stop every wire without raising events.
    pub fn shutdown(&self) {
        let wires: Vec<Wire> = write(&self.wires).drain(..).map(|(_, wire)| wire).collect();
        debug!("Stopping {} wires", wires.len());
        for wire in wires {
            wire.stop();
        }
    }

    fn pid_of(wire: &Wire, role: Role) -> Option<String> {
        let properties = wire.properties();
        let pid = match role {
            Role::Producer => properties.producer_pid(),
            Role::Consumer => properties.consumer_pid(),
        };
        pid.map(str::to_string)
    }
}

impl Registry for WireAdmin {
    fn connected_wires(&self, role: Role, pid: &str) -> Vec<Wire> {
        let wires: Vec<Wire> = read(&self.wires).values().cloned().collect();
        wires
            .into_iter()
            .filter(|wire| wire.is_connected() && Self::pid_of(wire, role).as_deref() == Some(pid))
            .collect()
    }

    fn notify_listeners(&self, wire: &Wire, kind: WireEventKind, error: Option<WireError>) {
        if kind == WireEventKind::WireTrace && !self.config.trace_events {
            return;
        }
        let event = WireAdminEvent {
            kind,
            wire_pid: wire.wire_pid(),
            wire: wire.clone(),
            error,
            timestamp: Utc::now(),
        };
        debug!("Wire admin event {}", event);

        let listeners: Vec<Arc<dyn WireAdminListener>> = self
            .listeners
            .iter()
            .filter(|entry| kind.is_in(entry.mask))
            .map(|entry| entry.listener.clone())
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.wire_admin_event(&event))).is_err() {
                warn!("Wire admin listener panicked on {}", event);
            }
        }

        // no receivers is fine
        let _ = self.events.send(event);
    }

    fn notify_endpoints(&self, event: NotificationEvent) {
        let result = catch_unwind(AssertUnwindSafe(|| match &event.target {
            NotificationTarget::Producer(producer) => producer.consumers_connected(&event.wires),
            NotificationTarget::Consumer(consumer) => consumer.producers_connected(&event.wires),
        }))
        .unwrap_or_else(|payload| Err(WireError::from_panic(payload)));

        if let Err(error) = result {
            let kind = match event.target.role() {
                Role::Producer => WireEventKind::ProducerException,
                Role::Consumer => WireEventKind::ConsumerException,
            };
            warn!("{} failed handling its connected wires: {}", event.target.role(), error);
            self.notify_listeners(&event.wire, kind, Some(error));
        }
    }

    fn delete_wire(&self, wire: &Wire) {
        let removed = {
            let mut wires = write(&self.wires);
            let index = wires.values().position(|w| w.ptr_eq(wire));
            index.and_then(|i| wires.shift_remove_index(i)).map(|(_, w)| w)
        };
        match removed {
            Some(wire) => self.retire(wire),
            None => wire.stop(),
        }
    }
}

impl fmt::Debug for WireAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireAdmin")
            .field("config", &self.config)
            .field("wires", &self.wire_count())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
