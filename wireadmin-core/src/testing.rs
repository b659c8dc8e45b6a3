//! Shared fixtures for the unit tests in this crate.

use crate::directory::{InMemoryDirectory, ServiceReference};
use crate::endpoint::{Capability, Consumer, Producer, Role};
use crate::error::WireError;
use crate::properties::{keys, PropertyMap, PropertyValue, WireProperties};
use crate::registry::{NotificationEvent, NotificationTarget, Registry, WireEventKind};
use crate::value::WireValue;
use crate::wire::{Wire, WireContext};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Notified {
    pub role: Role,
    pub wire_pid: Option<String>,
    pub peers: Vec<String>,
}

/// Registry double that records everything a wire reports.
#[derive(Default)]
pub struct RecordingRegistry {
    wires: Mutex<Vec<Wire>>,
    events: Mutex<Vec<(WireEventKind, Option<WireError>)>>,
    notifications: Mutex<Vec<Notified>>,
    deleted: Mutex<Vec<Option<String>>>,
    slow: Mutex<Option<(WireEventKind, Duration)>>,
}

impl RecordingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn track(&self, wire: &Wire) {
        self.wires.lock().unwrap().push(wire.clone());
    }

    pub fn kinds(&self) -> Vec<WireEventKind> {
        self.events.lock().unwrap().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn count(&self, kind: WireEventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn errors(&self) -> Vec<WireError> {
        self.events.lock().unwrap().iter().filter_map(|(_, e)| e.clone()).collect()
    }

    pub fn notifications(&self) -> Vec<Notified> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<Option<String>> {
        self.deleted.lock().unwrap().clone()
    }

    /// Delay delivery of every `kind` listener event before recording it.
    pub fn slow_down(&self, kind: WireEventKind, delay: Duration) {
        *self.slow.lock().unwrap() = Some((kind, delay));
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.notifications.lock().unwrap().clear();
    }
}

impl Registry for RecordingRegistry {
    fn connected_wires(&self, role: Role, pid: &str) -> Vec<Wire> {
        let wires = self.wires.lock().unwrap().clone();
        wires
            .into_iter()
            .filter(|wire| wire.is_connected())
            .filter(|wire| {
                let properties = wire.properties();
                let bound = match role {
                    Role::Producer => properties.producer_pid(),
                    Role::Consumer => properties.consumer_pid(),
                };
                bound == Some(pid)
            })
            .collect()
    }

    fn notify_listeners(&self, _wire: &Wire, kind: WireEventKind, error: Option<WireError>) {
        let slow = *self.slow.lock().unwrap();
        if let Some((slow_kind, delay)) = slow {
            if slow_kind == kind {
                std::thread::sleep(delay);
            }
        }
        self.events.lock().unwrap().push((kind, error));
    }

    fn notify_endpoints(&self, event: NotificationEvent) {
        let result = match &event.target {
            NotificationTarget::Producer(p) => p.consumers_connected(&event.wires),
            NotificationTarget::Consumer(c) => c.producers_connected(&event.wires),
        };
        assert!(result.is_ok());
        self.notifications.lock().unwrap().push(Notified {
            role: event.target.role(),
            wire_pid: event.wire.wire_pid(),
            peers: event.peer_pids(),
        });
    }

    fn delete_wire(&self, wire: &Wire) {
        self.deleted.lock().unwrap().push(wire.wire_pid());
        wire.stop();
        self.wires.lock().unwrap().retain(|w| w != wire);
    }
}

#[derive(Default)]
pub struct RecordingConsumer {
    pub values: Mutex<Vec<WireValue>>,
    pub fail: AtomicBool,
    pub panic: AtomicBool,
    pub connected: Mutex<Vec<usize>>,
}

impl RecordingConsumer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn received(&self) -> Vec<WireValue> {
        self.values.lock().unwrap().clone()
    }
}

impl Consumer for RecordingConsumer {
    fn updated(&self, _wire: &WireProperties, value: &WireValue) -> Result<(), WireError> {
        if self.panic.load(Ordering::SeqCst) {
            panic!("consumer blew up");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(WireError::consumer("rejected"));
        }
        self.values.lock().unwrap().push(value.clone());
        Ok(())
    }

    fn producers_connected(&self, wires: &[Wire]) -> Result<(), WireError> {
        self.connected.lock().unwrap().push(wires.len());
        Ok(())
    }
}

#[derive(Default)]
pub struct ScriptedProducer {
    pub next: Mutex<Option<WireValue>>,
    pub fail: AtomicBool,
    pub panic: AtomicBool,
    pub polls: AtomicUsize,
    pub connected: Mutex<Vec<usize>>,
}

impl ScriptedProducer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn returning(value: impl Into<WireValue>) -> Arc<Self> {
        let producer = Self::default();
        *producer.next.lock().unwrap() = Some(value.into());
        Arc::new(producer)
    }
}

impl Producer for ScriptedProducer {
    fn polled(&self, _wire: &WireProperties) -> Result<Option<WireValue>, WireError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.panic.load(Ordering::SeqCst) {
            panic!("producer blew up");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(WireError::producer("sensor offline"));
        }
        Ok(self.next.lock().unwrap().clone())
    }

    fn consumers_connected(&self, wires: &[Wire]) -> Result<(), WireError> {
        self.connected.lock().unwrap().push(wires.len());
        Ok(())
    }
}

pub fn props(pid: &str, extra: &[(&str, PropertyValue)]) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(keys::SERVICE_PID.to_string(), pid.into());
    for (key, value) in extra {
        props.insert(key.to_string(), value.clone());
    }
    props
}

/// A directory and a recording registry wired together.
pub struct Fixture {
    pub directory: Arc<InMemoryDirectory>,
    pub registry: Arc<RecordingRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            directory: Arc::new(InMemoryDirectory::new()),
            registry: RecordingRegistry::new(),
        }
    }

    pub fn context(&self) -> WireContext {
        let registry: Arc<dyn Registry> = self.registry.clone();
        WireContext::new(self.directory.clone(), Arc::downgrade(&registry))
    }

    pub fn wire(&self, properties: WireProperties) -> Wire {
        let wire = Wire::new(self.context(), properties);
        self.registry.track(&wire);
        wire
    }

    pub fn wire_between(&self, producer_pid: &str, consumer_pid: &str) -> Wire {
        self.wire(
            WireProperties::builder()
                .wire_pid(format!("W-{producer_pid}-{consumer_pid}"))
                .producer_pid(producer_pid)
                .consumer_pid(consumer_pid)
                .build(),
        )
    }

    pub fn producer(
        &self,
        pid: &str,
        producer: Arc<ScriptedProducer>,
        extra: &[(&str, PropertyValue)],
    ) -> ServiceReference {
        self.directory.register(Capability::Producer(producer), props(pid, extra))
    }

    pub fn consumer(
        &self,
        pid: &str,
        consumer: Arc<RecordingConsumer>,
        extra: &[(&str, PropertyValue)],
    ) -> ServiceReference {
        self.directory.register(Capability::Consumer(consumer), props(pid, extra))
    }
}
