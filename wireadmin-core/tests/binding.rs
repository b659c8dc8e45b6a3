//! Wire binding through the public API with a minimal registry.

use std::sync::{Arc, Mutex, Weak};
use wireadmin_core::{
    keys, Capability, Consumer, InMemoryDirectory, NotificationEvent, Producer, PropertyMap, Registry, Role,
    ServiceDirectory, Wire, WireContext, WireError, WireEventKind, WireProperties, WireValue,
};

#[derive(Default)]
struct Log {
    wires: Mutex<Vec<Wire>>,
    kinds: Mutex<Vec<WireEventKind>>,
}

impl Registry for Log {
    fn connected_wires(&self, role: Role, pid: &str) -> Vec<Wire> {
        let wires = self.wires.lock().unwrap().clone();
        wires
            .into_iter()
            .filter(|w| w.is_connected())
            .filter(|w| {
                let properties = w.properties();
                match role {
                    Role::Producer => properties.producer_pid() == Some(pid),
                    Role::Consumer => properties.consumer_pid() == Some(pid),
                }
            })
            .collect()
    }

    fn notify_listeners(&self, _wire: &Wire, kind: WireEventKind, _error: Option<WireError>) {
        self.kinds.lock().unwrap().push(kind);
    }

    fn notify_endpoints(&self, _event: NotificationEvent) {}

    fn delete_wire(&self, wire: &Wire) {
        wire.stop();
    }
}

struct Counter(Mutex<i64>);

impl Producer for Counter {
    fn polled(&self, _wire: &WireProperties) -> Result<Option<WireValue>, WireError> {
        let mut n = self.0.lock().unwrap();
        *n += 1;
        Ok(Some(WireValue::Integer(*n)))
    }
}

#[derive(Default)]
struct Last(Mutex<Option<WireValue>>);

impl Consumer for Last {
    fn updated(&self, _wire: &WireProperties, value: &WireValue) -> Result<(), WireError> {
        *self.0.lock().unwrap() = Some(value.clone());
        Ok(())
    }
}

fn service(pid: &str) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(keys::SERVICE_PID.to_string(), pid.into());
    props
}

fn wire(directory: &Arc<InMemoryDirectory>, log: &Arc<Log>) -> Wire {
    let registry: Arc<dyn Registry> = log.clone();
    let registry: Weak<dyn Registry> = Arc::downgrade(&registry);
    let directory: Arc<dyn ServiceDirectory> = directory.clone();
    let wire = Wire::new(
        WireContext::new(directory, registry),
        WireProperties::builder()
            .wire_pid("W1")
            .producer_pid("sensor.1")
            .consumer_pid("panel.1")
            .build(),
    );
    log.wires.lock().unwrap().push(wire.clone());
    wire
}

#[test]
fn test_push_and_pull_through_a_bound_wire() {
    let directory = Arc::new(InMemoryDirectory::new());
    let log = Arc::new(Log::default());
    let last = Arc::new(Last::default());

    let producer = directory.register(Capability::Producer(Arc::new(Counter(Mutex::new(0)))), service("sensor.1"));
    let wire = wire(&directory, &log);
    wire.start();
    assert!(!wire.is_connected());

    directory.register(Capability::Consumer(last.clone()), service("panel.1"));
    assert!(wire.is_connected());
    assert_eq!(directory.usage_count(producer.id()), 1);

    assert_eq!(wire.poll(), Some(WireValue::Integer(1)));
    wire.update(WireValue::Text("hello".into()));
    assert_eq!(*last.0.lock().unwrap(), Some(WireValue::Text("hello".into())));
    assert_eq!(
        *log.kinds.lock().unwrap(),
        vec![WireEventKind::WireConnected, WireEventKind::WireTrace, WireEventKind::WireTrace]
    );

    wire.stop();
    assert_eq!(directory.usage_count(producer.id()), 0);
    assert_eq!(directory.subscription_count(), 0);
}

#[test]
fn test_pid_with_filter_metacharacters() {
    let directory = Arc::new(InMemoryDirectory::new());
    let log = Arc::new(Log::default());
    let registry: Arc<dyn Registry> = log.clone();
    let registry: Weak<dyn Registry> = Arc::downgrade(&registry);
    let wire = Wire::new(
        WireContext::new(directory.clone(), registry),
        WireProperties::builder()
            .wire_pid("W2")
            .producer_pid("sensor(*)")
            .consumer_pid("panel.1")
            .build(),
    );
    log.wires.lock().unwrap().push(wire.clone());

    directory.register(Capability::Producer(Arc::new(Counter(Mutex::new(0)))), service("sensor-x"));
    directory.register(Capability::Consumer(Arc::new(Last::default())), service("panel.1"));
    wire.start();
    assert!(!wire.is_connected());

    directory.register(Capability::Producer(Arc::new(Counter(Mutex::new(0)))), service("sensor(*)"));
    assert!(wire.is_connected());
}
