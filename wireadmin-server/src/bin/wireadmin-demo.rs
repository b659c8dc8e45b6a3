//! Wire admin demo
//!
//! Registers a simulated thermometer and a display in an in-memory
//! directory, wires them together with a change filter and streams readings
//! across the wire while printing the administrative events.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};
use wireadmin_core::{
    keys, Capability, Consumer, Flavor, InMemoryDirectory, Producer, PropertyMap, PropertyValue, Wire,
    WireError, WireProperties, WireValue,
};
use wireadmin_server::{init_logging, WireAdmin, WireAdminConfig};

/// Simulated thermometer reporting tenths of a degree
#[derive(Debug, Default)]
struct Thermometer {
    reading: AtomicI64,
}

impl Thermometer {
    fn next_reading(&self, step: i64) -> WireValue {
        WireValue::Integer(self.reading.fetch_add(step, Ordering::SeqCst) + step)
    }
}

impl Producer for Thermometer {
    fn polled(&self, _wire: &WireProperties) -> Result<Option<WireValue>, WireError> {
        Ok(Some(WireValue::Integer(self.reading.load(Ordering::SeqCst))))
    }

    fn consumers_connected(&self, wires: &[Wire]) -> Result<(), WireError> {
        info!("Thermometer now feeds {} wire(s)", wires.len());
        Ok(())
    }
}

#[derive(Debug)]
struct Display;

impl Consumer for Display {
    fn updated(&self, wire: &WireProperties, value: &WireValue) -> Result<(), WireError> {
        info!("Display [{}] shows {:?}", wire.wire_pid().unwrap_or("?"), value);
        Ok(())
    }

    fn producers_connected(&self, wires: &[Wire]) -> Result<(), WireError> {
        info!("Display now fed by {} wire(s)", wires.len());
        Ok(())
    }
}

fn service_properties(pid: &str) -> PropertyMap {
    let mut properties = PropertyMap::new();
    properties.insert(keys::SERVICE_PID.to_string(), pid.into());
    properties
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = WireAdminConfig::from_env().context("reading WIREADMIN_* configuration")?;
    let _guard = init_logging(&config.log_dir, &config.log_prefix)?;

    info!("Starting wire admin demo");

    let directory = Arc::new(InMemoryDirectory::new());
    let admin = WireAdmin::new(config, directory.clone());

    let mut events = admin.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("event: {}", event),
                Err(RecvError::Lagged(missed)) => error!("Event printer lagged by {} events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let thermometer = Arc::new(Thermometer::default());
    let mut display_properties = service_properties("demo.display");
    display_properties.insert(keys::CONSUMER_FLAVORS.to_string(), vec![Flavor::Integer].into());
    let display = directory.register(Capability::Consumer(Arc::new(Display)), display_properties);

    let mut wire_properties = PropertyMap::new();
    wire_properties.insert(
        keys::FILTER.to_string(),
        PropertyValue::from("(|(!(wirevalue.previous=*))(wirevalue.delta.absolute>=10))"),
    );
    let wire = admin.create_wire("demo.thermometer", "demo.display", wire_properties)?;
    info!("{}", wire);

    // the wire connects as soon as the producer shows up
    directory.register(
        Capability::Producer(thermometer.clone()),
        service_properties("demo.thermometer"),
    );
    info!("{}", wire);

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    for step in [3, 4, 5, 12, 2, 9, 15] {
        ticker.tick().await;
        wire.update(thermometer.next_reading(step));
    }
    info!("Polled {:?}", wire.poll());

    directory.unregister(display.id())?;
    info!("{}", wire);

    let wire_pid = wire.wire_pid().context("wire without pid")?;
    admin.delete_wire(&wire_pid)?;

    drop(admin);
    tokio::time::timeout(Duration::from_secs(1), printer)
        .await
        .context("event printer did not finish")??;

    info!("Demo finished");
    Ok(())
}
