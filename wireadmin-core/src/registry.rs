//! The administrative side a wire reports to.

use crate::endpoint::{Consumer, Producer, Role};
use crate::error::WireError;
use crate::wire::Wire;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Administrative event kinds, usable as bit-mask flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireEventKind {
    ProducerException,
    ConsumerException,
    WireCreated,
    WireUpdated,
    WireDeleted,
    WireConnected,
    WireDisconnected,
    WireTrace,
}

impl WireEventKind {
    pub const ALL: [WireEventKind; 8] = [
        WireEventKind::ProducerException,
        WireEventKind::ConsumerException,
        WireEventKind::WireCreated,
        WireEventKind::WireUpdated,
        WireEventKind::WireDeleted,
        WireEventKind::WireConnected,
        WireEventKind::WireDisconnected,
        WireEventKind::WireTrace,
    ];

    /// Mask selecting every kind.
    pub const ALL_MASK: u32 = 0xff;

    pub fn mask(&self) -> u32 {
        match self {
            WireEventKind::ProducerException => 0x01,
            WireEventKind::ConsumerException => 0x02,
            WireEventKind::WireCreated => 0x04,
            WireEventKind::WireUpdated => 0x08,
            WireEventKind::WireDeleted => 0x10,
            WireEventKind::WireConnected => 0x20,
            WireEventKind::WireDisconnected => 0x40,
            WireEventKind::WireTrace => 0x80,
        }
    }

    pub fn is_in(&self, mask: u32) -> bool {
        mask & self.mask() != 0
    }
}

impl fmt::Display for WireEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WireEventKind::ProducerException => "PRODUCER_EXCEPTION",
            WireEventKind::ConsumerException => "CONSUMER_EXCEPTION",
            WireEventKind::WireCreated => "WIRE_CREATED",
            WireEventKind::WireUpdated => "WIRE_UPDATED",
            WireEventKind::WireDeleted => "WIRE_DELETED",
            WireEventKind::WireConnected => "WIRE_CONNECTED",
            WireEventKind::WireDisconnected => "WIRE_DISCONNECTED",
            WireEventKind::WireTrace => "WIRE_TRACE",
        };
        f.write_str(s)
    }
}

/// Endpoint a connect/disconnect notification is addressed to.
#[derive(Clone)]
pub enum NotificationTarget {
    Producer(Arc<dyn Producer>),
    Consumer(Arc<dyn Consumer>),
}

impl NotificationTarget {
    pub fn role(&self) -> Role {
        match self {
            NotificationTarget::Producer(_) => Role::Producer,
            NotificationTarget::Consumer(_) => Role::Consumer,
        }
    }
}

/// Tells one endpoint which wires it is now connected through.
#[derive(Clone)]
pub struct NotificationEvent {
    pub target: NotificationTarget,
    /// Wire whose transition caused the notification.
    pub wire: Wire,
    /// Connected wires of the target endpoint's PID, in registry order.
    pub wires: Vec<Wire>,
}

impl NotificationEvent {
    /// PIDs on the far side of the target's connected wires.
    pub fn peer_pids(&self) -> Vec<String> {
        let peer_role = match self.target.role() {
            Role::Producer => Role::Consumer,
            Role::Consumer => Role::Producer,
        };
        self.wires
            .iter()
            .filter_map(|wire| {
                let props = wire.properties();
                match peer_role {
                    Role::Producer => props.producer_pid().map(str::to_string),
                    Role::Consumer => props.consumer_pid().map(str::to_string),
                }
            })
            .collect()
    }
}

impl fmt::Debug for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationEvent")
            .field("target", &self.target.role())
            .field("wire", &self.wire.wire_pid())
            .field("wires", &self.wires.len())
            .finish()
    }
}

/// Owner of wire identity and listener fan-out.
///
/// Wires call into the registry only after releasing their own lock, so an
/// implementation may freely query any wire, including the caller.
pub trait Registry: Send + Sync {
    /// Connected wires whose `role` side has the given PID.
    fn connected_wires(&self, role: Role, pid: &str) -> Vec<Wire>;

    fn notify_listeners(&self, wire: &Wire, kind: WireEventKind, error: Option<WireError>);

    fn notify_endpoints(&self, event: NotificationEvent);

    /// Remove a wire that cannot be bound (duplicate endpoint PIDs).
    fn delete_wire(&self, wire: &Wire);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_are_distinct_bits() {
        let mut seen = 0u32;
        for kind in WireEventKind::ALL {
            assert_eq!(kind.mask().count_ones(), 1);
            assert_eq!(seen & kind.mask(), 0);
            seen |= kind.mask();
        }
        assert_eq!(seen, WireEventKind::ALL_MASK);
    }

    #[test]
    fn test_is_in_mask() {
        let mask = WireEventKind::WireConnected.mask() | WireEventKind::WireDisconnected.mask();
        assert!(WireEventKind::WireConnected.is_in(mask));
        assert!(!WireEventKind::WireTrace.is_in(mask));
    }

    #[test]
    fn test_display_and_serde_names_agree() {
        for kind in WireEventKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }
}
