use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Transient instance id the directory assigns to a registration.
///
/// Unlike a PID it changes every time an endpoint is registered again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(u64);

/// Handle returned by a directory subscription, used to refine or cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl ServiceId {
    pub fn new(value: u64) -> Self {
        ServiceId(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl SubscriptionId {
    pub fn new(value: u64) -> Self {
        SubscriptionId(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl From<u64> for ServiceId {
    fn from(value: u64) -> Self {
        ServiceId::new(value)
    }
}

impl From<u64> for SubscriptionId {
    fn from(value: u64) -> Self {
        SubscriptionId::new(value)
    }
}

#[derive(Debug)]
pub struct ServiceIdAllocator {
    next: AtomicU64,
}

#[derive(Debug)]
pub struct SubscriptionIdAllocator {
    next: AtomicU64,
}

impl ServiceIdAllocator {
    pub fn new() -> Self {
        ServiceIdAllocator {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> ServiceId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        ServiceId::new(id)
    }

    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl SubscriptionIdAllocator {
    pub fn new() -> Self {
        SubscriptionIdAllocator {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> SubscriptionId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        SubscriptionId::new(id)
    }
}

impl Default for ServiceIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for SubscriptionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_id_creation() {
        let id = ServiceId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(format!("{}", id), "ServiceId(42)");
    }

    #[test]
    fn test_service_id_allocator_is_monotonic() {
        let allocator = ServiceIdAllocator::new();
        assert_eq!(allocator.peek_next(), 1);

        let first = allocator.allocate();
        let second = allocator.allocate();
        assert_eq!(first.as_u64(), 1);
        assert_eq!(second.as_u64(), 2);
        assert!(first < second);
        assert_eq!(allocator.peek_next(), 3);
    }

    #[test]
    fn test_subscription_id_allocator() {
        let allocator = SubscriptionIdAllocator::new();
        let a = allocator.allocate();
        let b = allocator.allocate();
        assert_ne!(a, b);
        assert_eq!(SubscriptionId::from(7).as_u64(), 7);
    }

    #[test]
    fn test_id_serialization_is_transparent() {
        let id = ServiceId::new(9);
        assert_eq!(serde_json::to_string(&id).unwrap(), "9");
        let parsed: ServiceId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, id);
    }
}
