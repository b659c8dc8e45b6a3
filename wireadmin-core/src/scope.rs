//! Scope and composite-interoperability negotiation between a bound producer
//! and consumer.

use crate::properties::keys;

/// Outcome of scope negotiation for a connected wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedScope {
    /// `None` when no restriction applies.
    names: Option<Vec<String>>,
    /// False once permissions, the peer or the wire restriction dropped a name.
    all_accepted: bool,
}

impl Default for NegotiatedScope {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl NegotiatedScope {
    pub fn unrestricted() -> Self {
        Self {
            names: None,
            all_accepted: true,
        }
    }

    /// Negotiate from each side's declared list and the subset of it that
    /// side is authorized for.
    ///
    /// If either side declares nothing the wire is unrestricted. A consumer
    /// authorized for exactly `*` takes the producer's authorized list as is.
    pub fn negotiate(
        producer_declared: Option<&[String]>,
        producer_granted: Vec<String>,
        consumer_declared: Option<&[String]>,
        consumer_granted: Vec<String>,
    ) -> Self {
        let (Some(producer_declared), Some(consumer_declared)) = (producer_declared, consumer_declared) else {
            return Self::unrestricted();
        };

        if consumer_granted.len() == 1 && consumer_granted[0] == keys::SCOPE_ALL {
            return Self {
                names: Some(producer_granted),
                all_accepted: true,
            };
        }

        let mut all_accepted = producer_granted.len() == producer_declared.len()
            && consumer_granted.len() == consumer_declared.len();

        let mut names = Vec::with_capacity(producer_granted.len());
        for name in producer_granted {
            if consumer_granted.contains(&name) {
                names.push(name);
            } else {
                all_accepted = false;
            }
        }

        Self {
            names: Some(names),
            all_accepted,
        }
    }

    /// Narrow by an administrative restriction configured on the wire.
    pub fn restrict(mut self, restriction: Option<&[String]>) -> Self {
        let Some(restriction) = restriction else {
            return self;
        };
        if restriction.iter().any(|r| r == keys::SCOPE_ALL) {
            return self;
        }
        match self.names.as_mut() {
            Some(names) => {
                let before = names.len();
                names.retain(|name| name == keys::SCOPE_ALL || restriction.contains(name));
                if names.len() != before {
                    self.all_accepted = false;
                }
            }
            None => {
                self.names = Some(restriction.to_vec());
                self.all_accepted = false;
            }
        }
        self
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    pub fn all_accepted(&self) -> bool {
        self.all_accepted
    }

    pub fn has_scope(&self, name: &str) -> bool {
        match &self.names {
            None => true,
            Some(names) => names.iter().any(|n| n == name || n == keys::SCOPE_ALL),
        }
    }
}

/// Composite interoperability: only two non-empty, disjoint tag sets fail.
pub fn interoperable(producer: Option<&[String]>, consumer: Option<&[String]>) -> bool {
    match (producer, consumer) {
        (Some(p), Some(c)) if !p.is_empty() && !c.is_empty() => p.iter().any(|tag| c.contains(tag)),
        _ => true,
    }
}
