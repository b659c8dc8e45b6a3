//! Per-endpoint authorization for scope names.

use crate::directory::ServiceReference;
use crate::endpoint::Role;
use crate::properties::keys;
use dashmap::DashMap;

/// Decides whether an endpoint may produce or consume under a scope name.
///
/// Denials narrow the negotiated scope; they are never reported as errors.
pub trait ScopeAuthority: Send + Sync {
    fn is_permitted(&self, endpoint: &ServiceReference, scope: &str, role: Role) -> bool;
}

/// Grants every scope to every endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl ScopeAuthority for AllowAll {
    fn is_permitted(&self, _endpoint: &ServiceReference, _scope: &str, _role: Role) -> bool {
        true
    }
}

/// Explicit grants keyed by endpoint PID and role.
///
/// A granted name of `*` covers every scope. Endpoints without an entry are
/// denied everything.
#[derive(Debug, Default)]
pub struct ScopeGrants {
    grants: DashMap<(String, Role), Vec<String>>,
}

impl ScopeGrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant<I, S>(&self, pid: impl Into<String>, role: Role, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants
            .entry((pid.into(), role))
            .or_default()
            .extend(scopes.into_iter().map(Into::into));
    }

    pub fn revoke(&self, pid: &str, role: Role) {
        self.grants.remove(&(pid.to_string(), role));
    }
}

impl ScopeAuthority for ScopeGrants {
    fn is_permitted(&self, endpoint: &ServiceReference, scope: &str, role: Role) -> bool {
        let Some(pid) = endpoint.pid() else {
            return false;
        };
        self.grants
            .get(&(pid.to_string(), role))
            .map(|granted| granted.iter().any(|g| g == keys::SCOPE_ALL || g == scope))
            .unwrap_or(false)
    }
}
