//! Authorization gate
//!
//! The decision itself belongs to an external [`AuthorizationChecker`]. The
//! gate only decides *whether* to ask: methods without declared roles, and
//! deployments without a checker, are always granted.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::request::JsonRpcRequest;

/// "Is the caller granted these roles?"
#[async_trait]
pub trait AuthorizationChecker: Send + Sync {
    async fn is_granted(&self, roles: &BTreeSet<String>, request: &JsonRpcRequest) -> bool;
}

/// Grants when the caller holds at least one of the required roles.
///
/// The caller's roles are fixed at construction; useful for single-tenant
/// deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRoles {
    granted: BTreeSet<String>,
}

impl StaticRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: roles.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AuthorizationChecker for StaticRoles {
    async fn is_granted(&self, roles: &BTreeSet<String>, _request: &JsonRpcRequest) -> bool {
        roles.iter().any(|role| self.granted.contains(role))
    }
}

/// Reads the caller's roles from a comma-separated transport metadata entry
#[derive(Debug, Clone)]
pub struct MetadataRoles {
    key: String,
}

impl MetadataRoles {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().to_ascii_lowercase(),
        }
    }
}

#[async_trait]
impl AuthorizationChecker for MetadataRoles {
    async fn is_granted(&self, roles: &BTreeSet<String>, request: &JsonRpcRequest) -> bool {
        let Some(held) = request.metadata.get(&self.key) else {
            return false;
        };
        held.split(',')
            .map(str::trim)
            .any(|role| roles.contains(role))
    }
}

/// Outcome of the authorization gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Granted,
    Denied,
}

impl Grant {
    pub fn is_granted(&self) -> bool {
        matches!(self, Grant::Granted)
    }
}

/// Permissive unless both roles and a checker are present
#[derive(Clone, Default)]
pub struct AuthorizationGate {
    checker: Option<Arc<dyn AuthorizationChecker>>,
}

impl AuthorizationGate {
    pub fn new(checker: Option<Arc<dyn AuthorizationChecker>>) -> Self {
        Self { checker }
    }

    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn has_checker(&self) -> bool {
        self.checker.is_some()
    }

    pub async fn check(
        &self,
        request: &JsonRpcRequest,
        required_roles: Option<&BTreeSet<String>>,
    ) -> Grant {
        let (Some(checker), Some(roles)) = (&self.checker, required_roles) else {
            return Grant::Granted;
        };
        if roles.is_empty() {
            return Grant::Granted;
        }

        if checker.is_granted(roles, request).await {
            Grant::Granted
        } else {
            debug!(
                method = request.method_name().unwrap_or_default(),
                roles = ?roles,
                "Authorization denied"
            );
            Grant::Denied
        }
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("has_checker", &self.checker.is_some())
            .finish()
    }
}
