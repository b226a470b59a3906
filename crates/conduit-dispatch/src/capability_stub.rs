//! Minimal capability store (SPEC_FULL.md §A.6): a default-allow or
//! default-deny stub gated behind `CapabilityStore`, for the demo driver and
//! anywhere no real orchestrator-backed store is wired up. Grounded on the
//! `CapabilityRequirement`/permission-check shape in
//! `examples/querymt-querymt/crates/agent/src/tools/context.rs`, reduced to
//! a static policy since this system has no capability-proposal workflow of
//! its own.

use conduit_core::external::{AuthDecision, CapabilityStore};
use std::collections::HashSet;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
    Allow,
    Deny,
}

/// A static stub: allows/denies by default, with explicit per-resource
/// overrides for tests and the demo scenarios.
pub struct StubCapabilityStore {
    default_policy: DefaultPolicy,
    denied_resources: Mutex<HashSet<String>>,
}

impl StubCapabilityStore {
    pub fn new(default_policy: DefaultPolicy) -> Self {
        Self { default_policy, denied_resources: Mutex::new(HashSet::new()) }
    }

    pub fn deny_resource(&self, resource: impl Into<String>) {
        self.denied_resources.lock().insert(resource.into());
    }
}

#[async_trait::async_trait]
impl CapabilityStore for StubCapabilityStore {
    async fn authorize(&self, _agent_id: &str, resource: &str, _action: &str) -> AuthDecision {
        if self.denied_resources.lock().contains(resource) {
            return AuthDecision::Unauthorized;
        }
        match self.default_policy {
            DefaultPolicy::Allow => AuthDecision::Authorized,
            DefaultPolicy::Deny => AuthDecision::Unauthorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_allow_authorizes_unlisted_resources() {
        let store = StubCapabilityStore::new(DefaultPolicy::Allow);
        assert_eq!(store.authorize("agent-1", "actions/execute/echo", "execute").await, AuthDecision::Authorized);
    }

    #[tokio::test]
    async fn explicit_deny_overrides_default_allow() {
        let store = StubCapabilityStore::new(DefaultPolicy::Allow);
        store.deny_resource("actions/execute/shell");
        assert_eq!(store.authorize("agent-1", "actions/execute/shell", "execute").await, AuthDecision::Unauthorized);
    }
}
