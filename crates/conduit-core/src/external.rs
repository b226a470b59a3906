//! External collaborator interfaces (spec.md §6.3): narrow traits the core
//! consumes but does not implement. Library crates take `Arc<dyn Trait>`
//! (or `Option<Arc<dyn Trait>>`) constructor arguments; `conduit-dispatch`
//! provides minimal in-process implementations for the demo driver and
//! tests (SPEC_FULL.md §A.6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthDecision {
    Authorized,
    PendingApproval { proposal_id: String },
    Unauthorized,
    StoreUnavailable,
}

/// Capability store (spec.md §6.3, §4.5).
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    async fn authorize(&self, agent_id: &str, resource: &str, action: &str) -> AuthDecision;
}

/// Signal bus (spec.md §6.3): fire-and-forget, failures swallowed by the
/// core.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn emit(&self, category: &str, kind: &str, data: Value);
}

/// A sink that drops everything; used where no bus is wired up so callers
/// never need an `Option` check at every emit site.
pub struct NullSignalSink;

#[async_trait]
impl SignalSink for NullSignalSink {
    async fn emit(&self, _category: &str, _kind: &str, _data: Value) {}
}

/// Orchestrator provider catalog (spec.md §6.3, §4.9 liveness probe).
#[async_trait]
pub trait ProviderCatalog: Send + Sync {
    async fn list_providers(&self) -> Vec<(String, bool)>;
}

/// External memory stores consulted by the System-Prompt Builder
/// (spec.md §4.10, §6.3). Each read returns `None` when the store has
/// nothing (or is absent) rather than erroring.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get_self_knowledge(&self, agent_id: &str) -> Option<String>;
    async fn get_active_goals(&self, agent_id: &str) -> Option<String>;
    async fn get_working_memory(&self, agent_id: &str) -> Option<String>;
    async fn knowledge_graph_lookup(&self, agent_id: &str) -> Option<String>;
}
