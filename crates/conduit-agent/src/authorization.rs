//! Tool Authorization (spec.md §4.5): pre-flight filter that removes tools
//! the caller lacks capability for.

use conduit_core::external::{AuthDecision, CapabilityStore, SignalSink};
use conduit_core::model::ToolDescriptor;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreUnavailablePolicy {
    /// `store_unavailable -> authorized` (spec.md §4.5).
    AllowInDev,
    /// `store_unavailable -> unauthorized` (spec.md §4.5).
    DenyInProd,
}

pub struct ToolAuthorizer {
    store: Arc<dyn CapabilityStore>,
    signals: Arc<dyn SignalSink>,
    unavailable_policy: StoreUnavailablePolicy,
}

impl ToolAuthorizer {
    pub fn new(
        store: Arc<dyn CapabilityStore>,
        signals: Arc<dyn SignalSink>,
        unavailable_policy: StoreUnavailablePolicy,
    ) -> Self {
        Self { store, signals, unavailable_policy }
    }

    /// `filter(agent_id, tools) -> authorized_tools` (spec.md §4.5).
    /// Identity when `agent_id` is `None`.
    pub async fn filter(&self, agent_id: Option<&str>, tools: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
        let Some(agent_id) = agent_id else {
            return tools;
        };

        let mut authorized = Vec::with_capacity(tools.len());
        let mut denied = Vec::new();

        for tool in tools {
            let resource = format!("actions/execute/{}", tool.name);
            let decision = self.store.authorize(agent_id, &resource, "execute").await;
            match decision {
                AuthDecision::Authorized => authorized.push(tool),
                AuthDecision::PendingApproval { .. } | AuthDecision::Unauthorized => {
                    denied.push(tool.name);
                }
                AuthDecision::StoreUnavailable => {
                    tracing::warn!(tool = %tool.name, "capability store unavailable during authorization check");
                    match self.unavailable_policy {
                        StoreUnavailablePolicy::AllowInDev => authorized.push(tool),
                        StoreUnavailablePolicy::DenyInProd => denied.push(tool.name),
                    }
                }
            }
        }

        // A single aggregated signal per filter call, not one per tool
        // (spec.md §4.5 invariant).
        if !denied.is_empty() {
            self.signals.emit("tool_authorization_denied", "denied", json!({ "agent_id": agent_id, "tools": denied })).await;
        }

        authorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::model::{ToolHandler, ToolDescriptor};
    use std::sync::Mutex;

    struct AllowOnly(Vec<&'static str>);

    #[async_trait::async_trait]
    impl CapabilityStore for AllowOnly {
        async fn authorize(&self, _agent_id: &str, resource: &str, _action: &str) -> AuthDecision {
            if self.0.iter().any(|t| resource.ends_with(t)) {
                AuthDecision::Authorized
            } else {
                AuthDecision::Unauthorized
            }
        }
    }

    struct RecordingSink(Mutex<Vec<(String, String, serde_json::Value)>>);

    #[async_trait::async_trait]
    impl SignalSink for RecordingSink {
        async fn emit(&self, category: &str, kind: &str, data: serde_json::Value) {
            self.0.lock().unwrap().push((category.to_string(), kind.to_string(), data));
        }
    }

    fn tool(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: String::new(),
            input_schema: serde_json::json!({}),
            handler: ToolHandler::External("noop".into()),
        }
    }

    #[tokio::test]
    async fn agent_id_none_is_identity() {
        let authorizer = ToolAuthorizer::new(
            Arc::new(AllowOnly(vec![])),
            Arc::new(RecordingSink(Mutex::new(vec![]))),
            StoreUnavailablePolicy::DenyInProd,
        );
        let tools = vec![tool("shell")];
        let result = authorizer.filter(None, tools.clone()).await;
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn denied_tools_emit_one_aggregated_signal() {
        let sink = Arc::new(RecordingSink(Mutex::new(vec![])));
        let authorizer = ToolAuthorizer::new(
            Arc::new(AllowOnly(vec!["echo"])),
            sink.clone(),
            StoreUnavailablePolicy::DenyInProd,
        );
        let tools = vec![tool("echo"), tool("shell"), tool("rm")];
        let result = authorizer.filter(Some("agent-1"), tools).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "echo");
        let emitted = sink.0.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, "tool_authorization_denied");
    }
}
