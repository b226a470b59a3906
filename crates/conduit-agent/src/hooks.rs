//! Hook Chain (spec.md §4.6): pre_tool / post_tool / on_message lanes with
//! allow/deny/modify semantics for the pre-tool chain.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum PreToolDecision {
    Allow,
    Modify(Value),
    Deny(Option<String>),
}

#[derive(Debug, Clone)]
pub struct HookContext {
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
}

#[async_trait]
pub trait PreToolHook: Send + Sync {
    async fn call(&self, tool_name: &str, input: &Value, ctx: &HookContext) -> PreToolDecision;
}

#[async_trait]
pub trait PostToolHook: Send + Sync {
    async fn call(&self, tool_name: &str, input: &Value, result: &Result<String, String>, ctx: &HookContext);
}

#[async_trait]
pub trait OnMessageHook: Send + Sync {
    async fn call(&self, text: &str, ctx: &HookContext);
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreToolOutcome {
    pub allow: bool,
    pub input: Value,
    pub deny_reason: Option<String>,
}

#[derive(Default, Clone)]
pub struct HookChain {
    pre_tool: Vec<Arc<dyn PreToolHook>>,
    post_tool: Vec<Arc<dyn PostToolHook>>,
    on_message: Vec<Arc<dyn OnMessageHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pre_tool(mut self, hook: Arc<dyn PreToolHook>) -> Self {
        self.pre_tool.push(hook);
        self
    }

    pub fn with_post_tool(mut self, hook: Arc<dyn PostToolHook>) -> Self {
        self.post_tool.push(hook);
        self
    }

    pub fn with_on_message(mut self, hook: Arc<dyn OnMessageHook>) -> Self {
        self.on_message.push(hook);
        self
    }

    /// Runs the pre-tool chain in registration order (spec.md §4.6).
    /// An empty chain yields `{allow, input_unchanged}` (spec.md §8 boundary
    /// case).
    pub async fn run_pre_tool(&self, tool_name: &str, input: Value, ctx: &HookContext) -> PreToolOutcome {
        let mut current = input;
        for hook in &self.pre_tool {
            match hook.call(tool_name, &current, ctx).await {
                PreToolDecision::Allow => {}
                PreToolDecision::Modify(new_input) => current = new_input,
                PreToolDecision::Deny(reason) => {
                    return PreToolOutcome { allow: false, input: current, deny_reason: Some(reason.unwrap_or_else(|| "denied".to_string())) };
                }
            }
        }
        PreToolOutcome { allow: true, input: current, deny_reason: None }
    }

    /// Post-tool hooks are fire-and-forget; exceptions are logged and
    /// swallowed rather than propagated (spec.md §4.6). Since hooks here
    /// return `()` rather than a `Result`, a panicking hook would abort the
    /// whole task like any Rust panic — callers that need resilience
    /// against buggy hooks should wrap individual hook calls in
    /// `catch_unwind` at the hook-registration boundary.
    pub async fn run_post_tool(&self, tool_name: &str, input: &Value, result: &Result<String, String>, ctx: &HookContext) {
        for hook in &self.post_tool {
            hook.call(tool_name, input, result, ctx).await;
        }
    }

    pub async fn run_on_message(&self, text: &str, ctx: &HookContext) {
        for hook in &self.on_message {
            hook.call(text, ctx).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DenyRm;
    #[async_trait]
    impl PreToolHook for DenyRm {
        async fn call(&self, tool_name: &str, input: &Value, _ctx: &HookContext) -> PreToolDecision {
            if tool_name == "shell" && input.get("cmd").and_then(Value::as_str).is_some_and(|c| c.starts_with("rm ")) {
                PreToolDecision::Deny(Some("blocked".to_string()))
            } else {
                PreToolDecision::Allow
            }
        }
    }

    struct UppercaseModifier;
    #[async_trait]
    impl PreToolHook for UppercaseModifier {
        async fn call(&self, _tool_name: &str, input: &Value, _ctx: &HookContext) -> PreToolDecision {
            if let Some(text) = input.get("text").and_then(Value::as_str) {
                PreToolDecision::Modify(serde_json::json!({ "text": text.to_uppercase() }))
            } else {
                PreToolDecision::Allow
            }
        }
    }

    fn ctx() -> HookContext {
        HookContext { agent_id: None, session_id: None }
    }

    #[tokio::test]
    async fn empty_chain_allows_input_unchanged() {
        let chain = HookChain::new();
        let input = serde_json::json!({"text": "hi"});
        let outcome = chain.run_pre_tool("echo", input.clone(), &ctx()).await;
        assert!(outcome.allow);
        assert_eq!(outcome.input, input);
    }

    #[tokio::test]
    async fn deny_stops_chain_with_reason() {
        let chain = HookChain::new().with_pre_tool(Arc::new(DenyRm));
        let outcome = chain.run_pre_tool("shell", serde_json::json!({"cmd": "rm -rf /"}), &ctx()).await;
        assert!(!outcome.allow);
        assert_eq!(outcome.deny_reason.as_deref(), Some("blocked"));
    }

    #[tokio::test]
    async fn modify_then_allow_applies_modification() {
        let chain = HookChain::new().with_pre_tool(Arc::new(UppercaseModifier));
        let outcome = chain.run_pre_tool("echo", serde_json::json!({"text": "hi"}), &ctx()).await;
        assert!(outcome.allow);
        assert_eq!(outcome.input, serde_json::json!({"text": "HI"}));
    }
}
