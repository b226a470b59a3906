//! Tool Loop Kernel (spec.md §4.2): the agentic kernel that drives a bounded
//! conversation until the model stops issuing tool calls or `max_turns` is
//! reached. Grounded in shape on the iterate-call-execute-append loop in
//! `examples/ConaryLabs-Mira/backend/src/session/codex_spawner.rs`'s
//! `run_codex_session`, adapted to this system's Request/Response/HookChain
//! types.

use crate::authorization::ToolAuthorizer;
use crate::hooks::{HookChain, HookContext};
use crate::registry::ToolRegistry;
use conduit_core::external::SignalSink;
use conduit_core::model::{
    FinishReason, HookResult, Message, Request, Response, ToolHandler, ToolOutcome, ToolUse, Usage,
};
use conduit_core::Result;
use conduit_provider::ProviderAdapter;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_TURNS: u32 = 10;
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ToolLoopKernel {
    adapter: Arc<dyn ProviderAdapter>,
    authorizer: ToolAuthorizer,
    hooks: HookChain,
    signals: Arc<dyn SignalSink>,
    max_turns: u32,
    tool_timeout: Duration,
}

pub struct ToolLoopInput {
    pub request: Request,
    pub agent_id: Option<String>,
}

impl ToolLoopKernel {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, authorizer: ToolAuthorizer, hooks: HookChain, signals: Arc<dyn SignalSink>) -> Self {
        Self { adapter, authorizer, hooks, signals, max_turns: DEFAULT_MAX_TURNS, tool_timeout: DEFAULT_TOOL_TIMEOUT }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub async fn run(&self, input: ToolLoopInput) -> Result<Response> {
        // Step 1: pre-flight authorization filter (spec.md §4.2 step 1).
        let authorized = self.authorizer.filter(input.agent_id.as_deref(), input.request.tools.clone()).await;
        let registry = ToolRegistry::from_descriptors(authorized);

        let mut request = input.request.clone();
        request.tools = registry.descriptors();

        let mut messages = request.messages.clone();
        let mut accumulated = Response::empty(request.provider.clone(), request.model.clone());
        let mut turn: u32 = 0;

        loop {
            turn += 1;
            if turn > self.max_turns {
                tracing::warn!(max_turns = self.max_turns, "tool loop exceeded max turns");
                accumulated.finish_reason = FinishReason::Error;
                return Ok(accumulated);
            }

            let mut turn_request = request.clone();
            turn_request.messages = messages.clone();

            // Step 2: send to the adapter. Adapter errors are surfaced,
            // not recovered (spec.md §7 propagation policy).
            let response = self.adapter.complete(&turn_request).await?;

            accumulated.text = response.text.clone();
            accumulated.thinking.extend(response.thinking.clone());
            accumulated.usage = sum_usage(accumulated.usage, response.usage);
            accumulated.session_id = response.session_id.clone().or(accumulated.session_id.take());
            accumulated.timing = response.timing.clone();
            accumulated.raw = response.raw.clone();

            let ctx = HookContext { agent_id: input.agent_id.clone(), session_id: accumulated.session_id.clone() };

            // Step 3: pre-tool hooks, in model-reported appearance order
            // (spec.md §4.2 ordering guarantee).
            let mut to_execute = Vec::new();
            for raw in &response.tool_uses {
                let outcome = self.hooks.run_pre_tool(&raw.name, raw.input.clone(), &ctx).await;
                if outcome.allow {
                    to_execute.push((raw.clone(), outcome.input));
                } else {
                    let reason = outcome.deny_reason.unwrap_or_else(|| "hook_denied".to_string());
                    accumulated.tool_uses.push(ToolUse {
                        id: raw.id.clone(),
                        name: raw.name.clone(),
                        input: raw.input.clone(),
                        hook_result: HookResult::Deny,
                        result: ToolOutcome::Err { reason: format!("hook_denied: {reason}") },
                    });
                }
            }

            // Step 4: no tool_use blocks remain unexecuted -> terminal.
            if to_execute.is_empty() {
                accumulated.finish_reason = response.finish_reason;
                return Ok(accumulated);
            }

            // Step 5: execute allowed tool uses in order, run post-hooks.
            let mut next_messages = Vec::new();
            for (raw, final_input) in to_execute {
                let execution = self.execute_one(&registry, &raw.name, final_input.clone()).await;
                self.hooks.run_post_tool(&raw.name, &final_input, &execution, &ctx).await;

                let (hook_result, outcome) = match &execution {
                    Ok(text) => (HookResult::Allow, ToolOutcome::Ok { text: text.clone() }),
                    Err(reason) if reason == "pending" => (HookResult::Allow, ToolOutcome::Pending),
                    Err(reason) => (HookResult::Allow, ToolOutcome::Err { reason: reason.clone() }),
                };
                accumulated.tool_uses.push(ToolUse {
                    id: raw.id.clone(),
                    name: raw.name.clone(),
                    input: final_input.clone(),
                    hook_result,
                    result: outcome,
                });

                let result_text = match &execution {
                    Ok(text) => text.clone(),
                    Err(reason) => reason.clone(),
                };
                next_messages.push(Message::tool_result(raw.id.clone(), result_text));
            }

            // Step 6: append assistant turn + tool results, loop.
            let mut assistant_message = Message::assistant(response.text.clone());
            assistant_message.tool_uses = accumulated.tool_uses.clone();
            messages.push(assistant_message);
            messages.extend(next_messages);
        }
    }

    async fn execute_one(&self, registry: &ToolRegistry, name: &str, input: serde_json::Value) -> std::result::Result<String, String> {
        let Some(descriptor) = registry.find(name) else {
            // Not registered locally: the adapter/subprocess handles it
            // (spec.md §4.2 step 5).
            return Err("pending".to_string());
        };
        match &descriptor.handler {
            ToolHandler::External(_) => Err("pending".to_string()),
            ToolHandler::Local(handler) => {
                let handler = handler.clone();
                let input_clone = input.clone();
                let call = tokio::task::spawn_blocking(move || handler(input_clone));
                match tokio::time::timeout(self.tool_timeout, call).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => {
                        self.signals.emit("tool_error", "panic", json!({ "tool": name, "reason": join_err.to_string() })).await;
                        Err(format!("tool handler panicked: {join_err}"))
                    }
                    Err(_) => Err("timeout".to_string()),
                }
            }
        }
    }
}

fn sum_usage(acc: Usage, delta: Usage) -> Usage {
    Usage {
        input_tokens: acc.input_tokens + delta.input_tokens,
        output_tokens: acc.output_tokens + delta.output_tokens,
        cache_read_tokens: add_optional(acc.cache_read_tokens, delta.cache_read_tokens),
        cache_creation_tokens: add_optional(acc.cache_creation_tokens, delta.cache_creation_tokens),
        total_tokens: acc.total_tokens + delta.total_tokens,
        cost_usd: add_optional_f64(acc.cost_usd, delta.cost_usd),
    }
    .normalized()
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

fn add_optional_f64(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::StoreUnavailablePolicy;
    use async_trait::async_trait;
    use conduit_core::external::{AuthDecision, CapabilityStore, NullSignalSink};
    use conduit_core::model::{ProviderId, Timing, ToolDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AllowAll;
    #[async_trait]
    impl CapabilityStore for AllowAll {
        async fn authorize(&self, _agent_id: &str, _resource: &str, _action: &str) -> AuthDecision {
            AuthDecision::Authorized
        }
    }

    /// Scripted provider: first turn emits a tool_use, second turn emits
    /// text only (spec.md §8 scenario S1).
    struct ScriptedAdapter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &Request) -> Result<Response> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut response = Response::empty(ProviderId::Other("scripted".into()), "test-model");
            response.timing = Timing { latency_ms: 1 };
            if call == 0 {
                response.tool_uses.push(ToolUse {
                    id: "u1".into(),
                    name: "echo".into(),
                    input: json!({"text": "hi"}),
                    hook_result: HookResult::Allow,
                    result: ToolOutcome::Pending,
                });
                response.finish_reason = FinishReason::ToolUse;
            } else {
                response.text = "done".into();
                response.finish_reason = FinishReason::Stop;
            }
            Ok(response)
        }
    }

    fn echo_tool() -> ToolDescriptor {
        ToolDescriptor {
            name: "echo".into(),
            description: "echoes input".into(),
            input_schema: json!({}),
            handler: ToolHandler::Local(Arc::new(|input: serde_json::Value| {
                Ok(input.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string())
            })),
        }
    }

    fn kernel(adapter: Arc<dyn ProviderAdapter>) -> ToolLoopKernel {
        let authorizer = ToolAuthorizer::new(Arc::new(AllowAll), Arc::new(NullSignalSink), StoreUnavailablePolicy::AllowInDev);
        ToolLoopKernel::new(adapter, authorizer, HookChain::new(), Arc::new(NullSignalSink))
    }

    #[tokio::test]
    async fn s1_happy_path_with_one_tool() {
        let adapter = Arc::new(ScriptedAdapter { calls: AtomicUsize::new(0) });
        let kernel = kernel(adapter);
        let request = Request {
            provider: ProviderId::Other("scripted".into()),
            model: "test-model".into(),
            messages: vec![Message::user("run echo")],
            tools: vec![echo_tool()],
            ..Default::default()
        };
        let response = kernel.run(ToolLoopInput { request, agent_id: None }).await.unwrap();
        assert_eq!(response.text, "done");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.tool_uses.len(), 1);
        assert_eq!(response.tool_uses[0].hook_result, HookResult::Allow);
        match &response.tool_uses[0].result {
            ToolOutcome::Ok { text } => assert_eq!(text, "hi"),
            other => panic!("expected ok, got {other:?}"),
        }
    }

    struct DenyShell;
    #[async_trait]
    impl crate::hooks::PreToolHook for DenyShell {
        async fn call(&self, tool_name: &str, input: &serde_json::Value, _ctx: &HookContext) -> crate::hooks::PreToolDecision {
            if tool_name == "shell" && input.get("cmd").and_then(|c| c.as_str()).is_some_and(|c| c.starts_with("rm ")) {
                crate::hooks::PreToolDecision::Deny(Some("blocked".into()))
            } else {
                crate::hooks::PreToolDecision::Allow
            }
        }
    }

    struct DenyOnceAdapter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderAdapter for DenyOnceAdapter {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, _request: &Request) -> Result<Response> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut response = Response::empty(ProviderId::Other("scripted".into()), "test-model");
            if call == 0 {
                response.tool_uses.push(ToolUse {
                    id: "u1".into(),
                    name: "shell".into(),
                    input: json!({"cmd": "rm -rf /"}),
                    hook_result: HookResult::Allow,
                    result: ToolOutcome::Pending,
                });
                response.finish_reason = FinishReason::ToolUse;
            } else {
                response.text = "acknowledged".into();
                response.finish_reason = FinishReason::Stop;
            }
            Ok(response)
        }
    }

    #[tokio::test]
    async fn s2_pre_hook_deny_records_err_and_continues() {
        let adapter = Arc::new(DenyOnceAdapter { calls: AtomicUsize::new(0) });
        let authorizer = ToolAuthorizer::new(Arc::new(AllowAll), Arc::new(NullSignalSink), StoreUnavailablePolicy::AllowInDev);
        let hooks = HookChain::new().with_pre_tool(Arc::new(DenyShell));
        let kernel = ToolLoopKernel::new(adapter, authorizer, hooks, Arc::new(NullSignalSink));

        let request = Request {
            provider: ProviderId::Other("scripted".into()),
            model: "test-model".into(),
            messages: vec![Message::user("rm it")],
            tools: vec![ToolDescriptor {
                name: "shell".into(),
                description: String::new(),
                input_schema: json!({}),
                handler: ToolHandler::External("shell".into()),
            }],
            ..Default::default()
        };
        let response = kernel.run(ToolLoopInput { request, agent_id: None }).await.unwrap();
        assert_eq!(response.tool_uses.len(), 1);
        assert_eq!(response.tool_uses[0].hook_result, HookResult::Deny);
        assert_eq!(response.text, "acknowledged");
    }

    #[tokio::test]
    async fn exceeding_max_turns_returns_partial_response_with_error_reason() {
        let adapter = Arc::new(ScriptedAdapter { calls: AtomicUsize::new(0) });
        let kernel = kernel(adapter).with_max_turns(1);
        let request = Request {
            provider: ProviderId::Other("scripted".into()),
            model: "test-model".into(),
            messages: vec![Message::user("run echo")],
            tools: vec![echo_tool()],
            ..Default::default()
        };
        let response = kernel.run(ToolLoopInput { request, agent_id: None }).await.unwrap();
        assert_eq!(response.finish_reason, FinishReason::Error);
    }
}
