//! Dispatcher (spec.md §4.1): the public entry point. Grounded in shape on
//! `querymt::chat::ChatProvider` dispatch plus `AgentStats::update_costs` in
//! `examples/querymt-querymt/crates/agent/src/middleware/state.rs` for the
//! terminal-outcome accounting step.

use conduit_agent::tool_loop::{ToolLoopInput, ToolLoopKernel};
use conduit_agent::{HookChain, StoreUnavailablePolicy, ToolAuthorizer};
use conduit_core::external::{AuthDecision, CapabilityStore, SignalSink};
use conduit_core::model::{AdapterKind, Message, ProviderId, Request, ToolDescriptor};
use conduit_core::stats::StatsKey;
use conduit_core::{ConduitError, Response, Result};
use conduit_provider::{ProviderAdapter, ProviderRegistry};
use conduit_session::pool::SessionPool;
use conduit_stats::{BudgetTracker, UsageStats};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub struct GenerateOpts {
    pub provider: ProviderId,
    pub model: String,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub tools: Vec<ToolDescriptor>,
    pub agent_id: Option<String>,
    pub trace_id: Option<String>,
}

pub enum AuthorizedOutcome {
    Response(Response),
    PendingApproval { proposal_id: String },
}

pub struct Dispatcher {
    registry: ProviderRegistry,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    pool: Option<Arc<SessionPool>>,
    hooks: HookChain,
    capability_store: Arc<dyn CapabilityStore>,
    signals: Arc<dyn SignalSink>,
    stats: Arc<UsageStats>,
    budget: Arc<BudgetTracker>,
    unavailable_policy: StoreUnavailablePolicy,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: ProviderRegistry,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
        pool: Option<Arc<SessionPool>>,
        hooks: HookChain,
        capability_store: Arc<dyn CapabilityStore>,
        signals: Arc<dyn SignalSink>,
        stats: Arc<UsageStats>,
        budget: Arc<BudgetTracker>,
        unavailable_policy: StoreUnavailablePolicy,
    ) -> Self {
        Self { registry, adapters, pool, hooks, capability_store, signals, stats, budget, unavailable_policy }
    }

    pub async fn generate(&self, prompt: &str, opts: GenerateOpts) -> Result<Response> {
        self.dispatch(prompt, opts).await
    }

    pub async fn generate_with_tools(&self, prompt: &str, opts: GenerateOpts) -> Result<Response> {
        if opts.tools.is_empty() {
            return Err(ConduitError::InvalidRequest { detail: "generate_with_tools requires at least one tool".to_string() });
        }
        self.dispatch(prompt, opts).await
    }

    /// Wraps `dispatch` with a capability check against
    /// `ai/request/<provider>` (spec.md §4.1 operation 3).
    pub async fn authorized_generate(&self, agent_id: &str, prompt: &str, opts: GenerateOpts) -> Result<AuthorizedOutcome> {
        let resource = format!("ai/request/{}", opts.provider.as_str());
        match self.capability_store.authorize(agent_id, &resource, "execute").await {
            AuthDecision::Authorized => {
                let mut opts = opts;
                opts.agent_id = Some(agent_id.to_string());
                Ok(AuthorizedOutcome::Response(self.dispatch(prompt, opts).await?))
            }
            AuthDecision::PendingApproval { proposal_id } => Ok(AuthorizedOutcome::PendingApproval { proposal_id }),
            AuthDecision::Unauthorized => Err(ConduitError::Unauthorized { reason: format!("agent {agent_id} lacks {resource}") }),
            AuthDecision::StoreUnavailable => match self.unavailable_policy {
                StoreUnavailablePolicy::AllowInDev => {
                    let mut opts = opts;
                    opts.agent_id = Some(agent_id.to_string());
                    Ok(AuthorizedOutcome::Response(self.dispatch(prompt, opts).await?))
                }
                StoreUnavailablePolicy::DenyInProd => Err(ConduitError::Unauthorized { reason: "capability store unavailable".to_string() }),
            },
        }
    }

    /// Steps 1-4 of spec.md §4.1.
    async fn dispatch(&self, prompt: &str, opts: GenerateOpts) -> Result<Response> {
        // Step 1: config snapshot. `provider`/`model` are resolved once,
        // here, and never re-read from mutable shared config afterward
        // (closes the TOCTOU window spec.md §4.1 describes).
        let provider = opts.provider.clone();
        let model = opts.model.clone();
        let stats_key = StatsKey::new(provider.as_str(), model.clone());

        self.signals.emit("dispatch", "started", json!({ "provider": provider.as_str(), "model": model, "trace_id": opts.trace_id })).await;
        let start = Instant::now();

        let outcome = self.run_path(prompt, &opts, &provider, &model).await;

        let latency_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(response) => {
                self.budget.record_usage(provider.as_str(), &model, response.usage.input_tokens, response.usage.output_tokens);
                self.stats.record_success(&stats_key, latency_ms, response.usage.cost_usd).await;
                self.signals.emit("dispatch", "completed", json!({ "provider": provider.as_str(), "model": model, "latency_ms": latency_ms })).await;
            }
            Err(err) => {
                self.stats.record_failure(&stats_key).await;
                self.signals.emit("dispatch", "failed", json!({ "provider": provider.as_str(), "model": model, "reason": err.to_string() })).await;
            }
        }
        outcome
    }

    async fn run_path(&self, prompt: &str, opts: &GenerateOpts, provider: &ProviderId, model: &str) -> Result<Response> {
        // Step 2: provider resolution. Unknown atoms pass through (already
        // true of `ProviderId::Other`); the registry only maps to a
        // transport strategy.
        let adapter_kind = self.registry.resolve(provider);

        let adapter = self
            .adapters
            .get(provider.as_str())
            .cloned()
            .ok_or_else(|| ConduitError::UnknownProvider { name: provider.as_str().to_string() })?;

        let mut messages = Vec::new();
        if let Some(system) = &opts.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt.to_string()));

        let request = Request {
            provider: provider.clone(),
            model: model.to_string(),
            messages,
            tools: opts.tools.clone(),
            max_tokens: opts.max_tokens,
            temperature: opts.temperature,
            reasoning_effort: None,
            provider_options: HashMap::new(),
        };

        // Step 3: path selection.
        if !opts.tools.is_empty() {
            let authorizer = ToolAuthorizer::new(self.capability_store.clone(), self.signals.clone(), self.unavailable_policy);
            let kernel = ToolLoopKernel::new(adapter, authorizer, self.hooks.clone(), self.signals.clone());
            return kernel.run(ToolLoopInput { request, agent_id: opts.agent_id.clone() }).await;
        }

        if adapter_kind == Some(AdapterKind::SubprocessSession) {
            let Some(pool) = &self.pool else {
                return Err(ConduitError::AdapterUnavailable { provider: provider.as_str().to_string() });
            };
            // Session Pool bookkeeping governs lifecycle/capacity for
            // subprocess-backed providers; the adapter itself owns the
            // transport handle the checked-out session corresponds to.
            let guard = pool.checkout(provider.as_str(), Default::default())?;
            let response = adapter.complete(&request).await;
            guard.checkin();
            return response;
        }

        adapter.complete(&request).await
    }
}
