//! Core request/response data model (spec.md §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Symbolic provider name. Unknown atoms pass through as `Other` so
/// late-bound adapters still round-trip (spec.md §4.1 step 2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Anthropic,
    Openai,
    Openrouter,
    Ollama,
    Lmstudio,
    ClaudeCli,
    CodexCli,
    Other(String),
}

impl Serialize for ProviderId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ProviderId::from(s.as_str()))
    }
}

impl ProviderId {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::Openai => "openai",
            ProviderId::Openrouter => "openrouter",
            ProviderId::Ollama => "ollama",
            ProviderId::Lmstudio => "lmstudio",
            ProviderId::ClaudeCli => "claude_cli",
            ProviderId::CodexCli => "codex_cli",
            ProviderId::Other(s) => s,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        match s {
            "anthropic" => ProviderId::Anthropic,
            "openai" => ProviderId::Openai,
            "openrouter" => ProviderId::Openrouter,
            "ollama" => ProviderId::Ollama,
            "lmstudio" => ProviderId::Lmstudio,
            "claude_cli" => ProviderId::ClaudeCli,
            "codex_cli" => ProviderId::CodexCli,
            other => ProviderId::Other(other.to_string()),
        }
    }
}

/// Transport strategy a ProviderId maps to, one per provider (spec.md §3, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    ApiHttp,
    SubprocessSession,
    LocalHttp,
    Acp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_uses: Vec<ToolUse>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_call_id: None, tool_uses: Vec::new() }
    }
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_call_id: None, tool_uses: Vec::new() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_call_id: None, tool_uses: Vec::new() }
    }
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_uses: Vec::new(),
        }
    }
}

/// A tool handler: either a module-resolved local function or an opaque
/// external executor id (spec.md §3 ToolDescriptor).
#[derive(Clone)]
pub enum ToolHandler {
    Local(Arc<dyn Fn(serde_json::Value) -> Result<String, String> + Send + Sync>),
    External(String),
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolHandler::Local(_) => write!(f, "ToolHandler::Local(..)"),
            ToolHandler::External(id) => write!(f, "ToolHandler::External({id})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub handler: ToolHandler,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    pub provider: ProviderId,
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip)]
    pub tools: Vec<ToolDescriptor>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub provider_options: HashMap<String, serde_json::Value>,
}

impl Default for ProviderId {
    fn default() -> Self {
        ProviderId::Other(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookResult {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Ok { text: String },
    Err { reason: String },
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUse {
    /// Server-assigned id; primary key matching a tool-result event back to
    /// its originating call (spec.md §3 invariants).
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    pub hook_result: HookResult,
    pub result: ToolOutcome,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: Option<u64>,
    pub cache_creation_tokens: Option<u64>,
    pub total_tokens: u64,
    pub cost_usd: Option<f64>,
}

impl Usage {
    /// Enforces `total_tokens >= input_tokens + output_tokens` (spec.md §3).
    pub fn normalized(mut self) -> Self {
        let floor = self.input_tokens + self.output_tokens;
        if self.total_tokens < floor {
            self.total_tokens = floor;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingBlock {
    pub text: String,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    MaxTokens,
    ToolUse,
    Error,
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timing {
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub text: String,
    #[serde(default)]
    pub thinking: Vec<ThinkingBlock>,
    #[serde(default)]
    pub tool_uses: Vec<ToolUse>,
    pub usage: Usage,
    pub session_id: Option<String>,
    pub model: String,
    pub provider: ProviderId,
    pub finish_reason: FinishReason,
    pub timing: Timing,
    #[serde(default)]
    pub raw: Option<serde_json::Value>,
}

impl Response {
    pub fn empty(provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            thinking: Vec::new(),
            tool_uses: Vec::new(),
            usage: Usage::default(),
            session_id: None,
            model: model.into(),
            provider,
            finish_reason: FinishReason::Null,
            timing: Timing { latency_ms: 0 },
            raw: None,
        }
    }
}
