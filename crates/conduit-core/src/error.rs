//! Structured error taxonomy shared by every conduit crate.
//!
//! Mirrors the corpus convention of one `thiserror` enum per crate boundary,
//! each variant carrying typed context rather than a bare string.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConduitError {
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },

    #[error("unknown model: {name}")]
    UnknownModel { name: String },

    #[error("transport not ready")]
    TransportNotReady,

    #[error("transport crashed: {reason}")]
    TransportCrashed { reason: String },

    #[error("reconnect failed after {attempts} attempts")]
    ReconnectFailed { attempts: u32 },

    #[error("transport buffer overflow")]
    BufferOverflow,

    #[error("subprocess exited with code {exit_code}: {stderr}")]
    ProcessError { exit_code: i32, stderr: String },

    #[error("operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("hook denied tool {tool}: {reason}")]
    HookDenied { tool: String, reason: String },

    #[error("permission denied for tool {tool}: {reason}")]
    PermissionDenied { tool: String, reason: String },

    #[error("tool {tool} failed: {reason}")]
    ToolError { tool: String, reason: String },

    #[error("session pool exhausted for provider {provider}")]
    PoolExhausted { provider: String },

    #[error("failed to spawn session for provider {provider}: {reason}")]
    SpawnFailed { provider: String, reason: String },

    #[error("json decode error: {reason}")]
    JsonDecodeError { input_prefix: String, reason: String },

    #[error("daily budget exceeded")]
    BudgetExceeded,

    #[error("provider cli not found: {provider}")]
    CliNotFound { provider: String },

    #[error("invalid request: {detail}")]
    InvalidRequest { detail: String },

    #[error("adapter unavailable for provider {provider}")]
    AdapterUnavailable { provider: String },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ConduitError>;
