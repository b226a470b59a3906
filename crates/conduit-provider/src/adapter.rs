//! Provider adapter contract (spec.md §6.1, consumed not implemented).
//!
//! Grounded on the `LLMProvider`/`HTTPLLMProvider` split in
//! `examples/querymt-querymt/crates/querymt/src/lib.rs`: a single async
//! trait object, registered by name, resolved once per request by the
//! Dispatcher (spec.md §9 "the Dispatcher selects the variant once per
//! request; all later calls are monomorphic").

use async_trait::async_trait;
use conduit_core::model::Request;
use conduit_core::{ConduitError, Response, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub provider: String,
    pub dimensions: usize,
    pub input_tokens: u64,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &Request) -> Result<Response>;

    /// Embedding-capable providers override this; others inherit the
    /// default error (spec.md §6.1: "for embedding-capable providers").
    async fn embed(&self, _model: &str, _input: Vec<String>) -> Result<EmbeddingResponse> {
        Err(ConduitError::AdapterUnavailable { provider: self.name().to_string() })
    }

    fn supports_embeddings(&self) -> bool {
        false
    }

    /// Whether this adapter is backed by a long-lived subprocess Session
    /// (spec.md §4.1 step 3: tools present -> Tool Loop Kernel; otherwise
    /// Session Pool when the adapter is subprocess_session, else direct
    /// HTTP adapter).
    fn supports_sessions(&self) -> bool {
        false
    }
}
