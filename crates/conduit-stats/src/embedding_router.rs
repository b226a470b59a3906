//! Embedding Router (spec.md §4.9): picks an embedding-capable provider
//! according to a `local | cloud | auto` preference, with an optional
//! fall-through to cloud providers when no local one is reachable.
//! Grounded on the named-registry lookup pattern in
//! `examples/querymt-querymt/crates/querymt/src/lib.rs`'s `LLMRegistry`,
//! reused here via `conduit_provider::ProviderAdapter` instead of building a
//! second registry abstraction.

use conduit_core::external::ProviderCatalog;
use conduit_core::{ConduitError, Result};
use conduit_provider::{EmbeddingResponse, ProviderAdapter};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingPreference {
    Local,
    Cloud,
    Auto,
}

/// The fixed cloud-capable provider set (spec.md §4.9 step 2).
const CLOUD_PROVIDERS: [&str; 4] = ["openai", "anthropic", "gemini", "cohere"];

fn is_cloud_provider(name: &str) -> bool {
    CLOUD_PROVIDERS.contains(&name)
}

#[derive(Debug, Clone)]
pub struct EmbeddingRouterConfig {
    pub preferred: EmbeddingPreference,
    /// Ordered `(provider, model)` pairs (spec.md §4.9 config shape).
    pub providers: Vec<(String, String)>,
    pub fallback_to_cloud: bool,
    /// Dev-only last resort when nothing else is available (spec.md §4.9
    /// step 4: "fall back to the test provider only when a dev flag is
    /// set").
    pub allow_test_provider_fallback: bool,
}

pub struct EmbeddingRouter {
    config: EmbeddingRouterConfig,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    catalog: Option<Arc<dyn ProviderCatalog>>,
}

impl EmbeddingRouter {
    pub fn new(
        config: EmbeddingRouterConfig,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
        catalog: Option<Arc<dyn ProviderCatalog>>,
    ) -> Self {
        Self { config, adapters, catalog }
    }

    /// Step 2: when preference is `cloud`, stable-partition so the fixed
    /// cloud-capable providers come first (spec.md §4.9). `local`/`auto`
    /// leave the configured order untouched.
    fn candidate_order(&self) -> Vec<&(String, String)> {
        match self.config.preferred {
            EmbeddingPreference::Cloud => {
                let mut ordered: Vec<&(String, String)> =
                    self.config.providers.iter().filter(|(p, _)| is_cloud_provider(p)).collect();
                ordered.extend(self.config.providers.iter().filter(|(p, _)| !is_cloud_provider(p)));
                ordered
            }
            EmbeddingPreference::Local | EmbeddingPreference::Auto => self.config.providers.iter().collect(),
        }
    }

    /// An unreachable catalog is treated as "assume available" rather than
    /// excluding the provider (spec.md §4.9 step 3, §5 shared-resource
    /// tolerance policy).
    async fn is_available(&self, name: &str) -> bool {
        let Some(catalog) = &self.catalog else {
            return true;
        };
        let listed = catalog.list_providers().await;
        if listed.is_empty() {
            return true;
        }
        listed.iter().any(|(provider, live)| provider == name && *live)
    }

    async fn first_available<'a>(&self, candidates: &[&'a (String, String)]) -> Option<&'a (String, String)> {
        for pair @ (name, _model) in candidates {
            let Some(adapter) = self.adapters.get(name) else { continue };
            if !adapter.supports_embeddings() {
                continue;
            }
            if self.is_available(name).await {
                return Some(pair);
            }
        }
        None
    }

    /// Step 4: first available in the ordered list; if none and
    /// `fallback_to_cloud`, retry cloud-first order; if still none and the
    /// dev flag is set, fall back to a provider literally named `test`.
    async fn select(&self) -> Result<(String, String)> {
        let primary = self.candidate_order();
        if let Some(found) = self.first_available(&primary).await {
            return Ok(found.clone());
        }

        if self.config.fallback_to_cloud && !matches!(self.config.preferred, EmbeddingPreference::Cloud) {
            let cloud_first: Vec<&(String, String)> = {
                let mut ordered: Vec<&(String, String)> =
                    self.config.providers.iter().filter(|(p, _)| is_cloud_provider(p)).collect();
                ordered.extend(self.config.providers.iter().filter(|(p, _)| !is_cloud_provider(p)));
                ordered
            };
            if let Some(found) = self.first_available(&cloud_first).await {
                return Ok(found.clone());
            }
        }

        if self.config.allow_test_provider_fallback {
            if let Some(adapter) = self.adapters.get("test") {
                if adapter.supports_embeddings() {
                    return Ok(("test".to_string(), "test".to_string()));
                }
            }
        }

        Err(ConduitError::AdapterUnavailable { provider: "embedding".to_string() })
    }

    pub async fn embed(&self, model_override: Option<&str>, input: String) -> Result<EmbeddingResponse> {
        let (provider, configured_model) = self.select().await?;
        let adapter = self.adapters.get(&provider).expect("selected provider must be registered");
        adapter.embed(model_override.unwrap_or(&configured_model), vec![input]).await
    }

    pub async fn embed_batch(&self, model_override: Option<&str>, inputs: Vec<String>) -> Result<EmbeddingResponse> {
        let (provider, configured_model) = self.select().await?;
        let adapter = self.adapters.get(&provider).expect("selected provider must be registered");
        adapter.embed(model_override.unwrap_or(&configured_model), inputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_core::model::{ProviderId, Request};
    use conduit_core::Response;

    struct FakeEmbedder {
        name: &'static str,
    }

    #[async_trait]
    impl ProviderAdapter for FakeEmbedder {
        fn name(&self) -> &str {
            self.name
        }
        async fn complete(&self, _request: &Request) -> Result<Response> {
            unimplemented!()
        }
        async fn embed(&self, model: &str, input: Vec<String>) -> Result<EmbeddingResponse> {
            Ok(EmbeddingResponse {
                embeddings: input.iter().map(|_| vec![0.0; 3]).collect(),
                model: model.to_string(),
                provider: self.name.to_string(),
                dimensions: 3,
                input_tokens: 1,
            })
        }
        fn supports_embeddings(&self) -> bool {
            true
        }
    }

    fn adapters() -> HashMap<String, Arc<dyn ProviderAdapter>> {
        let mut map: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        map.insert("ollama".to_string(), Arc::new(FakeEmbedder { name: "ollama" }));
        map.insert("openai".to_string(), Arc::new(FakeEmbedder { name: "openai" }));
        map
    }

    fn pair(provider: &str, model: &str) -> (String, String) {
        (provider.to_string(), model.to_string())
    }

    #[tokio::test]
    async fn local_preference_keeps_configured_order() {
        let config = EmbeddingRouterConfig {
            preferred: EmbeddingPreference::Local,
            providers: vec![pair("ollama", "nomic-embed"), pair("openai", "text-embedding-3")],
            fallback_to_cloud: true,
            allow_test_provider_fallback: false,
        };
        let router = EmbeddingRouter::new(config, adapters(), None);
        let result = router.embed(None, "hi".to_string()).await.unwrap();
        assert_eq!(result.provider, "ollama");
    }

    #[tokio::test]
    async fn cloud_preference_partitions_cloud_first() {
        let config = EmbeddingRouterConfig {
            preferred: EmbeddingPreference::Cloud,
            providers: vec![pair("ollama", "nomic-embed"), pair("openai", "text-embedding-3")],
            fallback_to_cloud: false,
            allow_test_provider_fallback: false,
        };
        let router = EmbeddingRouter::new(config, adapters(), None);
        let result = router.embed(None, "hi".to_string()).await.unwrap();
        assert_eq!(result.provider, "openai");
    }

    #[tokio::test]
    async fn falls_back_to_cloud_order_when_primary_unavailable() {
        let config = EmbeddingRouterConfig {
            preferred: EmbeddingPreference::Local,
            providers: vec![pair("missing-local", "m"), pair("openai", "text-embedding-3")],
            fallback_to_cloud: true,
            allow_test_provider_fallback: false,
        };
        let router = EmbeddingRouter::new(config, adapters(), None);
        let result = router.embed(None, "hi".to_string()).await.unwrap();
        assert_eq!(result.provider, "openai");
    }

    #[tokio::test]
    async fn no_candidates_available_and_no_fallback_errors() {
        let config = EmbeddingRouterConfig {
            preferred: EmbeddingPreference::Local,
            providers: vec![pair("missing-local", "m")],
            fallback_to_cloud: false,
            allow_test_provider_fallback: false,
        };
        let router = EmbeddingRouter::new(config, adapters(), None);
        let result = router.embed(None, "hi".to_string()).await;
        assert!(result.is_err());
    }
}
