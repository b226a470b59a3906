//! Provider Registry (spec.md §4.1 component 2 / §2 row 2): maps a symbolic
//! provider identifier to the adapter kind that knows how to talk to it.

use conduit_core::model::{AdapterKind, ProviderId};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    kinds: HashMap<String, AdapterKind>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        let mut kinds = HashMap::new();
        kinds.insert("anthropic".to_string(), AdapterKind::ApiHttp);
        kinds.insert("openai".to_string(), AdapterKind::ApiHttp);
        kinds.insert("openrouter".to_string(), AdapterKind::ApiHttp);
        kinds.insert("ollama".to_string(), AdapterKind::LocalHttp);
        kinds.insert("lmstudio".to_string(), AdapterKind::LocalHttp);
        kinds.insert("claude_cli".to_string(), AdapterKind::SubprocessSession);
        kinds.insert("codex_cli".to_string(), AdapterKind::SubprocessSession);
        Self { kinds }
    }

    /// Registers or overrides the adapter kind for a provider, allowing
    /// late-bound / unknown providers (spec.md §4.1 step 2) to be wired up
    /// at process startup.
    pub fn register(&mut self, provider: impl Into<String>, kind: AdapterKind) {
        self.kinds.insert(provider.into(), kind);
    }

    pub fn resolve(&self, provider: &ProviderId) -> Option<AdapterKind> {
        self.kinds.get(provider.as_str()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_providers() {
        let reg = ProviderRegistry::new();
        assert_eq!(reg.resolve(&ProviderId::Anthropic), Some(AdapterKind::ApiHttp));
        assert_eq!(reg.resolve(&ProviderId::ClaudeCli), Some(AdapterKind::SubprocessSession));
    }

    #[test]
    fn unknown_provider_resolves_to_none_until_registered() {
        let mut reg = ProviderRegistry::new();
        let custom = ProviderId::Other("my-local-model".into());
        assert_eq!(reg.resolve(&custom), None);
        reg.register("my-local-model", AdapterKind::LocalHttp);
        assert_eq!(reg.resolve(&custom), Some(AdapterKind::LocalHttp));
    }
}
