//! `StatsKey` — the `(provider, model)` key shared between the Dispatcher,
//! Usage Stats owner and its persistence format (spec.md §3, §6.5).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsKey {
    pub provider: String,
    pub model: String,
}

impl StatsKey {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self { provider: provider.into(), model: model.into() }
    }

    /// Percent-escapes `:` in each component before joining, resolving the
    /// open question in spec.md §9 about ambiguous persistence keys when a
    /// model name itself contains a colon.
    pub fn persistence_key(&self) -> String {
        format!("{}:{}", escape(&self.provider), escape(&self.model))
    }

    pub fn from_persistence_key(key: &str) -> Option<Self> {
        let (provider, model) = key.split_once(':')?;
        Some(Self { provider: unescape(provider), model: unescape(model) })
    }
}

impl fmt::Display for StatsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

fn escape(s: &str) -> String {
    s.replace('%', "%25").replace(':', "%3A")
}

fn unescape(s: &str) -> String {
    s.replace("%3A", ":").replace("%25", "%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_colon_in_model_name() {
        let key = StatsKey::new("openrouter", "anthropic:claude-3");
        let persisted = key.persistence_key();
        assert_eq!(persisted, "openrouter:anthropic%3Aclaude-3");
        assert_eq!(StatsKey::from_persistence_key(&persisted).unwrap(), key);
    }
}
