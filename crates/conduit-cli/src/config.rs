//! `ConduitConfig` loading (SPEC_FULL.md §A.3): defaults, overlaid by an
//! optional `conduit.toml`, overlaid by `CONDUIT_*` environment variables.
//! Grounded on the layered-defaults/file/env pattern of
//! `examples/querymt-querymt/crates/agent/src/config.rs`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    pub default_provider: String,
    pub pool_capacity: usize,
    pub pool_idle_timeout_secs: u64,
    pub daily_budget_usd: f64,
    pub stats_retention_days: i64,
    pub reliability_alert_threshold: f64,
    pub system_prompt_context_window: usize,
    pub demo_mode: bool,
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            default_provider: "anthropic".to_string(),
            pool_capacity: 4,
            pool_idle_timeout_secs: 300,
            daily_budget_usd: 50.0,
            stats_retention_days: 7,
            reliability_alert_threshold: 0.8,
            system_prompt_context_window: 200_000,
            demo_mode: false,
        }
    }
}

impl ConduitConfig {
    /// Loads defaults, then `conduit.toml` in `config_dir` if present, then
    /// `CONDUIT_*` environment overrides.
    pub fn load(config_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = config_dir {
            let path = dir.join("conduit.toml");
            if path.exists() {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                config = toml::from_str(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CONDUIT_DEFAULT_PROVIDER") {
            self.default_provider = v;
        }
        if let Some(v) = env_parsed("CONDUIT_POOL_CAPACITY") {
            self.pool_capacity = v;
        }
        if let Some(v) = env_parsed("CONDUIT_POOL_IDLE_TIMEOUT_SECS") {
            self.pool_idle_timeout_secs = v;
        }
        if let Some(v) = env_parsed("CONDUIT_DAILY_BUDGET_USD") {
            self.daily_budget_usd = v;
        }
        if let Some(v) = env_parsed("CONDUIT_STATS_RETENTION_DAYS") {
            self.stats_retention_days = v;
        }
        if let Some(v) = env_parsed("CONDUIT_RELIABILITY_ALERT_THRESHOLD") {
            self.reliability_alert_threshold = v;
        }
        if let Some(v) = env_parsed("CONDUIT_SYSTEM_PROMPT_CONTEXT_WINDOW") {
            self.system_prompt_context_window = v;
        }
        if let Some(v) = env_parsed("CONDUIT_DEMO_MODE") {
            self.demo_mode = v;
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_used_when_no_file_present() {
        let config = ConduitConfig::load(None).unwrap();
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.pool_capacity, 4);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("conduit.toml"),
            "default_provider = \"openai\"\ndaily_budget_usd = 10.0\n",
        )
        .unwrap();
        let config = ConduitConfig::load(Some(dir.path())).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.daily_budget_usd, 10.0);
        assert_eq!(config.pool_capacity, 4);
    }

    #[test]
    fn env_overrides_file_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("conduit.toml"), "default_provider = \"openai\"\n").unwrap();
        std::env::set_var("CONDUIT_DEFAULT_PROVIDER", "gemini");
        let config = ConduitConfig::load(Some(dir.path())).unwrap();
        std::env::remove_var("CONDUIT_DEFAULT_PROVIDER");
        assert_eq!(config.default_provider, "gemini");
    }
}
