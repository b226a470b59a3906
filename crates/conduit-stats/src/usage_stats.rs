//! Usage Stats (spec.md §4.7): per `(provider, model)` rolling counters with
//! a bounded latency sample ring and a reliability-threshold alert signal.
//! Grounded in shape on `AgentStats` in
//! `examples/querymt-querymt/crates/agent/src/middleware/state.rs` (counter
//! fields, `update_costs` cost accumulation), restructured around
//! `conduit_core::stats::StatsKey` for the `(provider, model)` axis this
//! system keys on instead of a single running total.

use conduit_core::external::SignalSink;
use conduit_core::pricing::PricingTable;
use conduit_core::stats::StatsKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

const LATENCY_RING_CAPACITY: usize = 100;
const DEFAULT_RELIABILITY_THRESHOLD: f64 = 0.8;
const DEFAULT_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStats {
    pub successes: u64,
    pub failures: u64,
    /// Most-recent-first, capped at `LATENCY_RING_CAPACITY` (spec.md §4.7).
    #[serde(default)]
    latencies_ms: VecDeque<u64>,
    pub total_cost_usd: f64,
    #[serde(default)]
    pub last_updated_day: Option<i64>,
}

impl ModelStats {
    pub fn requests(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn reliability(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            return 1.0;
        }
        self.successes as f64 / total as f64
    }

    /// p95 latency: samples sorted descending, index `round(0.05 * N)` from
    /// the front, clamped to a valid index (spec.md §4.7).
    pub fn p95_latency_ms(&self) -> Option<u64> {
        if self.latencies_ms.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.latencies_ms.iter().copied().collect();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let n = sorted.len();
        let idx = ((0.05 * n as f64).round() as usize).clamp(1, n) - 1;
        Some(sorted[idx])
    }

    fn push_latency(&mut self, latency_ms: u64) {
        // A non-positive latency is a malformed sample, never recorded
        // (spec.md §4.7 edge case).
        if latency_ms == 0 {
            return;
        }
        self.latencies_ms.push_front(latency_ms);
        self.latencies_ms.truncate(LATENCY_RING_CAPACITY);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityEntry {
    pub provider: String,
    pub model: String,
    pub reliability: f64,
    pub requests: u64,
}

pub struct UsageStatsConfig {
    pub persistence_path: Option<PathBuf>,
    pub reliability_threshold: f64,
    pub retention_days: i64,
}

impl Default for UsageStatsConfig {
    fn default() -> Self {
        Self {
            persistence_path: None,
            reliability_threshold: DEFAULT_RELIABILITY_THRESHOLD,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

pub struct UsageStats {
    entries: Mutex<HashMap<String, ModelStats>>,
    config: UsageStatsConfig,
    signals: Arc<dyn SignalSink>,
}

impl UsageStats {
    pub fn new(config: UsageStatsConfig, signals: Arc<dyn SignalSink>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), config, signals }
    }

    fn today(&self) -> i64 {
        chrono::Utc::now().date_naive().num_days_from_ce() as i64
    }

    pub async fn record_success(&self, key: &StatsKey, latency_ms: u64, cost_usd: Option<f64>) {
        let today = self.today();
        let crossed_alert;
        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.persistence_key()).or_default();
            let was_below = entry.requests() >= 5 && entry.reliability() < self.config.reliability_threshold;
            entry.successes += 1;
            entry.push_latency(latency_ms);
            entry.total_cost_usd += cost_usd.unwrap_or(0.0);
            entry.last_updated_day = Some(today);
            let now_above = entry.requests() >= 5 && entry.reliability() >= self.config.reliability_threshold;
            crossed_alert = was_below && now_above;
        }
        if crossed_alert {
            self.emit_reliability_alert(key, true).await;
        }
    }

    pub async fn record_failure(&self, key: &StatsKey) {
        let today = self.today();
        let crossed_alert;
        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.persistence_key()).or_default();
            let was_above = entry.requests() < 5 || entry.reliability() >= self.config.reliability_threshold;
            entry.failures += 1;
            entry.last_updated_day = Some(today);
            let now_below = entry.requests() >= 5 && entry.reliability() < self.config.reliability_threshold;
            crossed_alert = was_above && now_below;
        }
        if crossed_alert {
            self.emit_reliability_alert(key, false).await;
        }
    }

    async fn emit_reliability_alert(&self, key: &StatsKey, recovered: bool) {
        self.signals
            .emit(
                "reliability_alert",
                if recovered { "recovered" } else { "degraded" },
                serde_json::json!({ "provider": key.provider, "model": key.model }),
            )
            .await;
    }

    pub fn get(&self, key: &StatsKey) -> Option<ModelStats> {
        self.entries.lock().get(&key.persistence_key()).cloned()
    }

    /// `get(provider)` — aggregate across every model of that provider
    /// (spec.md §4.7).
    pub fn get_provider(&self, provider: &str) -> ModelStats {
        let entries = self.entries.lock();
        let mut aggregate = ModelStats::default();
        for (k, v) in entries.iter() {
            let Some(key) = StatsKey::from_persistence_key(k) else { continue };
            if key.provider != provider {
                continue;
            }
            aggregate.successes += v.successes;
            aggregate.failures += v.failures;
            aggregate.total_cost_usd += v.total_cost_usd;
            for &latency in v.latencies_ms.iter().rev() {
                aggregate.push_latency(latency);
            }
        }
        aggregate
    }

    /// Providers ordered by descending aggregate reliability, ties broken by
    /// request volume (spec.md §4.7: `reliability_ranking() -> [(provider,
    /// success_rate)]`, aggregated across models).
    pub fn reliability_ranking(&self) -> Vec<ReliabilityEntry> {
        let providers: std::collections::HashSet<String> = {
            let entries = self.entries.lock();
            entries.keys().filter_map(|k| StatsKey::from_persistence_key(k)).map(|k| k.provider).collect()
        };
        let mut ranked: Vec<ReliabilityEntry> = providers
            .into_iter()
            .map(|provider| {
                let aggregate = self.get_provider(&provider);
                ReliabilityEntry {
                    reliability: aggregate.reliability(),
                    requests: aggregate.requests(),
                    model: String::new(),
                    provider,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.reliability
                .partial_cmp(&a.reliability)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.requests.cmp(&a.requests))
        });
        ranked
    }

    pub fn reset(&self) {
        self.entries.lock().clear();
    }

    pub fn reset_provider(&self, provider: &str) {
        self.entries.lock().retain(|k, _| StatsKey::from_persistence_key(k).is_some_and(|key| key.provider != provider));
    }

    /// Drops entries not touched within `retention_days` (spec.md §4.7 daily
    /// pruning). Entries with no `last_updated_day` (never pruned before a
    /// first write) are kept.
    pub fn prune_stale(&self) {
        let today = self.today();
        let retention = self.config.retention_days;
        self.entries.lock().retain(|_, v| match v.last_updated_day {
            Some(day) => today - day <= retention,
            None => true,
        });
    }

    pub fn persist(&self) -> std::io::Result<()> {
        let Some(path) = &self.config.persistence_path else {
            return Ok(());
        };
        let entries = self.entries.lock();
        let json = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(path, json)
    }

    pub fn load(&self) -> std::io::Result<()> {
        let Some(path) = &self.config.persistence_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let data = std::fs::read_to_string(path)?;
        let loaded: HashMap<String, ModelStats> = serde_json::from_str(&data)?;
        *self.entries.lock() = loaded;
        Ok(())
    }

    pub fn apply_pricing(&self, _pricing: &PricingTable) {
        // Pricing is applied at record time via the caller-supplied
        // `cost_usd`; this hook exists for callers that recompute historical
        // cost after a pricing-table reload.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::external::NullSignalSink;

    fn stats() -> UsageStats {
        UsageStats::new(UsageStatsConfig::default(), Arc::new(NullSignalSink))
    }

    fn key() -> StatsKey {
        StatsKey::new("anthropic", "claude-opus")
    }

    #[tokio::test]
    async fn records_successes_and_failures() {
        let s = stats();
        s.record_success(&key(), 100, Some(0.01)).await;
        s.record_failure(&key()).await;
        let entry = s.get(&key()).unwrap();
        assert_eq!(entry.successes, 1);
        assert_eq!(entry.failures, 1);
        assert_eq!(entry.requests(), 2);
    }

    #[tokio::test]
    async fn zero_latency_sample_is_not_recorded() {
        let s = stats();
        s.record_success(&key(), 0, None).await;
        let entry = s.get(&key()).unwrap();
        assert_eq!(entry.p95_latency_ms(), None);
    }

    #[tokio::test]
    async fn latency_ring_is_bounded_and_most_recent_first() {
        let s = stats();
        for i in 1..=150u64 {
            s.record_success(&key(), i, None).await;
        }
        let entry = s.get(&key()).unwrap();
        assert_eq!(entry.latencies_ms.len(), LATENCY_RING_CAPACITY);
        assert_eq!(entry.latencies_ms.front().copied(), Some(150));
    }

    #[tokio::test]
    async fn reliability_ranking_orders_providers_descending() {
        let s = stats();
        let good = StatsKey::new("anthropic", "claude-opus");
        let bad = StatsKey::new("openai", "gpt");
        for _ in 0..10 {
            s.record_success(&good, 10, None).await;
        }
        for _ in 0..2 {
            s.record_success(&bad, 10, None).await;
        }
        for _ in 0..8 {
            s.record_failure(&bad).await;
        }
        let ranking = s.reliability_ranking();
        assert_eq!(ranking[0].provider, "anthropic");
        assert_eq!(ranking[1].provider, "openai");
    }

    #[tokio::test]
    async fn get_provider_aggregates_across_models() {
        let s = stats();
        s.record_success(&StatsKey::new("anthropic", "opus"), 10, None).await;
        s.record_success(&StatsKey::new("anthropic", "haiku"), 20, None).await;
        let aggregate = s.get_provider("anthropic");
        assert_eq!(aggregate.successes, 2);
    }

    #[tokio::test]
    async fn reset_clears_all_entries() {
        let s = stats();
        s.record_success(&key(), 10, None).await;
        s.reset();
        assert!(s.get(&key()).is_none());
    }

    #[tokio::test]
    async fn persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let config = UsageStatsConfig { persistence_path: Some(path.clone()), ..Default::default() };
        let s = UsageStats::new(config, Arc::new(NullSignalSink));
        s.record_success(&key(), 42, Some(0.5)).await;
        s.persist().unwrap();

        let config2 = UsageStatsConfig { persistence_path: Some(path), ..Default::default() };
        let s2 = UsageStats::new(config2, Arc::new(NullSignalSink));
        s2.load().unwrap();
        let entry = s2.get(&key()).unwrap();
        assert_eq!(entry.successes, 1);
        assert_eq!(entry.total_cost_usd, 0.5);
    }
}
