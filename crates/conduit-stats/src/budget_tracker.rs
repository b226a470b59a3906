//! Budget Tracker (spec.md §4.8): daily spend accounting with UTC-midnight
//! rollover, backed by `conduit_core::budget::{Budget, BudgetStatus}` and
//! priced through `conduit_core::pricing::PricingTable`. Grounded on the
//! cost-accumulation shape of `AgentStats::update_costs` in
//! `examples/querymt-querymt/crates/agent/src/middleware/state.rs`, lifted
//! out of per-agent state into a standalone daily-rollover tracker.

use conduit_core::budget::{Budget, BudgetStatus};
use conduit_core::pricing::PricingTable;
use parking_lot::Mutex;
use std::collections::HashMap;

struct TrackerState {
    budget: Budget,
    day: i64,
}

pub struct BudgetTracker {
    state: Mutex<TrackerState>,
    pricing: PricingTable,
}

impl BudgetTracker {
    pub fn new(daily_budget_usd: f64, pricing: PricingTable) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                budget: Budget { daily_budget_usd, spent_today_usd: 0.0, per_provider_spend: HashMap::new() },
                day: today(),
            }),
            pricing,
        }
    }

    /// Rolls spend over to zero on the first call after UTC midnight
    /// (spec.md §4.8). Must be called under the state lock.
    fn roll_if_needed(&self, state: &mut TrackerState) {
        let now = today();
        if now != state.day {
            state.budget.spent_today_usd = 0.0;
            state.budget.per_provider_spend.clear();
            state.day = now;
        }
    }

    pub fn record_usage(&self, provider: &str, model: &str, input_tokens: u64, output_tokens: u64) {
        if self.pricing.lookup(provider, model).is_none() {
            tracing::debug!(provider, model, "no pricing entry; usage not charged against budget");
            return;
        }
        let cost = self.pricing.calculate_cost(provider, model, input_tokens, output_tokens);
        let mut state = self.state.lock();
        self.roll_if_needed(&mut state);
        state.budget.spent_today_usd += cost;
        *state.budget.per_provider_spend.entry(provider.to_string()).or_insert(0.0) += cost;
    }

    pub fn get_status(&self) -> BudgetStatus {
        let mut state = self.state.lock();
        self.roll_if_needed(&mut state);
        state.budget.status()
    }
}

fn today() -> i64 {
    chrono::Utc::now().date_naive().num_days_from_ce() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::pricing::ModelPricing;

    fn pricing() -> PricingTable {
        let mut inner = HashMap::new();
        let mut models = HashMap::new();
        models.insert(
            "claude-opus".to_string(),
            ModelPricing { input: Some(3.0), output: Some(15.0), cache_read: None, cache_write: None },
        );
        inner.insert("anthropic".to_string(), models);
        PricingTable(inner)
    }

    #[test]
    fn records_usage_against_daily_spend() {
        let tracker = BudgetTracker::new(10.0, pricing());
        tracker.record_usage("anthropic", "claude-opus", 1_000_000, 0);
        let status = tracker.get_status();
        assert!((status.spent_today - 3.0).abs() < 1e-9);
        assert!((status.remaining - 7.0).abs() < 1e-9);
    }

    #[test]
    fn unpriced_model_is_not_charged() {
        let tracker = BudgetTracker::new(10.0, pricing());
        tracker.record_usage("anthropic", "unknown-model", 1_000_000, 1_000_000);
        assert_eq!(tracker.get_status().spent_today, 0.0);
    }

    #[test]
    fn per_provider_spend_is_tracked_separately() {
        let tracker = BudgetTracker::new(10.0, pricing());
        tracker.record_usage("anthropic", "claude-opus", 1_000_000, 0);
        let status = tracker.get_status();
        assert!((status.per_provider["anthropic"] - 3.0).abs() < 1e-9);
    }
}
