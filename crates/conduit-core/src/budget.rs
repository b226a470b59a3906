//! Budget snapshot data type (spec.md §3, §4.8). The tracker actor that
//! owns and mutates this lives in `conduit-stats`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Budget {
    pub daily_budget_usd: f64,
    pub spent_today_usd: f64,
    pub per_provider_spend: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub daily_budget: f64,
    pub spent_today: f64,
    pub remaining: f64,
    pub percent_remaining: f64,
    pub per_provider: HashMap<String, f64>,
}

impl Budget {
    pub fn status(&self) -> BudgetStatus {
        let remaining = (self.daily_budget_usd - self.spent_today_usd).max(0.0);
        let percent_remaining = if self.daily_budget_usd > 0.0 {
            (remaining / self.daily_budget_usd * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        BudgetStatus {
            daily_budget: self.daily_budget_usd,
            spent_today: self.spent_today_usd,
            remaining,
            percent_remaining,
            per_provider: self.per_provider_spend.clone(),
        }
    }
}
