//! Per-model cost tables and cost calculation.
//!
//! Grounded on `examples/querymt-querymt/crates/querymt/src/pricing/*`:
//! a per-million-token rate table with a tolerant deserializer, reduced here
//! to the fields the Budget Tracker and Usage Stats actually need (spec.md
//! §4.7, §4.8).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Accepts either a bare number or a numeric string in the source table,
/// matching the tolerant parsing the corpus pricing table uses for values
/// that sometimes arrive quoted.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
        Null,
    }
    Ok(match Option::<NumOrStr>::deserialize(deserializer)? {
        Some(NumOrStr::Num(n)) => Some(n),
        Some(NumOrStr::Str(s)) => s.parse().ok(),
        Some(NumOrStr::Null) | None => None,
    })
}

/// Cost per million tokens, in USD, for one model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub input: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub output: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cache_read: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cache_write: Option<f64>,
}

impl ModelPricing {
    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64) -> Option<f64> {
        if self.input.is_none() && self.output.is_none() {
            return None;
        }
        let in_cost = self.input.unwrap_or(0.0) * (input_tokens as f64 / 1_000_000.0);
        let out_cost = self.output.unwrap_or(0.0) * (output_tokens as f64 / 1_000_000.0);
        Some(in_cost + out_cost)
    }

    pub fn calculate_cache_cost(&self, read_tokens: u64, write_tokens: u64) -> (Option<f64>, Option<f64>) {
        let read = self.cache_read.map(|r| r * (read_tokens as f64 / 1_000_000.0));
        let write = self.cache_write.map(|w| w * (write_tokens as f64 / 1_000_000.0));
        (read, write)
    }
}

/// `provider -> model -> pricing`, the shape implementers supply externally
/// (spec.md §4.8: "compute cost via a provider-specific model→price table
/// (implementer-supplied; external data)").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingTable(pub HashMap<String, HashMap<String, ModelPricing>>);

impl PricingTable {
    pub fn lookup(&self, provider: &str, model: &str) -> Option<&ModelPricing> {
        self.0.get(provider)?.get(model)
    }

    pub fn calculate_cost(&self, provider: &str, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.lookup(provider, model)
            .and_then(|p| p.calculate_cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculates_cost_from_rates() {
        let pricing = ModelPricing { input: Some(3.0), output: Some(15.0), cache_read: None, cache_write: None };
        let cost = pricing.calculate_cost(1_000_000, 1_000_000).unwrap();
        assert!((cost - 18.0).abs() < 1e-9);
    }

    #[test]
    fn missing_rates_yield_none() {
        let pricing = ModelPricing::default();
        assert!(pricing.calculate_cost(100, 100).is_none());
    }

    #[test]
    fn lenient_numeric_string_parses() {
        let json = r#"{"input": "3.50", "output": 15.0}"#;
        let pricing: ModelPricing = serde_json::from_str(json).unwrap();
        assert_eq!(pricing.input, Some(3.5));
    }
}
