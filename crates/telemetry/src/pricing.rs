//! Pricing for the models the agent is expected to run against.
//!
//! Prices are USD per 1 million tokens. The table ships with defaults for
//! the models we route through OpenRouter and accepts runtime overrides.

use serde::{Deserialize, Serialize};
use souschef_core::Usage;
use std::collections::HashMap;
use std::sync::RwLock;

/// Per-million-token pricing for one model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    /// USD per 1M prompt tokens.
    pub input_per_m: f64,
    /// USD per 1M completion tokens.
    pub output_per_m: f64,
}

impl ModelPricing {
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Cost of a call with the given measured usage.
    pub fn cost(&self, usage: &Usage) -> f64 {
        (usage.prompt_tokens as f64 * self.input_per_m
            + usage.completion_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Thread-safe model pricing table.
pub struct PricingTable {
    entries: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    /// Table seeded with the models we actually deploy against.
    pub fn with_defaults() -> Self {
        let mut entries = HashMap::new();

        entries.insert(
            "anthropic/claude-sonnet-4".into(),
            ModelPricing::new(3.0, 15.0),
        );
        entries.insert(
            "anthropic/claude-3.5-haiku".into(),
            ModelPricing::new(0.8, 4.0),
        );
        entries.insert("openai/gpt-4o".into(), ModelPricing::new(2.5, 10.0));
        entries.insert("openai/gpt-4o-mini".into(), ModelPricing::new(0.15, 0.6));
        entries.insert(
            "google/gemini-2.0-flash".into(),
            ModelPricing::new(0.1, 0.4),
        );
        entries.insert("deepseek/deepseek-v3".into(), ModelPricing::new(0.27, 1.1));

        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace pricing for a model.
    pub fn set(&self, model: impl Into<String>, pricing: ModelPricing) {
        self.entries.write().unwrap().insert(model.into(), pricing);
    }

    /// Cost of a call, or 0.0 when the model has no pricing entry.
    ///
    /// Matching is lenient: exact name first, then the bare name without a
    /// provider prefix, then longest-prefix match so versioned responses
    /// like `gpt-4o-mini-2024-07-18` still resolve to `gpt-4o-mini`.
    pub fn compute_cost(&self, model: &str, usage: &Usage) -> f64 {
        let entries = self.entries.read().unwrap();

        if let Some(p) = entries.get(model) {
            return p.cost(usage);
        }

        let bare_model = model.rsplit('/').next().unwrap_or(model).to_lowercase();

        let mut best: Option<(usize, &ModelPricing)> = None;
        for (key, pricing) in entries.iter() {
            let bare_key = key.rsplit('/').next().unwrap_or(key).to_lowercase();
            if bare_model.starts_with(&bare_key)
                && best.is_none_or(|(len, _)| bare_key.len() > len)
            {
                best = Some((bare_key.len(), pricing));
            }
        }

        best.map(|(_, p)| p.cost(usage)).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u32, completion: u32) -> Usage {
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn known_model_cost() {
        let table = PricingTable::with_defaults();
        // $3/M in, $15/M out: (1000*3 + 500*15) / 1M = 0.0105
        let cost = table.compute_cost("anthropic/claude-sonnet-4", &usage(1000, 500));
        assert!((cost - 0.0105).abs() < 1e-10);
    }

    #[test]
    fn unknown_model_costs_zero() {
        let table = PricingTable::with_defaults();
        let cost = table.compute_cost("acme/model-xyz", &usage(1000, 500));
        assert!(cost.abs() < 1e-10);
    }

    #[test]
    fn versioned_model_resolves_by_prefix() {
        let table = PricingTable::with_defaults();
        let exact = table.compute_cost("openai/gpt-4o-mini", &usage(2000, 1000));
        let versioned = table.compute_cost("gpt-4o-mini-2024-07-18", &usage(2000, 1000));
        assert!((exact - versioned).abs() < 1e-10);
        assert!(versioned > 0.0);
    }

    #[test]
    fn prefix_match_prefers_longest_key() {
        let table = PricingTable::empty();
        table.set("openai/gpt-4o", ModelPricing::new(2.5, 10.0));
        table.set("openai/gpt-4o-mini", ModelPricing::new(0.15, 0.6));

        let cost = table.compute_cost("gpt-4o-mini-2024-07-18", &usage(1_000_000, 0));
        assert!((cost - 0.15).abs() < 1e-10);
    }

    #[test]
    fn set_overrides_existing() {
        let table = PricingTable::with_defaults();
        table.set("openai/gpt-4o", ModelPricing::new(5.0, 20.0));
        let cost = table.compute_cost("openai/gpt-4o", &usage(1_000_000, 0));
        assert!((cost - 5.0).abs() < 1e-10);
    }
}
