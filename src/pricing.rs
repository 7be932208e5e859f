use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pricing information for a specific model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens (in USD)
    pub input_per_million: f64,
    /// Price per 1M output tokens (in USD)
    pub output_per_million: f64,
    /// Price per 1M cached input tokens (optional, in USD)
    #[serde(default)]
    pub cached_per_million: Option<f64>,
    /// Price per 1M reasoning tokens (optional, in USD)
    #[serde(default)]
    pub reasoning_per_million: Option<f64>,
}

/// Cost breakdown for a single call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    /// Cost for uncached input tokens
    pub input_cost: f64,
    /// Cost for output tokens (reasoning excluded when priced separately)
    pub output_cost: f64,
    /// Cost for cached input tokens (if applicable)
    pub cached_cost: Option<f64>,
    /// Cost for reasoning tokens (if priced separately)
    pub reasoning_cost: Option<f64>,
    /// Total cost
    pub total_cost: f64,
    /// Currency (e.g., "USD")
    pub currency: String,
    /// Pricing entry used for calculation
    pub pricing_model: Option<String>,
}

fn per_million(tokens: u64, price: f64) -> f64 {
    (tokens as f64 / 1_000_000.0) * price
}

impl ModelPricing {
    /// Returns `(input_cost, output_cost, cached_cost, reasoning_cost, total)`.
    ///
    /// Cached tokens are a subset of `input_tokens` and reasoning tokens a subset of
    /// `output_tokens`; each is billed once, at the discounted or reasoning rate when
    /// one is configured.
    pub fn calculate_cost(
        &self,
        input_tokens: u64,
        output_tokens: u64,
        cached_tokens: Option<u64>,
        reasoning_tokens: Option<u64>,
    ) -> (f64, f64, Option<f64>, Option<f64>, f64) {
        let (uncached, cached_cost) = match (cached_tokens, self.cached_per_million) {
            (Some(tokens), Some(price)) => {
                let tokens = tokens.min(input_tokens);
                (input_tokens - tokens, Some(per_million(tokens, price)))
            }
            _ => (input_tokens, None),
        };
        let input_cost = per_million(uncached, self.input_per_million);

        let (plain_output, reasoning_cost) =
            match (reasoning_tokens, self.reasoning_per_million) {
                (Some(tokens), Some(price)) => {
                    let tokens = tokens.min(output_tokens);
                    (output_tokens - tokens, Some(per_million(tokens, price)))
                }
                _ => (output_tokens, None),
            };
        let output_cost = per_million(plain_output, self.output_per_million);

        let total =
            input_cost + output_cost + cached_cost.unwrap_or(0.0) + reasoning_cost.unwrap_or(0.0);

        (input_cost, output_cost, cached_cost, reasoning_cost, total)
    }
}

/// Pricing configuration manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Map of model name to pricing
    pub models: HashMap<String, ModelPricing>,
    /// Default pricing for unknown models
    #[serde(default)]
    pub default: Option<ModelPricing>,
}

fn entry(input: f64, output: f64, cached: Option<f64>) -> ModelPricing {
    ModelPricing {
        input_per_million: input,
        output_per_million: output,
        cached_per_million: cached,
        reasoning_per_million: None,
    }
}

impl PricingConfig {
    /// OpenAI list prices for models served through the Responses API.
    pub fn openai_defaults() -> Self {
        let mut models = HashMap::new();

        // GPT-4o
        models.insert("gpt-4o".to_string(), entry(2.50, 10.00, Some(1.25)));
        models.insert(
            "gpt-4o-2024-11-20".to_string(),
            entry(2.50, 10.00, Some(1.25)),
        );
        models.insert(
            "gpt-4o-2024-05-13".to_string(),
            entry(5.00, 15.00, None),
        );
        models.insert("gpt-4o-mini".to_string(), entry(0.150, 0.600, Some(0.075)));

        // GPT-4.1 family
        models.insert("gpt-4.1".to_string(), entry(2.00, 8.00, Some(0.50)));
        models.insert("gpt-4.1-mini".to_string(), entry(0.40, 1.60, Some(0.10)));
        models.insert("gpt-4.1-nano".to_string(), entry(0.10, 0.40, Some(0.025)));

        // Reasoning models (reasoning tokens billed as output)
        models.insert("o1".to_string(), entry(15.00, 60.00, Some(7.50)));
        models.insert("o1-mini".to_string(), entry(1.10, 4.40, Some(0.55)));
        models.insert("o3-mini".to_string(), entry(1.10, 4.40, Some(0.55)));

        // Legacy
        models.insert("gpt-4-turbo".to_string(), entry(10.00, 30.00, None));
        models.insert("gpt-3.5-turbo".to_string(), entry(0.50, 1.50, None));

        Self {
            models,
            default: None,
        }
    }

    /// Load from JSON file
    pub fn load_from_file(path: &str) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Load from `LLM_RESPONSES_PRICING_CONFIG` when set, otherwise the OpenAI defaults.
    pub fn from_env() -> Self {
        match std::env::var("LLM_RESPONSES_PRICING_CONFIG") {
            Ok(path) if !path.trim().is_empty() => {
                let path = path.trim();
                match Self::load_from_file(path) {
                    Ok(config) => {
                        tracing::info!("Pricing configuration loaded from {}", path);
                        config
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load pricing config: {}, using defaults", e);
                        Self::default()
                    }
                }
            }
            _ => Self::default(),
        }
    }

    /// Get pricing for a model: exact match, then longest prefix, then default.
    pub fn get_pricing(&self, model: &str) -> Option<&ModelPricing> {
        if let Some(pricing) = self.models.get(model) {
            return Some(pricing);
        }

        // "gpt-4o-2024-08-06" matches "gpt-4o", but "gpt-4o-mini-2024-07-18" must
        // match "gpt-4o-mini" rather than "gpt-4o".
        let prefix_match = self
            .models
            .iter()
            .filter(|(key, _)| model.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, pricing)| pricing);
        if prefix_match.is_some() {
            return prefix_match;
        }

        self.default.as_ref()
    }

    /// Calculate cost for a request
    pub fn calculate_cost(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cached_tokens: Option<u64>,
        reasoning_tokens: Option<u64>,
    ) -> Option<CostInfo> {
        let pricing = self.get_pricing(model)?;
        let (input_cost, output_cost, cached_cost, reasoning_cost, total_cost) =
            pricing.calculate_cost(input_tokens, output_tokens, cached_tokens, reasoning_tokens);

        Some(CostInfo {
            input_cost,
            output_cost,
            cached_cost,
            reasoning_cost,
            total_cost,
            currency: "USD".to_string(),
            pricing_model: Some(model.to_string()),
        })
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self::openai_defaults()
    }
}
