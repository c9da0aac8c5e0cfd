use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::RuntimeConfig;
use crate::delegate::ReasoningDelegate;
use crate::delegate::anthropic::{AnthropicConfig, AnthropicDelegate};

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

pub fn validate_model_name(model_name: &str) -> Result<()> {
    if model_name.starts_with("claude") {
        return Ok(());
    }
    Err(anyhow::anyhow!(
        "model '{}' is not an Anthropic model; expected a name starting with 'claude'",
        model_name
    ))
}

pub fn anthropic_config(cfg: &RuntimeConfig, api_key: String) -> AnthropicConfig {
    AnthropicConfig {
        api_key,
        model: cfg.model.clone(),
        base_url: cfg.api_base_url.clone(),
        max_tokens: cfg.max_tokens,
        request_timeout: cfg.request_timeout(),
    }
}

/// Builds the reasoning delegate for a run from the resolved configuration
/// and the API key in the environment.
pub fn resolve_delegate(cfg: &RuntimeConfig) -> Result<Arc<dyn ReasoningDelegate>> {
    let api_key = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .context("ANTHROPIC_API_KEY is required to run tasks")?;
    validate_model_name(&cfg.model)?;

    let delegate = AnthropicDelegate::new(anthropic_config(cfg, api_key))
        .context("failed to build the reasoning delegate HTTP client")?;
    Ok(Arc::new(delegate))
}
