use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::*;
use crate::delegate::anthropic::{
    DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_ANTHROPIC_MODEL, DEFAULT_MAX_TOKENS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::orchestrator::{DEFAULT_MAX_STEPS, DEFAULT_SUMMARY_RESULT_CHARS, OrchestratorConfig};
use crate::task::EnumerationTuning;
use crate::tools::ToolSettings;
use crate::tools::find::{
    DEFAULT_BULK_OUTPUT_CEILING_BYTES, DEFAULT_FIND_PROGRAM, DEFAULT_PAGE_SIZE, EnumeratorConfig,
    MAX_PAGE_SIZE,
};
use crate::tools::read::DEFAULT_MAX_READ_BYTES;

pub const MAX_STEPS_LIMIT: usize = 100;
const MIN_BULK_OUTPUT_CEILING_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub model: String,
    pub api_base_url: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_steps: usize,
    pub page_size: usize,
    pub max_depth: Option<usize>,
    pub enumeration_strategy: EnumerationStrategy,
    pub bulk_output_ceiling_bytes: usize,
    pub find_program: String,
    pub max_read_bytes: usize,
    pub summary_result_chars: usize,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
}

impl RuntimeConfig {
    pub fn enumeration_tuning(&self) -> EnumerationTuning {
        EnumerationTuning {
            page_size: self.page_size,
            max_depth: self.max_depth,
        }
    }

    pub fn enumerator_config(&self) -> EnumeratorConfig {
        EnumeratorConfig {
            strategy: self.enumeration_strategy,
            bulk_output_ceiling_bytes: self.bulk_output_ceiling_bytes,
            find_program: self.find_program.clone(),
        }
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            enumerator: self.enumerator_config(),
            enumeration: self.enumeration_tuning(),
            max_read_bytes: self.max_read_bytes,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_steps: self.max_steps,
            summary_result_chars: self.summary_result_chars,
            tools: self.tool_settings(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub model: Option<String>,
    pub api_base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub max_steps: Option<usize>,
    pub page_size: Option<usize>,
    pub max_depth: Option<usize>,
    pub enumeration_strategy: Option<EnumerationStrategy>,
    pub bulk_output_ceiling_bytes: Option<usize>,
    pub find_program: Option<String>,
    pub max_read_bytes: Option<usize>,
    pub summary_result_chars: Option<usize>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. \
             Check enumeration_strategy values and field names.",
            path.display()
        )
    })
}

fn select_profile(cli: &Cli, profiles: &ProfilesFile) -> Result<ProfileConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    if selected == "default" && !profiles.profiles.contains_key("default") {
        return Ok(ProfileConfig::default());
    }

    profiles.profiles.get(selected).cloned().ok_or_else(|| {
        let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
        names.sort();
        if names.is_empty() {
            anyhow::anyhow!(
                "profile '{}' not found in '{}'. No profiles are defined yet.",
                selected,
                cli.config_path
            )
        } else {
            anyhow::anyhow!(
                "profile '{}' not found in '{}'. Available profiles: {}",
                selected,
                cli.config_path,
                names.join(", ")
            )
        }
    })
}

/// Resolves settings with precedence CLI flag / env var, then profile, then
/// built-in default. Run-level overrides (`--max-steps` and friends) are
/// applied by the command handlers on top of this.
pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let profile = select_profile(cli, profiles)?;

    let model = cli
        .model
        .clone()
        .or(profile.model)
        .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());
    if model.trim().is_empty() {
        return Err(anyhow::anyhow!("model name cannot be empty. Set --model <name>."));
    }

    Ok(RuntimeConfig {
        profile: cli.profile.trim().to_string(),
        config_path: cli.config_path.clone(),
        model,
        api_base_url: cli
            .api_base_url
            .clone()
            .or(profile.api_base_url)
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
        max_tokens: cli
            .max_tokens
            .or(profile.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS)
            .max(256),
        request_timeout_secs: cli
            .request_timeout_secs
            .or(profile.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
            .max(1),
        max_steps: profile
            .max_steps
            .unwrap_or(DEFAULT_MAX_STEPS)
            .clamp(1, MAX_STEPS_LIMIT),
        page_size: profile
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE),
        max_depth: profile.max_depth.map(|depth| depth.max(1)),
        enumeration_strategy: cli
            .strategy
            .or(profile.enumeration_strategy)
            .unwrap_or(EnumerationStrategy::Auto),
        bulk_output_ceiling_bytes: cli
            .bulk_output_ceiling_bytes
            .or(profile.bulk_output_ceiling_bytes)
            .unwrap_or(DEFAULT_BULK_OUTPUT_CEILING_BYTES)
            .max(MIN_BULK_OUTPUT_CEILING_BYTES),
        find_program: cli
            .find_program
            .clone()
            .or(profile.find_program)
            .unwrap_or_else(|| DEFAULT_FIND_PROGRAM.to_string()),
        max_read_bytes: cli
            .max_read_bytes
            .or(profile.max_read_bytes)
            .unwrap_or(DEFAULT_MAX_READ_BYTES)
            .max(1),
        summary_result_chars: cli
            .summary_result_chars
            .or(profile.summary_result_chars)
            .unwrap_or(DEFAULT_SUMMARY_RESULT_CHARS)
            .max(32),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(true),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".fsagent/telemetry/events.jsonl".to_string()),
    })
}

/// Applies `run`/`find` flags over the resolved configuration.
pub fn apply_run_overrides(
    cfg: &mut RuntimeConfig,
    max_steps: Option<usize>,
    page_size: Option<usize>,
    max_depth: Option<usize>,
) {
    if let Some(max_steps) = max_steps {
        cfg.max_steps = max_steps.clamp(1, MAX_STEPS_LIMIT);
    }
    if let Some(page_size) = page_size {
        cfg.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    }
    if let Some(max_depth) = max_depth {
        cfg.max_depth = Some(max_depth.max(1));
    }
}
