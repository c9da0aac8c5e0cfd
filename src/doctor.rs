use std::process::Stdio;
use std::time::Duration;

use anyhow::Result;

use crate::cli::strategy_label;
use crate::config::RuntimeConfig;
use crate::provider::{API_KEY_ENV, env_present, validate_model_name};

const FIND_PROBE_TIMEOUT_SECS: u64 = 5;

/// Runs `<find> -H . -maxdepth 0` to confirm the bulk strategy can launch.
pub async fn probe_find_program(program: &str) -> std::result::Result<(), String> {
    let probe = tokio::process::Command::new(program)
        .arg("-H")
        .arg(".")
        .arg("-maxdepth")
        .arg("0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(Duration::from_secs(FIND_PROBE_TIMEOUT_SECS), probe).await {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => Err(format!("exited with {status}")),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err(format!("timed out after {FIND_PROBE_TIMEOUT_SECS}s")),
    }
}

pub async fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );

    let key_status = if env_present(API_KEY_ENV) { "set" } else { "missing" };
    println!("Credential check:");
    println!("- {API_KEY_ENV}: {key_status}");
    if !env_present(API_KEY_ENV) {
        println!("Tip: export {API_KEY_ENV} before using `fsagent run`");
    }

    match validate_model_name(&cfg.model) {
        Ok(()) => println!("Model: {} (ok)", cfg.model),
        Err(err) => println!("Model: {} ({err})", cfg.model),
    }
    println!(
        "Reasoning service: base_url={} max_tokens={} timeout_secs={}",
        cfg.api_base_url, cfg.max_tokens, cfg.request_timeout_secs
    );

    println!(
        "Enumeration: strategy={} page_size={} max_depth={} bulk_ceiling_bytes={}",
        strategy_label(cfg.enumeration_strategy),
        cfg.page_size,
        cfg.max_depth
            .map(|depth| depth.to_string())
            .unwrap_or_else(|| "<unbounded>".to_string()),
        cfg.bulk_output_ceiling_bytes
    );
    match probe_find_program(&cfg.find_program).await {
        Ok(()) => println!("Bulk listing program '{}': ok", cfg.find_program),
        Err(reason) => {
            println!(
                "Bulk listing program '{}': unavailable ({reason})",
                cfg.find_program
            );
            println!(
                "Tip: enumeration falls back to manual traversal; \
                 use --strategy manual to skip the probe"
            );
        }
    }

    println!(
        "Execution: max_steps={} max_read_bytes={} summary_result_chars={}",
        cfg.max_steps, cfg.max_read_bytes, cfg.summary_result_chars
    );
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );

    Ok(())
}
