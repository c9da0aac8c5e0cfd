use anyhow::Result;

use crate::cli::strategy_label;
use crate::config::{ProfilesFile, RuntimeConfig};

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();

    println!("Configured profiles (active='{}'):", cfg.profile);
    for name in names {
        let marker = if name == cfg.profile { "*" } else { " " };
        let source = if profiles.profiles.contains_key(&name) {
            "configured"
        } else {
            "implicit"
        };
        println!("{marker} {name} ({source})");
    }

    Ok(())
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path);
    println!("Model: {}", cfg.model);
    println!("API base URL: {}", cfg.api_base_url);
    println!("Max tokens: {}", cfg.max_tokens);
    println!("Request timeout (secs): {}", cfg.request_timeout_secs);
    println!("Max steps: {}", cfg.max_steps);
    println!("Page size: {}", cfg.page_size);
    println!(
        "Max depth: {}",
        cfg.max_depth
            .map(|depth| depth.to_string())
            .unwrap_or_else(|| "<unbounded when recursive>".to_string())
    );
    println!(
        "Enumeration strategy: {}",
        strategy_label(cfg.enumeration_strategy)
    );
    println!(
        "Bulk output ceiling (bytes): {}",
        cfg.bulk_output_ceiling_bytes
    );
    println!("Find program: {}", cfg.find_program);
    println!("Max read bytes: {}", cfg.max_read_bytes);
    println!("Summary result chars: {}", cfg.summary_result_chars);
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    Ok(())
}
