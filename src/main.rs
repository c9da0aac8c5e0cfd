use anyhow::Result;
use clap::Parser;

use fsagent::cli::{Cli, Commands, ProfileCommands, TelemetryCommands, command_label};
use fsagent::config::{load_profiles, resolve_runtime_config};
use fsagent::doctor::run_doctor;
use fsagent::error::{categorize_error, format_cli_error};
use fsagent::profiles::{run_profiles_list, run_profiles_show};
use fsagent::provider::resolve_delegate;
use fsagent::runner::{
    FindOptions, RunOptions, exit_code_for_error, run_find_command, run_task_command,
    run_tools_command,
};
use fsagent::telemetry::{TelemetrySink, run_telemetry_report};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run_cli(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let category = categorize_error(&err);
            eprintln!("{}", format_cli_error(&err));
            tracing::error!(category = %category.code(), error = %err, "command failed");
            std::process::exit(exit_code_for_error(category));
        }
    }
}

async fn run_cli(cli: Cli) -> Result<i32> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;
    let telemetry = TelemetrySink::new(&cfg, command_label(&cli.command));

    match cli.command {
        Commands::Run {
            task,
            verbose,
            json,
            working_dir,
            max_steps,
            page_size,
            max_depth,
        } => {
            let delegate = resolve_delegate(&cfg)?;
            tracing::info!(delegate = %delegate.name(), "Using reasoning delegate");
            run_task_command(
                delegate,
                cfg,
                telemetry,
                RunOptions {
                    prompt: task.join(" "),
                    verbose,
                    json,
                    working_dir,
                    max_steps,
                    page_size,
                    max_depth,
                },
            )
            .await
        }
        Commands::Find {
            pattern,
            directory,
            recursive,
            max_depth,
            page_size,
            page_token,
            json,
        } => {
            run_find_command(
                &cfg,
                &telemetry,
                FindOptions {
                    pattern,
                    directory,
                    recursive,
                    max_depth,
                    page_size,
                    page_token,
                    json,
                },
            )
            .await
        }
        Commands::Tools => run_tools_command(&cfg),
        Commands::Doctor => {
            run_doctor(&cfg).await?;
            Ok(0)
        }
        Commands::Profiles { command } => {
            match command {
                ProfileCommands::List => run_profiles_list(&profiles, &cfg)?,
                ProfileCommands::Show => run_profiles_show(&cfg)?,
            }
            Ok(0)
        }
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { path, limit } => {
                run_telemetry_report(&cfg, path, limit)?;
                Ok(0)
            }
        },
    }
}

fn init_tracing(log_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
