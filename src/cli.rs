use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// How the enumerator lists directories: `auto` tries one bulk `find` and
/// falls back to manual traversal when it overflows or is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumerationStrategy {
    Auto,
    Bulk,
    Manual,
}

pub fn strategy_label(strategy: EnumerationStrategy) -> &'static str {
    match strategy {
        EnumerationStrategy::Auto => "auto",
        EnumerationStrategy::Bulk => "bulk",
        EnumerationStrategy::Manual => "manual",
    }
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TelemetryCommands {
    #[command(about = "Summarize telemetry events from a JSONL stream")]
    Report {
        #[arg(long)]
        path: Option<String>,
        #[arg(long, default_value_t = 5000)]
        limit: usize,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  fsagent run \"find all markdown files under docs and summarize the largest one\"\n\
  fsagent run --verbose --working-dir ./src \"which files mention CancellationToken?\"\n\
  fsagent run --json --max-steps 8 \"list the config files in this project\"\n\
  fsagent find \"*.rs\" --directory src --recursive --page-size 50\n\
  fsagent find \"*.rs\" --directory src --recursive --page-token <token>\n\
  fsagent --strategy manual find \"*.log\" --directory /var/log --max-depth 2\n\
  fsagent tools\n\
  fsagent --profile work profiles show\n\
  fsagent telemetry report --limit 2000\n\
\n\
Exit codes:\n\
  0 success, 1 fatal error, 2 task finished with failed steps, 130 cancelled.";

#[derive(Debug, Parser)]
#[command(name = "fsagent")]
#[command(about = "LLM-directed file assistant with auditable, paginated tool steps")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "FSAGENT_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "FSAGENT_API_BASE_URL")]
    pub api_base_url: Option<String>,

    #[arg(long, env = "FSAGENT_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    #[arg(long, env = "FSAGENT_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, env = "FSAGENT_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "FSAGENT_CONFIG", default_value = ".fsagent/config.toml")]
    pub config_path: String,

    #[arg(long, env = "FSAGENT_STRATEGY", value_enum, global = true)]
    pub strategy: Option<EnumerationStrategy>,

    #[arg(long, env = "FSAGENT_BULK_OUTPUT_CEILING_BYTES")]
    pub bulk_output_ceiling_bytes: Option<usize>,

    #[arg(long, env = "FSAGENT_FIND_PROGRAM")]
    pub find_program: Option<String>,

    #[arg(long, env = "FSAGENT_MAX_READ_BYTES")]
    pub max_read_bytes: Option<usize>,

    #[arg(long, env = "FSAGENT_SUMMARY_RESULT_CHARS")]
    pub summary_result_chars: Option<usize>,

    #[arg(long, env = "FSAGENT_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "FSAGENT_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "error")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Plan, execute and summarize a free-text file task")]
    Run {
        #[arg(required = true)]
        task: Vec<String>,
        #[arg(long, help = "Include the plan, transcript and step log in the report")]
        verbose: bool,
        #[arg(long, help = "Print the task result as JSON")]
        json: bool,
        #[arg(long)]
        working_dir: Option<String>,
        #[arg(long, env = "FSAGENT_MAX_STEPS")]
        max_steps: Option<usize>,
        #[arg(long, env = "FSAGENT_PAGE_SIZE")]
        page_size: Option<usize>,
        #[arg(long, env = "FSAGENT_MAX_DEPTH")]
        max_depth: Option<usize>,
    },
    #[command(about = "List one page of entries whose name matches a glob pattern")]
    Find {
        pattern: String,
        #[arg(long)]
        directory: Option<String>,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        max_depth: Option<usize>,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        page_token: Option<String>,
        #[arg(long, help = "Print the page as JSON")]
        json: bool,
    },
    #[command(about = "Print the capability descriptions offered to the reasoning service")]
    Tools,
    #[command(about = "Validate credentials, enumeration tooling and configuration")]
    Doctor,
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Telemetry utilities and reporting")]
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Run { .. } => "run".to_string(),
        Commands::Find { .. } => "find".to_string(),
        Commands::Tools => "tools".to_string(),
        Commands::Doctor => "doctor".to_string(),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}
