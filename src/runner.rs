use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::{RuntimeConfig, apply_run_overrides};
use crate::delegate::ReasoningDelegate;
use crate::error::{EXIT_PARTIAL, ErrorCategory};
use crate::orchestrator::Orchestrator;
use crate::task::{Task, TaskResult, resolve_against};
use crate::telemetry::TelemetrySink;
use crate::theme::{render_enumeration_page, render_task_result, stdout_supports_color};
use crate::tools::CapabilityRegistry;
use crate::tools::find::{EnumerationRequest, EnumerationResult, Enumerator};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub prompt: String,
    pub verbose: bool,
    pub json: bool,
    pub working_dir: Option<String>,
    pub max_steps: Option<usize>,
    pub page_size: Option<usize>,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct FindOptions {
    pub pattern: String,
    pub directory: Option<String>,
    pub recursive: bool,
    pub max_depth: Option<usize>,
    pub page_size: Option<usize>,
    pub page_token: Option<String>,
    pub json: bool,
}

/// Cancels `token` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling");
            token.cancel();
        }
    });
}

pub fn exit_code_for(result: &TaskResult) -> i32 {
    if result.success { 0 } else { EXIT_PARTIAL }
}

pub fn base_directory(requested: Option<&str>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to resolve the current directory")?;
    Ok(match requested {
        Some(path) => resolve_against(&cwd, path),
        None => cwd,
    })
}

pub async fn run_task_with_delegate(
    delegate: Arc<dyn ReasoningDelegate>,
    cfg: &RuntimeConfig,
    telemetry: TelemetrySink,
    task: Task,
) -> Result<TaskResult> {
    let orchestrator = Orchestrator::new(delegate, cfg.orchestrator_config(), telemetry);
    orchestrator.run(task).await.map_err(anyhow::Error::from)
}

/// `fsagent run`: returns the process exit code.
pub async fn run_task_command(
    delegate: Arc<dyn ReasoningDelegate>,
    mut cfg: RuntimeConfig,
    telemetry: TelemetrySink,
    options: RunOptions,
) -> Result<i32> {
    apply_run_overrides(&mut cfg, options.max_steps, options.page_size, options.max_depth);
    let working_directory = base_directory(options.working_dir.as_deref())?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let task = Task::new(options.prompt, working_directory)
        .with_verbose(options.verbose)
        .with_cancellation(cancel)
        .with_enumeration(cfg.enumeration_tuning());

    tracing::info!(
        model = %cfg.model,
        max_steps = cfg.max_steps,
        working_directory = %task.working_directory.display(),
        "starting task"
    );
    let result = run_task_with_delegate(delegate, &cfg, telemetry, task).await?;

    if options.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("failed to encode task result")?
        );
    } else {
        print!("{}", render_task_result(&result, stdout_supports_color()));
    }
    Ok(exit_code_for(&result))
}

pub async fn run_find(
    cfg: &RuntimeConfig,
    options: &FindOptions,
    cancel: &CancellationToken,
) -> Result<EnumerationResult> {
    let cwd = base_directory(None)?;
    let request = EnumerationRequest {
        pattern: options.pattern.clone(),
        directory: resolve_against(&cwd, options.directory.as_deref().unwrap_or(".")),
        recursive: options.recursive,
        max_depth: options.max_depth.or(if options.recursive { cfg.max_depth } else { None }),
        page_size: options.page_size.unwrap_or(cfg.page_size),
        page_token: options.page_token.clone(),
    };
    let enumerator = Enumerator::new(cfg.enumerator_config());
    enumerator
        .enumerate(&request, cancel)
        .await
        .map_err(anyhow::Error::from)
}

/// `fsagent find`: one page of the paginated enumerator, without a delegate.
pub async fn run_find_command(
    cfg: &RuntimeConfig,
    telemetry: &TelemetrySink,
    options: FindOptions,
) -> Result<i32> {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let page = match run_find(cfg, &options, &cancel).await {
        Ok(page) => page,
        Err(err) => {
            telemetry.emit("find.failed", json!({ "error": err.to_string() }));
            return Err(err);
        }
    };
    telemetry.emit(
        "find.completed",
        json!({
            "returned": page.paths.len(),
            "total_matched": page.total_matched,
            "strategy": page.strategy,
            "has_more": page.next_page_token.is_some(),
        }),
    );

    if options.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&page).context("failed to encode enumeration result")?
        );
    } else {
        print!("{}", render_enumeration_page(&page, stdout_supports_color()));
    }
    Ok(0)
}

/// `fsagent tools`: capability descriptions as JSON.
pub fn run_tools_command(cfg: &RuntimeConfig) -> Result<i32> {
    let registry = CapabilityRegistry::new(cfg.tool_settings());
    println!(
        "{}",
        serde_json::to_string_pretty(&registry.descriptors())
            .context("failed to encode capability descriptions")?
    );
    Ok(0)
}

pub fn exit_code_for_error(category: ErrorCategory) -> i32 {
    category.exit_code()
}
