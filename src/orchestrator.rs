//! Plan, execute and summarize one task against a reasoning delegate.
//!
//! The orchestrator is the capability host during the execute phase: every
//! call the delegate makes goes through [`StepRecorder`], which owns the step
//! log and the working-directory cursor for the run.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::delegate::{
    CapabilityHost, DelegateError, DelegateReply, DelegateRequest, Message, ReasoningDelegate,
};
use crate::task::{
    StepLog, StepOutcome, Task, TaskDetails, TaskResult, WorkingDirectoryCursor,
    resolve_working_directory, truncate_text,
};
use crate::telemetry::TelemetrySink;
use crate::tools::{
    Capability, CapabilityDescriptor, CapabilityError, CapabilityRegistry, ToolSettings,
};

pub const DEFAULT_MAX_STEPS: usize = 15;
pub const DEFAULT_SUMMARY_RESULT_CHARS: usize = 500;

const SYSTEM_INSTRUCTION: &str = "You are a careful file system assistant. You help with finding, \
listing, reading and searching files. Relative paths are resolved against the current working \
directory, which only changes through the cd tool. File searches are paginated: when a find \
result carries next_page_token, pass it back as page_token to see further results. Report what \
you actually observed; if a tool call fails, say so and continue with what you can do.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Planning,
    Executing,
    Summarizing,
    Done,
    Cancelled,
}

impl RunPhase {
    pub fn label(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Planning => "planning",
            RunPhase::Executing => "executing",
            RunPhase::Summarizing => "summarizing",
            RunPhase::Done => "done",
            RunPhase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("reasoning delegate failed during {phase}: {source}")]
    FatalDelegate {
        phase: RunPhase,
        #[source]
        source: DelegateError,
    },
    #[error("task cancelled during {phase}")]
    Cancelled { phase: RunPhase },
    #[error("working directory '{path}' is not usable: {message}")]
    WorkingDirectory { path: String, message: String },
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_steps: usize,
    pub summary_result_chars: usize,
    pub tools: ToolSettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            summary_result_chars: DEFAULT_SUMMARY_RESULT_CHARS,
            tools: ToolSettings::default(),
        }
    }
}

pub struct Orchestrator {
    delegate: Arc<dyn ReasoningDelegate>,
    config: OrchestratorConfig,
    telemetry: TelemetrySink,
}

/// Mutable state of one run. Owned by `Orchestrator::run`, never shared.
struct TaskRun {
    phase: RunPhase,
    cursor: WorkingDirectoryCursor,
    steps: StepLog,
    cancel: CancellationToken,
}

impl TaskRun {
    fn enter(&mut self, phase: RunPhase, telemetry: &TelemetrySink) {
        tracing::info!(from = %self.phase, to = %phase, "task phase transition");
        self.phase = phase;
        if !matches!(phase, RunPhase::Done | RunPhase::Cancelled) {
            telemetry.emit("phase.started", json!({ "phase": phase.label() }));
        }
    }
}

impl Orchestrator {
    pub fn new(
        delegate: Arc<dyn ReasoningDelegate>,
        config: OrchestratorConfig,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            delegate,
            config,
            telemetry,
        }
    }

    pub async fn run(&self, task: Task) -> Result<TaskResult, OrchestratorError> {
        let working_directory = resolve_working_directory(&task.working_directory).map_err(|err| {
            OrchestratorError::WorkingDirectory {
                path: task.working_directory.display().to_string(),
                message: err.to_string(),
            }
        })?;
        if !working_directory.is_dir() {
            return Err(OrchestratorError::WorkingDirectory {
                path: working_directory.display().to_string(),
                message: "not a directory".to_string(),
            });
        }

        let mut run = TaskRun {
            phase: RunPhase::Idle,
            cursor: WorkingDirectoryCursor::new(working_directory),
            steps: StepLog::default(),
            cancel: task.cancel.clone(),
        };
        self.telemetry.emit(
            "task.started",
            json!({
                "working_directory": run.cursor.current().to_string_lossy(),
                "delegate": self.delegate.name(),
                "max_steps": self.config.max_steps,
            }),
        );

        let outcome = self.drive(&task, &mut run).await;
        match &outcome {
            Ok(result) => {
                run.enter(RunPhase::Done, &self.telemetry);
                self.telemetry.emit(
                    "task.completed",
                    json!({
                        "success": result.success,
                        "steps": result.steps,
                        "errors": result.errors,
                        "working_directory": result.working_directory,
                    }),
                );
            }
            Err(OrchestratorError::Cancelled { phase }) => {
                run.enter(RunPhase::Cancelled, &self.telemetry);
                self.telemetry.emit(
                    "task.cancelled",
                    json!({ "phase": phase.label(), "steps": run.steps.len() }),
                );
            }
            Err(err) => {
                tracing::error!(error = %err, phase = %run.phase, "task failed");
                self.telemetry.emit(
                    "task.failed",
                    json!({ "phase": run.phase.label(), "error": err.to_string() }),
                );
            }
        }
        outcome
    }

    async fn drive(&self, task: &Task, run: &mut TaskRun) -> Result<TaskResult, OrchestratorError> {
        let registry = CapabilityRegistry::new(
            self.config
                .tools
                .clone()
                .with_enumeration(task.enumeration),
        );

        run.enter(RunPhase::Planning, &self.telemetry);
        let plan = self.plan(task, run).await?;

        run.enter(RunPhase::Executing, &self.telemetry);
        let execution = self.execute(task, run, &registry, &plan.text).await?;

        run.enter(RunPhase::Summarizing, &self.telemetry);
        let summary = self.summarize(task, run).await?;

        let steps = run.steps.len();
        let errors = run.steps.error_count();
        let details = task.verbose.then(|| TaskDetails {
            plan: plan.text.clone(),
            transcript: [
                plan.transcript.as_str(),
                execution.transcript.as_str(),
                summary.transcript.as_str(),
            ]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<&str>>()
            .join("\n"),
            step_log: run.steps.steps().to_vec(),
        });

        Ok(TaskResult {
            success: errors == 0,
            working_directory: run.cursor.current().to_string_lossy().into_owned(),
            steps,
            errors,
            summary: summary.text,
            details,
        })
    }

    fn request(&self, run: &TaskRun, prompt: String, max_calls: usize) -> DelegateRequest {
        DelegateRequest {
            system: SYSTEM_INSTRUCTION.to_string(),
            messages: vec![Message::user(prompt)],
            max_calls,
            cancel: run.cancel.clone(),
        }
    }

    fn phase_error(&self, run: &TaskRun, err: DelegateError) -> OrchestratorError {
        if matches!(err, DelegateError::Cancelled) || run.cancel.is_cancelled() {
            OrchestratorError::Cancelled { phase: run.phase }
        } else {
            OrchestratorError::FatalDelegate {
                phase: run.phase,
                source: err,
            }
        }
    }

    fn ensure_not_cancelled(&self, run: &TaskRun) -> Result<(), OrchestratorError> {
        if run.cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled { phase: run.phase });
        }
        Ok(())
    }

    async fn plan(
        &self,
        task: &Task,
        run: &mut TaskRun,
    ) -> Result<DelegateReply, OrchestratorError> {
        self.ensure_not_cancelled(run)?;
        let prompt = format!(
            "Plan this file task: {}\n\nWorking directory: {}\n\n\
             Reply with a short numbered plan of the steps you would take. \
             Do not perform any of them yet.",
            task.prompt,
            run.cursor.current().display()
        );
        let request = self.request(run, prompt, 0);
        self.delegate
            .generate(request, None)
            .await
            .map_err(|err| self.phase_error(run, err))
    }

    async fn execute(
        &self,
        task: &Task,
        run: &mut TaskRun,
        registry: &CapabilityRegistry,
        plan: &str,
    ) -> Result<DelegateReply, OrchestratorError> {
        self.ensure_not_cancelled(run)?;
        let prompt = format!(
            "Execute this file task step by step using the available tools.\n\n\
             Task: {}\n\nWorking directory: {}\n\nPlan:\n{}\n\n\
             Use cd to change directories. Relative paths resolve against the current \
             working directory.",
            task.prompt,
            run.cursor.current().display(),
            plan
        );
        let request = self.request(run, prompt, self.config.max_steps);

        let mut recorder = StepRecorder {
            registry,
            steps: &mut run.steps,
            cursor: &mut run.cursor,
            cancel: &run.cancel,
            telemetry: &self.telemetry,
            budget: self.config.max_steps,
            calls: 0,
        };
        let reply = self.delegate.generate(request, Some(&mut recorder)).await;

        match reply {
            Ok(reply) if !run.cancel.is_cancelled() => Ok(reply),
            Ok(_) => Err(OrchestratorError::Cancelled { phase: run.phase }),
            Err(err) => Err(self.phase_error(run, err)),
        }
    }

    async fn summarize(
        &self,
        task: &Task,
        run: &mut TaskRun,
    ) -> Result<DelegateReply, OrchestratorError> {
        self.ensure_not_cancelled(run)?;
        let prompt = format!(
            "Summarize the results of this file task.\n\n\
             Original task: {}\n\nFinal working directory: {}\n\n\
             Steps taken:\n{}\n\n\
             Write a clear, concise report with these sections: Overview, Key Findings, \
             Next Steps, Final Directory.",
            task.prompt,
            run.cursor.current().display(),
            run.steps.render_compact(self.config.summary_result_chars)
        );
        let request = self.request(run, prompt, 0);
        self.delegate
            .generate(request, None)
            .await
            .map_err(|err| self.phase_error(run, err))
    }
}

/// Capability host for the execute phase. Records each completed call as a
/// step and moves the cursor on successful `cd`.
struct StepRecorder<'a> {
    registry: &'a CapabilityRegistry,
    steps: &'a mut StepLog,
    cursor: &'a mut WorkingDirectoryCursor,
    cancel: &'a CancellationToken,
    telemetry: &'a TelemetrySink,
    budget: usize,
    calls: usize,
}

#[async_trait]
impl<'a> CapabilityHost for StepRecorder<'a> {
    fn capabilities(&self) -> Vec<CapabilityDescriptor> {
        self.registry.descriptors()
    }

    async fn invoke(&mut self, name: &str, arguments: Value) -> Result<Value, CapabilityError> {
        if self.cancel.is_cancelled() {
            return Err(CapabilityError::Cancelled);
        }
        if self.calls >= self.budget {
            tracing::warn!(
                capability = name,
                budget = self.budget,
                "refusing call beyond step budget"
            );
            return Err(CapabilityError::BudgetExhausted(self.budget));
        }
        self.calls += 1;

        self.telemetry.emit(
            "tool.requested",
            json!({ "capability": name, "call": self.calls }),
        );
        tracing::debug!(
            capability = name,
            arguments = %arguments,
            cwd = %self.cursor.current().display(),
            "invoking capability"
        );

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CapabilityError::Cancelled),
            outcome = self
                .registry
                .invoke(name, &arguments, self.cursor.current(), self.cancel) => outcome,
        };

        if let Err(err) = &outcome {
            if err.is_cancellation() {
                tracing::debug!(capability = name, "abandoning in-flight capability call");
                return outcome;
            }
        }

        if outcome.is_ok() && Capability::from_name(name) == Some(Capability::Cd) {
            if let Some(target) = arguments.get("path").and_then(Value::as_str) {
                let moved = self.cursor.change_to(target);
                tracing::info!(working_directory = %moved.display(), "working directory changed");
            }
        }

        let step_outcome = match &outcome {
            Ok(result) => {
                self.telemetry.emit("tool.succeeded", json!({ "capability": name }));
                StepOutcome::Success {
                    result: result.clone(),
                }
            }
            Err(err) => {
                tracing::warn!(
                    capability = name,
                    code = err.code(),
                    error = %err,
                    "capability call failed"
                );
                self.telemetry.emit(
                    "tool.failed",
                    json!({ "capability": name, "code": err.code() }),
                );
                StepOutcome::Failure {
                    code: err.code().to_string(),
                    error: truncate_text(&err.to_string(), 2000).0,
                }
            }
        };
        self.steps.record(name.trim(), arguments, step_outcome);

        outcome
    }
}
