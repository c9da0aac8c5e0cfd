use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::tools::find::DEFAULT_PAGE_SIZE;

/// Enumeration tuning forwarded to the `find` capability when the delegate
/// does not pass its own values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnumerationTuning {
    pub page_size: usize,
    pub max_depth: Option<usize>,
}

impl Default for EnumerationTuning {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub prompt: String,
    pub working_directory: PathBuf,
    pub verbose: bool,
    pub cancel: CancellationToken,
    pub enumeration: EnumerationTuning,
}

impl Task {
    pub fn new(prompt: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            working_directory: working_directory.into(),
            verbose: false,
            cancel: CancellationToken::new(),
            enumeration: EnumerationTuning::default(),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_enumeration(mut self, enumeration: EnumerationTuning) -> Self {
        self.enumeration = enumeration;
        self
    }
}

/// Lexically normalizes `path`, folding `.` and `..` without touching the
/// filesystem. `..` never climbs above the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() && !path.is_absolute() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

/// Resolves `path` to an absolute, normalized path using the process
/// current directory for relative inputs.
pub fn resolve_working_directory(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize_path(&absolute))
}

/// Resolves `target` against `base`: absolute targets are used as-is,
/// relative ones are joined onto `base`.
pub fn resolve_against(base: &Path, target: &str) -> PathBuf {
    let target = Path::new(target.trim());
    if target.is_absolute() {
        normalize_path(target)
    } else {
        normalize_path(&base.join(target))
    }
}

#[derive(Debug, Clone)]
pub struct WorkingDirectoryCursor {
    current: PathBuf,
}

impl WorkingDirectoryCursor {
    pub fn new(initial: PathBuf) -> Self {
        Self { current: initial }
    }

    pub fn current(&self) -> &Path {
        &self.current
    }

    pub fn resolve(&self, target: &str) -> PathBuf {
        resolve_against(&self.current, target)
    }

    pub fn change_to(&mut self, target: &str) -> &Path {
        self.current = self.resolve(target);
        &self.current
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Success { result: Value },
    Failure { code: String, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStep {
    pub index: usize,
    pub capability: String,
    pub arguments: Value,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionStep {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failure { .. })
    }
}

/// Append-only record of the capability calls observed during one run.
#[derive(Debug, Default, Clone)]
pub struct StepLog {
    steps: Vec<ExecutionStep>,
}

impl StepLog {
    pub fn record(
        &mut self,
        capability: impl Into<String>,
        arguments: Value,
        outcome: StepOutcome,
    ) -> &ExecutionStep {
        let index = self.steps.len() + 1;
        self.steps.push(ExecutionStep {
            index,
            capability: capability.into(),
            arguments,
            outcome,
            timestamp: Utc::now(),
        });
        &self.steps[index - 1]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.steps.iter().filter(|step| step.is_error()).count()
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    /// One line per step: index, capability, arguments and the truncated
    /// result or error.
    pub fn render_compact(&self, max_chars: usize) -> String {
        if self.steps.is_empty() {
            return "(no tool calls were made)".to_string();
        }

        self.steps
            .iter()
            .map(|step| {
                let (arguments, _) = truncate_text(&step.arguments.to_string(), max_chars);
                match &step.outcome {
                    StepOutcome::Success { result } => {
                        let (rendered, truncated) = truncate_text(&result.to_string(), max_chars);
                        let marker = if truncated { " …" } else { "" };
                        format!(
                            "{}. {} {} -> ok: {}{}",
                            step.index, step.capability, arguments, rendered, marker
                        )
                    }
                    StepOutcome::Failure { code, error } => {
                        let (rendered, _) = truncate_text(error, max_chars);
                        format!(
                            "{}. {} {} -> error [{}]: {}",
                            step.index, step.capability, arguments, code, rendered
                        )
                    }
                }
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

pub fn truncate_text(text: &str, max_chars: usize) -> (String, bool) {
    let mut iter = text.chars();
    let truncated = iter.by_ref().take(max_chars).collect::<String>();
    if iter.next().is_some() {
        (truncated, true)
    } else {
        (text.to_string(), false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    pub plan: String,
    pub transcript: String,
    pub step_log: Vec<ExecutionStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub success: bool,
    pub working_directory: String,
    pub steps: usize,
    pub errors: usize,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<TaskDetails>,
}
