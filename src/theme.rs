/// Terminal rendering for task reports and enumeration pages.
///
/// Color is applied only when stdout is a terminal; piped output stays plain.
use std::io::IsTerminal;

use crate::task::{StepOutcome, TaskResult};
use crate::tools::find::EnumerationResult;

// ---------------------------------------------------------------------------
// ANSI color helpers
// ---------------------------------------------------------------------------

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const CYAN: &str = "\x1b[36m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RED: &str = "\x1b[31m";
pub const BOLD_CYAN: &str = "\x1b[1;36m";
pub const BOLD_GREEN: &str = "\x1b[1;32m";
pub const BOLD_YELLOW: &str = "\x1b[1;33m";

pub fn stdout_supports_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn paint(text: &str, style: &str, color: bool) -> String {
    if color {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Strip ANSI escape sequences for visible length calculation.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Task report
// ---------------------------------------------------------------------------

pub fn render_task_result(result: &TaskResult, color: bool) -> String {
    let mut out = String::new();

    let status = if result.success {
        paint("✓ completed", BOLD_GREEN, color)
    } else {
        paint("⚠ completed with errors", BOLD_YELLOW, color)
    };
    out.push_str(&format!(
        "{status} {}\n",
        paint(
            &format!("(steps={}, errors={})", result.steps, result.errors),
            DIM,
            color
        )
    ));
    out.push_str(&format!(
        "{} {}\n\n",
        paint("Working directory:", BOLD, color),
        result.working_directory
    ));
    out.push_str(result.summary.trim());
    out.push('\n');

    if let Some(details) = &result.details {
        out.push_str(&format!("\n{}\n", paint("Plan", BOLD_CYAN, color)));
        out.push_str(details.plan.trim());
        out.push('\n');

        out.push_str(&format!("\n{}\n", paint("Steps", BOLD_CYAN, color)));
        if details.step_log.is_empty() {
            out.push_str(&paint("  (no tool calls)", DIM, color));
            out.push('\n');
        }
        for step in &details.step_log {
            let marker = match &step.outcome {
                StepOutcome::Success { .. } => paint("ok ", GREEN, color),
                StepOutcome::Failure { code, .. } => paint(&format!("err[{code}]"), RED, color),
            };
            out.push_str(&format!(
                "  {:>2}. {} {} {}\n",
                step.index,
                paint(&step.capability, CYAN, color),
                paint(&step.arguments.to_string(), DIM, color),
                marker
            ));
            if let StepOutcome::Failure { error, .. } = &step.outcome {
                out.push_str(&format!("      {}\n", paint(error, YELLOW, color)));
            }
        }

        if !details.transcript.is_empty() {
            out.push_str(&format!("\n{}\n", paint("Transcript", BOLD_CYAN, color)));
            out.push_str(details.transcript.trim());
            out.push('\n');
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Enumeration page
// ---------------------------------------------------------------------------

pub fn render_enumeration_page(page: &EnumerationResult, color: bool) -> String {
    let mut out = String::new();
    for path in &page.paths {
        out.push_str(&path.to_string_lossy());
        out.push('\n');
    }
    for warning in &page.warnings {
        out.push_str(&paint(&format!("warning: {warning}"), YELLOW, color));
        out.push('\n');
    }

    let footer = format!(
        "{} of {} matches shown (strategy={})",
        page.paths.len(),
        page.total_matched,
        match page.strategy {
            crate::tools::find::ServedBy::Bulk => "bulk",
            crate::tools::find::ServedBy::Manual => "manual",
        }
    );
    out.push_str(&paint(&footer, DIM, color));
    out.push('\n');
    if let Some(token) = &page.next_page_token {
        out.push_str(&format!(
            "{} {}\n",
            paint("next page:", BOLD, color),
            token
        ));
    }
    out
}
