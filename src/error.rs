use crate::delegate::DelegateError;
use crate::orchestrator::OrchestratorError;
use crate::tools::CapabilityError;
use crate::tools::find::EnumerationError;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_PARTIAL: i32 = 2;
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Delegate,
    Cancelled,
    Config,
    Enumeration,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Delegate => "DELEGATE",
            ErrorCategory::Cancelled => "CANCELLED",
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Enumeration => "ENUMERATION",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Delegate => {
                "Check ANTHROPIC_API_KEY, --model and --api-base-url, then run fsagent doctor."
            }
            ErrorCategory::Cancelled => {
                "The task was cancelled; steps already taken are not rolled back."
            }
            ErrorCategory::Config => {
                "Check --config-path and the [profiles.<name>] tables; run fsagent profiles list."
            }
            ErrorCategory::Enumeration => {
                "Check that the directory exists and is readable, or retry with --strategy manual."
            }
            ErrorCategory::Input => "Run fsagent --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Cancelled => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    for cause in err.chain() {
        if let Some(orchestrator) = cause.downcast_ref::<OrchestratorError>() {
            return match orchestrator {
                OrchestratorError::Cancelled { .. } => ErrorCategory::Cancelled,
                OrchestratorError::FatalDelegate { .. } => ErrorCategory::Delegate,
                OrchestratorError::WorkingDirectory { .. } => ErrorCategory::Input,
            };
        }
        if let Some(delegate) = cause.downcast_ref::<DelegateError>() {
            return match delegate {
                DelegateError::Cancelled => ErrorCategory::Cancelled,
                _ => ErrorCategory::Delegate,
            };
        }
        if let Some(enumeration) = cause.downcast_ref::<EnumerationError>() {
            return match enumeration {
                EnumerationError::Cancelled => ErrorCategory::Cancelled,
                EnumerationError::InvalidPattern { .. } => ErrorCategory::Input,
                _ => ErrorCategory::Enumeration,
            };
        }
        if let Some(capability) = cause.downcast_ref::<CapabilityError>() {
            return match capability {
                CapabilityError::Cancelled => ErrorCategory::Cancelled,
                CapabilityError::Enumeration(_) => ErrorCategory::Enumeration,
                _ => ErrorCategory::Input,
            };
        }
    }

    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("api_key") || msg.contains("anthropic") || msg.contains("model '") {
        return ErrorCategory::Delegate;
    }

    if msg.contains("profile") || msg.contains("config") || msg.contains(".toml") {
        return ErrorCategory::Config;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("page token")
        || msg.contains("working directory")
    {
        return ErrorCategory::Input;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        render_error_message(err),
        category.hint()
    )
}

pub fn render_error_message(err: &anyhow::Error) -> String {
    redact_api_keys(&format!("{err:#}"))
}

/// Masks anything that looks like an Anthropic API key (`sk-ant-...`).
pub fn redact_api_keys(text: &str) -> String {
    const KEY_PREFIX: &str = "sk-ant-";
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    while let Some(offset) = text[cursor..].find(KEY_PREFIX) {
        let start = cursor + offset;
        out.push_str(&text[cursor..start]);

        let remainder = &text[start..];
        let end = remainder
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
            .unwrap_or(remainder.len());
        out.push_str("sk-ant-[REDACTED]");
        cursor = start + end;
    }

    out.push_str(&text[cursor..]);
    out
}
