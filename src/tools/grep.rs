use std::path::Path;

use regex::RegexBuilder;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use super::CapabilityError;
use crate::task::resolve_against;

pub const GREP_MAX_MATCHES: usize = 1000;

fn default_line_numbers() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GrepArgs {
    /// Regular expression to search for.
    pub pattern: String,
    /// File to search.
    pub file: String,
    #[serde(default)]
    pub ignore_case: bool,
    /// Report 1-based line numbers (default true).
    #[serde(default = "default_line_numbers")]
    pub line_numbers: bool,
}

/// Matching lines of one file. No match is an empty list, not an error.
pub fn grep_file(cwd: &Path, args: &GrepArgs, max_bytes: usize) -> Result<Value, CapabilityError> {
    let regex = RegexBuilder::new(&args.pattern)
        .case_insensitive(args.ignore_case)
        .build()
        .map_err(|err| CapabilityError::InvalidArguments {
            capability: "grep",
            message: format!("'pattern' is not a valid regular expression: {err}"),
        })?;

    let resolved = resolve_against(cwd, &args.file);
    if !resolved.is_file() {
        return Err(CapabilityError::InvalidPath(format!(
            "path '{}' is not a readable file",
            args.file
        )));
    }
    let data = std::fs::read(&resolved).map_err(|err| {
        CapabilityError::Io(format!("failed to read file '{}': {err}", resolved.display()))
    })?;
    let text = String::from_utf8_lossy(&data[..data.len().min(max_bytes)]).into_owned();

    let display = resolved.to_string_lossy();
    let matches = text
        .lines()
        .enumerate()
        .filter(|(_, line)| regex.is_match(line))
        .take(GREP_MAX_MATCHES)
        .map(|(index, line)| {
            let mut rendered = json!({ "file": display, "content": line.trim() });
            if args.line_numbers {
                rendered["line_number"] = json!(index + 1);
            }
            rendered
        })
        .collect::<Vec<Value>>();

    Ok(Value::Array(matches))
}
