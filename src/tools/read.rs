use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use super::CapabilityError;
use crate::task::resolve_against;

pub const DEFAULT_MAX_READ_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CatArgs {
    /// File to read in full.
    pub file: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadArgs {
    /// File to read.
    pub file: String,
    /// 1-based inclusive line range such as "10:20". A single number reads one line.
    #[serde(default)]
    pub line_range: Option<String>,
    /// 0-based, end-exclusive character range "start:end" applied after the
    /// line range. A single number reads one character.
    #[serde(default)]
    pub char_range: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanRange {
    pub start: usize,
    pub end: usize,
}

/// Parses "start:end" or "start". A missing or zero end means `start`.
pub fn parse_range(raw: &str, field: &'static str) -> Result<SpanRange, CapabilityError> {
    let invalid = || CapabilityError::InvalidArguments {
        capability: "read",
        message: format!("'{field}' must look like \"start:end\" (got \"{raw}\")"),
    };
    let mut parts = raw.trim().splitn(2, ':');
    let start = parts
        .next()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .ok_or_else(invalid)?
        .parse::<usize>()
        .map_err(|_| invalid())?;
    let end = match parts.next().map(str::trim) {
        None | Some("") => start,
        Some(part) => part.parse::<usize>().map_err(|_| invalid())?,
    };
    let end = if end == 0 { start } else { end };
    if end < start {
        return Err(invalid());
    }
    Ok(SpanRange { start, end })
}

fn resolve_file(cwd: &Path, requested: &str) -> Result<PathBuf, CapabilityError> {
    let resolved = resolve_against(cwd, requested);
    if !resolved.exists() {
        return Err(CapabilityError::InvalidPath(format!(
            "path '{requested}' does not exist"
        )));
    }
    if !resolved.is_file() {
        return Err(CapabilityError::InvalidPath(format!(
            "path '{requested}' is not a regular file"
        )));
    }
    Ok(resolved)
}

fn load_text(path: &Path, max_bytes: usize) -> Result<(String, bool), CapabilityError> {
    let data = std::fs::read(path).map_err(|err| {
        CapabilityError::Io(format!("failed to read file '{}': {err}", path.display()))
    })?;
    let bytes_to_use = data.len().min(max_bytes);
    let truncated = data.len() > bytes_to_use;
    Ok((
        String::from_utf8_lossy(&data[..bytes_to_use]).into_owned(),
        truncated,
    ))
}

pub fn cat_file(cwd: &Path, args: &CatArgs, max_bytes: usize) -> Result<Value, CapabilityError> {
    let resolved = resolve_file(cwd, &args.file)?;
    let (content, truncated) = load_text(&resolved, max_bytes)?;
    let mut payload = json!({
        "path": resolved.to_string_lossy(),
        "content": content,
    });
    if truncated {
        payload["truncated"] = json!(true);
    }
    Ok(payload)
}

pub fn read_file(cwd: &Path, args: &ReadArgs, max_bytes: usize) -> Result<Value, CapabilityError> {
    let line_range = args
        .line_range
        .as_deref()
        .map(|raw| parse_range(raw, "line_range"))
        .transpose()?;
    let char_range = args
        .char_range
        .as_deref()
        .map(|raw| parse_range(raw, "char_range"))
        .transpose()?;

    let resolved = resolve_file(cwd, &args.file)?;
    let (text, truncated) = load_text(&resolved, max_bytes)?;
    let total_lines = text.lines().count();
    let total_chars = text.chars().count();

    let mut content = match line_range {
        Some(range) => {
            let start = range.start.saturating_sub(1);
            let take = range.end.saturating_sub(start);
            text.lines().skip(start).take(take).collect::<Vec<&str>>().join("\n")
        }
        None => text,
    };
    if let Some(range) = char_range {
        content = content
            .chars()
            .skip(range.start)
            .take((range.end - range.start).max(1))
            .collect();
    }

    let mut payload = json!({
        "path": resolved.to_string_lossy(),
        "content": content,
        "metadata": {
            "line_range": args.line_range,
            "char_range": args.char_range,
            "total_lines": total_lines,
            "total_chars": total_chars,
        }
    });
    if truncated {
        payload["truncated"] = json!(true);
    }
    Ok(payload)
}
