use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use super::CapabilityError;
use crate::task::resolve_against;

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct LsArgs {
    /// Directory to list. Defaults to the current working directory.
    #[serde(default)]
    pub path: Option<String>,
    /// Include entries whose name starts with a dot.
    #[serde(default)]
    pub all: bool,
    /// Include size and last-modified time for each entry.
    #[serde(default)]
    pub long: bool,
}

fn entry_kind(file_type: std::fs::FileType) -> &'static str {
    if file_type.is_dir() {
        "directory"
    } else if file_type.is_file() {
        "file"
    } else if file_type.is_symlink() {
        "symlink"
    } else {
        "other"
    }
}

pub fn list_directory(cwd: &Path, args: &LsArgs) -> Result<Value, CapabilityError> {
    let requested = args.path.as_deref().unwrap_or(".");
    let resolved = resolve_against(cwd, requested);
    if !resolved.is_dir() {
        return Err(CapabilityError::InvalidPath(format!(
            "'{requested}' is not a directory"
        )));
    }

    let mut entries = std::fs::read_dir(&resolved)
        .map_err(|err| {
            CapabilityError::Io(format!(
                "failed to read directory '{}': {err}",
                resolved.display()
            ))
        })?
        .filter_map(|entry| entry.ok())
        .filter(|entry| args.all || !entry.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|entry| {
            let file_type = entry.file_type().ok()?;
            let name = entry.file_name().to_string_lossy().to_string();
            let mut rendered = json!({
                "name": name,
                "path": entry.path().to_string_lossy(),
                "type": entry_kind(file_type),
            });
            if args.long {
                if let Ok(metadata) = entry.metadata() {
                    if file_type.is_file() {
                        rendered["size"] = json!(metadata.len());
                    }
                    if let Ok(modified) = metadata.modified() {
                        rendered["modified"] = json!(
                            DateTime::<Utc>::from(modified)
                                .to_rfc3339_opts(SecondsFormat::Secs, true)
                        );
                    }
                }
            }
            Some((name, rendered))
        })
        .collect::<Vec<(String, Value)>>();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(Value::Array(
        entries.into_iter().map(|(_, rendered)| rendered).collect(),
    ))
}
