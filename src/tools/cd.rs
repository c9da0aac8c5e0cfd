use std::path::Path;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use super::CapabilityError;
use crate::task::resolve_against;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CdArgs {
    /// Target directory, absolute or relative to the current working directory.
    pub path: String,
}

/// Validates the target only. The caller owns the working-directory cursor
/// and moves it after observing a successful result.
pub fn change_directory(cwd: &Path, args: &CdArgs) -> Result<Value, CapabilityError> {
    if args.path.trim().is_empty() {
        return Err(CapabilityError::InvalidArguments {
            capability: "cd",
            message: "'path' must not be empty".to_string(),
        });
    }

    let target = resolve_against(cwd, &args.path);
    match std::fs::metadata(&target) {
        Ok(metadata) if metadata.is_dir() => Ok(json!({
            "working_directory": target.to_string_lossy(),
        })),
        Ok(_) => Err(CapabilityError::InvalidPath(format!(
            "'{}' is not a directory",
            args.path
        ))),
        Err(err) => Err(CapabilityError::InvalidPath(format!(
            "cannot change to '{}': {err}",
            args.path
        ))),
    }
}
