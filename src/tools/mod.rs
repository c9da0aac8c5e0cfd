pub mod cd;
pub mod find;
pub mod grep;
pub mod ls;
pub mod read;

use std::path::Path;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::task::{EnumerationTuning, resolve_against};
use cd::CdArgs;
use find::{EnumerationError, EnumerationRequest, Enumerator, EnumeratorConfig, MAX_PAGE_SIZE};
use grep::GrepArgs;
use ls::LsArgs;
use read::{CatArgs, DEFAULT_MAX_READ_BYTES, ReadArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Find,
    Ls,
    Cat,
    Read,
    Grep,
    Cd,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Find,
        Capability::Ls,
        Capability::Cat,
        Capability::Read,
        Capability::Grep,
        Capability::Cd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::Find => "find",
            Capability::Ls => "ls",
            Capability::Cat => "cat",
            Capability::Read => "read",
            Capability::Grep => "grep",
            Capability::Cd => "cd",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.name() == name.trim())
    }

    pub fn description(self) -> &'static str {
        match self {
            Capability::Find => {
                "Finds files and directories whose name matches a glob pattern (* and ?). \
                 Results are paginated: pass next_page_token back as page_token to continue. \
                 Set recursive=true to search subdirectories; max_depth bounds the depth."
            }
            Capability::Ls => {
                "Lists the entries of a directory. all=true includes hidden entries, \
                 long=true adds size and modification time."
            }
            Capability::Cat => "Reads the whole content of a file.",
            Capability::Read => {
                "Reads part of a file. line_range selects 1-based lines (\"start:end\"), \
                 char_range then selects characters. Returns total line and character counts."
            }
            Capability::Grep => {
                "Searches a file for lines matching a regular expression. \
                 Returns an empty list when nothing matches."
            }
            Capability::Cd => {
                "Changes the working directory used to resolve relative paths in later calls."
            }
        }
    }

    pub fn argument_schema(self) -> Value {
        match self {
            Capability::Find => schema_value::<FindArgs>(),
            Capability::Ls => schema_value::<LsArgs>(),
            Capability::Cat => schema_value::<CatArgs>(),
            Capability::Read => schema_value::<ReadArgs>(),
            Capability::Grep => schema_value::<GrepArgs>(),
            Capability::Cd => schema_value::<CdArgs>(),
        }
    }
}

fn schema_value<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilityDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindArgs {
    /// Glob matched against entry names, for example "*.rs".
    pub pattern: String,
    /// Directory to search. Defaults to the current working directory.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub recursive: bool,
    /// Maximum depth; 1 means direct children only.
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Results per page (1-1000).
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Token from a previous result's next_page_token.
    #[serde(default)]
    pub page_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("unknown capability '{0}'")]
    UnknownCapability(String),
    #[error("invalid arguments for '{capability}': {message}")]
    InvalidArguments {
        capability: &'static str,
        message: String,
    },
    #[error("{0}")]
    InvalidPath(String),
    #[error("{0}")]
    Io(String),
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
    #[error("capability call budget of {0} calls is exhausted")]
    BudgetExhausted(usize),
    #[error("capability call cancelled")]
    Cancelled,
}

impl CapabilityError {
    pub fn code(&self) -> &'static str {
        match self {
            CapabilityError::UnknownCapability(_) => "unknown_capability",
            CapabilityError::InvalidArguments { .. } => "invalid_args",
            CapabilityError::InvalidPath(_) => "invalid_path",
            CapabilityError::Io(_) => "io_error",
            CapabilityError::Enumeration(EnumerationError::DirectoryAccess { .. }) => {
                "directory_access"
            }
            CapabilityError::Enumeration(EnumerationError::Overflow { .. }) => {
                "enumeration_overflow"
            }
            CapabilityError::Enumeration(EnumerationError::InvalidPattern { .. }) => "invalid_args",
            CapabilityError::Enumeration(EnumerationError::Cancelled)
            | CapabilityError::Cancelled => "cancelled",
            CapabilityError::Enumeration(_) => "enumeration_failed",
            CapabilityError::BudgetExhausted(_) => "budget_exhausted",
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            CapabilityError::Cancelled | CapabilityError::Enumeration(EnumerationError::Cancelled)
        )
    }
}

/// Registry-wide settings: enumeration defaults and read limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub enumerator: EnumeratorConfig,
    pub enumeration: EnumerationTuning,
    pub max_read_bytes: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            enumerator: EnumeratorConfig::default(),
            enumeration: EnumerationTuning::default(),
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }
}

impl ToolSettings {
    pub fn with_enumeration(mut self, enumeration: EnumerationTuning) -> Self {
        self.enumeration = enumeration;
        self
    }
}

/// A validated call: the capability plus its typed arguments.
#[derive(Debug, Clone)]
pub enum Invocation {
    Find(FindArgs),
    Ls(LsArgs),
    Cat(CatArgs),
    Read(ReadArgs),
    Grep(GrepArgs),
    Cd(CdArgs),
}

impl Invocation {
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, CapabilityError> {
        let capability = Capability::from_name(name)
            .ok_or_else(|| CapabilityError::UnknownCapability(name.to_string()))?;
        Ok(match capability {
            Capability::Find => Invocation::Find(parse_args(capability, arguments)?),
            Capability::Ls => Invocation::Ls(parse_args(capability, arguments)?),
            Capability::Cat => Invocation::Cat(parse_args(capability, arguments)?),
            Capability::Read => Invocation::Read(parse_args(capability, arguments)?),
            Capability::Grep => Invocation::Grep(parse_args(capability, arguments)?),
            Capability::Cd => Invocation::Cd(parse_args(capability, arguments)?),
        })
    }

    pub fn capability(&self) -> Capability {
        match self {
            Invocation::Find(_) => Capability::Find,
            Invocation::Ls(_) => Capability::Ls,
            Invocation::Cat(_) => Capability::Cat,
            Invocation::Read(_) => Capability::Read,
            Invocation::Grep(_) => Capability::Grep,
            Invocation::Cd(_) => Capability::Cd,
        }
    }
}

fn parse_args<T: DeserializeOwned>(
    capability: Capability,
    arguments: &Value,
) -> Result<T, CapabilityError> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments).map_err(|err| CapabilityError::InvalidArguments {
        capability: capability.name(),
        message: err.to_string(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    settings: ToolSettings,
    enumerator: Enumerator,
}

impl CapabilityRegistry {
    pub fn new(settings: ToolSettings) -> Self {
        let enumerator = Enumerator::new(settings.enumerator.clone());
        Self {
            settings,
            enumerator,
        }
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        Capability::ALL
            .into_iter()
            .map(|capability| CapabilityDescriptor {
                name: capability.name(),
                description: capability.description(),
                input_schema: capability.argument_schema(),
            })
            .collect()
    }

    /// Validates and runs one capability call with `cwd` as the base for
    /// relative paths.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &Value,
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<Value, CapabilityError> {
        if cancel.is_cancelled() {
            return Err(CapabilityError::Cancelled);
        }

        let max_read_bytes = self.settings.max_read_bytes;
        match Invocation::parse(name, arguments)? {
            Invocation::Find(args) => {
                let request = self.enumeration_request(cwd, args);
                let result = self.enumerator.enumerate(&request, cancel).await?;
                serde_json::to_value(result)
                    .map_err(|err| CapabilityError::Io(format!("failed to encode result: {err}")))
            }
            Invocation::Ls(args) => ls::list_directory(cwd, &args),
            Invocation::Cat(args) => read::cat_file(cwd, &args, max_read_bytes),
            Invocation::Read(args) => read::read_file(cwd, &args, max_read_bytes),
            Invocation::Grep(args) => grep::grep_file(cwd, &args, max_read_bytes),
            Invocation::Cd(args) => cd::change_directory(cwd, &args),
        }
    }

    pub fn enumeration_request(&self, cwd: &Path, args: FindArgs) -> EnumerationRequest {
        let defaults = self.settings.enumeration;
        EnumerationRequest {
            pattern: args.pattern,
            directory: resolve_against(cwd, args.directory.as_deref().unwrap_or(".")),
            recursive: args.recursive,
            max_depth: args
                .max_depth
                .or(if args.recursive { defaults.max_depth } else { None }),
            page_size: args
                .page_size
                .unwrap_or(defaults.page_size)
                .clamp(1, MAX_PAGE_SIZE),
            page_token: args.page_token,
        }
    }
}
