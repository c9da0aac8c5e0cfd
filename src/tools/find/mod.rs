//! Paginated directory enumeration behind the `find` capability.
//!
//! Two strategies produce the same canonical order (see [`order`]): a bulk
//! listing from one `find` process with a hard output ceiling, and a manual
//! level-by-level traversal that can resume mid-tree and stop early. Page
//! tokens issued by either strategy resume in the other.

pub mod bulk;
pub mod manual;
pub mod order;
pub mod pattern;
pub mod token;

use std::cmp::Ordering;
use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cli::EnumerationStrategy;
use bulk::{BulkListing, BulkOutcome};
use manual::ManualWalk;
use order::{compare_components, relative_components, sort_canonical};
use pattern::NamePattern;
pub use token::{decode_page_token, encode_page_token};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 1000;
pub const DEFAULT_BULK_OUTPUT_CEILING_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_FIND_PROGRAM: &str = "find";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratorConfig {
    pub strategy: EnumerationStrategy,
    pub bulk_output_ceiling_bytes: usize,
    pub find_program: String,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            strategy: EnumerationStrategy::Auto,
            bulk_output_ceiling_bytes: DEFAULT_BULK_OUTPUT_CEILING_BYTES,
            find_program: DEFAULT_FIND_PROGRAM.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationRequest {
    pub pattern: String,
    pub directory: PathBuf,
    pub recursive: bool,
    pub max_depth: Option<usize>,
    pub page_size: usize,
    pub page_token: Option<String>,
}

impl EnumerationRequest {
    pub fn new(pattern: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            pattern: pattern.into(),
            directory: directory.into(),
            recursive: false,
            max_depth: None,
            page_size: DEFAULT_PAGE_SIZE,
            page_token: None,
        }
    }

    /// Depth 1 means direct children only. Non-recursive requests default to
    /// 1, recursive ones are unbounded unless a depth was given.
    pub fn effective_max_depth(&self) -> Option<usize> {
        match (self.max_depth, self.recursive) {
            (Some(depth), _) => Some(depth.max(1)),
            (None, false) => Some(1),
            (None, true) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServedBy {
    Bulk,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumerationResult {
    #[serde(serialize_with = "serialize_paths")]
    pub paths: Vec<PathBuf>,
    pub next_page_token: Option<String>,
    pub total_matched: usize,
    pub strategy: ServedBy,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn serialize_paths<S>(paths: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(paths.iter().map(|path| path.to_string_lossy()))
}

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("cannot read directory '{}': {message}", path.display())]
    DirectoryAccess { path: PathBuf, message: String },
    #[error("bulk listing exceeded the {ceiling} byte output ceiling")]
    Overflow { ceiling: usize },
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("bulk listing unavailable: {0}")]
    BulkUnavailable(String),
    #[error("enumeration cancelled")]
    Cancelled,
    #[error("enumeration failed: {0}")]
    Io(String),
}

#[derive(Debug, Clone, Default)]
pub struct Enumerator {
    config: EnumeratorConfig,
}

struct Prepared {
    root: PathBuf,
    matcher: NamePattern,
    resume: Option<Vec<OsString>>,
    max_depth: Option<usize>,
    page_size: usize,
    warnings: Vec<String>,
}

impl Enumerator {
    pub fn new(config: EnumeratorConfig) -> Self {
        Self { config }
    }

    pub async fn enumerate(
        &self,
        request: &EnumerationRequest,
        cancel: &CancellationToken,
    ) -> Result<EnumerationResult, EnumerationError> {
        let prepared = prepare(request).await?;

        if self.config.strategy == EnumerationStrategy::Manual {
            return run_manual(prepared, cancel).await;
        }

        let outcome = self.run_bulk(&prepared, cancel).await?;
        match (self.config.strategy, outcome) {
            (_, BulkOutcome::Complete(paths)) => Ok(page_from_listing(prepared, paths)),
            (EnumerationStrategy::Bulk, BulkOutcome::Overflow { ceiling }) => {
                Err(EnumerationError::Overflow { ceiling })
            }
            (EnumerationStrategy::Bulk, BulkOutcome::Unavailable(reason)) => {
                Err(EnumerationError::BulkUnavailable(reason))
            }
            (_, BulkOutcome::Overflow { ceiling }) => {
                tracing::debug!(
                    root = %prepared.root.display(),
                    ceiling,
                    "bulk listing overflowed; falling back to manual traversal"
                );
                run_manual(prepared, cancel).await.map_err(|err| match err {
                    EnumerationError::Cancelled => EnumerationError::Cancelled,
                    other => {
                        tracing::warn!(error = %other, "manual fallback failed after overflow");
                        EnumerationError::Overflow { ceiling }
                    }
                })
            }
            (_, BulkOutcome::Unavailable(reason)) => {
                tracing::debug!(
                    root = %prepared.root.display(),
                    reason = %reason,
                    "bulk listing unavailable; using manual traversal"
                );
                run_manual(prepared, cancel).await
            }
        }
    }

    async fn run_bulk(
        &self,
        prepared: &Prepared,
        cancel: &CancellationToken,
    ) -> Result<BulkOutcome, EnumerationError> {
        BulkListing {
            program: &self.config.find_program,
            root: &prepared.root,
            max_depth: prepared.max_depth,
            name_filter: prepared.matcher.find_name_filter(),
            ceiling_bytes: self.config.bulk_output_ceiling_bytes,
        }
        .run(cancel)
        .await
    }
}

async fn prepare(request: &EnumerationRequest) -> Result<Prepared, EnumerationError> {
    let root = request.directory.clone();
    let metadata = tokio::fs::metadata(&root)
        .await
        .map_err(|err| EnumerationError::DirectoryAccess {
            path: root.clone(),
            message: err.to_string(),
        })?;
    if !metadata.is_dir() {
        return Err(EnumerationError::DirectoryAccess {
            path: root,
            message: "not a directory".to_string(),
        });
    }

    let matcher =
        NamePattern::new(&request.pattern).map_err(|err| EnumerationError::InvalidPattern {
            pattern: request.pattern.clone(),
            message: err.to_string(),
        })?;

    let mut warnings = Vec::new();
    let resume = match request.page_token.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let resume = decode_page_token(raw).and_then(|path| relative_components(&root, &path));
            if resume.is_none() {
                tracing::debug!(
                    token = raw,
                    "ignoring page token that does not belong to this listing"
                );
                warnings.push("page token was not recognised; listing from the start".to_string());
            }
            resume
        }
    };

    Ok(Prepared {
        root,
        matcher,
        resume,
        max_depth: request.effective_max_depth(),
        page_size: request.page_size.clamp(1, MAX_PAGE_SIZE),
        warnings,
    })
}

async fn run_manual(
    prepared: Prepared,
    cancel: &CancellationToken,
) -> Result<EnumerationResult, EnumerationError> {
    let cancel = cancel.clone();
    let Prepared {
        root,
        matcher,
        resume,
        max_depth,
        page_size,
        mut warnings,
    } = prepared;

    let walk_root = root.clone();
    let page = tokio::task::spawn_blocking(move || {
        ManualWalk::new(&matcher, resume, page_size, &cancel).run(&walk_root, max_depth)
    })
    .await
    .map_err(|err| EnumerationError::Io(format!("manual traversal task failed: {err}")))??;

    warnings.extend(page.warnings);
    let next_page_token = next_token(&page.paths, page.total_matched);
    Ok(EnumerationResult {
        paths: page.paths,
        next_page_token,
        total_matched: page.total_matched,
        strategy: ServedBy::Manual,
        warnings,
    })
}

fn page_from_listing(prepared: Prepared, listing: Vec<PathBuf>) -> EnumerationResult {
    let Prepared {
        root,
        matcher,
        resume,
        page_size,
        warnings,
        ..
    } = prepared;

    let mut matched = listing
        .into_iter()
        .filter(|path| path.file_name().is_some_and(|name| matcher.matches(name)))
        .filter(|path| match (&resume, relative_components(&root, path)) {
            (Some(resume), Some(relative)) => {
                compare_components(&relative, resume) == Ordering::Greater
            }
            (None, Some(_)) => true,
            (_, None) => false,
        })
        .collect::<Vec<PathBuf>>();
    sort_canonical(&root, &mut matched);

    let total_matched = matched.len();
    matched.truncate(page_size);
    let next_page_token = next_token(&matched, total_matched);
    EnumerationResult {
        paths: matched,
        next_page_token,
        total_matched,
        strategy: ServedBy::Bulk,
        warnings,
    }
}

fn next_token(paths: &[PathBuf], total_matched: usize) -> Option<String> {
    if total_matched > paths.len() {
        paths.last().map(|last| encode_page_token(last))
    } else {
        None
    }
}

