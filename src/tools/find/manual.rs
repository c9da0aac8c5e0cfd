use std::cmp::Ordering;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::EnumerationError;
use super::order::{compare_components, subtree_precedes};
use super::pattern::NamePattern;

#[derive(Debug, Default)]
pub struct ManualPage {
    pub paths: Vec<PathBuf>,
    pub total_matched: usize,
    pub warnings: Vec<String>,
}

pub(crate) struct LevelEntry {
    pub(crate) name: OsString,
    pub(crate) is_dir: bool,
}

/// Reads one directory level, sorted by name.
pub(crate) type LevelReader = fn(&Path) -> std::io::Result<Vec<LevelEntry>>;

/// Resumable, depth-bounded traversal that reads one directory level at a
/// time and stops as soon as it knows a further page exists.
pub struct ManualWalk<'a> {
    matcher: &'a NamePattern,
    resume: Option<Vec<OsString>>,
    page_size: usize,
    cancel: &'a CancellationToken,
    read_level: LevelReader,
    page: ManualPage,
}

impl<'a> ManualWalk<'a> {
    pub fn new(
        matcher: &'a NamePattern,
        resume: Option<Vec<OsString>>,
        page_size: usize,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            matcher,
            resume,
            page_size: page_size.max(1),
            cancel,
            read_level,
            page: ManualPage::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_level_reader(mut self, read_level: LevelReader) -> Self {
        self.read_level = read_level;
        self
    }

    pub fn run(
        mut self,
        root: &Path,
        max_depth: Option<usize>,
    ) -> Result<ManualPage, EnumerationError> {
        let entries =
            (self.read_level)(root).map_err(|err| EnumerationError::DirectoryAccess {
                path: root.to_path_buf(),
                message: err.to_string(),
            })?;
        self.visit(root, &[], entries, max_depth)?;
        Ok(self.page)
    }

    fn page_settled(&self) -> bool {
        self.page.paths.len() >= self.page_size && self.page.total_matched > self.page.paths.len()
    }

    fn is_after_resume(&self, relative: &[OsString]) -> bool {
        match &self.resume {
            Some(resume) => compare_components(relative, resume) == Ordering::Greater,
            None => true,
        }
    }

    fn visit(
        &mut self,
        directory: &Path,
        relative: &[OsString],
        entries: Vec<LevelEntry>,
        depth_remaining: Option<usize>,
    ) -> Result<(), EnumerationError> {
        if self.cancel.is_cancelled() {
            return Err(EnumerationError::Cancelled);
        }

        let descend = depth_remaining.is_none_or(|depth| depth > 1);
        let mut subdirectories = Vec::new();
        for entry in entries {
            let mut entry_relative = relative.to_vec();
            entry_relative.push(entry.name.clone());

            if self.is_after_resume(&entry_relative) && self.matcher.matches(&entry.name) {
                self.page.total_matched += 1;
                if self.page.paths.len() < self.page_size {
                    self.page.paths.push(directory.join(&entry.name));
                }
            }
            if entry.is_dir && descend {
                subdirectories.push((entry.name, entry_relative));
            }
        }

        for (name, child_relative) in subdirectories {
            if self.page_settled() {
                break;
            }
            if let Some(resume) = &self.resume {
                if subtree_precedes(&child_relative, resume) {
                    continue;
                }
            }

            let child = directory.join(&name);
            match (self.read_level)(&child) {
                Ok(children) => {
                    self.visit(
                        &child,
                        &child_relative,
                        children,
                        depth_remaining.map(|depth| depth - 1),
                    )?;
                }
                Err(err) => {
                    tracing::warn!(
                        path = %child.display(),
                        error = %err,
                        "skipping unreadable directory"
                    );
                    self.page
                        .warnings
                        .push(format!("skipped '{}': {err}", child.display()));
                }
            }
        }

        Ok(())
    }
}

pub(crate) fn read_level(directory: &Path) -> std::io::Result<Vec<LevelEntry>> {
    let mut entries = std::fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let is_dir = entry
                .file_type()
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            LevelEntry {
                name: entry.file_name(),
                is_dir,
            }
        })
        .collect::<Vec<LevelEntry>>();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
