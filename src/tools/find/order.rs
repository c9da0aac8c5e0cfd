//! Canonical enumeration order shared by the bulk and manual strategies.
//!
//! Depth-first, names compared byte-wise inside a directory, and every entry
//! of a directory comes before anything found inside its subdirectories.
//! Paths are compared as component lists relative to the enumeration root.

use std::cmp::Ordering;
use std::ffi::{OsStr, OsString};
use std::path::Path;

pub fn relative_components(root: &Path, path: &Path) -> Option<Vec<OsString>> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_os_string())
        .collect::<Vec<OsString>>();
    if parts.is_empty() { None } else { Some(parts) }
}

pub fn compare_components<A, B>(a: &[A], b: &[B]) -> Ordering
where
    A: AsRef<OsStr>,
    B: AsRef<OsStr>,
{
    for (index, (left, right)) in a.iter().zip(b).enumerate() {
        let (left, right) = (left.as_ref(), right.as_ref());
        if left == right {
            continue;
        }
        let left_is_leaf = index + 1 == a.len();
        let right_is_leaf = index + 1 == b.len();
        return match (left_is_leaf, right_is_leaf) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => left.cmp(right),
        };
    }
    a.len().cmp(&b.len())
}

/// True when every descendant of `directory` sorts before `resume`, so the
/// subtree can be skipped without reading it.
pub fn subtree_precedes<A, B>(directory: &[A], resume: &[B]) -> bool
where
    A: AsRef<OsStr>,
    B: AsRef<OsStr>,
{
    for (index, (dir_part, resume_part)) in directory.iter().zip(resume).enumerate() {
        let (dir_part, resume_part) = (dir_part.as_ref(), resume_part.as_ref());
        if dir_part != resume_part {
            let resume_is_leaf = index + 1 == resume.len();
            return !resume_is_leaf && dir_part < resume_part;
        }
    }
    false
}

pub fn sort_canonical(root: &Path, paths: &mut [std::path::PathBuf]) {
    paths.sort_by_cached_key(|path| {
        CanonicalKey(relative_components(root, path).unwrap_or_default())
    });
}

#[derive(PartialEq, Eq)]
struct CanonicalKey(Vec<OsString>);

impl PartialOrd for CanonicalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_components(&self.0, &other.0)
    }
}
