//! Containment guard for client-supplied paths.
//!
//! Every path-accepting endpoint resolves through [`MediaRoot::resolve`] before
//! any metadata is read; a rejected path is reported as not found.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::BrowseError;

/// Longest single component most filesystems accept.
const MAX_NAME_BYTES: usize = 255;
/// Longest path the kernel will look up.
const MAX_PATH_BYTES: usize = 4096;

/// Canonical, immutable media root.
#[derive(Clone, Debug)]
pub struct MediaRoot {
    root: PathBuf,
}

impl MediaRoot {
    /// Canonicalize `path` and ensure it is a directory.
    pub fn new(path: &Path) -> Result<Self> {
        let root = path
            .canonicalize()
            .with_context(|| format!("canonicalize media root {:?}", path))?;
        if !root.is_dir() {
            return Err(anyhow::anyhow!("media root is not a directory: {:?}", root));
        }
        Ok(Self { root })
    }

    /// Return the canonical root path.
    pub fn path(&self) -> &Path {
        self.root.as_path()
    }

    /// Resolve a relative client path to an absolute path inside the root.
    ///
    /// Existence is not checked here. When the candidate cannot be
    /// canonicalized (missing file, broken link) its deepest existing ancestor
    /// is canonicalized instead and the remaining components re-appended.
    ///
    /// Strings that cannot name any file (NUL bytes, oversized components or
    /// paths) are `NotFound` without touching the filesystem.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, BrowseError> {
        let joined = self.join_lexical(relative);
        if !is_representable(relative, &joined) {
            tracing::debug!(reason = "unrepresentable", "rejected malformed path");
            return Err(BrowseError::NotFound);
        }
        let candidate = match joined.canonicalize() {
            Ok(canon) => canon,
            Err(_) => canonicalize_existing_ancestor(&joined),
        };
        if candidate.starts_with(&self.root) {
            Ok(candidate)
        } else {
            tracing::debug!(
                requested = relative,
                reason = "containment",
                "rejected path outside media root"
            );
            Err(BrowseError::ContainmentViolation)
        }
    }

    /// Render an absolute in-root path as a POSIX relative string.
    pub fn relative_of(&self, path: &Path) -> String {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return String::new();
        };
        rel.components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Join without touching the filesystem; `..` pops, roots and prefixes are dropped.
    fn join_lexical(&self, relative: &str) -> PathBuf {
        let mut out = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::ParentDir => {
                    out.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        out
    }
}

fn is_representable(relative: &str, joined: &Path) -> bool {
    !relative.contains('\0')
        && relative.split('/').all(|part| part.len() <= MAX_NAME_BYTES)
        && joined.as_os_str().len() <= MAX_PATH_BYTES
}

fn canonicalize_existing_ancestor(path: &Path) -> PathBuf {
    let mut tail: Vec<OsString> = Vec::new();
    let mut current = path;
    loop {
        if let Ok(mut canon) = current.canonicalize() {
            for part in tail.iter().rev() {
                canon.push(part);
            }
            return canon;
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
