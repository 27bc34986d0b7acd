//! Directory listing for the browse endpoints.
//!
//! Enumerates one level of a resolved directory, classifies audio files and
//! orders the result with directories first.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use recording_browser_types::{Breadcrumb, DirectoryEntry, EntryLinks, SortMode};

use crate::error::BrowseError;
use crate::resolver::MediaRoot;

/// Names starting with this marker are never listed.
const HIDDEN_MARKER: char = '.';

/// Extensions treated as audio without consulting the media type table.
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &[
    "wav", "WAV", "gsm", "GSM", "mp3", "MP3", "ogg", "OGG", "oga", "OGA", "opus", "OPUS",
    "flac", "FLAC", "m4a", "M4A", "aac", "AAC", "amr", "AMR", "aif", "AIF", "aiff", "AIFF",
    "wma", "WMA", "spx", "SPX", "au", "AU", "sln", "SLN", "ulaw", "ULAW", "alaw", "ALAW",
];

/// Decides whether a file name refers to an audio recording.
#[derive(Clone, Debug)]
pub struct AudioClassifier {
    extensions: HashSet<String>,
}

impl Default for AudioClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIO_EXTENSIONS.iter().copied())
    }
}

impl AudioClassifier {
    /// Build a classifier from a case-sensitive extension allowlist.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(Into::into)
                .map(|ext: String| ext.trim_start_matches('.').to_string())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn is_audio(&self, name: &str) -> bool {
        let ext = Path::new(name).extension().and_then(OsStr::to_str);
        if ext.is_some_and(|ext| self.extensions.contains(ext)) {
            return true;
        }
        mime_guess::from_path(name)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::AUDIO)
    }
}

/// List the immediate children of `dir`.
///
/// Hidden names are dropped, `filter` is a case-insensitive substring match
/// applied before any stat call, and children whose metadata cannot be read
/// are skipped. The result is ordered per `sort` with directories first; ties
/// keep enumeration order.
///
/// The entry type comes from the link itself, so a symlink is never listed as
/// a directory. Size and mtime follow a symlink only to a regular file inside
/// the root; a symlink to a directory is reported with the link's own
/// metadata, and its file links resolve to 404 like any directory would.
pub fn list_dir(
    root: &MediaRoot,
    dir: &Path,
    filter: &str,
    sort: SortMode,
    classifier: &AudioClassifier,
) -> Result<Vec<DirectoryEntry>, BrowseError> {
    let read_dir = fs::read_dir(dir).map_err(BrowseError::from_io)?;
    let needle = filter.to_lowercase();
    let base = root.relative_of(dir);

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(HIDDEN_MARKER) {
            continue;
        }
        if !needle.is_empty() && !name.to_lowercase().contains(&needle) {
            continue;
        }

        let relative_path = if base.is_empty() {
            name.clone()
        } else {
            format!("{base}/{name}")
        };
        let link_meta = match fs::symlink_metadata(entry.path()) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::debug!(name = %name, error = %err, "skipping entry without metadata");
                continue;
            }
        };
        let is_directory = link_meta.is_dir();
        let meta = if link_meta.file_type().is_symlink() {
            contained_target_meta(root, &relative_path).unwrap_or(link_meta)
        } else {
            link_meta
        };
        let modified_at: DateTime<Local> = match meta.modified() {
            Ok(time) => time.into(),
            Err(err) => {
                tracing::debug!(name = %name, error = %err, "skipping entry without mtime");
                continue;
            }
        };

        entries.push(DirectoryEntry {
            is_audio: !is_directory && classifier.is_audio(&name),
            size_bytes: if is_directory { 0 } else { meta.len() },
            name,
            relative_path,
            is_directory,
            modified_at,
            links: EntryLinks::default(),
        });
    }

    sort_entries(&mut entries, sort);
    Ok(entries)
}

/// Metadata of a symlink's target, only when the target is a file inside the root.
///
/// Escaping or dangling links, and links to directories, keep the link's own
/// metadata.
fn contained_target_meta(root: &MediaRoot, relative_path: &str) -> Option<fs::Metadata> {
    let target = root.resolve(relative_path).ok()?;
    fs::metadata(target).ok().filter(|meta| meta.is_file())
}

/// Stable sort with directories ahead of files.
pub fn sort_entries(entries: &mut [DirectoryEntry], sort: SortMode) {
    match sort {
        SortMode::Name => entries.sort_by_key(|e| (!e.is_directory, e.name.to_lowercase())),
        SortMode::Time => entries.sort_by_key(|e| (!e.is_directory, Reverse(e.modified_at))),
    }
}

/// Relative path of the parent directory, `None` at the root.
pub fn parent_of(relative: &str) -> Option<String> {
    if relative.is_empty() {
        return None;
    }
    Some(
        relative
            .rsplit_once('/')
            .map(|(parent, _)| parent.to_string())
            .unwrap_or_default(),
    )
}

/// Steps from the root down to `relative`, root first.
pub fn breadcrumbs(relative: &str) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        name: "Home".to_string(),
        path: String::new(),
    }];
    let mut acc = String::new();
    for part in relative.split('/').filter(|part| !part.is_empty()) {
        if !acc.is_empty() {
            acc.push('/');
        }
        acc.push_str(part);
        crumbs.push(Breadcrumb {
            name: part.to_string(),
            path: acc.clone(),
        });
    }
    crumbs
}
