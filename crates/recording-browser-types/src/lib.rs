use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Ordering applied to a directory listing.
///
/// Directories always sort ahead of files; the mode only decides the order
/// inside each group.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Case-insensitive name order.
    Name,
    /// Most recently modified first.
    #[default]
    Time,
}

impl SortMode {
    /// Parse a query value, falling back to the default for unknown input.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("name") => SortMode::Name,
            Some(value) if value.eq_ignore_ascii_case("time") => SortMode::Time,
            _ => SortMode::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Name => "name",
            SortMode::Time => "time",
        }
    }
}

/// Links for an entry, relative to the server's mount point.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntryLinks {
    /// Directory listing link (directories only).
    pub browse: Option<String>,
    /// Inline file link (files only).
    pub file: Option<String>,
    /// Attachment download link (files only).
    pub download: Option<String>,
    /// Transcoded stream link (audio files only).
    pub stream: Option<String>,
}

/// One immediate child of a listed directory.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DirectoryEntry {
    /// File or directory name.
    pub name: String,
    /// POSIX-style path relative to the served root.
    pub relative_path: String,
    pub is_directory: bool,
    /// Size in bytes, always 0 for directories.
    pub size_bytes: u64,
    /// Last modification time in the server's local timezone.
    pub modified_at: DateTime<Local>,
    /// True when the name carries a known audio extension or media type.
    pub is_audio: bool,
    #[serde(default)]
    pub links: EntryLinks,
}

/// A single step in the path from the root to the listed directory.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Breadcrumb {
    /// Display name ("Home" for the root).
    pub name: String,
    /// Relative path of this step ("" for the root).
    pub path: String,
}

/// Response body of the directory listing endpoints.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListingResponse {
    /// Relative path of the listed directory ("" for the root).
    pub path: String,
    /// Relative path of the parent directory, absent at the root.
    pub parent: Option<String>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub sort: SortMode,
    /// Substring filter that was applied, empty when none.
    pub query: String,
    pub entries: Vec<DirectoryEntry>,
}

/// Basic liveness payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
