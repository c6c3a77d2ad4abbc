use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs::Metadata, path::Path};

/// Root of a namespace exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Drive {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileDescriptor {
    pub name: String,
    pub path: String,
    pub length: u64,
    #[serde(rename = "CreatedTimeUtc")]
    pub created_at_utc: DateTime<Utc>,
    #[serde(default, rename = "UpdatedTimeUtc")]
    pub updated_at_utc: Option<DateTime<Utc>>,
    pub read_only: bool,
    #[serde(default)]
    pub attributes: String,
    #[serde(default)]
    pub unix_file_mode: String,
}

impl FileDescriptor {
    /// Descriptor for an upload target: only name, path and length matter to
    /// the receiving side.
    pub fn for_upload<P: Into<String>>(path: P, length: u64) -> Self {
        let path = path.into();
        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name,
            path,
            length,
            created_at_utc: Utc::now(),
            updated_at_utc: None,
            read_only: false,
            attributes: String::new(),
            unix_file_mode: String::new(),
        }
    }

    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        let created = metadata
            .created()
            .ok()
            .map(DateTime::<Utc>::from)
            .or(modified)
            .unwrap_or_default();

        Self {
            name: file_name(path),
            path: path.to_string_lossy().into_owned(),
            length: metadata.len(),
            created_at_utc: created,
            updated_at_utc: modified,
            read_only: metadata.permissions().readonly(),
            attributes: attributes(path, metadata),
            unix_file_mode: unix_file_mode(metadata),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FolderErrors {
    #[serde(rename = "ErrorReading")]
    pub error_reading_self: bool,
    pub error_reading_files: bool,
    pub error_reading_sub_folders: bool,
}

/// Folder listing. Built per request and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FolderDescriptor {
    pub name: String,
    pub path: String,
    pub length: u64,
    #[serde(default)]
    pub folders: Vec<FolderDescriptor>,
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
    #[serde(default)]
    pub unix_file_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FolderErrors>,
}

impl FolderDescriptor {
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        Self {
            name: file_name(path),
            path: path.to_string_lossy().into_owned(),
            unix_file_mode: unix_file_mode(metadata),
            ..Self::default()
        }
    }

    /// Placeholder for a folder whose details could not be read
    pub fn unreadable(path: &Path) -> Self {
        Self {
            name: file_name(path),
            path: path.to_string_lossy().into_owned(),
            errors: Some(FolderErrors {
                error_reading_self: true,
                ..FolderErrors::default()
            }),
            ..Self::default()
        }
    }

    pub fn errors_mut(&mut self) -> &mut FolderErrors {
        self.errors.get_or_insert_with(FolderErrors::default)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |n| n.to_string_lossy().into_owned(),
    )
}

fn attributes(path: &Path, metadata: &Metadata) -> String {
    let mut attributes = Vec::new();

    if metadata.permissions().readonly() {
        attributes.push("ReadOnly");
    }
    if path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
    {
        attributes.push("Hidden");
    }
    if metadata.is_dir() {
        attributes.push("Directory");
    }
    if attributes.is_empty() {
        attributes.push("Normal");
    }

    attributes.join(", ")
}

fn permission(permission: u32) -> String {
    let read = if (permission >> 2) & 0x1 == 0x1 { "r" } else { "-" };
    let write = if (permission >> 1) & 0x1 == 0x1 { "w" } else { "-" };
    let execute = if permission & 0x1 == 0x1 { "x" } else { "-" };

    format!("{read}{write}{execute}")
}

#[cfg(unix)]
fn unix_file_mode(metadata: &Metadata) -> String {
    let mode = metadata.permissions().mode();

    let owner = permission((mode >> 6) & 0x7);
    let group = permission((mode >> 3) & 0x7);
    let other = permission(mode & 0x7);

    format!("{owner}{group}{other}")
}

#[cfg(not(unix))]
fn unix_file_mode(_metadata: &Metadata) -> String {
    String::new()
}
