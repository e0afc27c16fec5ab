use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Context, ResolvedPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    File,
    Directory,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatResponse {
    pub name: String,
    pub relative_path: PathBuf,
    #[serde(rename = "type")]
    pub kind: StatKind,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    pub readonly: bool,
    pub is_symlink: bool,
    /// Guessed from the extension; files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

fn metadata_time_to_secs(
    relative: &Path,
    op: &'static str,
    value: std::io::Result<std::time::SystemTime>,
) -> Result<Option<u64>> {
    match value {
        Ok(time) => Ok(super::system_time_to_secs(time)),
        Err(err) if err.kind() == ErrorKind::Unsupported => Ok(None),
        Err(err) => Err(Error::io_path(op, relative, err)),
    }
}

/// Metadata for one entry. A symlink is described by its target, which the resolver has
/// already proved to be inside the root.
pub fn stat(_ctx: &Context, path: &ResolvedPath) -> Result<StatResponse> {
    let relative = path.relative().to_path_buf();
    let link_meta = fs::symlink_metadata(path.as_path())
        .map_err(|err| Error::io_path("symlink_metadata", &relative, err))?;
    let is_symlink = link_meta.file_type().is_symlink();
    let meta = if is_symlink {
        fs::metadata(path.as_path()).map_err(|err| Error::io_path("metadata", &relative, err))?
    } else {
        link_meta
    };

    let kind = if meta.is_file() {
        StatKind::File
    } else if meta.is_dir() {
        StatKind::Directory
    } else {
        StatKind::Other
    };
    let name = path
        .as_path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    let mime = (kind == StatKind::File).then(|| {
        mime_guess::from_path(path.as_path())
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });

    Ok(StatResponse {
        name,
        kind,
        size_bytes: if meta.is_file() { meta.len() } else { 0 },
        modified: metadata_time_to_secs(&relative, "metadata.modified", meta.modified())?,
        accessed: metadata_time_to_secs(&relative, "metadata.accessed", meta.accessed())?,
        created: metadata_time_to_secs(&relative, "metadata.created", meta.created())?,
        mode: super::permission_bits(&meta),
        readonly: meta.permissions().readonly(),
        is_symlink,
        mime,
        relative_path: relative,
    })
}
