use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Context, ResolvedPath};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub relative_path: PathBuf,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Seconds since the unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    pub is_symlink: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDirResponse {
    pub relative_path: PathBuf,
    pub entries: Vec<DirEntry>,
    pub truncated: bool,
    /// Entries left out: symlinks that dangle or leave the root, and entries that vanished or
    /// could not be inspected while listing.
    pub skipped: u64,
}

/// Directories before files; then case-insensitive by name, exact name as tie-break.
pub(super) fn listing_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    let rank = |entry: &DirEntry| match entry.kind {
        EntryKind::Directory => 0,
        EntryKind::File => 1,
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

/// Describes the entry at `path` (inside the root) or returns `None` when it must be omitted:
/// a symlink whose target dangles or lies outside the root, or something that is neither a
/// file nor a directory.
pub(super) fn describe_entry(ctx: &Context, path: &Path) -> Option<DirEntry> {
    let link_meta = fs::symlink_metadata(path).ok()?;
    let is_symlink = link_meta.file_type().is_symlink();
    let meta = if is_symlink {
        let target = path.canonicalize().ok()?;
        if !crate::path_utils::is_within_root(&target, ctx.root()) {
            tracing::debug!(path = %path.display(), "omitting symlink that leaves the root");
            return None;
        }
        fs::metadata(&target).ok()?
    } else {
        link_meta
    };

    let kind = if meta.is_dir() {
        EntryKind::Directory
    } else if meta.is_file() {
        EntryKind::File
    } else {
        return None;
    };

    Some(DirEntry {
        name: path.file_name()?.to_string_lossy().into_owned(),
        path: path.to_path_buf(),
        relative_path: ctx.relative_of(path),
        kind,
        size_bytes: (kind == EntryKind::File).then(|| meta.len()),
        modified: meta.modified().ok().and_then(super::system_time_to_secs),
        mode: super::permission_bits(&meta),
        is_symlink,
    })
}

/// Lists the immediate children of `dir`.
pub fn list_dir(ctx: &Context, dir: &ResolvedPath) -> Result<ListDirResponse> {
    let meta = fs::metadata(dir.as_path())
        .map_err(|err| Error::io_path("metadata", dir.relative(), err))?;
    if !meta.is_dir() {
        return Err(Error::InvalidPath(format!(
            "path {} is not a directory",
            dir.relative().display()
        )));
    }

    let max_entries = ctx.config.limits.max_list_entries;
    let mut entries = Vec::<DirEntry>::new();
    let mut skipped: u64 = 0;
    let mut truncated = false;

    let rows = fs::read_dir(dir.as_path())
        .map_err(|err| Error::io_path("read_dir", dir.relative(), err))?;
    for row in rows {
        let row = match row {
            Ok(row) => row,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        match describe_entry(ctx, &row.path()) {
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }
    entries.sort_by(listing_order);
    if entries.len() > max_entries {
        entries.truncate(max_entries);
        truncated = true;
    }

    tracing::debug!(
        path = %dir.relative().display(),
        entries = entries.len(),
        skipped,
        truncated,
        "listed directory"
    );
    Ok(ListDirResponse {
        relative_path: dir.relative().to_path_buf(),
        entries,
        truncated,
        skipped,
    })
}
