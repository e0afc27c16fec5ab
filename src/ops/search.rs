use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, PathFailure, Result};

use super::list_dir::describe_entry;
use super::{Context, DirEntry, ResolvedPath};

/// Collected form of a [`Search`], as returned at the request boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub relative_path: PathBuf,
    pub entries: Vec<DirEntry>,
    /// Directories that could not be read and were skipped.
    pub failures: Vec<PathFailure>,
    pub truncated: bool,
}

/// Lazy recursive name search below one directory.
///
/// Yields every entry whose name contains the query, ignoring case, in walk order. Symlinks are
/// reported but never descended into. A directory that cannot be read does not end the search;
/// it is recorded in [`Search::failures`] and the walk moves on. Each call to [`search`] starts a
/// fresh walk.
pub struct Search<'a> {
    ctx: &'a Context,
    walker: walkdir::IntoIter,
    needle: String,
    failures: Vec<PathFailure>,
}

impl std::fmt::Debug for Search<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search")
            .field("needle", &self.needle)
            .field("failures", &self.failures.len())
            .finish_non_exhaustive()
    }
}

impl Search<'_> {
    /// Directories skipped so far because they could not be read.
    pub fn failures(&self) -> &[PathFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<PathFailure> {
        self.failures
    }

    fn record(&mut self, err: walkdir::Error) {
        let path = err
            .path()
            .map(|path| self.ctx.relative_of(path))
            .unwrap_or_else(|| PathBuf::from("."));
        tracing::debug!(path = %path.display(), error = %err, "search skipped unreadable entry");
        self.failures.push(PathFailure::new(path, err));
    }
}

impl Iterator for Search<'_> {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        loop {
            match self.walker.next()? {
                Ok(entry) => {
                    let name = entry.file_name().to_string_lossy();
                    if !name.to_lowercase().contains(&self.needle) {
                        continue;
                    }
                    if let Some(found) = describe_entry(self.ctx, entry.path()) {
                        return Some(found);
                    }
                }
                Err(err) => self.record(err),
            }
        }
    }
}

/// Starts a case-insensitive substring search for `query` below `dir`.
pub fn search<'a>(ctx: &'a Context, dir: &ResolvedPath, query: &str) -> Result<Search<'a>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(Error::InvalidPath("search query cannot be empty".to_string()));
    }
    let meta = fs::metadata(dir.as_path())
        .map_err(|err| Error::io_path("metadata", dir.relative(), err))?;
    if !meta.is_dir() {
        return Err(Error::InvalidPath(format!(
            "path {} is not a directory",
            dir.relative().display()
        )));
    }

    // `dir` may be a symlink the resolver kept as-is; its target is inside the root, so the walk
    // starts there. Links below it are still never followed.
    let walker = WalkDir::new(dir.as_path())
        .follow_root_links(true)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();
    Ok(Search {
        ctx,
        walker,
        needle,
        failures: Vec::new(),
    })
}
