use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Context, ResolvedPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameResponse {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Renames `from` to `to_name` inside the same directory.
pub fn rename(_ctx: &Context, from: &ResolvedPath, to_name: &str) -> Result<RenameResponse> {
    let to_name =
        crate::path_utils::validate_entry_name(to_name, "new name").map_err(Error::InvalidPath)?;
    if from.is_root() {
        return Err(Error::InvalidPath(
            "refusing to rename the root directory".to_string(),
        ));
    }
    if !from.exists() {
        return Err(Error::NotFound(from.relative().to_path_buf()));
    }

    let to = from.sibling(to_name).ok_or_else(|| {
        Error::InvalidPath("refusing to rename the root directory".to_string())
    })?;
    if to.as_path() == from.as_path() {
        return Err(Error::AlreadyExists(to.relative().to_path_buf()));
    }
    if to.exists() {
        return Err(Error::AlreadyExists(to.relative().to_path_buf()));
    }

    crate::platform::rename::rename_no_replace(from.as_path(), to.as_path()).map_err(|err| {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            Error::AlreadyExists(to.relative().to_path_buf())
        } else {
            Error::io_path("rename", from.relative(), err)
        }
    })?;

    tracing::info!(
        from = %from.relative().display(),
        to = %to.relative().display(),
        "renamed"
    );
    Ok(RenameResponse {
        from: from.relative().to_path_buf(),
        to: to.relative().to_path_buf(),
    })
}
