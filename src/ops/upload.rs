use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Context, ResolvedPath};

// Each taken name costs one failed no-clobber persist; give up eventually.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

#[cfg(unix)]
pub(super) const NEW_FILE_MODE: u32 = 0o644;

/// An incoming upload. The stream is consumed exactly once by [`accept_upload`].
#[derive(Debug)]
pub struct UploadDescriptor<R> {
    /// Name as declared by the client; only its final segment is used.
    pub filename: String,
    /// Declared size in bytes. Checked up front, and again against the actual stream.
    pub size: u64,
    /// Declared MIME type. Echoed back for display, never used for validation.
    pub content_type: Option<String>,
    pub source: R,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedName {
    /// Final stored name, possibly de-duplicated (`report_1.txt`).
    pub name: String,
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub bytes: u64,
    /// `true` when the declared name was taken and a suffix was added.
    pub renamed: bool,
    /// Guessed from the stored extension.
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_content_type: Option<String>,
}

/// Final path segment of a client-supplied name, accepting both separator styles.
fn base_name(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw)
}

/// Splits `name` into stem and lowercased extension at the last dot.
///
/// A leading-dot name like `.htaccess` has an empty stem and extension `htaccess`.
fn split_extension(name: &str) -> (&str, Option<String>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext.to_ascii_lowercase())),
        None => (name, None),
    }
}

/// Refuses names whose extension is on the deny list. Shared with `write_file`, which creates
/// files by name just like an upload does.
pub(super) fn check_denied_extension(ctx: &Context, name: &str) -> Result<()> {
    let (_, extension) = split_extension(name);
    let extension = extension.unwrap_or_default();
    if ctx
        .config
        .upload
        .deny_extensions
        .iter()
        .any(|denied| *denied == extension)
    {
        return Err(Error::DisallowedExtension {
            name: name.to_string(),
            extension,
        });
    }
    Ok(())
}

fn check_extension(ctx: &Context, name: &str) -> Result<()> {
    check_denied_extension(ctx, name)?;
    let rules = &ctx.config.upload;
    let (_, extension) = split_extension(name);
    let extension = extension.unwrap_or_default();
    if !rules.allow_extensions.is_empty()
        && !rules.allow_extensions.iter().any(|allowed| *allowed == extension)
    {
        return Err(Error::DisallowedExtension {
            name: name.to_string(),
            extension,
        });
    }
    Ok(())
}

/// `name`, then `stem_1.ext`, `stem_2.ext`, ...
fn candidate_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{attempt}.{ext}"),
        _ => format!("{name}_{attempt}"),
    }
}

fn write_failed(relative: &Path, source: std::io::Error) -> Error {
    Error::WriteFailed {
        path: relative.to_path_buf(),
        source,
    }
}

/// Validates an upload and stores it in `destination_dir` under a name no other entry uses.
///
/// Checks run in order: name, declared size, extension (deny list before allow list). The
/// content is streamed into a temp file in the destination directory with a hard cap of
/// `max_bytes + 1`, then published under the first free candidate name without ever replacing
/// an existing entry. On any failure nothing is left behind.
pub fn accept_upload<R: Read>(
    ctx: &Context,
    destination_dir: &ResolvedPath,
    descriptor: UploadDescriptor<R>,
) -> Result<AcceptedName> {
    let UploadDescriptor {
        filename,
        size,
        content_type: declared_content_type,
        source,
    } = descriptor;

    let dir_meta = fs::metadata(destination_dir.as_path())
        .map_err(|err| Error::io_path("metadata", destination_dir.relative(), err))?;
    if !dir_meta.is_dir() {
        return Err(Error::InvalidPath(format!(
            "invalid upload directory: {}",
            destination_dir.relative().display()
        )));
    }

    let name = crate::path_utils::validate_entry_name(base_name(&filename), "file name")
        .map_err(Error::InvalidPath)?
        .to_string();

    let max_bytes = ctx.config.upload.max_bytes;
    if size > max_bytes {
        return Err(Error::TooLarge {
            name,
            size_bytes: size,
            max_bytes,
        });
    }
    check_extension(ctx, &name)?;

    let declared_relative = destination_dir.child(&name).relative().to_path_buf();
    let mut tmp_file = tempfile::Builder::new()
        .prefix(".safe-fm-upload.")
        .suffix(".tmp")
        .tempfile_in(destination_dir.as_path())
        .map_err(|err| write_failed(&declared_relative, err))?;

    let mut limited = source.take(max_bytes.saturating_add(1));
    let bytes = std::io::copy(&mut limited, tmp_file.as_file_mut())
        .map_err(|err| write_failed(&declared_relative, err))?;
    if bytes > max_bytes {
        tracing::debug!(name = %name, declared = size, "upload stream exceeded declared size");
        return Err(Error::TooLarge {
            name,
            size_bytes: bytes,
            max_bytes,
        });
    }
    tmp_file
        .as_file()
        .sync_all()
        .map_err(|err| write_failed(&declared_relative, err))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(
            tmp_file.path(),
            fs::Permissions::from_mode(NEW_FILE_MODE),
        )
        .map_err(|err| write_failed(&declared_relative, err))?;
    }

    let mut attempt = 0;
    let stored = loop {
        if attempt >= MAX_NAME_ATTEMPTS {
            return Err(Error::AlreadyExists(declared_relative));
        }
        let candidate = candidate_name(&name, attempt);
        let target = destination_dir.child(&candidate);
        match tmp_file.persist_noclobber(target.as_path()) {
            Ok(_) => break target,
            Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tmp_file = err.file;
                attempt += 1;
            }
            Err(err) => return Err(write_failed(target.relative(), err.error)),
        }
    };

    let stored_name = candidate_name(&name, attempt);
    let content_type = mime_guess::from_path(&stored_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    tracing::info!(
        name = %stored_name,
        dir = %destination_dir.relative().display(),
        bytes,
        renamed = attempt > 0,
        "upload stored"
    );
    Ok(AcceptedName {
        name: stored_name,
        relative_path: stored.relative().to_path_buf(),
        path: stored.into_path_buf(),
        bytes,
        renamed: attempt > 0,
        content_type,
        declared_content_type,
    })
}
