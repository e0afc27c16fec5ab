use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::path_utils::{display_relative, is_within_root, normalize_path_lexical, strip_root};

use super::Context;

/// A caller-supplied path that has been proven to lie inside the sandbox root.
///
/// Only the resolver can construct one, so every engine operation that takes a `ResolvedPath`
/// is guaranteed to start from a contained location. It is not `Clone`: resolve
/// once per call, use, drop. The filesystem may change between resolution and use; operations
/// re-check what they depend on instead of trusting a cached value.
#[derive(Debug)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative: PathBuf,
    exists: bool,
}

impl ResolvedPath {
    /// Absolute path with every directory component canonicalized.
    ///
    /// A final component that is a symlink is kept as the link itself (its target has been
    /// checked to lie inside the root), so mutations act on the link and not on what it
    /// points to.
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// Root-relative path; the root itself is `.`.
    pub fn relative(&self) -> &Path {
        if self.relative.as_os_str().is_empty() {
            Path::new(".")
        } else {
            &self.relative
        }
    }

    /// Whether an entry (of any kind) was present at resolution time.
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.absolute
    }

    /// A direct child of this (directory) path. `name` must already be a validated single
    /// segment, which keeps the child inside the root.
    pub(super) fn child(&self, name: &str) -> ResolvedPath {
        let absolute = self.absolute.join(name);
        let exists = fs::symlink_metadata(&absolute).is_ok();
        ResolvedPath {
            relative: self.relative.join(name),
            absolute,
            exists,
        }
    }

    /// A sibling of this path (same parent directory). `None` for the root.
    pub(super) fn sibling(&self, name: &str) -> Option<ResolvedPath> {
        let parent = self.absolute.parent()?;
        if self.is_root() {
            return None;
        }
        let absolute = parent.join(name);
        let exists = fs::symlink_metadata(&absolute).is_ok();
        let relative = self
            .relative
            .parent()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|| PathBuf::from(name));
        Some(ResolvedPath {
            absolute,
            relative,
            exists,
        })
    }
}

fn outside_root(raw: &str) -> Error {
    Error::OutsideRoot(PathBuf::from(raw))
}

fn check_request_shape(ctx: &Context, raw: &str, raw_path: &Path) -> Result<()> {
    if raw.contains('\0') {
        return Err(Error::InvalidPath(format!(
            "invalid path {raw:?}: contains NUL byte"
        )));
    }
    if raw_path.is_absolute() && !ctx.config.paths.allow_absolute {
        return Err(Error::InvalidPath(
            "absolute request paths are not allowed by config".to_string(),
        ));
    }
    #[cfg(windows)]
    {
        // `\foo` and `C:foo` are neither relative to the root nor fully absolute.
        if !raw_path.is_absolute()
            && matches!(
                raw_path.components().next(),
                Some(Component::RootDir | Component::Prefix(_))
            )
        {
            return Err(Error::InvalidPath(format!(
                "invalid path {raw:?}: rooted or drive-relative paths are not supported"
            )));
        }
    }
    Ok(())
}

/// Resolves `raw` against the sandbox root and proves containment.
///
/// An empty string means the root. Relative paths are joined onto the root; absolute paths are
/// taken as-is (when the config allows them). The result is rejected with
/// [`Error::OutsideRoot`] when either the lexical form or the canonical, symlink-resolved form
/// lands outside the root. A path whose leaf does not exist yet resolves successfully as long
/// as its parent exists inside the root.
pub fn resolve(ctx: &Context, raw: &str) -> Result<ResolvedPath> {
    let canonical_root = ctx.root();
    let raw_path = Path::new(raw);
    check_request_shape(ctx, raw, raw_path)?;

    if raw.is_empty() {
        return Ok(ResolvedPath {
            absolute: canonical_root.to_path_buf(),
            relative: PathBuf::new(),
            exists: true,
        });
    }

    let joined = if raw_path.is_absolute() {
        raw_path.to_path_buf()
    } else {
        canonical_root.join(raw_path)
    };

    // Lexical gate first: a `..` escape is rejected even when intermediate directories are
    // missing and canonicalization would only report NotFound.
    let lexical = normalize_path_lexical(&joined);
    let lexical_relative = strip_root(&lexical, canonical_root)
        .or_else(|| strip_root(&lexical, &ctx.config.root))
        .ok_or_else(|| outside_root(raw))?;
    let lexical_relative = display_relative(&lexical_relative);

    // From here on the lexical form is used, so `..` never walks back out through a symlink.
    match lexical.canonicalize() {
        Ok(canonical) => resolve_existing(canonical_root, raw, &lexical, canonical),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            resolve_missing_leaf(canonical_root, raw, &lexical, &lexical_relative)
        }
        Err(err) => Err(Error::io_path("canonicalize", &lexical_relative, err)),
    }
}

fn resolve_existing(
    canonical_root: &Path,
    raw: &str,
    joined: &Path,
    canonical: PathBuf,
) -> Result<ResolvedPath> {
    let relative = strip_root(&canonical, canonical_root).ok_or_else(|| {
        tracing::debug!(raw, canonical = %canonical.display(), "canonical path escapes root");
        outside_root(raw)
    })?;
    if relative.as_os_str().is_empty() {
        return Ok(ResolvedPath {
            absolute: canonical,
            relative,
            exists: true,
        });
    }

    let leaf_is_symlink = fs::symlink_metadata(joined)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false);
    let leaf_name = match joined.components().next_back() {
        Some(Component::Normal(name)) => Some(name),
        _ => None,
    };

    if let (true, Some(name), Some(parent)) = (leaf_is_symlink, leaf_name, joined.parent()) {
        let canonical_parent = parent
            .canonicalize()
            .map_err(|err| Error::io_path("canonicalize", Path::new(raw), err))?;
        let parent_relative =
            strip_root(&canonical_parent, canonical_root).ok_or_else(|| outside_root(raw))?;
        return Ok(ResolvedPath {
            absolute: canonical_parent.join(name),
            relative: parent_relative.join(name),
            exists: true,
        });
    }

    Ok(ResolvedPath {
        absolute: canonical,
        relative,
        exists: true,
    })
}

fn resolve_missing_leaf(
    canonical_root: &Path,
    raw: &str,
    joined: &Path,
    lexical_relative: &Path,
) -> Result<ResolvedPath> {
    let name = match joined.components().next_back() {
        Some(Component::Normal(name)) => name,
        _ => return Err(Error::NotFound(lexical_relative.to_path_buf())),
    };
    let parent = joined
        .parent()
        .ok_or_else(|| Error::NotFound(lexical_relative.to_path_buf()))?;
    let parent_relative_hint = lexical_relative
        .parent()
        .map(display_relative)
        .unwrap_or_else(|| PathBuf::from("."));

    let canonical_parent = parent
        .canonicalize()
        .map_err(|err| Error::io_path("canonicalize", &parent_relative_hint, err))?;
    let parent_relative =
        strip_root(&canonical_parent, canonical_root).ok_or_else(|| outside_root(raw))?;

    let parent_meta = fs::metadata(&canonical_parent)
        .map_err(|err| Error::io_path("metadata", &parent_relative_hint, err))?;
    if !parent_meta.is_dir() {
        return Err(Error::InvalidPath(format!(
            "parent of {} is not a directory",
            lexical_relative.display()
        )));
    }

    let candidate = canonical_parent.join(name);
    let exists = match fs::symlink_metadata(&candidate) {
        Ok(meta) if meta.file_type().is_symlink() => {
            // Dangling link: judge it by where it would point.
            let target = fs::read_link(&candidate)
                .map_err(|err| Error::io_path("read_link", lexical_relative, err))?;
            let target = if target.is_absolute() {
                target
            } else {
                canonical_parent.join(target)
            };
            if !is_within_root(&normalize_path_lexical(&target), canonical_root) {
                tracing::debug!(raw, "dangling symlink points outside root");
                return Err(outside_root(raw));
            }
            true
        }
        Ok(_) => true,
        Err(_) => false,
    };

    Ok(ResolvedPath {
        absolute: candidate,
        relative: parent_relative.join(name),
        exists,
    })
}
