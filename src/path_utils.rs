//! Lexical path helpers shared by the resolver and the tree operations.
//!
//! Nothing in this module touches the filesystem. Containment decisions made here are only the
//! first gate; `ops::resolve` always re-checks against canonicalized, symlink-resolved paths.
//!
//! Invariants of `normalize_path_lexical`:
//! - Removes `.` segments.
//! - Resolves `..` against preceding *normal* segments when possible.
//! - Preserves leading `..` for relative paths (e.g. `../../a/../b` → `../../b`).
//! - For absolute paths, `..` cannot escape the filesystem root (e.g. `/../etc` → `/etc`).
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

pub(crate) fn normalize_path_lexical(path: &Path) -> PathBuf {
    enum Segment {
        ParentDir,
        Normal(OsString),
    }

    let mut path_prefix: Option<OsString> = None;
    let mut has_root = false;
    let mut segments: Vec<Segment> = Vec::new();

    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(segments.last(), Some(Segment::Normal(_))) {
                    segments.pop();
                } else if !has_root {
                    segments.push(Segment::ParentDir);
                }
            }
            Component::Normal(part) => segments.push(Segment::Normal(part.to_os_string())),
            Component::RootDir => has_root = true,
            Component::Prefix(prefix) => {
                path_prefix = Some(prefix.as_os_str().to_os_string());
            }
        }
    }

    let mut out = PathBuf::new();
    if let Some(prefix) = path_prefix {
        out.push(Path::new(&prefix));
    }
    if has_root {
        // On Windows, pushing `RootDir` after `Prefix` would reset the path (dropping the
        // prefix). Append a separator instead.
        #[cfg(windows)]
        out.as_mut_os_string()
            .push(std::path::MAIN_SEPARATOR.to_string());
        #[cfg(not(windows))]
        out.push("/");
    }
    for segment in segments {
        match segment {
            Segment::ParentDir => out.push(".."),
            Segment::Normal(part) => out.push(part),
        }
    }

    if out.as_os_str().is_empty() && path.is_relative() {
        PathBuf::from(".")
    } else {
        out
    }
}

#[cfg(windows)]
fn os_str_eq(a: &OsStr, b: &OsStr) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

#[cfg(not(windows))]
fn os_str_eq(a: &OsStr, b: &OsStr) -> bool {
    a == b
}

fn components_eq(a: Component<'_>, b: Component<'_>) -> bool {
    match (a, b) {
        (Component::Prefix(a), Component::Prefix(b)) => os_str_eq(a.as_os_str(), b.as_os_str()),
        (Component::RootDir, Component::RootDir) => true,
        (Component::CurDir, Component::CurDir) => true,
        (Component::ParentDir, Component::ParentDir) => true,
        (Component::Normal(a), Component::Normal(b)) => os_str_eq(a, b),
        _ => false,
    }
}

/// Returns the remainder of `path` below `root`, or `None` when `path` is not `root` itself or
/// a descendant of it.
///
/// The comparison is component-wise, so a match always ends on a separator boundary:
/// `/srv/files-evil` is *not* below `/srv/files`. Both inputs are normalized lexically first.
/// Comparison is case-insensitive on Windows.
pub fn strip_root(path: &Path, root: &Path) -> Option<PathBuf> {
    let path = normalize_path_lexical(path);
    let root = normalize_path_lexical(root);

    let mut path_components = path.components();
    for root_comp in root.components() {
        let path_comp = path_components.next()?;
        if !components_eq(path_comp, root_comp) {
            return None;
        }
    }
    Some(path_components.as_path().to_path_buf())
}

/// `true` when `path` equals `root` or lies below it on a separator boundary.
pub fn is_within_root(path: &Path, root: &Path) -> bool {
    strip_root(path, root).is_some()
}

/// Validates a caller-supplied single entry name (new folder name, rename target, upload name).
///
/// Returns the trimmed name. Rejects empty names, `.`/`..`, NUL bytes and anything containing a
/// path separator.
pub(crate) fn validate_entry_name<'a>(raw: &'a str, what: &str) -> Result<&'a str, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }
    if name == "." || name == ".." {
        return Err(format!("invalid {what} {name:?}"));
    }
    if name.contains('\0') {
        return Err(format!("invalid {what} {name:?}: contains NUL byte"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(format!("invalid {what} {name:?}: must not contain path separators"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(format!("invalid {what} {name:?}")),
    }
}

/// Root-relative display form: the root itself is reported as `.`.
pub(crate) fn display_relative(relative: &Path) -> PathBuf {
    if relative.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        relative.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_lexical_dot_is_stable() {
        assert_eq!(normalize_path_lexical(Path::new(".")), PathBuf::from("."));
        assert_eq!(
            normalize_path_lexical(Path::new("././")),
            PathBuf::from(".")
        );
        assert_eq!(
            normalize_path_lexical(Path::new("a/..")),
            PathBuf::from(".")
        );
        assert_eq!(normalize_path_lexical(Path::new("")), PathBuf::from("."));
    }

    #[test]
    fn normalize_path_lexical_keeps_leading_parent_segments() {
        assert_eq!(
            normalize_path_lexical(Path::new("../../a/../b")),
            PathBuf::from("../../b")
        );
    }

    #[test]
    #[cfg(not(windows))]
    fn normalize_path_lexical_handles_absolute_paths() {
        assert_eq!(
            normalize_path_lexical(Path::new("/../etc")),
            PathBuf::from("/etc")
        );
        assert_eq!(
            normalize_path_lexical(Path::new("/a/./b//c")),
            PathBuf::from("/a/b/c")
        );
    }

    #[test]
    #[cfg(not(windows))]
    fn strip_root_respects_separator_boundary() {
        let root = Path::new("/srv/files");
        assert_eq!(strip_root(Path::new("/srv/files"), root), Some(PathBuf::new()));
        assert_eq!(
            strip_root(Path::new("/srv/files/a/b"), root),
            Some(PathBuf::from("a/b"))
        );
        assert_eq!(strip_root(Path::new("/srv/files-evil"), root), None);
        assert_eq!(strip_root(Path::new("/srv/files-evil/x"), root), None);
        assert_eq!(strip_root(Path::new("/srv"), root), None);
    }

    #[test]
    #[cfg(not(windows))]
    fn strip_root_normalizes_before_comparing() {
        let root = Path::new("/srv/files");
        assert_eq!(strip_root(Path::new("/srv/files/a/../../etc"), root), None);
        assert!(is_within_root(Path::new("/srv/./files//a"), root));
    }

    #[test]
    #[cfg(windows)]
    fn strip_root_is_case_insensitive_on_windows() {
        assert_eq!(
            strip_root(Path::new(r"C:\Files\Bar"), Path::new(r"c:\files")),
            Some(PathBuf::from("Bar"))
        );
    }

    #[test]
    fn validate_entry_name_accepts_plain_names() {
        assert_eq!(validate_entry_name("  notes.txt ", "name"), Ok("notes.txt"));
        assert_eq!(validate_entry_name(".hidden", "name"), Ok(".hidden"));
    }

    #[test]
    fn validate_entry_name_rejects_traversal_and_separators() {
        for bad in ["", "   ", ".", "..", "a/b", "..\\x", "a\0b"] {
            assert!(
                validate_entry_name(bad, "name").is_err(),
                "expected {bad:?} to be rejected"
            );
        }
    }
}
