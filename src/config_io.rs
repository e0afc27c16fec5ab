//! Loading [`EngineConfig`] from a TOML or JSON file.
//!
//! A relative `root` in the file is taken relative to the directory holding the file, so a
//! config can sit next to the tree it serves and move with it.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{EngineConfig, Error, Result};

/// Config files are small; anything bigger than this is almost certainly the wrong file.
pub const DEFAULT_MAX_CONFIG_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// `.json` is JSON; `.toml` or no extension is TOML.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            None => Ok(Self::Toml),
            Some(other) => Err(Error::InvalidConfig(format!(
                "config file {} has extension {other:?}; use .toml or .json",
                path.display()
            ))),
        }
    }
}

/// Parses config text without touching the filesystem. `root` is taken as written.
pub fn parse_config(raw: &str, format: ConfigFormat) -> Result<EngineConfig> {
    let parsed = match format {
        ConfigFormat::Json => serde_json::from_str(raw).map_err(|err| err.to_string()),
        ConfigFormat::Toml => toml::from_str(raw).map_err(|err| err.to_string()),
    };
    parsed.map_err(|err| Error::InvalidConfig(format!("cannot parse {format:?} config: {err}")))
}

pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig> {
    load_config_with_limit(path, DEFAULT_MAX_CONFIG_BYTES)
}

/// Reads, parses, anchors and validates the config file at `path`.
pub fn load_config_with_limit(path: impl AsRef<Path>, max_bytes: u64) -> Result<EngineConfig> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let raw = read_config_text(path, max_bytes)?;
    let mut config = parse_config(&raw, format)?;
    config.root = anchor_root(&config.root, path)?;
    config.validate()?;
    tracing::debug!(config = %path.display(), root = %config.root.display(), "config loaded");
    Ok(config)
}

fn unreadable(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::InvalidConfig(format!("cannot read config file {}: {reason}", path.display()))
}

/// The file's text. Only a regular file (not a symlink to one) is accepted, and at most
/// `max_bytes` of it.
fn read_config_text(path: &Path, max_bytes: u64) -> Result<String> {
    let meta = std::fs::symlink_metadata(path).map_err(|err| unreadable(path, err))?;
    if meta.file_type().is_symlink() {
        return Err(unreadable(path, "it is a symlink"));
    }
    if !meta.is_file() {
        return Err(unreadable(path, "it is not a regular file"));
    }

    let mut bytes = Vec::<u8>::new();
    std::fs::File::open(path)
        .and_then(|file| file.take(max_bytes.saturating_add(1)).read_to_end(&mut bytes))
        .map_err(|err| unreadable(path, err))?;
    if bytes.len() as u64 > max_bytes {
        return Err(unreadable(path, format!("larger than {max_bytes} bytes")));
    }
    String::from_utf8(bytes).map_err(|err| {
        Error::InvalidConfig(format!(
            "config file {} is not UTF-8 (invalid byte at offset {})",
            path.display(),
            err.utf8_error().valid_up_to()
        ))
    })
}

/// Resolves a relative `root` against the directory that holds the config file.
fn anchor_root(root: &Path, config_path: &Path) -> Result<PathBuf> {
    if root.is_absolute() || root.as_os_str().is_empty() {
        return Ok(root.to_path_buf());
    }
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
    let config_dir = if config_dir.is_absolute() {
        config_dir.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|err| unreadable(config_path, err))?
            .join(config_dir)
    };
    Ok(crate::path_utils::normalize_path_lexical(&config_dir.join(root)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_fills_in_defaults() {
        let config = parse_config(
            r#"
root = "/srv/files"

[upload]
max_bytes = 1024
"#,
            ConfigFormat::Toml,
        )
        .expect("parse");
        assert_eq!(config.upload.max_bytes, 1024);
        assert!(config.upload.deny_extensions.iter().any(|ext| ext == "php"));
        assert!(config.paths.allow_absolute);
    }

    #[test]
    fn format_follows_the_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/engine.JSON")).expect("json"),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("engine")).expect("toml"),
            ConfigFormat::Toml
        );
        let err = ConfigFormat::from_path(Path::new("engine.yaml")).expect_err("yaml");
        assert_eq!(err.code(), "invalid_config");
    }

    #[test]
    fn relative_root_is_anchored_at_the_config_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"root": "files/../shared"}"#).expect("write");

        let config = load_config(&path).expect("load");
        assert_eq!(config.root, dir.path().join("shared"));
    }

    #[test]
    fn oversized_or_non_utf8_files_are_config_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "root = \"files\"\n").expect("write");

        let err = load_config_with_limit(&path, 4).expect_err("too large");
        assert_eq!(err.code(), "invalid_config");
        assert!(err.to_string().contains("larger than 4 bytes"), "{err}");

        std::fs::write(&path, b"root = \"\xff\"\n").expect("write");
        let err = load_config(&path).expect_err("not utf-8");
        assert_eq!(err.code(), "invalid_config");
        assert!(err.to_string().contains("offset 8"), "{err}");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_config(dir.path().join("absent.toml")).expect_err("missing");
        assert_eq!(err.code(), "invalid_config");
    }

    #[test]
    #[cfg(unix)]
    fn symlinked_config_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let real = dir.path().join("real.toml");
        std::fs::write(&real, "root = \"/srv\"\n").expect("write");
        let link = dir.path().join("link.toml");
        std::os::unix::fs::symlink(&real, &link).expect("symlink");

        let err = load_config(&link).expect_err("symlink");
        assert_eq!(err.code(), "invalid_config");
        assert!(err.to_string().contains("symlink"), "{err}");
    }
}
