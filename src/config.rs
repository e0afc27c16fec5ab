use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathRules {
    /// Whether absolute request paths are accepted.
    ///
    /// Absolute paths are still subject to the same containment checks as relative ones; when
    /// `false`, all request paths must be root-relative.
    #[serde(default = "default_allow_absolute_paths")]
    pub allow_absolute: bool,
}

const fn default_allow_absolute_paths() -> bool {
    true
}

impl Default for PathRules {
    fn default() -> Self {
        Self {
            allow_absolute: default_allow_absolute_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadRules {
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: u64,
    /// Lowercase extensions (without the dot) accepted for upload.
    ///
    /// An empty list accepts every extension not in `deny_extensions`.
    #[serde(default = "default_allow_extensions")]
    pub allow_extensions: Vec<String>,
    /// Lowercase extensions (without the dot) that are always refused, even when allow-listed.
    #[serde(default = "default_deny_extensions")]
    pub deny_extensions: Vec<String>,
}

const fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_allow_extensions() -> Vec<String> {
    [
        "jpg", "jpeg", "png", "gif", "pdf", "doc", "docx", "txt", "zip", "rar",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_deny_extensions() -> Vec<String> {
    [
        "php", "php3", "php4", "php5", "phtml", "phar", "cgi", "pl", "exe", "bat", "cmd", "com",
        "sh", "htaccess",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
            allow_extensions: default_allow_extensions(),
            deny_extensions: default_deny_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    #[serde(default = "default_max_list_entries")]
    pub max_list_entries: usize,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    /// Upper bound for `read_file` (downloads).
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: u64,
    /// Upper bound for content saved through `write_file`.
    #[serde(default = "default_max_write_bytes")]
    pub max_write_bytes: u64,
}

const fn default_max_list_entries() -> usize {
    10_000
}

const fn default_max_search_results() -> usize {
    2000
}

const fn default_max_read_bytes() -> u64 {
    10 * 1024 * 1024
}

const fn default_max_write_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_list_entries: default_max_list_entries(),
            max_search_results: default_max_search_results(),
            max_read_bytes: default_max_read_bytes(),
            max_write_bytes: default_max_write_bytes(),
        }
    }
}

const fn default_dir_mode() -> u32 {
    0o755
}

// Hard caps are guardrails against misconfiguration.
const MAX_UPLOAD_BYTES_HARD_CAP: u64 = 4 * 1024 * 1024 * 1024;
const MAX_READ_BYTES_HARD_CAP: u64 = 256 * 1024 * 1024;
const MAX_WRITE_BYTES_HARD_CAP: u64 = 256 * 1024 * 1024;
const MAX_LIST_ENTRIES_HARD_CAP: usize = 1_000_000;
const MAX_SEARCH_RESULTS_HARD_CAP: usize = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// The sandbox root. Must be absolute; canonicalized by `Context::new`. `config_io` anchors a
    /// relative root in a config file at that file's directory.
    pub root: PathBuf,
    /// Permission bits for directories created by `create_directory` (unix only).
    #[serde(default = "default_dir_mode")]
    pub dir_mode: u32,
    #[serde(default)]
    pub paths: PathRules,
    #[serde(default)]
    pub upload: UploadRules,
    #[serde(default)]
    pub limits: Limits,
}

fn validate_u64_limit(value: u64, field: &str, hard_cap: u64) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidConfig(format!("{field} must be > 0")));
    }
    if value > hard_cap {
        return Err(Error::InvalidConfig(format!(
            "{field} must be <= {hard_cap}"
        )));
    }
    Ok(())
}

fn validate_usize_limit(value: usize, field: &str, hard_cap: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidConfig(format!("{field} must be > 0")));
    }
    if value > hard_cap {
        return Err(Error::InvalidConfig(format!(
            "{field} must be <= {hard_cap}"
        )));
    }
    Ok(())
}

fn validate_extensions(list: &[String], field: &str) -> Result<()> {
    for ext in list {
        if ext.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{field} contains an empty extension"
            )));
        }
        if ext.contains(['.', '/', '\\']) {
            return Err(Error::InvalidConfig(format!(
                "{field} entry {ext:?} must be a bare extension without dots or separators"
            )));
        }
        if ext.chars().any(char::is_uppercase) {
            return Err(Error::InvalidConfig(format!(
                "{field} entry {ext:?} must be lowercase"
            )));
        }
    }
    Ok(())
}

impl EngineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir_mode: default_dir_mode(),
            paths: PathRules::default(),
            upload: UploadRules::default(),
            limits: Limits::default(),
        }
    }

    /// Structural validation only: it does **not** touch the filesystem.
    ///
    /// Root existence and directory checks happen in `ops::Context::new`, which also
    /// canonicalizes the configured root.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("root is empty".to_string()));
        }
        if !self.root.is_absolute() {
            return Err(Error::InvalidConfig(format!(
                "root must be absolute (root={})",
                self.root.display()
            )));
        }
        if self.dir_mode > 0o7777 {
            return Err(Error::InvalidConfig(format!(
                "dir_mode must be <= 0o7777 (got {:#o})",
                self.dir_mode
            )));
        }
        validate_u64_limit(
            self.upload.max_bytes,
            "upload.max_bytes",
            MAX_UPLOAD_BYTES_HARD_CAP,
        )?;
        validate_u64_limit(
            self.limits.max_read_bytes,
            "limits.max_read_bytes",
            MAX_READ_BYTES_HARD_CAP,
        )?;
        validate_u64_limit(
            self.limits.max_write_bytes,
            "limits.max_write_bytes",
            MAX_WRITE_BYTES_HARD_CAP,
        )?;
        validate_usize_limit(
            self.limits.max_list_entries,
            "limits.max_list_entries",
            MAX_LIST_ENTRIES_HARD_CAP,
        )?;
        validate_usize_limit(
            self.limits.max_search_results,
            "limits.max_search_results",
            MAX_SEARCH_RESULTS_HARD_CAP,
        )?;
        validate_extensions(&self.upload.allow_extensions, "upload.allow_extensions")?;
        validate_extensions(&self.upload.deny_extensions, "upload.deny_extensions")?;
        Ok(())
    }
}
