use std::fs;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::error::{Error, Result};

use super::{
    AcceptedName, Context, CopyResponse, DeleteResponse, ListDirResponse, MkdirResponse,
    MoveResponse, ReadResponse, RenameResponse, ResolvedPath, Search, StatResponse,
    UploadDescriptor, WriteFileResponse,
};

impl Context {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let canonical_root = config.root.canonicalize().map_err(|err| {
            Error::InvalidConfig(format!(
                "failed to canonicalize root ({}): {err}",
                config.root.display()
            ))
        })?;
        let meta = fs::metadata(&canonical_root).map_err(|err| {
            Error::InvalidConfig(format!(
                "failed to stat root ({}): {err}",
                canonical_root.display()
            ))
        })?;
        if !meta.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "root ({}) is not a directory",
                canonical_root.display()
            )));
        }

        tracing::debug!(root = %canonical_root.display(), "sandbox root ready");
        Ok(Self {
            config,
            canonical_root,
        })
    }

    #[cfg(feature = "config-io")]
    pub fn from_config_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = crate::config_io::load_config(path)?;
        Self::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.canonical_root
    }

    pub fn resolve(&self, raw: &str) -> Result<ResolvedPath> {
        super::resolve(self, raw)
    }

    pub fn list_dir(&self, dir: &ResolvedPath) -> Result<ListDirResponse> {
        super::list_dir(self, dir)
    }

    pub fn search(&self, dir: &ResolvedPath, query: &str) -> Result<Search<'_>> {
        super::search(self, dir, query)
    }

    pub fn stat(&self, path: &ResolvedPath) -> Result<StatResponse> {
        super::stat(self, path)
    }

    pub fn read_file(&self, path: &ResolvedPath) -> Result<ReadResponse> {
        super::read_file(self, path)
    }

    pub fn create_directory(&self, parent: &ResolvedPath, name: &str) -> Result<MkdirResponse> {
        super::create_directory(self, parent, name)
    }

    pub fn delete(&self, target: &ResolvedPath) -> Result<DeleteResponse> {
        super::delete(self, target)
    }

    pub fn rename(&self, from: &ResolvedPath, to_name: &str) -> Result<RenameResponse> {
        super::rename(self, from, to_name)
    }

    pub fn copy(&self, from: &ResolvedPath, to: &ResolvedPath) -> Result<CopyResponse> {
        super::copy(self, from, to)
    }

    pub fn move_path(&self, from: &ResolvedPath, to: &ResolvedPath) -> Result<MoveResponse> {
        super::move_path(self, from, to)
    }

    pub fn write_file(&self, path: &ResolvedPath, content: &[u8]) -> Result<WriteFileResponse> {
        super::write_file(self, path, content)
    }

    pub fn accept_upload<R: std::io::Read>(
        &self,
        destination_dir: &ResolvedPath,
        descriptor: UploadDescriptor<R>,
    ) -> Result<AcceptedName> {
        super::accept_upload(self, destination_dir, descriptor)
    }

    /// Root-relative form of an absolute path known to be inside the root.
    pub(super) fn relative_of(&self, absolute: &Path) -> PathBuf {
        crate::path_utils::strip_root(absolute, &self.canonical_root)
            .map(|relative| crate::path_utils::display_relative(&relative))
            .unwrap_or_else(|| absolute.to_path_buf())
    }
}
