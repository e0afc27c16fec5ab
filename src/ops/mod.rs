use std::path::PathBuf;

use crate::config::EngineConfig;

mod context;
mod copy;
mod delete;
mod list_dir;
mod mkdir;
mod move_path;
mod read;
mod rename;
mod resolve;
mod search;
mod stat;
mod upload;
mod write;

pub use copy::{CopyResponse, copy};
pub use delete::{DeleteKind, DeleteResponse, delete};
pub use list_dir::{DirEntry, EntryKind, ListDirResponse, list_dir};
pub use mkdir::{MkdirResponse, create_directory};
pub use move_path::{MoveMethod, MoveResponse, move_path};
pub use read::{ReadResponse, read_file};
pub use rename::{RenameResponse, rename};
pub use resolve::{ResolvedPath, resolve};
pub use search::{Search, SearchResponse, search};
pub use stat::{StatKind, StatResponse, stat};
pub use upload::{AcceptedName, UploadDescriptor, accept_upload};
pub use write::{WriteFileResponse, write_file};

/// The engine: an immutable sandbox root plus the rules every operation is checked against.
///
/// A `Context` holds no per-operation state; it can be shared freely across threads.
pub struct Context {
    config: EngineConfig,
    canonical_root: PathBuf,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.canonical_root)
            .field("max_upload_bytes", &self.config.upload.max_bytes)
            .finish_non_exhaustive()
    }
}

pub(crate) fn system_time_to_secs(value: std::time::SystemTime) -> Option<u64> {
    value
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|duration| duration.as_secs())
}

#[cfg(unix)]
pub(crate) fn permission_bits(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub(crate) fn permission_bits(_meta: &std::fs::Metadata) -> Option<u32> {
    None
}
