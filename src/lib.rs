//! `safe-fm` is a path-safe file-operations engine for web-style file managers.
//!
//! Every caller-supplied path is resolved against one sandbox root and proven to stay inside it
//! before anything touches the filesystem. On top of that sit tree mutations (mkdir, delete,
//! rename, copy, move), validated uploads, directory listing and a lazy recursive search, plus a
//! request boundary ([`api`]) that wraps results in uniform JSON envelopes.

pub mod api;
pub mod config;
#[cfg(feature = "config-io")]
pub mod config_io;
mod error;
pub mod ops;
pub mod path_utils;
mod platform {
    pub(crate) mod rename;
}

pub use api::{Action, AuthContext, ErrorBody, FileManager, OpResult};
pub use config::{EngineConfig, Limits, PathRules, UploadRules};
pub use error::{Error, PathFailure, Result};
pub use ops::{
    AcceptedName, Context, CopyResponse, DeleteKind, DeleteResponse, DirEntry, EntryKind,
    ListDirResponse, MkdirResponse, MoveMethod, MoveResponse, ReadResponse, RenameResponse,
    ResolvedPath, Search, SearchResponse, StatKind, StatResponse, UploadDescriptor,
    WriteFileResponse,
};
