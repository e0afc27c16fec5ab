//! Request boundary: raw caller strings in, uniform [`OpResult`] envelopes out.
//!
//! [`FileManager`] resolves every path through the engine, enforces write authorization from an
//! explicit [`AuthContext`], and converts engine errors into `{code, message, failures}` bodies.
//! [`FileManager::handle`] dispatches one serde-tagged [`Action`], which is what the CLI's
//! `request` subcommand feeds it.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{Error, PathFailure, Result};
use crate::ops::{
    AcceptedName, Context, CopyResponse, DeleteResponse, ListDirResponse, MkdirResponse,
    MoveResponse, ReadResponse, RenameResponse, SearchResponse, StatResponse, UploadDescriptor,
    WriteFileResponse,
};

/// Who is asking. Passed explicitly to every call; there is no ambient session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub can_write: bool,
}

impl AuthContext {
    pub const fn read_only() -> Self {
        Self { can_write: false }
    }

    pub const fn read_write() -> Self {
        Self { can_write: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PathFailure>,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            failures: err.failures().to_vec(),
        }
    }
}

/// Uniform response envelope: `{success, message, data?, error?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpResult<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> OpResult<T> {
    pub fn from_result(result: Result<T>, success_message: &str) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                message: success_message.to_string(),
                data: Some(data),
                error: None,
            },
            Err(err) => Self::failure(&err),
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            data: None,
            error: Some(ErrorBody::from(err)),
        }
    }
}

impl<T: Serialize> OpResult<T> {
    /// Re-types the payload as JSON. A payload that fails to serialize becomes a `json` error.
    pub fn into_json(self) -> OpResult<serde_json::Value> {
        let Self {
            success,
            message,
            data,
            error,
        } = self;
        match data.map(serde_json::to_value).transpose() {
            Ok(data) => OpResult {
                success,
                message,
                data,
                error,
            },
            Err(err) => OpResult::failure(&Error::Json(err)),
        }
    }
}

/// One request, as decoded from `{"action": "...", ...}`.
///
/// Field names follow the form fields of the web file manager this engine backs: `parent` for
/// the directory an entry is created in, `target` for a delete, `file` for a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    List {
        #[serde(default)]
        path: String,
    },
    #[serde(alias = "create_directory")]
    CreateFolder {
        #[serde(default)]
        parent: String,
        name: String,
    },
    Rename {
        from: String,
        to: String,
    },
    Delete {
        target: String,
    },
    Copy {
        from: String,
        to: String,
    },
    Move {
        from: String,
        to: String,
    },
    /// Text upload; binary uploads go through [`FileManager::upload`] with a reader.
    Upload {
        #[serde(default)]
        parent: String,
        filename: String,
        content: String,
        #[serde(default)]
        content_type: Option<String>,
    },
    /// Saves text as the whole content of a file, creating it if needed.
    WriteFile {
        path: String,
        content: String,
    },
    Search {
        #[serde(default)]
        path: String,
        query: String,
    },
    Stat {
        path: String,
    },
    Download {
        file: String,
    },
}

impl Action {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::CreateFolder { .. } => "create_folder",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
            Self::Copy { .. } => "copy",
            Self::Move { .. } => "move",
            Self::Upload { .. } => "upload",
            Self::WriteFile { .. } => "write_file",
            Self::Search { .. } => "search",
            Self::Stat { .. } => "stat",
            Self::Download { .. } => "download",
        }
    }

    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::CreateFolder { .. }
                | Self::Rename { .. }
                | Self::Delete { .. }
                | Self::Copy { .. }
                | Self::Move { .. }
                | Self::Upload { .. }
                | Self::WriteFile { .. }
        )
    }
}

fn require_write(auth: AuthContext, op: &str) -> Result<()> {
    if auth.can_write {
        return Ok(());
    }
    tracing::debug!(op, "write refused: caller lacks write permission");
    Err(Error::NotPermitted(format!(
        "{op} is not allowed: caller lacks write permission"
    )))
}

/// The engine behind a request boundary.
#[derive(Debug)]
pub struct FileManager {
    ctx: Context,
}

impl FileManager {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn list(&self, path: &str) -> OpResult<ListDirResponse> {
        let result = self
            .ctx
            .resolve(path)
            .and_then(|dir| self.ctx.list_dir(&dir));
        OpResult::from_result(result, "Listed successfully")
    }

    pub fn create_directory(
        &self,
        auth: AuthContext,
        parent: &str,
        name: &str,
    ) -> OpResult<MkdirResponse> {
        let result = require_write(auth, "create_folder")
            .and_then(|()| self.ctx.resolve(parent))
            .and_then(|parent| self.ctx.create_directory(&parent, name));
        OpResult::from_result(result, "Folder created successfully")
    }

    pub fn rename(&self, auth: AuthContext, from: &str, to_name: &str) -> OpResult<RenameResponse> {
        let result = require_write(auth, "rename")
            .and_then(|()| self.ctx.resolve(from))
            .and_then(|from| self.ctx.rename(&from, to_name));
        OpResult::from_result(result, "Renamed successfully")
    }

    pub fn delete(&self, auth: AuthContext, target: &str) -> OpResult<DeleteResponse> {
        let result = require_write(auth, "delete")
            .and_then(|()| self.ctx.resolve(target))
            .and_then(|target| self.ctx.delete(&target));
        OpResult::from_result(result, "Deleted successfully")
    }

    pub fn copy(&self, auth: AuthContext, from: &str, to: &str) -> OpResult<CopyResponse> {
        let result = require_write(auth, "copy").and_then(|()| {
            let from = self.ctx.resolve(from)?;
            let to = self.ctx.resolve(to)?;
            self.ctx.copy(&from, &to)
        });
        OpResult::from_result(result, "Copied successfully")
    }

    pub fn move_path(&self, auth: AuthContext, from: &str, to: &str) -> OpResult<MoveResponse> {
        let result = require_write(auth, "move").and_then(|()| {
            let from = self.ctx.resolve(from)?;
            let to = self.ctx.resolve(to)?;
            self.ctx.move_path(&from, &to)
        });
        OpResult::from_result(result, "Moved successfully")
    }

    pub fn upload<R: Read>(
        &self,
        auth: AuthContext,
        parent: &str,
        descriptor: UploadDescriptor<R>,
    ) -> OpResult<AcceptedName> {
        let result = require_write(auth, "upload")
            .and_then(|()| self.ctx.resolve(parent))
            .and_then(|dir| self.ctx.accept_upload(&dir, descriptor));
        OpResult::from_result(result, "File uploaded successfully")
    }

    pub fn write_file(
        &self,
        auth: AuthContext,
        path: &str,
        content: &[u8],
    ) -> OpResult<WriteFileResponse> {
        let result = require_write(auth, "write_file")
            .and_then(|()| self.ctx.resolve(path))
            .and_then(|path| self.ctx.write_file(&path, content));
        OpResult::from_result(result, "File saved successfully")
    }

    /// Runs a search to completion, keeping at most `limits.max_search_results` matches.
    pub fn search(&self, path: &str, query: &str) -> OpResult<SearchResponse> {
        let result = self.ctx.resolve(path).and_then(|dir| {
            let max_results = self.ctx.config().limits.max_search_results;
            let mut search = self.ctx.search(&dir, query)?;
            let entries: Vec<_> = search.by_ref().take(max_results).collect();
            // One extra match tells a full page apart from a cut-off one.
            let truncated = entries.len() == max_results && search.next().is_some();
            Ok(SearchResponse {
                query: query.to_string(),
                relative_path: dir.relative().to_path_buf(),
                entries,
                failures: search.into_failures(),
                truncated,
            })
        });
        OpResult::from_result(result, "Search completed")
    }

    pub fn stat(&self, path: &str) -> OpResult<StatResponse> {
        let result = self
            .ctx
            .resolve(path)
            .and_then(|path| self.ctx.stat(&path));
        OpResult::from_result(result, "File details loaded")
    }

    pub fn download(&self, file: &str) -> OpResult<ReadResponse> {
        let result = self
            .ctx
            .resolve(file)
            .and_then(|file| self.ctx.read_file(&file));
        OpResult::from_result(result, "File ready for download")
    }

    /// Dispatches one decoded request.
    pub fn handle(&self, auth: AuthContext, action: Action) -> OpResult<serde_json::Value> {
        tracing::debug!(action = action.name(), can_write = auth.can_write, "handling request");
        match action {
            Action::List { path } => self.list(&path).into_json(),
            Action::CreateFolder { parent, name } => {
                self.create_directory(auth, &parent, &name).into_json()
            }
            Action::Rename { from, to } => self.rename(auth, &from, &to).into_json(),
            Action::Delete { target } => self.delete(auth, &target).into_json(),
            Action::Copy { from, to } => self.copy(auth, &from, &to).into_json(),
            Action::Move { from, to } => self.move_path(auth, &from, &to).into_json(),
            Action::Upload {
                parent,
                filename,
                content,
                content_type,
            } => {
                let descriptor = UploadDescriptor {
                    filename,
                    size: content.len() as u64,
                    content_type,
                    source: content.as_bytes(),
                };
                self.upload(auth, &parent, descriptor).into_json()
            }
            Action::WriteFile { path, content } => {
                self.write_file(auth, &path, content.as_bytes()).into_json()
            }
            Action::Search { path, query } => self.search(&path, &query).into_json(),
            Action::Stat { path } => self.stat(&path).into_json(),
            Action::Download { file } => self.download(&file).into_json(),
        }
    }

    /// Decodes a JSON request and dispatches it. Malformed requests come back as a failed
    /// `OpResult` with code `json`.
    pub fn handle_json(&self, auth: AuthContext, raw: &str) -> OpResult<serde_json::Value> {
        match serde_json::from_str::<Action>(raw) {
            Ok(action) => self.handle(auth, action),
            Err(err) => OpResult::failure(&Error::Json(err)),
        }
    }
}
