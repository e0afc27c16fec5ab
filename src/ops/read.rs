use std::io::Read;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Context, ResolvedPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResponse {
    /// File name, suitable for a download's suggested name.
    pub name: String,
    pub relative_path: PathBuf,
    pub bytes_read: u64,
    pub mime: String,
    /// The content as text when it is valid UTF-8.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Raw content; base64 (standard alphabet, padded) on the wire.
    #[serde(with = "base64_content")]
    pub content: Vec<u8>,
}

mod base64_content {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Reads a whole regular file, refusing anything above `limits.max_read_bytes`.
pub fn read_file(ctx: &Context, path: &ResolvedPath) -> Result<ReadResponse> {
    let relative = path.relative().to_path_buf();
    let max_bytes = ctx.config.limits.max_read_bytes;

    let file = std::fs::File::open(path.as_path())
        .map_err(|err| Error::io_path("open", &relative, err))?;
    let meta = file
        .metadata()
        .map_err(|err| Error::io_path("metadata", &relative, err))?;
    if !meta.is_file() {
        return Err(Error::InvalidPath(format!(
            "path {} is not a regular file",
            relative.display()
        )));
    }
    let name = path
        .as_path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if meta.len() > max_bytes {
        return Err(Error::TooLarge {
            name,
            size_bytes: meta.len(),
            max_bytes,
        });
    }

    let mut content = Vec::<u8>::new();
    file.take(max_bytes.saturating_add(1))
        .read_to_end(&mut content)
        .map_err(|err| Error::io_path("read", &relative, err))?;
    let bytes_read = content.len() as u64;
    if bytes_read > max_bytes {
        // Grew while being read.
        return Err(Error::TooLarge {
            name,
            size_bytes: bytes_read,
            max_bytes,
        });
    }

    let mime = mime_guess::from_path(path.as_path())
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    tracing::debug!(path = %relative.display(), bytes_read, "file read");
    Ok(ReadResponse {
        text: std::str::from_utf8(&content).ok().map(str::to_string),
        name,
        relative_path: relative,
        bytes_read,
        mime,
        content,
    })
}
