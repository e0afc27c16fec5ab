use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use safe_fm::api::{AuthContext, FileManager, OpResult};
use safe_fm::ops::{Context, UploadDescriptor};
use safe_fm::{EngineConfig, Error, Result};

const MAX_REQUEST_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "safe-fm")]
#[command(about = "Path-safe file manager operations confined to one sandbox root.")]
struct Cli {
    /// Config file (.toml or .json).
    #[arg(long, conflicts_with = "root")]
    config: Option<PathBuf>,

    /// Sandbox root, using default rules; alternative to --config.
    #[arg(long, required_unless_present = "config")]
    root: Option<PathBuf>,

    /// Refuse every mutating command.
    #[arg(long, default_value_t = false)]
    read_only: bool,

    #[arg(long, default_value_t = false)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    List {
        #[arg(default_value = "")]
        path: String,
    },
    Mkdir {
        parent: String,
        name: String,
    },
    Rename {
        from: String,
        to_name: String,
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
    /// Upload a local file into a directory under the root.
    Upload {
        parent: String,
        file: PathBuf,
        /// Stored name; defaults to the local file name.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Save the content of a local file (or stdin with `-`) as the file at `path`.
    Write {
        path: String,
        source: PathBuf,
    },
    Search {
        query: String,
        #[arg(long, default_value = "")]
        path: String,
    },
    Stat {
        path: String,
    },
    Download {
        file: String,
        /// Write the content here (must not exist) instead of embedding it in the JSON output.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run one JSON request (`{"action": ...}`); `-` reads it from stdin.
    Request {
        json: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match build_manager(&cli) {
        Ok(manager) => run(&cli, &manager),
        Err(err) => OpResult::failure(&err),
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    };
    match rendered {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("json error: {err}");
            std::process::exit(1);
        }
    }
    if !result.success {
        std::process::exit(1);
    }
}

fn build_manager(cli: &Cli) -> Result<FileManager> {
    let config = match (&cli.config, &cli.root) {
        (Some(path), _) => safe_fm::config_io::load_config(path)?,
        (None, Some(root)) => EngineConfig::new(absolute(root)?),
        (None, None) => {
            return Err(Error::InvalidConfig(
                "either --config or --root is required".to_string(),
            ));
        }
    };
    Ok(FileManager::new(Context::new(config)?))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn run(cli: &Cli, manager: &FileManager) -> OpResult<serde_json::Value> {
    let auth = AuthContext {
        can_write: !cli.read_only,
    };
    match &cli.command {
        Command::List { path } => manager.list(path).into_json(),
        Command::Mkdir { parent, name } => manager.create_directory(auth, parent, name).into_json(),
        Command::Rename { from, to_name } => manager.rename(auth, from, to_name).into_json(),
        Command::Delete { target } => manager.delete(auth, target).into_json(),
        Command::Copy { from, to } => manager.copy(auth, from, to).into_json(),
        Command::Move { from, to } => manager.move_path(auth, from, to).into_json(),
        Command::Upload {
            parent,
            file,
            name,
            content_type,
        } => match open_upload(file, name.as_deref(), content_type.clone()) {
            Ok(descriptor) => manager.upload(auth, parent, descriptor).into_json(),
            Err(err) => OpResult::failure(&err),
        },
        Command::Write { path, source } => {
            let max_bytes = manager.context().config().limits.max_write_bytes;
            match read_capped(source, max_bytes) {
                Ok(content) => manager.write_file(auth, path, &content).into_json(),
                Err(err) => OpResult::failure(&err),
            }
        }
        Command::Search { query, path } => manager.search(path, query).into_json(),
        Command::Stat { path } => manager.stat(path).into_json(),
        Command::Download { file, output } => {
            let result = manager.download(file);
            if let (Some(output), Some(data)) = (output, result.data.as_ref())
                && let Err(err) = write_new_file(output, &data.content)
            {
                return OpResult::failure(&err);
            }
            result.into_json()
        }
        Command::Request { json } => match load_request(json) {
            Ok(raw) => manager.handle_json(auth, &raw),
            Err(err) => OpResult::failure(&err),
        },
    }
}

fn open_upload(
    path: &Path,
    name: Option<&str>,
    content_type: Option<String>,
) -> Result<UploadDescriptor<std::fs::File>> {
    let file = std::fs::File::open(path).map_err(|err| Error::IoPath {
        op: "open",
        path: path.to_path_buf(),
        source: err,
    })?;
    let meta = file.metadata().map_err(|err| Error::IoPath {
        op: "metadata",
        path: path.to_path_buf(),
        source: err,
    })?;
    if !meta.is_file() {
        return Err(Error::InvalidPath(format!(
            "path {} is not a regular file",
            path.display()
        )));
    }
    let filename = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    Ok(UploadDescriptor {
        filename,
        size: meta.len(),
        content_type,
        source: file,
    })
}

fn write_new_file(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .and_then(|mut file| file.write_all(content))
        .map_err(|err| Error::WriteFailed {
            path: path.to_path_buf(),
            source: err,
        })
}

/// Reads `source` (`-` for stdin) up to `max_bytes`; one byte more is a `TooLarge` error.
fn read_capped(source: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    let limit = max_bytes.saturating_add(1);
    let mut bytes = Vec::<u8>::new();
    if source == Path::new("-") {
        std::io::stdin().take(limit).read_to_end(&mut bytes)?;
    } else {
        std::fs::File::open(source)
            .and_then(|file| file.take(limit).read_to_end(&mut bytes))
            .map_err(|err| Error::IoPath {
                op: "read",
                path: source.to_path_buf(),
                source: err,
            })?;
    }
    if bytes.len() as u64 > max_bytes {
        return Err(Error::TooLarge {
            name: source.display().to_string(),
            size_bytes: bytes.len() as u64,
            max_bytes,
        });
    }
    Ok(bytes)
}

fn load_request(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let bytes = read_capped(Path::new("-"), MAX_REQUEST_BYTES)?;
    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidPath("request is not valid utf-8".to_string()))
}
