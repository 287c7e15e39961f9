//! Tracing setup: human-readable stderr plus JSON access and error logs.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const ACCESS_LOG: &str = "access.log";
pub const ERRORS_LOG: &str = "errors.log";

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("cannot create log folder {}: {source}", .path.display())]
    Folder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create log file {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot install tracing subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Handle for the installed subscriber. Owned by `main` for the life of
/// the process.
#[derive(Debug)]
pub struct LogGuard {
    folder: PathBuf,
}

impl LogGuard {
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn access_log(&self) -> PathBuf {
        self.folder.join(ACCESS_LOG)
    }

    pub fn errors_log(&self) -> PathBuf {
        self.folder.join(ERRORS_LOG)
    }
}

/// Create `folder`, truncate both log files, and install the global
/// subscriber. `RUST_LOG` takes precedence over `level` for stderr.
pub fn init(folder: &Path, level: &str) -> Result<LogGuard, LoggingError> {
    std::fs::create_dir_all(folder).map_err(|source| LoggingError::Folder {
        path: folder.to_path_buf(),
        source,
    })?;
    let access = create_log(&folder.join(ACCESS_LOG))?;
    let errors = create_log(&folder.join(ERRORS_LOG))?;

    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(stderr_filter),
        )
        .with(
            fmt::layer()
                .json()
                .with_writer(Mutex::new(access))
                .with_filter(LevelFilter::INFO),
        )
        .with(
            fmt::layer()
                .json()
                .with_writer(Mutex::new(errors))
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()?;

    Ok(LogGuard {
        folder: folder.to_path_buf(),
    })
}

fn create_log(path: &Path) -> Result<File, LoggingError> {
    File::create(path).map_err(|source| LoggingError::File {
        path: path.to_path_buf(),
        source,
    })
}
