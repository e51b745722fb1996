use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::media::MediaFetchError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("catalog query failed: {0}")]
    UpstreamQuery(#[from] youtube::Error),
    #[error(transparent)]
    MediaFetch(#[from] MediaFetchError),
    #[error("store operation failed: {0}")]
    Store(#[from] sqlx::Error),
    #[error("store migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("file system operation on {} failed: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(
        "{} serial(s) failed: {}",
        .0.len(),
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    Serials(Vec<SerialFailure>),
}

impl Error {
    /// Store level failures abort the whole run, everything else is scoped to a serial.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Migrate(_) | Error::Config(_))
    }

    /// A write lost against a concurrent insert of the same key.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Store(sqlx::Error::Database(err)) => err.is_unique_violation(),
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct SerialFailure {
    pub serial: String,
    pub error: Error,
}

impl fmt::Display for SerialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.serial, self.error)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type InternalError = anyhow::Error;
