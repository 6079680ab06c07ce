use faceclock_core::EnrollError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable at {}: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("known-faces I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("known-faces file {} is corrupt: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported known-faces format version {0}")]
    UnsupportedVersion(u32),
    #[error("enrollment rejected: {0}")]
    Enroll(#[from] EnrollError),
}
