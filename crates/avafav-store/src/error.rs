use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Everything the collection store can trip over
#[derive(Error, Debug)]
pub enum StoreError {
    /// Another process (or connection) holds a lock on the file.
    /// We never wait for it (busy_timeout is zero).
    #[error("Store file is locked by another process: {}", path.display())]
    Locked { path: PathBuf },

    #[error("Document in '{collection}' has no key yet - insert it first")]
    Unassigned { collection: &'static str },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Document encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_locked(&self) -> bool {
        matches!(self, StoreError::Locked { .. })
    }
}

/// Attach the file path to raw SQLite failures, promoting BUSY/LOCKED to `Locked`
pub(crate) trait SqliteResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                StoreError::Locked {
                    path: path.to_path_buf(),
                }
            }
            _ => StoreError::Sqlite(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_becomes_locked() {
        let busy: rusqlite::Result<()> = Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        let err = busy.at(Path::new("favorites.db")).unwrap_err();
        assert!(err.is_locked());
        assert!(err.to_string().contains("favorites.db"));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let failed: rusqlite::Result<()> = Err(rusqlite::Error::QueryReturnedNoRows);
        let err = failed.at(Path::new("favorites.db")).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
