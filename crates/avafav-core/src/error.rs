use avafav_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// All the ways a favorites call can go wrong
///
/// Lookups that find nothing are not errors - they come back as `None`,
/// `false` or an empty list. Failed calls are not retried internally (a
/// snapshot copy that raced a writer is re-taken, nothing else); if the game
/// client is sitting on a file, the caller decides when to try again.
#[derive(Error, Debug)]
pub enum Error {
    /// The file is held by someone else (usually the game client) and the
    /// caller didn't ask for a snapshot read
    #[error("Store file is locked by another process: {}", path.display())]
    LockConflict { path: PathBuf },

    #[error("Malformed input record: {0}")]
    MalformedInput(#[from] serde_json::Error),

    /// A response record couldn't be turned into JSON
    #[error("Failed to encode output: {0}")]
    Encoding(serde_json::Error),

    /// The live file kept changing while a snapshot copy was being taken
    #[error("Store file changed during every snapshot attempt: {}", path.display())]
    SnapshotUnstable { path: PathBuf },

    #[error("Store operation failed: {0}")]
    Store(StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Locked { path } => Error::LockConflict { path },
            other => Error::Store(other),
        }
    }
}

impl Error {
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, Error::LockConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_store_error_becomes_lock_conflict() {
        let err: Error = StoreError::Locked {
            path: PathBuf::from("favorites.db"),
        }
        .into();
        assert!(err.is_lock_conflict());
    }

    #[test]
    fn test_other_store_errors_stay_wrapped() {
        let err: Error = StoreError::Unassigned {
            collection: "favorites",
        }
        .into();
        assert!(matches!(err, Error::Store(_)));
    }
}
