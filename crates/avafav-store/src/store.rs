use crate::collection::Collection;
use crate::document::Document;
use crate::error::{Result, SqliteResultExt};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// One database file holding any number of document collections
///
/// SQLite was chosen because:
/// - Zero-config embedded database
/// - json_extract gives us predicate scans over stored documents for free
/// - Crash-safe commits without us writing a single fsync
/// - Doesn't require a separate process
///
/// The connection lives exactly as long as this value. Open it right before the
/// operation that needs it and drop it right after - files are never held
/// between calls.
pub struct StoreFile {
    conn: Connection,
    path: PathBuf,
}

impl StoreFile {
    /// Open (or create) the file at `path`.
    ///
    /// The busy timeout is zero: if someone else holds the file we fail right
    /// away with `StoreError::Locked` instead of hanging the caller. Journal mode
    /// stays at SQLite's rollback default so the main file always carries the
    /// last committed state, which is what makes copy-based snapshots sound.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).at(&path)?;
        conn.busy_timeout(Duration::ZERO).at(&path)?;

        debug!("Opened store file {}", path.display());
        Ok(Self { conn, path })
    }

    /// Throwaway store for tests and for snapshots of files that don't exist yet
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().at(&path)?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Typed handle on one collection, creating its table on first use
    pub fn collection<D: Document>(&self) -> Result<Collection<'_, D>> {
        Collection::bind(self)
    }

    /// Run `f` inside a single transaction on this file.
    ///
    /// Anything `f` does is rolled back if it returns an error. This only spans
    /// collections of *this* file - there is no cross-file transaction.
    pub fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&StoreFile) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction().at(&self.path)?;
        let out = f(self)?;
        tx.commit().at(&self.path)?;
        Ok(out)
    }

    /// Close explicitly so close-time errors surface instead of vanishing in Drop
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| e).at(&path)?;
        debug!("Closed store file {}", path.display());
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl std::fmt::Debug for StoreFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreFile").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocId;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        name: String,
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";

        fn id(&self) -> DocId {
            DocId::Key(self.name.clone())
        }
    }

    #[test]
    fn test_open_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.db");

        let file = StoreFile::open(&path).unwrap();
        file.collection::<Note>().unwrap();
        file.close().unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.db");

        {
            let file = StoreFile::open(&path).unwrap();
            let mut note = Note {
                name: "hello".to_string(),
            };
            file.collection::<Note>().unwrap().insert(&mut note).unwrap();
        }

        let file = StoreFile::open(&path).unwrap();
        let notes = file.collection::<Note>().unwrap().all().unwrap();
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let file = StoreFile::open_in_memory().unwrap();

        let result: Result<()> = file.atomically(|f| {
            let notes = f.collection::<Note>()?;
            notes.insert(&mut Note {
                name: "a".to_string(),
            })?;
            // Duplicate key blows up the second insert
            notes.insert(&mut Note {
                name: "a".to_string(),
            })?;
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(file.collection::<Note>().unwrap().count().unwrap(), 0);
    }

    #[test]
    fn test_exclusive_lock_fails_fast() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.db");
        StoreFile::open(&path)
            .unwrap()
            .collection::<Note>()
            .unwrap();

        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let file = StoreFile::open(&path).unwrap();
        let err = file.collection::<Note>().and_then(|c| c.all()).unwrap_err();
        assert!(err.is_locked());

        holder.execute_batch("COMMIT").unwrap();
    }
}
