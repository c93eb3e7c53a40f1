// Snapshot reads: copy the file, read the copy, throw the copy away.
//
// The game client keeps the favorites files open while it runs, and SQLite
// refuses to read a file someone else holds exclusively. Reads that may race
// the client go through a private copy instead of the live file.

use crate::{Error, Result};
use avafav_store::StoreFile;
use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

const SNAPSHOT_SUFFIX: &str = ".snapshot";
const JOURNAL_SUFFIX: &str = "-journal";
const WAL_SUFFIX: &str = "-wal";
const SHM_SUFFIX: &str = "-shm";

/// Files SQLite may keep next to a database. `-shm` is never copied (SQLite
/// rebuilds it from the WAL) but a copy can grow one while it's open.
const COMPANION_SUFFIXES: [&str; 3] = [JOURNAL_SUFFIX, WAL_SUFFIX, SHM_SUFFIX];

/// How many times to retry a copy that raced a writer
const COPY_ATTEMPTS: usize = 3;

/// A store file opened for reading, possibly through a snapshot copy
///
/// Field order matters: the connection has to close before the copy it points
/// at gets deleted, and struct fields drop in declaration order.
pub struct ReadHandle {
    file: StoreFile,
    copy: Option<SnapshotCopy>,
}

impl ReadHandle {
    pub fn is_snapshot(&self) -> bool {
        self.copy.is_some()
    }
}

impl Deref for ReadHandle {
    type Target = StoreFile;

    fn deref(&self) -> &StoreFile {
        &self.file
    }
}

/// Open `live` for a read-only operation.
///
/// With `externally_locked == false` this is just the live file. Otherwise the
/// live file plus its rollback journal or WAL is copied to a uniquely named
/// sibling and the copy is opened. The copy is deleted when the returned handle
/// drops, on every exit path. A missing live file reads as an empty store.
///
/// Companions are copied before the main file: a writer mid-commit has already
/// synced its journal before touching the main file, so the copied journal can
/// roll a torn main copy back. If the live files still changed while we were
/// copying, the copy is thrown away and taken again; after `COPY_ATTEMPTS`
/// tries the read fails with `Error::SnapshotUnstable`.
pub fn open_for_read(live: &Path, externally_locked: bool) -> Result<ReadHandle> {
    if !externally_locked {
        return Ok(ReadHandle {
            file: StoreFile::open(live)?,
            copy: None,
        });
    }

    if !live.exists() {
        debug!("{} doesn't exist yet, nothing to snapshot", live.display());
        return Ok(ReadHandle {
            file: StoreFile::open_in_memory()?,
            copy: None,
        });
    }

    for attempt in 1..=COPY_ATTEMPTS {
        // Guard first, copy second: a copy that dies halfway still gets cleaned up
        let copy = SnapshotCopy {
            path: snapshot_path(live),
        };

        let before = Fingerprint::of(live)?;
        for suffix in [JOURNAL_SUFFIX, WAL_SUFFIX] {
            copy_if_present(&with_suffix(live, suffix), &with_suffix(&copy.path, suffix))?;
        }
        std::fs::copy(live, &copy.path)?;

        if Fingerprint::of(live)? != before {
            debug!(
                "{} changed while copying (attempt {}), retrying",
                live.display(),
                attempt
            );
            continue;
        }

        debug!(
            "Reading {} through snapshot {}",
            live.display(),
            copy.path.display()
        );
        return Ok(ReadHandle {
            file: StoreFile::open(&copy.path)?,
            copy: Some(copy),
        });
    }

    Err(Error::SnapshotUnstable {
        path: live.to_path_buf(),
    })
}

/// Delete snapshot copies left behind by a process that died mid-read.
///
/// Only `<live name>.<32 hex>.snapshot` files (and their SQLite companions)
/// for the given live file names are touched; anything else in `dir` belongs
/// to someone else. Returns how many files were removed.
pub fn sweep_stale(dir: &Path, live_names: &[&str]) -> Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let ours = live_names.iter().any(|live| is_snapshot_of(&name, live));

        if ours && entry.file_type()?.is_file() {
            remove_if_present(&entry.path())?;
            debug!("Removed stale snapshot {}", entry.path().display());
            removed += 1;
        }
    }

    Ok(removed)
}

/// Does `name` look like a snapshot (or snapshot companion) of `live`?
fn is_snapshot_of(name: &str, live: &str) -> bool {
    let Some(rest) = name
        .strip_prefix(live)
        .and_then(|rest| rest.strip_prefix('.'))
    else {
        return false;
    };

    let rest = COMPANION_SUFFIXES
        .iter()
        .find_map(|suffix| rest.strip_suffix(suffix))
        .unwrap_or(rest);

    match rest.strip_suffix(SNAPSHOT_SUFFIX) {
        Some(id) => id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// `<live name>.<uuid>.snapshot` next to the live file. A fresh uuid per call
/// means a leftover copy can never be mistaken for this call's data.
fn snapshot_path(live: &Path) -> PathBuf {
    with_suffix(
        live,
        &format!(".{}{}", uuid::Uuid::new_v4().simple(), SNAPSHOT_SUFFIX),
    )
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Companion files come and go with transactions; a missing one isn't an error
fn copy_if_present(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::copy(from, to) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Cheap "did anything move?" check over a database and its companions.
///
/// Bytes 24..28 of the header are SQLite's file change counter, bumped on
/// every rollback-mode commit. WAL commits don't touch the main file, so the
/// WAL's size and mtime are tracked too.
#[derive(Debug, PartialEq, Eq)]
struct Fingerprint {
    change_counter: Option<[u8; 4]>,
    files: Vec<Option<(u64, Option<SystemTime>)>>,
}

impl Fingerprint {
    fn of(live: &Path) -> std::io::Result<Self> {
        let mut header = Vec::with_capacity(28);
        std::fs::File::open(live)?
            .take(28)
            .read_to_end(&mut header)?;
        let change_counter = header.get(24..28).map(|b| [b[0], b[1], b[2], b[3]]);

        let mut files = Vec::with_capacity(3);
        for path in [
            live.to_path_buf(),
            with_suffix(live, JOURNAL_SUFFIX),
            with_suffix(live, WAL_SUFFIX),
        ] {
            files.push(match std::fs::metadata(&path) {
                Ok(meta) => Some((meta.len(), meta.modified().ok())),
                Err(e) if e.kind() == ErrorKind::NotFound => None,
                Err(e) => return Err(e),
            });
        }

        Ok(Self {
            change_counter,
            files,
        })
    }
}

/// Owns a temporary copy on disk (plus companions) and deletes it on drop
struct SnapshotCopy {
    path: PathBuf,
}

impl Drop for SnapshotCopy {
    fn drop(&mut self) {
        let companions = COMPANION_SUFFIXES
            .iter()
            .map(|suffix| with_suffix(&self.path, suffix));

        for path in companions.chain(std::iter::once(self.path.clone())) {
            if let Err(e) = remove_if_present(&path) {
                // Can't propagate from Drop. sweep_stale picks it up next start.
                warn!("Failed to remove snapshot {}: {}", path.display(), e);
            }
        }
        debug!("Discarded snapshot {}", self.path.display());
    }
}
