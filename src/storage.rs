//! The content repository: sqlite-backed persistence for records, imported
//! sheets, and import logs.
//!
//! One database file holds everything:
//!
//! ```text
//! <root>/repository.sqlite
//!   record      # published records and working copies, JSON payloads
//!   sheet       # imported sheets: definition snapshot + row snapshot
//!   import_log  # one audit row per batch execution
//! ```
//!
//! Batch writes go through [`WriteScope`], which isolates one import batch
//! from concurrent writers while letting each record publish succeed or
//! fail on its own.

mod logs;
mod records;
mod sheets;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use rusqlite::Connection;
use uuid::Uuid;

use crate::model::StagedRecord;

pub use records::StoredRecord;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sheet not found: {0}")]
    SheetNotFound(Uuid),

    #[error("sheet already exists: {0}")]
    SheetAlreadyExists(Uuid),

    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// Errors publishing a single record. The batch isolates these to the
/// record that raised them.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("{0}")]
    Validation(String),

    #[error("local path {path} is already claimed by {other}")]
    DuplicatePath { path: String, other: Uuid },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS record (
    id           TEXT PRIMARY KEY,
    record_type  TEXT NOT NULL,
    import_key   TEXT,
    published    INTEGER NOT NULL DEFAULT 0,
    data         TEXT NOT NULL,
    published_at TEXT,
    published_by TEXT
);
CREATE INDEX IF NOT EXISTS record_identity ON record (record_type, import_key);

CREATE TABLE IF NOT EXISTS sheet (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    definition TEXT NOT NULL,
    rows       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    synced_at  TEXT
);

CREATE TABLE IF NOT EXISTS import_log (
    id              TEXT PRIMARY KEY,
    object_id       TEXT NOT NULL,
    submission_date TEXT NOT NULL,
    submitted_by    TEXT NOT NULL,
    status          TEXT NOT NULL,
    errors          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS import_log_object ON import_log (object_id, submission_date);
";

/// The repository database.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens the repository database under the given root directory,
    /// creating the directory and schema if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Self::open(&root.join("repository.sqlite"))
    }

    /// Returns the default storage root: `~/.stevedore/`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".stevedore"))
    }

    fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Begins the batch-level isolated-write scope.
    ///
    /// The scope holds an immediate transaction, keeping this batch's
    /// partial writes from interleaving with concurrent writers until
    /// [`WriteScope::commit`] flushes them. Dropping the scope without
    /// committing rolls the whole batch back.
    pub fn begin_isolated_writes(&self) -> Result<WriteScope<'_>> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(WriteScope {
            storage: self,
            committed: false,
        })
    }
}

/// Scoped isolated-write transaction for one import batch.
///
/// Each publish runs inside its own savepoint, so a failed record rolls
/// back only itself and previously published records in the same batch
/// survive. Release is guaranteed on every exit path: `commit` flushes,
/// drop rolls back.
pub struct WriteScope<'a> {
    storage: &'a Storage,
    committed: bool,
}

impl WriteScope<'_> {
    /// Publishes one staged record as its own atomic unit.
    ///
    /// Validation or duplicate-path failures roll back the record's
    /// savepoint and leave the rest of the batch untouched.
    pub fn publish(
        &self,
        record: &StagedRecord,
        site: Option<&str>,
        actor: &str,
    ) -> core::result::Result<(), PublishError> {
        let conn = &self.storage.conn;
        conn.execute_batch("SAVEPOINT publish")
            .map_err(StorageError::from)?;

        match self.storage.write_published(record, site, actor) {
            Ok(()) => {
                conn.execute_batch("RELEASE publish")
                    .map_err(StorageError::from)?;
                Ok(())
            }
            Err(e) => {
                // Undo this record only; the error itself is what matters.
                let _ = conn.execute_batch("ROLLBACK TO publish; RELEASE publish");
                Err(e)
            }
        }
    }

    /// Commits everything the batch published.
    pub fn commit(mut self) -> Result<()> {
        self.storage.conn.execute_batch("COMMIT")?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for WriteScope<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let _ = self.storage.conn.execute_batch("ROLLBACK");
        }
    }
}
