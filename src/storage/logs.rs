//! Import log storage: the audit trail queried by the status surface.

use jiff::Timestamp;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::model::{ImportLog, ImportStatus};

use super::{Result, Storage, StorageError};

impl Storage {
    /// Saves an import log, inserting or updating by id. Called once when a
    /// batch opens and once when it reaches a terminal status.
    pub fn save_log(&self, log: &ImportLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO import_log (id, object_id, submission_date, submitted_by, status, errors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (id) DO UPDATE SET
                 status = excluded.status,
                 errors = excluded.errors",
            rusqlite::params![
                log.id.to_string(),
                log.object_id.to_string(),
                log.submission_date.to_string(),
                &log.submitted_by,
                serialize_status(log.status),
                serde_json::to_string(&log.errors)?,
            ],
        )?;
        Ok(())
    }

    /// The most recent import log for an object, if any.
    pub fn find_latest_log(&self, object_id: Uuid) -> Result<Option<ImportLog>> {
        let mut logs = self.query_logs(object_id, Some(1))?;
        Ok(logs.pop())
    }

    /// All import logs for an object, newest first.
    pub fn list_logs(&self, object_id: Uuid) -> Result<Vec<ImportLog>> {
        self.query_logs(object_id, None)
    }

    fn query_logs(&self, object_id: Uuid, limit: Option<usize>) -> Result<Vec<ImportLog>> {
        let mut statement = self.conn.prepare(
            "SELECT id, submission_date, submitted_by, status, errors FROM import_log
             WHERE object_id = ?1
             ORDER BY submission_date DESC
             LIMIT ?2",
        )?;
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let rows = statement.query_map(
            rusqlite::params![object_id.to_string(), limit],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;

        let mut logs = Vec::new();
        for row in rows {
            let (id, submission_date, submitted_by, status, errors) = row?;
            logs.push(ImportLog {
                id: id
                    .parse::<Uuid>()
                    .map_err(|e| StorageError::Corrupt(format!("invalid log id: {e}")))?,
                object_id,
                submission_date: submission_date.parse::<Timestamp>().map_err(|e| {
                    StorageError::Corrupt(format!("invalid submission_date: {e}"))
                })?,
                submitted_by,
                status: deserialize_status(&status)?,
                errors: serde_json::from_str(&errors)?,
            });
        }
        Ok(logs)
    }
}

/// Converts an `ImportStatus` to its status column value.
fn serialize_status(status: ImportStatus) -> &'static str {
    match status {
        ImportStatus::InProgress => "in_progress",
        ImportStatus::Success => "success",
        ImportStatus::PartiallySuccessful => "partially_successful",
        ImportStatus::Failure => "failure",
    }
}

/// Reconstructs an `ImportStatus` from its status column value.
fn deserialize_status(status: &str) -> Result<ImportStatus> {
    match status {
        "in_progress" => Ok(ImportStatus::InProgress),
        "success" => Ok(ImportStatus::Success),
        "partially_successful" => Ok(ImportStatus::PartiallySuccessful),
        "failure" => Ok(ImportStatus::Failure),
        other => Err(StorageError::Corrupt(format!(
            "unknown import status: {other}"
        ))),
    }
}
