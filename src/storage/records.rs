//! Record storage: identity lookups, working copies, and publishing.

use jiff::Timestamp;
use rusqlite::OptionalExtension;

use crate::model::StagedRecord;

use super::{PublishError, Result, Storage};

/// A record loaded from the repository, with its lifecycle state.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub body: StagedRecord,
    /// False for a working copy that has never been published.
    pub published: bool,
}

impl Storage {
    /// Finds a record of `record_type` by its identity key. When both a
    /// published record and a working copy carry the key, the published
    /// one wins.
    pub fn find_by_identity(
        &self,
        record_type: &str,
        key: &str,
    ) -> Result<Option<StoredRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT data, published FROM record
                 WHERE record_type = ?1 AND import_key = ?2
                 ORDER BY published DESC LIMIT 1",
                rusqlite::params![record_type, key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                    ))
                },
            )
            .optional()?;

        let Some((data, published)) = row else {
            return Ok(None);
        };
        Ok(Some(StoredRecord {
            body: serde_json::from_str(&data)?,
            published,
        }))
    }

    /// All records of `record_type`, working copies included.
    pub fn list_records(&self, record_type: &str) -> Result<Vec<StoredRecord>> {
        let mut statement = self.conn.prepare(
            "SELECT data, published FROM record WHERE record_type = ?1 ORDER BY id",
        )?;
        let rows = statement.query_map([record_type], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (data, published) = row?;
            records.push(StoredRecord {
                body: serde_json::from_str(&data)?,
                published,
            });
        }
        Ok(records)
    }

    /// Saves a record as an unpublished working copy.
    ///
    /// This is how a host system's not-yet-published lifecycle states enter
    /// the repository; the importer itself only writes through
    /// [`super::WriteScope::publish`].
    pub fn save_working_copy(&self, record: &StagedRecord) -> Result<()> {
        self.upsert(record, false, None, None)
    }

    /// Validates, normalizes, and writes one record as published. Called
    /// from within a [`super::WriteScope`] savepoint.
    pub(super) fn write_published(
        &self,
        record: &StagedRecord,
        site: Option<&str>,
        actor: &str,
    ) -> core::result::Result<(), PublishError> {
        let record = match record {
            StagedRecord::Redirect(redirect) => {
                let mut redirect = redirect.clone();
                if redirect.site.is_none() {
                    redirect.site = site.map(str::to_string);
                }
                redirect.normalize();
                redirect.validate().map_err(PublishError::Validation)?;
                self.check_duplicate_paths(&redirect)?;
                StagedRecord::Redirect(redirect)
            }
            StagedRecord::Draft(_) => record.clone(),
        };

        self.upsert(&record, true, Some(Timestamp::now()), Some(actor))?;
        Ok(())
    }

    /// A published local path must be unique across published redirects.
    fn check_duplicate_paths(
        &self,
        redirect: &crate::model::VanityRedirect,
    ) -> core::result::Result<(), PublishError> {
        for stored in self.list_records("vanity-redirect")? {
            let StagedRecord::Redirect(other) = stored.body else {
                continue;
            };
            if !stored.published || other.id == redirect.id {
                continue;
            }
            if let Some(path) = redirect.local_paths.intersection(&other.local_paths).next() {
                return Err(PublishError::DuplicatePath {
                    path: path.clone(),
                    other: other.id,
                });
            }
        }
        Ok(())
    }

    fn upsert(
        &self,
        record: &StagedRecord,
        published: bool,
        published_at: Option<Timestamp>,
        published_by: Option<&str>,
    ) -> Result<()> {
        let import_key = match record {
            StagedRecord::Redirect(redirect) => Some(redirect.import_key.clone()),
            StagedRecord::Draft(_) => None,
        };

        self.conn.execute(
            "INSERT INTO record (id, record_type, import_key, published, data, published_at, published_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (id) DO UPDATE SET
                 import_key = excluded.import_key,
                 published = excluded.published,
                 data = excluded.data,
                 published_at = excluded.published_at,
                 published_by = excluded.published_by",
            rusqlite::params![
                record.id().to_string(),
                record.type_id(),
                import_key,
                published,
                serde_json::to_string(record)?,
                published_at.map(|t| t.to_string()),
                published_by,
            ],
        )?;
        Ok(())
    }
}
