//! Imported sheet storage: create, load, update, and list sheets.

use jiff::Timestamp;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::model::ImportedSheet;

use super::{Result, Storage, StorageError};

impl Storage {
    /// Persists a new imported sheet.
    pub fn create_sheet(&self, sheet: &ImportedSheet) -> Result<()> {
        if self.sheet_exists(sheet.id)? {
            return Err(StorageError::SheetAlreadyExists(sheet.id));
        }
        self.conn.execute(
            "INSERT INTO sheet (id, name, definition, rows, created_at, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                sheet.id.to_string(),
                &sheet.name,
                serde_json::to_string(&sheet.definition)?,
                serde_json::to_string(&sheet.rows)?,
                sheet.created_at.to_string(),
                sheet.synced_at.map(|t| t.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Updates a sheet's row snapshot and sync time after re-synchronization.
    pub fn update_sheet(&self, sheet: &ImportedSheet) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE sheet SET name = ?1, definition = ?2, rows = ?3, synced_at = ?4
             WHERE id = ?5",
            rusqlite::params![
                &sheet.name,
                serde_json::to_string(&sheet.definition)?,
                serde_json::to_string(&sheet.rows)?,
                sheet.synced_at.map(|t| t.to_string()),
                sheet.id.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(StorageError::SheetNotFound(sheet.id));
        }
        Ok(())
    }

    /// Loads a single imported sheet.
    pub fn load_sheet(&self, id: Uuid) -> Result<ImportedSheet> {
        let row = self
            .conn
            .query_row(
                "SELECT name, definition, rows, created_at, synced_at FROM sheet WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((name, definition, rows, created_at, synced_at)) = row else {
            return Err(StorageError::SheetNotFound(id));
        };

        Ok(ImportedSheet {
            id,
            name,
            definition: serde_json::from_str(&definition)?,
            rows: serde_json::from_str(&rows)?,
            created_at: parse_timestamp(&created_at, "created_at")?,
            synced_at: synced_at
                .map(|t| parse_timestamp(&t, "synced_at"))
                .transpose()?,
        })
    }

    /// Lists all imported sheets, oldest first.
    pub fn list_sheets(&self) -> Result<Vec<ImportedSheet>> {
        let mut statement = self
            .conn
            .prepare("SELECT id FROM sheet ORDER BY created_at")?;
        let ids = statement.query_map([], |row| row.get::<_, String>(0))?;

        let mut sheets = Vec::new();
        for id in ids {
            let id = id?
                .parse::<Uuid>()
                .map_err(|e| StorageError::Corrupt(format!("invalid sheet id: {e}")))?;
            sheets.push(self.load_sheet(id)?);
        }
        Ok(sheets)
    }

    fn sheet_exists(&self, id: Uuid) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sheet WHERE id = ?1",
                [id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn parse_timestamp(value: &str, column: &str) -> Result<Timestamp> {
    value
        .parse::<Timestamp>()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}
