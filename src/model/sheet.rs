//! Imported sheets: the persisted reconciliation session.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ImportDefinition;

/// One source line of tabular data, addressable by column heading.
///
/// Column order follows the source. Values are the raw cell strings;
/// interpretation is left to the reconciliation strategies. Immutable once
/// produced by the tabular adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, String)>,
}

impl Row {
    pub fn new(columns: Vec<(String, String)>) -> Self {
        Self { columns }
    }

    /// The value under `column`, if the row has that column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Column headings and values in source order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A source document snapshot plus the import definition it was loaded
/// with, so re-synchronization reuses the same configuration without
/// re-reading user input.
///
/// Rows are replaced wholesale on each sync; the sheet itself is never
/// deleted automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedSheet {
    pub id: Uuid,
    pub name: String,
    pub definition: ImportDefinition,
    pub rows: Vec<Row>,
    pub created_at: Timestamp,
    pub synced_at: Option<Timestamp>,
}

impl ImportedSheet {
    pub fn new(name: &str, definition: ImportDefinition, rows: Vec<Row>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            definition,
            rows,
            created_at: Timestamp::now(),
            synced_at: None,
        }
    }

    /// Replaces the row snapshot from a re-synchronized source.
    pub fn replace_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
        self.synced_at = Some(Timestamp::now());
    }
}
