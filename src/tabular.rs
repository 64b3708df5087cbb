//! Tabular source adapter: turns a CSV export into header-addressable rows.
//!
//! Thin wrapper around the `csv` crate. When the source has no header row,
//! columns are addressed by synthesized spreadsheet-style letter headings
//! (`A`, `B`, ..., `Z`, `AA`, `AB`, ...).

use std::path::{Path, PathBuf};

use crate::model::Row;

/// Errors reading or decoding a tabular source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read source {path}: {source}")]
    Unavailable { path: PathBuf, source: csv::Error },

    #[error("malformed tabular data: {0}")]
    Malformed(#[from] csv::Error),
}

pub type Result<T> = core::result::Result<T, SourceError>;

/// Parses the source into an ordered sequence of rows.
///
/// With a header row, columns are addressed by the header values; without
/// one, by synthesized letter headings per row width. Cell values are
/// trimmed; fully blank lines are skipped.
pub fn parse(path: &Path, has_header_row: bool) -> Result<Vec<Row>> {
    let mut reader = open(path, has_header_row)?;

    let headers: Option<Vec<String>> = if has_header_row {
        Some(reader.headers()?.iter().map(str::to_string).collect())
    } else {
        None
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let columns = match &headers {
            Some(headers) => headers
                .iter()
                .zip(record.iter())
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect(),
            None => record
                .iter()
                .enumerate()
                .map(|(index, value)| (column_heading(index), value.to_string()))
                .collect(),
        };
        rows.push(Row::new(columns));
    }
    Ok(rows)
}

/// Header row values of the source, for mapping-UI column suggestions.
pub fn header_names(path: &Path) -> Result<Vec<String>> {
    let mut reader = open(path, true)?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

/// Column headings to offer when building mappings: the header row when
/// present, letter headings sized to the first row otherwise.
pub fn column_suggestions(path: &Path, has_header_row: bool) -> Result<Vec<String>> {
    if has_header_row {
        return header_names(path);
    }
    let mut reader = open(path, false)?;
    let width = reader.records().next().transpose()?.map_or(0, |r| r.len());
    Ok(column_letters(width))
}

fn open(path: &Path, has_headers: bool) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| SourceError::Unavailable {
            path: path.to_path_buf(),
            source,
        })
}

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Spreadsheet-style heading for a zero-based column index: base-26 with
/// 1-indexed letters and no zero digit.
pub fn column_heading(index: usize) -> String {
    let letter = char::from(LETTERS[index % 26]);
    match (index / 26).checked_sub(1) {
        Some(prefix) => {
            let mut heading = column_heading(prefix);
            heading.push(letter);
            heading
        }
        None => letter.to_string(),
    }
}

/// The first `count` column headings, in order.
pub fn column_letters(count: usize) -> Vec<String> {
    (0..count).map(column_heading).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    fn write_source(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheet.csv");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn column_heading_base26_sequence() {
        assert_eq!(column_heading(0), "A");
        assert_eq!(column_heading(25), "Z");
        assert_eq!(column_heading(26), "AA");
        assert_eq!(column_heading(701), "ZZ");
        assert_eq!(column_heading(702), "AAA");
    }

    #[test]
    fn column_letters_in_order() {
        assert_eq!(column_letters(3), ["A", "B", "C"]);
        assert!(column_letters(0).is_empty());
    }

    #[test]
    fn parse_with_header_row() {
        let (_dir, path) = write_source(
            "Local Path,New URL,Status,Query String\n/old,/new,301,preserve\n",
        );

        let rows = parse(&path, true).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Local Path"), Some("/old"));
        assert_eq!(rows[0].get("Query String"), Some("preserve"));
    }

    #[test]
    fn parse_without_header_row_synthesizes_letters() {
        let (_dir, path) = write_source("/old,/new\n/other,/elsewhere\n");

        let rows = parse(&path, false).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("A"), Some("/old"));
        assert_eq!(rows[1].get("B"), Some("/elsewhere"));
    }

    #[test]
    fn parse_trims_cell_values() {
        let (_dir, path) = write_source("Name\n  padded  \n");

        let rows = parse(&path, true).unwrap();
        assert_eq!(rows[0].get("Name"), Some("padded"));
    }

    #[test]
    fn parse_missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.csv");

        let err = parse(&path, true).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[test]
    fn header_names_reads_first_row() {
        let (_dir, path) = write_source("Local Path,New URL\n/old,/new\n");

        let names = header_names(&path).unwrap();
        assert_eq!(names, ["Local Path", "New URL"]);
    }

    #[test]
    fn column_suggestions_without_header_use_first_row_width() {
        let (_dir, path) = write_source("/old,/new,301\n");

        let suggestions = column_suggestions(&path, false).unwrap();
        assert_eq!(suggestions, ["A", "B", "C"]);
    }
}
