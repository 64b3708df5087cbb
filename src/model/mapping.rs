//! Field mappings: the user-authored association between sheet columns and
//! record fields.

use serde::{Deserialize, Serialize};

/// Associates one sheet column heading with one field on the target type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Column heading from the source sheet, or a synthesized letter
    /// heading when the sheet has no header row.
    pub column: String,

    /// Internal field identifier on the target type. May be namespaced,
    /// e.g. `"parent.displayName"`.
    pub field: String,
}

/// Everything needed to turn parsed rows into records: the target type,
/// whether the source carries a header row, and the column-to-field
/// mappings.
///
/// Authored once per import, snapshotted onto the sheet, and read-only
/// during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDefinition {
    pub target_type: String,
    pub has_header_row: bool,
    pub mappings: Vec<FieldMapping>,
}

/// Finds the first mapping whose field identifier contains `identifier`.
///
/// Substring match, not exact, so a namespaced field like
/// `"parent.displayName"` is found by `"parent"`.
pub fn find_mapping<'a>(
    mappings: &'a [FieldMapping],
    identifier: &str,
) -> Option<&'a FieldMapping> {
    mappings.iter().find(|m| m.field.contains(identifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(column: &str, field: &str) -> FieldMapping {
        FieldMapping {
            column: column.into(),
            field: field.into(),
        }
    }

    #[test]
    fn find_mapping_returns_first_match() {
        let mappings = vec![
            mapping("Name", "displayName"),
            mapping("Other Name", "displayName"),
        ];

        let found = find_mapping(&mappings, "displayName").unwrap();
        assert_eq!(found.column, "Name");
    }

    #[test]
    fn find_mapping_matches_by_substring() {
        let mappings = vec![mapping("Parent", "parent.displayName")];

        assert!(find_mapping(&mappings, "parent").is_some());
        assert!(find_mapping(&mappings, "displayName").is_some());
    }

    #[test]
    fn find_mapping_none_when_absent() {
        let mappings = vec![mapping("Name", "displayName")];

        assert!(find_mapping(&mappings, "destination").is_none());
    }
}
