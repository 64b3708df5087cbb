//! Drafts: pending, reviewable changes to already-published records.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A simple field value, the unit of comparison when diffing two versions
/// of a record.
///
/// Tagged enum so stored diffs are self-describing when read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Text(String),
    Texts(Vec<String>),
    Flag(bool),
    Reference(Uuid),
}

/// One field's before/after pair inside a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDifference {
    pub old: Option<FieldValue>,
    pub new: Option<FieldValue>,
}

/// A pending change to an already-published record, carrying a field-level
/// diff instead of overwriting the record directly.
///
/// Created only when the diff is non-empty; consumed by an external
/// review-and-publish workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: Uuid,
    /// The published record this draft proposes changes to.
    pub target_id: Uuid,
    pub target_type: String,
    pub differences: BTreeMap<String, FieldDifference>,
    pub owner: String,
    pub name: String,
    pub created_at: Timestamp,
}

impl Draft {
    /// Naming convention for drafts produced by re-importing a sheet.
    pub fn reimport_name(at: Timestamp) -> String {
        format!("Sheet reimport {at}")
    }
}

/// Computes the field-level differences between two simple-value views of
/// a record. Fields equal in both views are omitted; fields present in
/// only one side appear with the other side as `None`.
pub fn find_differences(
    old: &BTreeMap<String, FieldValue>,
    new: &BTreeMap<String, FieldValue>,
) -> BTreeMap<String, FieldDifference> {
    let mut differences = BTreeMap::new();

    for (name, value) in old {
        if new.get(name) != Some(value) {
            differences.insert(
                name.clone(),
                FieldDifference {
                    old: Some(value.clone()),
                    new: new.get(name).cloned(),
                },
            );
        }
    }

    for (name, value) in new {
        if !old.contains_key(name) {
            differences.insert(
                name.clone(),
                FieldDifference {
                    old: None,
                    new: Some(value.clone()),
                },
            );
        }
    }

    differences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), FieldValue::Text((*value).to_string())))
            .collect()
    }

    #[test]
    fn diff_against_self_is_empty() {
        let a = values(&[("displayName", "/old"), ("destination", "/new")]);

        assert!(find_differences(&a, &a).is_empty());
    }

    #[test]
    fn diff_reports_changed_field_only() {
        let old = values(&[("displayName", "/old"), ("destination", "/new")]);
        let new = values(&[("displayName", "/old"), ("destination", "/changed")]);

        let diff = find_differences(&old, &new);
        assert_eq!(diff.len(), 1);

        let difference = &diff["destination"];
        assert_eq!(difference.old, Some(FieldValue::Text("/new".into())));
        assert_eq!(difference.new, Some(FieldValue::Text("/changed".into())));
    }

    #[test]
    fn diff_reports_added_and_removed_fields() {
        let old = values(&[("displayName", "/old")]);
        let new = values(&[("destination", "/new")]);

        let diff = find_differences(&old, &new);
        assert_eq!(diff.len(), 2);
        assert_eq!(diff["displayName"].new, None);
        assert_eq!(diff["destination"].old, None);
    }

    #[test]
    fn reimport_name_carries_timestamp() {
        let at = Timestamp::new(1_000_000_000, 0).unwrap();
        let name = Draft::reimport_name(at);

        assert!(name.starts_with("Sheet reimport "));
        assert!(name.contains("2001"));
    }
}
