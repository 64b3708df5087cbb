//! Redirect reconciliation: how a sheet row becomes a new vanity redirect,
//! an in-place update, or a draft against a published one.

use std::collections::BTreeSet;

use jiff::Timestamp;
use uuid::Uuid;

use crate::model::{
    Draft, FieldMapping, ImportDefinition, QueryStringMode, Row, StagedRecord, VanityRedirect,
    find_differences, find_mapping,
};
use crate::storage::Storage;

use super::{FieldSpec, ReconcileError, SheetReconciler, StagedSet};

/// Reconciliation strategy for vanity redirects.
pub struct RedirectStrategy;

const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        identifier: "displayName",
        label: "Display Name",
        required: true,
    },
    FieldSpec {
        identifier: "localPaths",
        label: "Local Paths",
        required: true,
    },
    FieldSpec {
        identifier: "destination",
        label: "Destination",
        required: true,
    },
    FieldSpec {
        identifier: "temporary",
        label: "Temporary",
        required: false,
    },
    FieldSpec {
        identifier: "queryString",
        label: "Query String",
        required: false,
    },
    FieldSpec {
        identifier: "parent",
        label: "Parent",
        required: false,
    },
    FieldSpec {
        identifier: "description",
        label: "Description",
        required: false,
    },
];

impl SheetReconciler for RedirectStrategy {
    fn target_type(&self) -> &'static str {
        "vanity-redirect"
    }

    fn fields_to_convert(&self) -> &[FieldSpec] {
        FIELDS
    }

    fn reconcile_row(
        &self,
        storage: &Storage,
        definition: &ImportDefinition,
        row: &Row,
        actor: &str,
        staged: &mut StagedSet,
    ) -> Result<(), ReconcileError> {
        let mappings = &definition.mappings;

        // The display name drives identity matching; a row without one is
        // skipped outright.
        let Some(identity) = mapped_value(mappings, "displayName", row) else {
            return Ok(());
        };

        // A row naming itself as its own parent gets no parent link.
        let parent_identity =
            mapped_value(mappings, "parent", row).filter(|parent| *parent != identity);

        match find_redirect(storage, &identity, staged)? {
            Found::None => {
                let mut redirect = VanityRedirect::new(&identity);
                apply_row(&mut redirect, mappings, row);
                if let Some(parent) = resolve_parent(storage, parent_identity, staged)? {
                    redirect.parent = Some(parent);
                }
                staged.insert(StagedRecord::Redirect(redirect));
            }

            Found::Staged => {
                let parent = resolve_parent(storage, parent_identity, staged)?;
                if let Some(redirect) = staged.redirect_by_name_mut(&identity) {
                    apply_row(redirect, mappings, row);
                    if let Some(parent) = parent {
                        redirect.parent = Some(parent);
                    }
                }
            }

            // A working copy was never published, so there is nothing to
            // protect with a draft: update it in place and restage it.
            Found::Stored {
                redirect: mut stored,
                published: false,
            } => {
                apply_row(&mut stored, mappings, row);
                if let Some(parent) = resolve_parent(storage, parent_identity, staged)? {
                    stored.parent = Some(parent);
                }
                staged.insert(StagedRecord::Redirect(stored));
            }

            // Published records are never overwritten directly: apply the
            // row to a clone, and stage the field-level diff as a draft.
            Found::Stored {
                redirect: stored,
                published: true,
            } => {
                let original = stored.field_values();
                let mut updated = stored.clone();
                apply_row(&mut updated, mappings, row);
                if let Some(parent) = resolve_parent(storage, parent_identity, staged)? {
                    updated.parent = Some(parent);
                }

                let differences = find_differences(&original, &updated.field_values());
                if !differences.is_empty() {
                    let now = Timestamp::now();
                    staged.insert(StagedRecord::Draft(Draft {
                        id: Uuid::new_v4(),
                        target_id: stored.id,
                        target_type: self.target_type().to_string(),
                        differences,
                        owner: actor.to_string(),
                        name: Draft::reimport_name(now),
                        created_at: now,
                    }));
                }
            }
        }

        Ok(())
    }
}

enum Found {
    None,
    /// A sibling row staged this identity earlier in the batch.
    Staged,
    Stored {
        redirect: VanityRedirect,
        published: bool,
    },
}

/// Looks up an identity among repository records first, then among records
/// staged earlier in the same batch.
fn find_redirect(
    storage: &Storage,
    identity: &str,
    staged: &StagedSet,
) -> Result<Found, ReconcileError> {
    if let Some(stored) = storage.find_by_identity("vanity-redirect", identity)? {
        if let StagedRecord::Redirect(redirect) = stored.body {
            return Ok(Found::Stored {
                redirect,
                published: stored.published,
            });
        }
    }

    if staged.redirect_by_name(identity).is_some() {
        return Ok(Found::Staged);
    }
    Ok(Found::None)
}

/// Resolves or creates the parent redirect, staging a newly created one
/// before it is linked.
fn resolve_parent(
    storage: &Storage,
    identity: Option<String>,
    staged: &mut StagedSet,
) -> Result<Option<Uuid>, ReconcileError> {
    let Some(identity) = identity else {
        return Ok(None);
    };

    match find_redirect(storage, &identity, staged)? {
        Found::Stored { redirect, .. } => Ok(Some(redirect.id)),
        Found::Staged => Ok(staged.redirect_by_name(&identity).map(|r| r.id)),
        Found::None => {
            let parent = VanityRedirect::new(&identity);
            let id = parent.id;
            staged.insert(StagedRecord::Redirect(parent));
            Ok(Some(id))
        }
    }
}

/// Populates every mapped field from the row. Blank values never overwrite
/// existing ones.
fn apply_row(redirect: &mut VanityRedirect, mappings: &[FieldMapping], row: &Row) {
    if let Some(name) = mapped_value(mappings, "displayName", row) {
        redirect.display_name = name;
    }
    if let Some(path) = mapped_value(mappings, "localPaths", row) {
        redirect.local_paths = BTreeSet::from([VanityRedirect::normalize_path(&path)]);
    }
    if let Some(destination) = mapped_value(mappings, "destination", row) {
        redirect.destination = Some(destination);
    }
    if let Some(status) = mapped_value(mappings, "temporary", row) {
        redirect.temporary = status == "302";
    }
    if let Some(mode) =
        mapped_value(mappings, "queryString", row).and_then(|v| QueryStringMode::parse(&v))
    {
        redirect.query_string = mode;
    }
    if let Some(description) = mapped_value(mappings, "description", row) {
        redirect.description = Some(description);
    }
}

/// The row's trimmed value for the mapping matching `identifier`; missing
/// mappings, missing columns, and blank values all yield `None`.
fn mapped_value(mappings: &[FieldMapping], identifier: &str, row: &Row) -> Option<String> {
    let mapping = find_mapping(mappings, identifier)?;
    let value = row.get(&mapping.column)?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("repo")).unwrap();
        (dir, storage)
    }

    fn mapping(column: &str, field: &str) -> FieldMapping {
        FieldMapping {
            column: column.into(),
            field: field.into(),
        }
    }

    /// The 4-column redirect sheet layout.
    fn sheet_definition() -> ImportDefinition {
        ImportDefinition {
            target_type: "vanity-redirect".into(),
            has_header_row: true,
            mappings: vec![
                mapping("Local Path", "displayName"),
                mapping("Local Path", "localPaths"),
                mapping("New URL", "destination"),
                mapping("Status", "temporary"),
                mapping("Query String", "queryString"),
            ],
        }
    }

    fn sheet_row(path: &str, url: &str, status: &str, query: &str) -> Row {
        Row::new(vec![
            ("Local Path".into(), path.into()),
            ("New URL".into(), url.into()),
            ("Status".into(), status.into()),
            ("Query String".into(), query.into()),
        ])
    }

    fn parented_definition() -> ImportDefinition {
        ImportDefinition {
            target_type: "vanity-redirect".into(),
            has_header_row: true,
            mappings: vec![
                mapping("Path", "displayName"),
                mapping("Parent", "parent"),
            ],
        }
    }

    fn parented_row(path: &str, parent: &str) -> Row {
        Row::new(vec![
            ("Path".into(), path.into()),
            ("Parent".into(), parent.into()),
        ])
    }

    fn published_redirect(storage: &Storage, identity: &str, destination: &str) -> Uuid {
        let mut redirect = VanityRedirect::new(identity);
        redirect.local_paths = BTreeSet::from([identity.to_string()]);
        redirect.destination = Some(destination.to_string());
        redirect.site = Some("main".to_string());
        let id = redirect.id;

        let scope = storage.begin_isolated_writes().unwrap();
        scope
            .publish(&StagedRecord::Redirect(redirect), None, "importer")
            .unwrap();
        scope.commit().unwrap();
        id
    }

    fn reconcile(
        storage: &Storage,
        definition: &ImportDefinition,
        rows: &[Row],
    ) -> StagedSet {
        let mut staged = StagedSet::new();
        for row in rows {
            RedirectStrategy
                .reconcile_row(storage, definition, row, "importer", &mut staged)
                .unwrap();
        }
        staged
    }

    #[test]
    fn blank_identity_row_emits_nothing() {
        let (_dir, storage) = test_storage();
        let rows = [sheet_row("", "/new", "301", "preserve")];

        let staged = reconcile(&storage, &sheet_definition(), &rows);

        assert!(staged.is_empty());
    }

    #[test]
    fn new_record_from_four_column_row() {
        let (_dir, storage) = test_storage();
        let rows = [sheet_row("/old", "/new", "301", "preserve")];

        let staged = reconcile(&storage, &sheet_definition(), &rows);

        assert_eq!(staged.len(), 1);
        let Some(StagedRecord::Redirect(redirect)) = staged.iter().next() else {
            panic!("expected a redirect");
        };
        assert_eq!(redirect.display_name, "/old");
        assert_eq!(redirect.import_key, "/old");
        assert_eq!(redirect.local_paths, BTreeSet::from(["/old".to_string()]));
        assert_eq!(redirect.destination.as_deref(), Some("/new"));
        assert!(!redirect.temporary);
        assert_eq!(redirect.query_string, QueryStringMode::Preserve);
    }

    #[test]
    fn status_302_marks_redirect_temporary() {
        let (_dir, storage) = test_storage();
        let rows = [sheet_row("/old", "/new", "302", "ignore")];

        let staged = reconcile(&storage, &sheet_definition(), &rows);

        let Some(StagedRecord::Redirect(redirect)) = staged.iter().next() else {
            panic!("expected a redirect");
        };
        assert!(redirect.temporary);
        assert_eq!(redirect.query_string, QueryStringMode::Ignore);
    }

    #[test]
    fn published_record_with_changed_destination_becomes_draft() {
        let (_dir, storage) = test_storage();
        let target = published_redirect(&storage, "/old", "https://example.com/new");

        let rows = [sheet_row("/old", "https://example.com/changed", "301", "ignore")];
        let staged = reconcile(&storage, &sheet_definition(), &rows);

        assert_eq!(staged.len(), 1);
        let Some(StagedRecord::Draft(draft)) = staged.iter().next() else {
            panic!("expected a draft");
        };
        assert_eq!(draft.target_id, target);
        assert_eq!(draft.target_type, "vanity-redirect");
        assert_eq!(draft.owner, "importer");
        assert!(draft.name.starts_with("Sheet reimport "));

        let keys: Vec<&str> = draft.differences.keys().map(String::as_str).collect();
        assert_eq!(keys, ["destination"]);
    }

    #[test]
    fn unchanged_published_record_emits_nothing() {
        let (_dir, storage) = test_storage();
        published_redirect(&storage, "/old", "https://example.com/new");

        let rows = [sheet_row("/old", "https://example.com/new", "301", "ignore")];
        let staged = reconcile(&storage, &sheet_definition(), &rows);

        assert!(staged.is_empty());
    }

    #[test]
    fn later_row_mutates_staged_sibling_in_place() {
        let (_dir, storage) = test_storage();
        let rows = [
            sheet_row("/old", "https://example.com/first", "301", "ignore"),
            sheet_row("/old", "https://example.com/second", "302", "preserve"),
        ];

        let staged = reconcile(&storage, &sheet_definition(), &rows);

        assert_eq!(staged.len(), 1);
        let redirect = staged.redirect_by_name("/old").unwrap();
        assert_eq!(
            redirect.destination.as_deref(),
            Some("https://example.com/second")
        );
        assert!(redirect.temporary);
        assert_eq!(redirect.query_string, QueryStringMode::Preserve);
    }

    #[test]
    fn blank_values_do_not_overwrite_existing_ones() {
        let (_dir, storage) = test_storage();
        let rows = [
            sheet_row("/old", "https://example.com/first", "302", "preserve"),
            sheet_row("/old", "", "", ""),
        ];

        let staged = reconcile(&storage, &sheet_definition(), &rows);

        let redirect = staged.redirect_by_name("/old").unwrap();
        assert_eq!(
            redirect.destination.as_deref(),
            Some("https://example.com/first")
        );
        assert!(redirect.temporary);
        assert_eq!(redirect.query_string, QueryStringMode::Preserve);
    }

    #[test]
    fn working_copy_is_updated_in_place_without_draft() {
        let (_dir, storage) = test_storage();
        let mut working = VanityRedirect::new("/old");
        working.destination = Some("https://example.com/new".to_string());
        let id = working.id;
        storage
            .save_working_copy(&StagedRecord::Redirect(working))
            .unwrap();

        let rows = [sheet_row("/old", "https://example.com/changed", "301", "ignore")];
        let staged = reconcile(&storage, &sheet_definition(), &rows);

        assert_eq!(staged.len(), 1);
        let Some(StagedRecord::Redirect(redirect)) = staged.iter().next() else {
            panic!("expected a redirect, not a draft");
        };
        assert_eq!(redirect.id, id);
        assert_eq!(
            redirect.destination.as_deref(),
            Some("https://example.com/changed")
        );
    }

    #[test]
    fn new_parent_is_created_and_staged_before_child() {
        let (_dir, storage) = test_storage();
        let rows = [parented_row("/child", "/section")];

        let staged = reconcile(&storage, &parented_definition(), &rows);

        assert_eq!(staged.len(), 2);
        let labels: Vec<String> = staged.iter().map(StagedRecord::label).collect();
        assert_eq!(labels, ["/section", "/child"]);

        let parent_id = staged.redirect_by_name("/section").unwrap().id;
        let child = staged.redirect_by_name("/child").unwrap();
        assert_eq!(child.parent, Some(parent_id));
    }

    #[test]
    fn parent_resolves_to_sibling_staged_by_earlier_row() {
        let (_dir, storage) = test_storage();
        let rows = [
            parented_row("/section", ""),
            parented_row("/child", "/section"),
        ];

        let staged = reconcile(&storage, &parented_definition(), &rows);

        assert_eq!(staged.len(), 2);
        let parent_id = staged.redirect_by_name("/section").unwrap().id;
        let child = staged.redirect_by_name("/child").unwrap();
        assert_eq!(child.parent, Some(parent_id));
    }

    #[test]
    fn parent_resolves_to_published_record() {
        let (_dir, storage) = test_storage();
        let parent_id = published_redirect(&storage, "/section", "https://example.com/s");

        let rows = [parented_row("/child", "/section")];
        let staged = reconcile(&storage, &parented_definition(), &rows);

        // The published parent is linked, not restaged.
        assert_eq!(staged.len(), 1);
        let child = staged.redirect_by_name("/child").unwrap();
        assert_eq!(child.parent, Some(parent_id));
    }

    #[test]
    fn self_parent_row_stages_single_record_without_link() {
        let (_dir, storage) = test_storage();
        let rows = [parented_row("/loop", "/loop")];

        let staged = reconcile(&storage, &parented_definition(), &rows);

        assert_eq!(staged.len(), 1);
        let redirect = staged.redirect_by_name("/loop").unwrap();
        assert_eq!(redirect.parent, None);
    }
}
