//! Row reconciliation: the per-type strategies that turn sheet rows into
//! staged records, and the ordered set they accumulate into.

mod redirect;

use crate::model::{FieldMapping, ImportDefinition, Row, StagedRecord, VanityRedirect, find_mapping};
use crate::storage::{Storage, StorageError};

pub use redirect::RedirectStrategy;

/// A field a strategy can populate from a mapped column.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Internal identifier matched against mapping fields.
    pub identifier: &'static str,
    /// Human label used in validation messages.
    pub label: &'static str,
    pub required: bool,
}

/// A definition that cannot drive an import. Raised before any row is read.
#[derive(Debug, thiserror::Error)]
pub enum MappingValidationError {
    #[error("mapping column and field must both be non-empty")]
    BlankMapping,

    #[error("all required fields must be mapped to a column: {}", missing.join(", "))]
    MissingRequired { missing: Vec<String> },

    #[error("invalid field mappings: {0}")]
    Custom(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Per-type reconciliation strategy.
///
/// Each supported target type supplies one implementation, resolved from
/// the [`StrategyRegistry`] once per batch.
pub trait SheetReconciler {
    /// Registry key for this strategy's target type.
    fn target_type(&self) -> &'static str;

    /// Fields eligible for mapping.
    fn fields_to_convert(&self) -> &[FieldSpec];

    /// Fields exempted from the required-fields rule and from conversion,
    /// for required fields whose values are populated elsewhere. Takes
    /// precedence over `fields_to_convert`.
    fn fields_to_exclude(&self) -> &[&str] {
        &[]
    }

    /// Custom validation hook, run after the required-fields check.
    fn validate_mappings(&self, _mappings: &[FieldMapping]) -> Result<(), String> {
        Ok(())
    }

    /// Turns one row into zero or more staged records, merged into `staged`.
    ///
    /// Output from earlier rows is visible through `staged`, so a row can
    /// reference records created by siblings in the same batch.
    fn reconcile_row(
        &self,
        storage: &Storage,
        definition: &ImportDefinition,
        row: &Row,
        actor: &str,
        staged: &mut StagedSet,
    ) -> Result<(), ReconcileError>;
}

/// Maps target-type identifiers to reconciliation strategies.
///
/// Resolved once per batch, before any row is read, so an unregistered
/// type fails the trigger instead of a half-finished run.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn SheetReconciler>>,
}

impl StrategyRegistry {
    /// The registry with every built-in strategy.
    pub fn with_defaults() -> Self {
        Self {
            strategies: vec![Box::new(RedirectStrategy)],
        }
    }

    pub fn resolve(&self, target_type: &str) -> Option<&dyn SheetReconciler> {
        self.strategies
            .iter()
            .find(|s| s.target_type() == target_type)
            .map(AsRef::as_ref)
    }

    /// Known target-type identifiers, for error messages and help output.
    pub fn target_types(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.target_type()).collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Validates an import definition against its strategy before any row is
/// processed: every required, non-excluded field must be mapped, then the
/// strategy's own hook runs.
pub fn validate_definition(
    definition: &ImportDefinition,
    strategy: &dyn SheetReconciler,
) -> Result<(), MappingValidationError> {
    if definition
        .mappings
        .iter()
        .any(|m| m.column.trim().is_empty() || m.field.trim().is_empty())
    {
        return Err(MappingValidationError::BlankMapping);
    }

    let excluded = strategy.fields_to_exclude();
    let missing: Vec<String> = strategy
        .fields_to_convert()
        .iter()
        .filter(|f| f.required)
        .filter(|f| !excluded.contains(&f.identifier))
        .filter(|f| find_mapping(&definition.mappings, f.identifier).is_none())
        .map(|f| f.label.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(MappingValidationError::MissingRequired { missing });
    }

    strategy
        .validate_mappings(&definition.mappings)
        .map_err(MappingValidationError::Custom)
}

/// The batch's records-to-publish set: insertion-ordered, deduplicated by
/// record id.
///
/// First staged wins the slot; later rows reach the same record through
/// the lookup methods and mutate it in place. Publish order follows
/// staging order.
#[derive(Debug, Default)]
pub struct StagedSet {
    records: Vec<StagedRecord>,
}

impl StagedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a record unless one with the same id is already present.
    pub fn insert(&mut self, record: StagedRecord) {
        if self.records.iter().all(|r| r.id() != record.id()) {
            self.records.push(record);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StagedRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Finds a staged redirect by display name, for sibling-row lookups.
    pub fn redirect_by_name(&self, name: &str) -> Option<&VanityRedirect> {
        self.records.iter().find_map(|r| match r {
            StagedRecord::Redirect(redirect) if redirect.display_name == name => Some(redirect),
            _ => None,
        })
    }

    pub fn redirect_by_name_mut(&mut self, name: &str) -> Option<&mut VanityRedirect> {
        self.records.iter_mut().find_map(|r| match r {
            StagedRecord::Redirect(redirect) if redirect.display_name == name => Some(redirect),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a StagedSet {
    type Item = &'a StagedRecord;
    type IntoIter = std::slice::Iter<'a, StagedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
