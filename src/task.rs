//! Batch execution: runs one import end to end, from mapping validation
//! through per-record publishing, under the isolated-write scope.

use crate::model::{ImportLog, ImportStatus, ImportedSheet};
use crate::reconcile::{
    MappingValidationError, ReconcileError, SheetReconciler, StagedSet, StrategyRegistry,
    validate_definition,
};
use crate::storage::{Storage, StorageError};

/// Errors that abort an import before any batch work happens — or, for
/// `Storage`, while writing the log itself.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("no import strategy registered for type `{0}`")]
    UnknownType(String),

    #[error(transparent)]
    Mapping(#[from] MappingValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Anything that kills the whole batch rather than a single record.
#[derive(Debug, thiserror::Error)]
enum BatchError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Triggers one import batch for a sheet.
///
/// Configuration problems — an unknown target type, an invalid mapping
/// set — fail here synchronously, before any log exists. Once the log is
/// opened, every later failure is captured in its terminal status instead
/// of an error: row-level publish failures are isolated and recorded,
/// batch-fatal failures roll the batch back and mark it `Failure`.
///
/// One invocation is one run; the caller is expected to be a dedicated
/// worker, not a request-handling thread.
pub fn trigger_import(
    storage: &Storage,
    registry: &StrategyRegistry,
    sheet: &ImportedSheet,
    actor: &str,
    site: Option<&str>,
) -> Result<ImportLog, ImportError> {
    let strategy = registry
        .resolve(&sheet.definition.target_type)
        .ok_or_else(|| ImportError::UnknownType(sheet.definition.target_type.clone()))?;
    validate_definition(&sheet.definition, strategy)?;

    let mut log = ImportLog::begin(sheet.id, actor);
    storage.save_log(&log)?;
    log::info!(
        "import of sheet [{}] started by {actor}: {} rows",
        sheet.id,
        sheet.rows.len()
    );

    match run_batch(storage, strategy, sheet, actor, site, &mut log) {
        Ok((staged, published)) => {
            log::info!(
                "import of sheet [{}] finished: {published} of {staged} records published",
                sheet.id
            );
        }
        Err(e) => {
            log::error!("unable to complete import for sheet [{}]: {e}", sheet.id);
            log.errors.push(e.to_string());
            log.status = ImportStatus::Failure;
        }
    }

    storage.save_log(&log)?;
    Ok(log)
}

/// The batch body: reconcile every row in source order, then publish each
/// staged record as its own atomic unit.
///
/// Returns `(staged, published)` counts. The write scope is released on
/// every path out of here — committed on success, rolled back when an
/// error propagates.
fn run_batch(
    storage: &Storage,
    strategy: &dyn SheetReconciler,
    sheet: &ImportedSheet,
    actor: &str,
    site: Option<&str>,
    log: &mut ImportLog,
) -> Result<(usize, usize), BatchError> {
    let scope = storage.begin_isolated_writes()?;

    let mut staged = StagedSet::new();
    for row in &sheet.rows {
        strategy.reconcile_row(storage, &sheet.definition, row, actor, &mut staged)?;
    }

    let mut published = 0usize;
    for record in &staged {
        match scope.publish(record, site, actor) {
            Ok(()) => published += 1,
            Err(e) => {
                log::error!("unable to publish record [{}]: {e}", record.label());
                log.errors.push(format!("{}: {e}", record.label()));
            }
        }
    }

    log.status = aggregate_status(staged.len(), published);
    scope.commit()?;
    Ok((staged.len(), published))
}

/// Rolls N per-record outcomes into one batch status. Nothing to publish
/// is a success; staging work and publishing none of it is not.
fn aggregate_status(staged: usize, published: usize) -> ImportStatus {
    if published == staged {
        ImportStatus::Success
    } else if published > 0 {
        ImportStatus::PartiallySuccessful
    } else {
        ImportStatus::Failure
    }
}
