//! Import logs: the audit record for one batch execution.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an import batch stands.
///
/// `InProgress` is written before any row is touched; exactly one terminal
/// state is written when the batch ends. A batch stuck in `InProgress`
/// means the process died mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportStatus {
    InProgress,
    Success,
    PartiallySuccessful,
    Failure,
}

impl ImportStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::InProgress => "in progress",
            Self::Success => "success",
            Self::PartiallySuccessful => "partially successful",
            Self::Failure => "failure",
        }
    }
}

/// One per batch execution: who triggered it, when, how it ended, and
/// every row- or batch-level failure captured along the way.
///
/// Owned by the repository; outlives the batch that wrote it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLog {
    pub id: Uuid,
    /// The imported sheet this run belongs to.
    pub object_id: Uuid,
    pub submission_date: Timestamp,
    pub submitted_by: String,
    pub status: ImportStatus,
    pub errors: Vec<String>,
}

impl ImportLog {
    /// Opens a new log entry in the `InProgress` state.
    pub fn begin(object_id: Uuid, submitted_by: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            object_id,
            submission_date: Timestamp::now(),
            submitted_by: submitted_by.to_string(),
            status: ImportStatus::InProgress,
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_opens_in_progress() {
        let log = ImportLog::begin(Uuid::new_v4(), "importer");

        assert_eq!(log.status, ImportStatus::InProgress);
        assert!(log.errors.is_empty());
    }

    #[test]
    fn only_in_progress_is_non_terminal() {
        assert!(!ImportStatus::InProgress.is_terminal());
        assert!(ImportStatus::Success.is_terminal());
        assert!(ImportStatus::PartiallySuccessful.is_terminal());
        assert!(ImportStatus::Failure.is_terminal());
    }
}
