//! Core data model for Stevedore.
//!
//! These types represent the import pipeline's vocabulary: field mappings,
//! rows and imported sheets, the records a row reconciles into, drafts
//! against published records, and the per-batch import log.

mod draft;
mod log;
mod mapping;
mod redirect;
mod sheet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use draft::{Draft, FieldDifference, FieldValue, find_differences};
pub use log::{ImportLog, ImportStatus};
pub use mapping::{FieldMapping, ImportDefinition, find_mapping};
pub use redirect::{QueryStringMode, VanityRedirect};
pub use sheet::{ImportedSheet, Row};

/// A record staged for publishing: either a redirect built from a row, or
/// a draft carrying changes to one that is already published.
///
/// Tagged enum so stored payloads are self-describing when read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "camelCase")]
pub enum StagedRecord {
    Redirect(VanityRedirect),
    Draft(Draft),
}

impl StagedRecord {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Redirect(redirect) => redirect.id,
            Self::Draft(draft) => draft.id,
        }
    }

    /// Repository type identifier for this record.
    pub fn type_id(&self) -> &'static str {
        match self {
            Self::Redirect(_) => "vanity-redirect",
            Self::Draft(_) => "draft",
        }
    }

    /// Identity context for error messages and logs.
    pub fn label(&self) -> String {
        match self {
            Self::Redirect(redirect) => redirect.display_name.clone(),
            Self::Draft(draft) => format!("{} (draft of {})", draft.name, draft.target_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_record_ids_and_types() {
        let redirect = VanityRedirect::new("/old");
        let id = redirect.id;
        let staged = StagedRecord::Redirect(redirect);

        assert_eq!(staged.id(), id);
        assert_eq!(staged.type_id(), "vanity-redirect");
        assert_eq!(staged.label(), "/old");
    }
}
