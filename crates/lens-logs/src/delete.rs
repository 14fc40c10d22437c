//! Bulk deletion by query and time range.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::query::select_matching;
use crate::traits::LogRepository;
use crate::types::DeleteSpec;

/// Result of a bulk deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Deletions the backend confirmed
    pub deleted_count: usize,
    /// False only when the match set could not be computed
    pub success: bool,
    /// Human-readable summary
    pub message: String,
}

/// Deletes every entry matched by a [`DeleteSpec`].
#[derive(Clone)]
pub struct DeletionEngine {
    repository: Arc<dyn LogRepository>,
}

impl DeletionEngine {
    /// Creates a deletion engine over the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn LogRepository>) -> Self {
        Self { repository }
    }

    /// Selects and filters the corpus, then deletes matches one by one.
    ///
    /// A failed individual delete is skipped and does not stop the rest.
    #[must_use]
    pub fn delete(&self, spec: &DeleteSpec) -> DeleteOutcome {
        let matches = match select_matching(
            self.repository.as_ref(),
            &spec.query,
            spec.time_range(),
        ) {
            Ok(matches) => matches,
            Err(e) => {
                error!(error = %e, query = %spec.query, "Deletion retrieval failed");
                return DeleteOutcome {
                    deleted_count: 0,
                    success: false,
                    message: format!("Failed to delete logs: {e}"),
                };
            }
        };

        let mut deleted_count = 0;
        for entry in &matches {
            match self.repository.delete_by_id(&entry.id) {
                Ok(true) => deleted_count += 1,
                Ok(false) => {
                    warn!(id = %entry.id, "Entry vanished before it could be deleted");
                }
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "Failed to delete entry, skipping");
                }
            }
        }

        info!(
            matched = matches.len(),
            deleted = deleted_count,
            query = %spec.query,
            "Bulk deletion completed"
        );

        DeleteOutcome {
            deleted_count,
            success: true,
            message: format!("Successfully deleted {deleted_count} logs"),
        }
    }
}

impl std::fmt::Debug for DeletionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionEngine").finish_non_exhaustive()
    }
}
