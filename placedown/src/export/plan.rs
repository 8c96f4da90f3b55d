//! Export dispatch per entity kind.
//!
//! The per-request branching on (entity type, entity class) is a single
//! closed match: either the records stream, or the export is rejected
//! in-stream with a fixed message. Adding an entity kind means adding an
//! arm here and nowhere else.

use crate::cache::{EntityType, ExportFormat};
use crate::export::model::EntityClass;

/// Whether an entity's records stream or the export is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPlan {
    /// Stream the entity's records.
    Stream,
    /// Emit an in-stream rejection instead of records.
    Reject(RejectReason),
}

/// Why an export was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Collections of whole datasets must be downloaded per dataset.
    DatasetCollection,
    /// Entity kind has no streaming export path.
    Unsupported,
}

impl RejectReason {
    /// Fixed message emitted as stream content.
    ///
    /// The stream has already committed to a content type by the time the
    /// rejection is known, so this is content, not a transport error.
    pub fn message(self, format: ExportFormat) -> &'static str {
        match (self, format) {
            (RejectReason::DatasetCollection, _) => {
                "Dataset collections may not be downloaded. \
                 Please download each constituent dataset individually."
            }
            (RejectReason::Unsupported, ExportFormat::Feature) => {
                "LPF export by streaming is only supported for datasets and place collections."
            }
            (RejectReason::Unsupported, ExportFormat::Table) => {
                "TSV export by streaming is only supported for datasets and place collections."
            }
        }
    }
}

/// Chooses the plan for an entity.
pub fn record_plan(entity_type: EntityType, class: EntityClass) -> RecordPlan {
    match (entity_type, class) {
        (EntityType::Dataset, _) => RecordPlan::Stream,
        (EntityType::Collection, EntityClass::DatasetCollection) => {
            RecordPlan::Reject(RejectReason::DatasetCollection)
        }
        (EntityType::Collection, EntityClass::PlaceCollection) => RecordPlan::Stream,
        (EntityType::Collection, _) => RecordPlan::Reject(RejectReason::Unsupported),
    }
}
