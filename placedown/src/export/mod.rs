//! Export serializers.
//!
//! Pure transformation of an entity and its record stream into a lazy
//! sequence of text chunks, one serializer per format. The stream engine
//! owns compression and sinks; nothing in here performs I/O.

mod feature;
pub mod model;
mod plan;
mod table;

pub use feature::{FeatureChunks, LICENSE_TEXT, LPF_CONTEXT};
pub use plan::{record_plan, RecordPlan, RejectReason};
pub use table::{TableChunks, TableOptions, TABLE_HEADERS};

use crate::cache::{EntityType, ExportFormat};
use model::{Entity, ExportRecord};

/// Chunk sequence of either format, chosen per cache key.
pub enum ExportChunks {
    Feature(FeatureChunks),
    Table(TableChunks),
}

impl Iterator for ExportChunks {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self {
            ExportChunks::Feature(chunks) => chunks.next(),
            ExportChunks::Table(chunks) => chunks.next(),
        }
    }
}

/// Builds the chunk sequence for one export.
pub fn export_chunks(
    format: ExportFormat,
    entity_type: EntityType,
    entity: &Entity,
    records: Box<dyn Iterator<Item = ExportRecord> + Send>,
    options: TableOptions,
) -> ExportChunks {
    match format {
        ExportFormat::Feature => {
            ExportChunks::Feature(FeatureChunks::new(entity_type, entity, records))
        }
        ExportFormat::Table => {
            ExportChunks::Table(TableChunks::new(entity_type, entity, records, options))
        }
    }
}
