//! Record source seam.
//!
//! The export pipeline does not know where entities and their place
//! records live; backends plug in through [`RecordSource`]. Records are
//! handed over as a streaming iterator so a backend can page through a
//! database cursor without materializing the whole collection.

use crate::cache::{CacheKey, EntityType};
use crate::export::model::{Entity, ExportRecord};
use dashmap::DashMap;
use thiserror::Error;

/// Errors from a record backend.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No entity exists for the requested key.
    #[error("entity not found: {entity_type} {entity_id}")]
    NotFound {
        entity_type: EntityType,
        entity_id: i64,
    },

    /// The backend failed in a way the pipeline cannot recover from.
    #[error("record source error: {0}")]
    Backend(String),
}

/// Streaming iterator of export records.
pub type RecordIter = Box<dyn Iterator<Item = ExportRecord> + Send>;

/// Backend that can resolve an entity and stream its records.
pub trait RecordSource: Send + Sync + 'static {
    /// Loads the entity metadata for `key`.
    fn load_entity(&self, key: &CacheKey) -> Result<Entity, SourceError>;

    /// Opens a record stream for `key`. Called once per build; the
    /// iterator is consumed on a blocking thread.
    fn list_records(&self, key: &CacheKey) -> Result<RecordIter, SourceError>;
}

/// In-memory [`RecordSource`] for tests and small fixed datasets.
#[derive(Default)]
pub struct MemoryRecordSource {
    entries: DashMap<(EntityType, i64), (Entity, Vec<ExportRecord>)>,
}

impl MemoryRecordSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity and its records.
    pub fn insert(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        entity: Entity,
        records: Vec<ExportRecord>,
    ) {
        self.entries
            .insert((entity_type, entity_id), (entity, records));
    }
}

impl RecordSource for MemoryRecordSource {
    fn load_entity(&self, key: &CacheKey) -> Result<Entity, SourceError> {
        self.entries
            .get(&(key.entity_type, key.entity_id))
            .map(|entry| entry.0.clone())
            .ok_or(SourceError::NotFound {
                entity_type: key.entity_type,
                entity_id: key.entity_id,
            })
    }

    fn list_records(&self, key: &CacheKey) -> Result<RecordIter, SourceError> {
        let records = self
            .entries
            .get(&(key.entity_type, key.entity_id))
            .map(|entry| entry.1.clone())
            .ok_or(SourceError::NotFound {
                entity_type: key.entity_type,
                entity_id: key.entity_id,
            })?;
        Ok(Box::new(records.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ExportFormat;
    use crate::export::model::EntityClass;

    fn key(id: i64) -> CacheKey {
        CacheKey::new(EntityType::Dataset, id, ExportFormat::Feature)
    }

    #[test]
    fn test_memory_source_round_trip() {
        let source = MemoryRecordSource::new();
        let entity = Entity {
            id: 7,
            title: "Test Dataset".to_string(),
            class: EntityClass::Dataset,
            citation: None,
        };
        let record = ExportRecord {
            id: 101,
            title: "Place".to_string(),
            ..Default::default()
        };
        source.insert(EntityType::Dataset, 7, entity, vec![record]);

        let loaded = source.load_entity(&key(7)).unwrap();
        assert_eq!(loaded.title, "Test Dataset");
        let records: Vec<_> = source.list_records(&key(7)).unwrap().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 101);
    }

    #[test]
    fn test_missing_entity_is_not_found() {
        let source = MemoryRecordSource::new();
        let err = source.load_entity(&key(99)).unwrap_err();
        assert!(matches!(err, SourceError::NotFound { entity_id: 99, .. }));
    }
}
