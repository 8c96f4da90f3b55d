//! Cache key derivation.
//!
//! A [`CacheKey`] identifies one exportable artifact by entity type, entity
//! id, and export format. Every other coordination-store key (build lock,
//! task id, throttle bookkeeping, pending flag) and the on-disk cache path
//! are derived from it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing entity types or export formats.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Unrecognized entity type string
    #[error("Unsupported entity type: {0}")]
    UnsupportedEntityType(String),

    /// Unrecognized export format string
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
}

/// Kind of entity an artifact is exported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    /// A contributed dataset of places
    Dataset,
    /// A curated collection of places
    Collection,
}

impl EntityType {
    /// Returns the string used in key derivation and filenames.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Dataset => "dataset",
            EntityType::Collection => "collection",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dataset" => Ok(EntityType::Dataset),
            "collection" => Ok(EntityType::Collection),
            other => Err(KeyError::UnsupportedEntityType(other.to_string())),
        }
    }
}

/// Export format of an artifact.
///
/// The feature format is a Linked Places feature collection; the table
/// format is a fixed-schema tab-separated export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportFormat {
    /// Linked Places feature collection (`.lpf.gz`)
    #[default]
    Feature,
    /// Tab-separated table (`.tsv.gz`)
    Table,
}

impl ExportFormat {
    /// Short code used as the namespace prefix of coordination keys.
    pub fn short_code(self) -> &'static str {
        match self {
            ExportFormat::Feature => "lpf",
            ExportFormat::Table => "tsv",
        }
    }

    /// File extension of the compressed artifact.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Feature => "lpf.gz",
            ExportFormat::Table => "tsv.gz",
        }
    }

    /// Content type declared when streaming this format.
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Feature => "application/json",
            ExportFormat::Table => "text/tab-separated-values",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_code())
    }
}

impl FromStr for ExportFormat {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lpf" => Ok(ExportFormat::Feature),
            "tsv" => Ok(ExportFormat::Table),
            other => Err(KeyError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Immutable identity of one exportable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Entity kind (dataset or collection)
    pub entity_type: EntityType,
    /// Entity primary key
    pub entity_id: i64,
    /// Export format
    pub format: ExportFormat,
}

impl CacheKey {
    /// Creates a new cache key.
    pub fn new(entity_type: EntityType, entity_id: i64, format: ExportFormat) -> Self {
        Self {
            entity_type,
            entity_id,
            format,
        }
    }

    /// Filename of the compressed artifact, also used as the download
    /// disposition filename.
    pub fn cache_filename(&self) -> String {
        format!(
            "placedown_{}_{}.{}",
            self.entity_type,
            self.entity_id,
            self.format.extension()
        )
    }

    /// Full canonical path of the artifact under `cache_dir`.
    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(self.cache_filename())
    }

    /// Coordination-store key of the build lock.
    pub fn lock_key(&self) -> String {
        self.namespaced("build_lock")
    }

    /// Coordination-store key of the in-flight build task id.
    pub fn task_key(&self) -> String {
        self.namespaced("build_task")
    }

    /// Coordination-store key of the last successful rebuild timestamp.
    pub fn last_rebuild_key(&self) -> String {
        self.namespaced("last_rebuild")
    }

    /// Coordination-store key of the pending deferred-rebuild flag.
    pub fn pending_key(&self) -> String {
        self.namespaced("pending_rebuild")
    }

    fn namespaced(&self, kind: &str) -> String {
        format!(
            "{}_{}:{}:{}",
            self.format.short_code(),
            kind,
            self.entity_type,
            self.entity_id
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.entity_type, self.entity_id, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_round_trip() {
        assert_eq!("dataset".parse::<EntityType>(), Ok(EntityType::Dataset));
        assert_eq!(
            "collection".parse::<EntityType>(),
            Ok(EntityType::Collection)
        );
        assert_eq!(EntityType::Dataset.as_str(), "dataset");
    }

    #[test]
    fn test_entity_type_rejects_unknown() {
        let err = "region".parse::<EntityType>().unwrap_err();
        assert_eq!(err, KeyError::UnsupportedEntityType("region".to_string()));
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(ExportFormat::Feature.short_code(), "lpf");
        assert_eq!(ExportFormat::Table.short_code(), "tsv");
        assert_eq!(ExportFormat::Feature.extension(), "lpf.gz");
        assert_eq!(ExportFormat::Table.extension(), "tsv.gz");
    }

    #[test]
    fn test_format_default_is_feature() {
        assert_eq!(ExportFormat::default(), ExportFormat::Feature);
    }

    #[test]
    fn test_format_rejects_unknown() {
        let err = "csv".parse::<ExportFormat>().unwrap_err();
        assert_eq!(err, KeyError::UnsupportedFormat("csv".to_string()));
    }

    #[test]
    fn test_cache_filename() {
        let key = CacheKey::new(EntityType::Dataset, 42, ExportFormat::Feature);
        assert_eq!(key.cache_filename(), "placedown_dataset_42.lpf.gz");

        let key = CacheKey::new(EntityType::Collection, 7, ExportFormat::Table);
        assert_eq!(key.cache_filename(), "placedown_collection_7.tsv.gz");
    }

    #[test]
    fn test_cache_path() {
        let key = CacheKey::new(EntityType::Dataset, 42, ExportFormat::Table);
        let path = key.cache_path(Path::new("/data/downloads"));
        assert_eq!(
            path,
            PathBuf::from("/data/downloads/placedown_dataset_42.tsv.gz")
        );
    }

    #[test]
    fn test_namespaced_keys() {
        let key = CacheKey::new(EntityType::Collection, 3, ExportFormat::Feature);
        assert_eq!(key.lock_key(), "lpf_build_lock:collection:3");
        assert_eq!(key.task_key(), "lpf_build_task:collection:3");
        assert_eq!(key.last_rebuild_key(), "lpf_last_rebuild:collection:3");
        assert_eq!(key.pending_key(), "lpf_pending_rebuild:collection:3");
    }

    #[test]
    fn test_keys_distinct_per_format() {
        let lpf = CacheKey::new(EntityType::Dataset, 1, ExportFormat::Feature);
        let tsv = CacheKey::new(EntityType::Dataset, 1, ExportFormat::Table);
        assert_ne!(lpf.lock_key(), tsv.lock_key());
        assert_ne!(lpf.cache_filename(), tsv.cache_filename());
    }
}
