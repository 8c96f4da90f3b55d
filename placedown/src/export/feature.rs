//! Linked Places feature-collection serializer.
//!
//! Produces a lazy, finite, non-restartable sequence of text chunks: a
//! fixed preamble (context, optional citation, license), then the records
//! array with each record independently serialized and comma-joined, then
//! the closing brackets. Rejected entity kinds emit an inline error object
//! in place of records, because by then the stream has already committed
//! to its content type.

use crate::cache::{EntityType, ExportFormat};
use crate::export::model::{Entity, ExportRecord};
use crate::export::plan::{record_plan, RecordPlan};
use serde::Serialize;
use tracing::warn;

/// JSON-LD context of the Linked Places format.
pub const LPF_CONTEXT: &str =
    "https://raw.githubusercontent.com/LinkedPasts/linked-places/master/linkedplaces-context-v1.1.jsonld";

/// Fixed license statement carried in every feature export.
pub const LICENSE_TEXT: &str =
    "Unless specified otherwise, all content created for or uploaded to this gazetteer - \
     including editorial content, documentation, images, and contributed datasets and \
     collections - is licensed under a Creative Commons Attribution-NonCommercial 4.0 \
     International License. Externally hosted datasets and content linked to from here \
     remain under the copyrights and licenses specified by their original contributors.";

#[derive(Serialize)]
struct FeatureDoc<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    record: &'a ExportRecord,
}

enum State {
    Preamble(std::vec::IntoIter<String>),
    Reject(&'static str),
    Records,
    Close,
    Final,
    Done,
}

/// Lazy chunk sequence for one feature-collection export.
pub struct FeatureChunks {
    state: State,
    plan: RecordPlan,
    records: Box<dyn Iterator<Item = ExportRecord> + Send>,
    first: bool,
}

impl FeatureChunks {
    /// Builds the chunk sequence for `entity` and its records.
    pub fn new(
        entity_type: EntityType,
        entity: &Entity,
        records: Box<dyn Iterator<Item = ExportRecord> + Send>,
    ) -> Self {
        let mut preamble = vec![format!(
            "{{\"@context\":{},\"type\":\"FeatureCollection\"",
            json_string(LPF_CONTEXT)
        )];
        if let Some(citation) = &entity.citation {
            // citation is already a JSON value; to_string cannot fail here.
            if let Ok(encoded) = serde_json::to_string(citation) {
                preamble.push(format!(",\"citation\":{}", encoded));
            }
        }
        preamble.push(format!(",\"license\":{}", json_string(LICENSE_TEXT)));
        preamble.push(",\"features\":[".to_string());

        Self {
            state: State::Preamble(preamble.into_iter()),
            plan: record_plan(entity_type, entity.class),
            records,
            first: true,
        }
    }
}

impl Iterator for FeatureChunks {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            match &mut self.state {
                State::Preamble(chunks) => {
                    if let Some(chunk) = chunks.next() {
                        return Some(chunk);
                    }
                    self.state = match self.plan {
                        RecordPlan::Stream => State::Records,
                        RecordPlan::Reject(reason) => {
                            State::Reject(reason.message(ExportFormat::Feature))
                        }
                    };
                }
                State::Reject(message) => {
                    let chunk = format!(
                        "],\"error\":{{\"message\":{}}}}}",
                        json_string(message)
                    );
                    self.state = State::Done;
                    return Some(chunk);
                }
                State::Records => match self.records.next() {
                    Some(record) => {
                        let doc = FeatureDoc {
                            kind: "Feature",
                            record: &record,
                        };
                        match serde_json::to_string(&doc) {
                            Ok(json) => {
                                let chunk = if self.first {
                                    self.first = false;
                                    json
                                } else {
                                    format!(",{}", json)
                                };
                                return Some(chunk);
                            }
                            Err(error) => {
                                // Per-record degradation: drop the record,
                                // never abort the artifact.
                                warn!(record_id = record.id, %error, "Skipping unserializable record");
                            }
                        }
                    }
                    None => {
                        self.state = State::Close;
                        return Some("]".to_string());
                    }
                },
                State::Close => {
                    self.state = State::Final;
                    return Some("}".to_string());
                }
                State::Final | State::Done => return None,
            }
        }
    }
}

fn json_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::model::EntityClass;

    fn entity(class: EntityClass) -> Entity {
        Entity {
            id: 11,
            title: "Test".to_string(),
            class,
            citation: None,
        }
    }

    fn no_records() -> Box<dyn Iterator<Item = ExportRecord> + Send> {
        Box::new(std::iter::empty())
    }

    fn collect(chunks: FeatureChunks) -> String {
        chunks.collect::<Vec<_>>().concat()
    }

    #[test]
    fn test_empty_dataset_is_well_formed() {
        let chunks = FeatureChunks::new(EntityType::Dataset, &entity(EntityClass::Dataset), no_records());
        let doc: serde_json::Value = serde_json::from_str(&collect(chunks)).unwrap();

        assert_eq!(doc["type"], "FeatureCollection");
        assert_eq!(doc["@context"], LPF_CONTEXT);
        assert_eq!(doc["features"], serde_json::json!([]));
        assert!(doc.get("error").is_none());
        assert!(doc["license"].as_str().unwrap().contains("Creative Commons"));
    }

    #[test]
    fn test_citation_included_when_present() {
        let mut ent = entity(EntityClass::Dataset);
        ent.citation = Some(serde_json::json!({"title": "My Dataset", "year": 2024}));
        let chunks = FeatureChunks::new(EntityType::Dataset, &ent, no_records());
        let doc: serde_json::Value = serde_json::from_str(&collect(chunks)).unwrap();
        assert_eq!(doc["citation"]["title"], "My Dataset");
    }

    #[test]
    fn test_records_comma_joined() {
        let records: Vec<ExportRecord> = (1..=3)
            .map(|id| ExportRecord {
                id,
                title: format!("Place {}", id),
                ..Default::default()
            })
            .collect();
        let chunks = FeatureChunks::new(
            EntityType::Dataset,
            &entity(EntityClass::Dataset),
            Box::new(records.into_iter()),
        );
        let doc: serde_json::Value = serde_json::from_str(&collect(chunks)).unwrap();

        let features = doc["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["type"], "Feature");
        assert_eq!(features[2]["title"], "Place 3");
    }

    #[test]
    fn test_dataset_collection_rejected_inline() {
        let chunks = FeatureChunks::new(
            EntityType::Collection,
            &entity(EntityClass::DatasetCollection),
            no_records(),
        );
        let doc: serde_json::Value = serde_json::from_str(&collect(chunks)).unwrap();

        assert_eq!(doc["features"], serde_json::json!([]));
        assert!(doc["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Dataset collections may not be downloaded"));
    }

    #[test]
    fn test_unsupported_collection_rejected_inline() {
        let chunks = FeatureChunks::new(
            EntityType::Collection,
            &entity(EntityClass::Unsupported),
            no_records(),
        );
        let doc: serde_json::Value = serde_json::from_str(&collect(chunks)).unwrap();
        assert!(doc["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("LPF export by streaming"));
    }

    #[test]
    fn test_chunks_are_lazy() {
        // The record iterator must not be advanced before its chunk is
        // requested.
        struct CountingIter {
            pulled: std::sync::Arc<std::sync::atomic::AtomicUsize>,
        }
        impl Iterator for CountingIter {
            type Item = ExportRecord;
            fn next(&mut self) -> Option<ExportRecord> {
                self.pulled
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                None
            }
        }

        let pulled = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut chunks = FeatureChunks::new(
            EntityType::Dataset,
            &entity(EntityClass::Dataset),
            Box::new(CountingIter {
                pulled: std::sync::Arc::clone(&pulled),
            }),
        );

        // Preamble chunks only; no record pull yet.
        let first = chunks.next().unwrap();
        assert!(first.starts_with("{\"@context\""));
        assert_eq!(pulled.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
