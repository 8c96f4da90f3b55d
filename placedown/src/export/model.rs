//! Entities and their exportable records.
//!
//! These types mirror the shape the record source hands over: an entity
//! (dataset or collection) plus its constituent place records with
//! geometries, names, types, links, relations, and temporal spans. They
//! deserialize from the source's JSON and serialize back out as Linked
//! Places features.

use crate::geometry::Geometry;
use serde::{Deserialize, Serialize};

/// Link types that matter to the table export.
pub mod link_type {
    pub const CLOSE_MATCH: &str = "closeMatch";
    pub const EXACT_MATCH: &str = "exactMatch";
    pub const PRIMARY_TOPIC_OF: &str = "primaryTopicOf";
}

/// Relation types that identify a parent entity.
pub mod relation_type {
    pub const BROADER_PARTITIVE: &str = "gvp:broaderPartitive";
    pub const BROADER: &str = "broader";
    pub const PART_OF: &str = "partOf";
}

/// Identifier prefix of the Getty AAT vocabulary.
pub const AAT_VOCABULARY: &str = "vocab.getty.edu/aat";

/// Classification of an entity for export dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    /// A contributed dataset of places
    Dataset,
    /// A collection whose members are places
    PlaceCollection,
    /// A collection whose members are whole datasets
    DatasetCollection,
    /// Anything else; rejected in-stream
    Unsupported,
}

/// An exportable entity: a dataset or a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub class: EntityClass,
    /// CSL citation payload, emitted verbatim in the feature preamble.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<serde_json::Value>,
}

/// One place record of an entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ccodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geoms: Vec<RecordGeometry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<Toponym>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeAssertion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<RecordLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub whens: Vec<SpanSet>,
}

/// A record geometry with its provenance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordGeometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geom: Option<Geometry>,
    /// Source label of the geometry
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<GeometryCitation>,
}

/// Citation attached to a geometry: either a structured object carrying an
/// id, or a bare string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeometryCitation {
    Object {
        #[serde(default)]
        id: String,
    },
    Text(String),
}

impl GeometryCitation {
    /// The citation identifier as used in the `geo_id` column.
    pub fn id(&self) -> &str {
        match self {
            GeometryCitation::Object { id } => id,
            GeometryCitation::Text(text) => text,
        }
    }
}

/// A name with an optional language tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Toponym {
    pub toponym: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lang: String,
}

/// A place-type assertion with an optional vocabulary identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeAssertion {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identifier: String,
}

/// A typed external link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordLink {
    #[serde(rename = "type", default)]
    pub link_type: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
}

/// A relation to another entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "relationType", default)]
    pub relation_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "relationTo", default)]
    pub relation_to: String,
}

/// A set of temporal spans ("when" block).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanSet {
    #[serde(default)]
    pub timespans: Vec<Timespan>,
}

/// One temporal span with optional start and end bounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timespan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<SpanBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<SpanBound>,
}

/// A span bound; the `in` field carries the year or date expression.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanBound {
    #[serde(rename = "in", default)]
    pub value: String,
}
