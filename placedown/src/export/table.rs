//! Tab-separated table serializer.
//!
//! Emits the fixed 18-column header, then one row per record. Column
//! derivation follows the LP-TSV conventions; every failure inside a row
//! degrades to an empty or reduced field rather than aborting the stream.

use crate::cache::{EntityType, ExportFormat};
use crate::export::model::{
    link_type, relation_type, Entity, ExportRecord, AAT_VOCABULARY,
};
use crate::export::plan::{record_plan, RecordPlan};
use crate::geometry::encode_bounded;

/// Column order of the table export.
pub const TABLE_HEADERS: [&str; 18] = [
    "id",
    "title",
    "title_source",
    "title_uri",
    "ccodes",
    "matches",
    "names",
    "types",
    "aat_types",
    "parent_name",
    "parent_id",
    "lon",
    "lat",
    "geowkt",
    "geo_source",
    "geo_id",
    "start",
    "end",
];

/// Geometry-encoding knobs for the `geowkt` column.
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    /// Maximum characters of the `geowkt` field
    pub max_wkt_len: usize,
    /// Simplification tolerance in degrees
    pub simplify_tolerance: f64,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            max_wkt_len: 10_000,
            simplify_tolerance: 0.01,
        }
    }
}

enum State {
    Header,
    Reject(&'static str),
    Records,
    Done,
}

/// Lazy chunk sequence for one table export.
pub struct TableChunks {
    state: State,
    plan: RecordPlan,
    records: Box<dyn Iterator<Item = ExportRecord> + Send>,
    options: TableOptions,
}

impl TableChunks {
    /// Builds the chunk sequence for `entity` and its records.
    pub fn new(
        entity_type: EntityType,
        entity: &Entity,
        records: Box<dyn Iterator<Item = ExportRecord> + Send>,
        options: TableOptions,
    ) -> Self {
        Self {
            state: State::Header,
            plan: record_plan(entity_type, entity.class),
            records,
            options,
        }
    }
}

impl Iterator for TableChunks {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match &self.state {
            State::Header => {
                self.state = match self.plan {
                    RecordPlan::Stream => State::Records,
                    RecordPlan::Reject(reason) => {
                        State::Reject(reason.message(ExportFormat::Table))
                    }
                };
                Some(format!("{}\n", TABLE_HEADERS.join("\t")))
            }
            State::Reject(message) => {
                let chunk = format!("Error: {}\n", message);
                self.state = State::Done;
                Some(chunk)
            }
            State::Records => match self.records.next() {
                Some(record) => Some(row(&record, &self.options)),
                None => {
                    self.state = State::Done;
                    None
                }
            },
            State::Done => None,
        }
    }
}

/// Builds one sanitized, tab-joined row.
fn row(record: &ExportRecord, options: &TableOptions) -> String {
    let (lon, lat, geowkt, geo_source, geo_id) = geometry_columns(record, options);
    let (start, end) = temporal_columns(record);
    let (title_source, title_uri) = title_link(record);
    let (parent_name, parent_id) = parent(record);
    let (types, aat_types) = type_columns(record);

    let fields = [
        record.id.to_string(),
        record.title.clone(),
        title_source,
        title_uri,
        record.ccodes.join(";"),
        matches(record),
        names(record),
        types,
        aat_types,
        parent_name,
        parent_id,
        lon,
        lat,
        geowkt,
        geo_source,
        geo_id,
        start,
        end,
    ];

    let sanitized: Vec<String> = fields.iter().map(|f| sanitize(f)).collect();
    format!("{}\n", sanitized.join("\t"))
}

/// Tabs become spaces, carriage returns and newlines are removed, then the
/// value is trimmed.
fn sanitize(field: &str) -> String {
    field
        .replace('\t', " ")
        .replace(['\r', '\n'], "")
        .trim()
        .to_string()
}

fn geometry_columns(
    record: &ExportRecord,
    options: &TableOptions,
) -> (String, String, String, String, String) {
    let Some(primary) = record.geoms.first() else {
        return Default::default();
    };

    let (mut lon, mut lat, mut geowkt) = (String::new(), String::new(), String::new());
    if let Some(geom) = &primary.geom {
        if let Some([x, y]) = geom.primary_coordinate() {
            lon = x.to_string();
            lat = y.to_string();
        }
        geowkt = encode_bounded(geom, options.max_wkt_len, options.simplify_tolerance);
    }

    let geo_source = primary.src.clone();
    let geo_id = primary
        .citation
        .as_ref()
        .map(|c| c.id().to_string())
        .unwrap_or_default();

    (lon, lat, geowkt, geo_source, geo_id)
}

/// First non-empty start and end values across all timespans, in record
/// order; the search stops once both are found.
fn temporal_columns(record: &ExportRecord) -> (String, String) {
    let mut start = String::new();
    let mut end = String::new();

    'outer: for span_set in &record.whens {
        for timespan in &span_set.timespans {
            if start.is_empty() {
                if let Some(bound) = &timespan.start {
                    if !bound.value.is_empty() {
                        start = bound.value.clone();
                    }
                }
            }
            if end.is_empty() {
                if let Some(bound) = &timespan.end {
                    if !bound.value.is_empty() {
                        end = bound.value.clone();
                    }
                }
            }
            if !start.is_empty() && !end.is_empty() {
                break 'outer;
            }
        }
    }

    (start, end)
}

fn names(record: &ExportRecord) -> String {
    record
        .names
        .iter()
        .filter(|n| !n.toponym.is_empty())
        .map(|n| {
            if n.lang.is_empty() {
                n.toponym.clone()
            } else {
                format!("{}@{}", n.toponym, n.lang)
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn type_columns(record: &ExportRecord) -> (String, String) {
    let labels: Vec<&str> = record
        .types
        .iter()
        .filter(|t| !t.label.is_empty())
        .map(|t| t.label.as_str())
        .collect();
    let aat: Vec<&str> = record
        .types
        .iter()
        .filter(|t| t.identifier.contains(AAT_VOCABULARY))
        .map(|t| t.identifier.as_str())
        .collect();
    (labels.join(";"), aat.join(";"))
}

fn matches(record: &ExportRecord) -> String {
    record
        .links
        .iter()
        .filter(|l| {
            (l.link_type == link_type::CLOSE_MATCH || l.link_type == link_type::EXACT_MATCH)
                && !l.identifier.is_empty()
        })
        .map(|l| l.identifier.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

fn title_link(record: &ExportRecord) -> (String, String) {
    record
        .links
        .iter()
        .find(|l| l.link_type == link_type::PRIMARY_TOPIC_OF)
        .map(|l| (l.label.clone(), l.identifier.clone()))
        .unwrap_or_default()
}

fn parent(record: &ExportRecord) -> (String, String) {
    record
        .related
        .iter()
        .find(|r| {
            matches!(
                r.relation_type.as_str(),
                relation_type::BROADER_PARTITIVE
                    | relation_type::BROADER
                    | relation_type::PART_OF
            )
        })
        .map(|r| (r.label.clone(), r.relation_to.clone()))
        .unwrap_or_default()
}
