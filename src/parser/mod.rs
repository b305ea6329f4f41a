//! Per-shard document parsing.
//!
//! One shard is parsed into a tree, every object element of the configured
//! kind becomes a [`Record`], inactive records are dropped and positions and
//! geometry are derived. Parsing is a pure function of the document and the
//! [`KindConfig`], which is what lets the orchestrator run it on any worker.

pub mod fields;

use tracing::warn;

use crate::config::KindConfig;
use crate::error::{BagError, Result};
use crate::models::{EntityKind, PositionSource, Record, Value, GEOMETRY_FIELD, POS_FIELD};
use crate::projection::{
    first_position, parse_position, polygon_to_geojson, rd_to_wgs84, ring_to_polygon,
};
use crate::xml::{extract, Element, ExtractMode};

/// Output of one shard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedShard {
    /// Object elements seen, before filtering
    pub raw_count: usize,
    pub records: Vec<Record>,
}

/// Parse one document.
///
/// `today` is an ISO `YYYY-MM-DD` date fixed for the whole run.
pub fn parse_document(
    xml: &str,
    shard: &str,
    config: &KindConfig,
    today: &str,
) -> Result<ParsedShard> {
    let root = Element::parse(xml).map_err(|e| BagError::xml(shard, e))?;

    let unrecognized: Vec<&str> = config
        .fields
        .iter()
        .filter(|(_, spec)| spec.mode == ExtractMode::Unrecognized)
        .map(|(name, _)| name.as_str())
        .collect();
    for name in &unrecognized {
        warn!(
            "{}: unrecognized extraction mode for field '{}', storing null",
            shard, name
        );
    }

    let mut objects = Vec::new();
    collect_objects(&root, config.kind.object_tag(), &mut objects);

    let mut parsed = ParsedShard {
        raw_count: objects.len(),
        records: Vec::with_capacity(objects.len()),
    };

    for object in objects {
        let mut record = config.defaults.clone();
        for (name, spec) in &config.fields {
            let value = extract(object, spec.path.as_slice(), spec.mode);
            record.set(name, Value::from(value));
        }

        if config.active_only && !is_active(&record, config.kind, today) {
            continue;
        }

        attach_position(&mut record, config.kind);
        structure_geometry(&mut record, config);
        parsed.records.push(record);
    }

    Ok(parsed)
}

/// Outermost elements with the object tag; objects never nest.
fn collect_objects<'a>(element: &'a Element, tag: &str, out: &mut Vec<&'a Element>) {
    if element.name() == tag {
        out.push(element);
        return;
    }
    for child in element.children() {
        collect_objects(child, tag, out);
    }
}

fn date_part(date: &str) -> &str {
    date.get(..10).unwrap_or(date)
}

/// Status and validity window check against `today`.
pub fn is_active(record: &Record, kind: EntityKind, today: &str) -> bool {
    if let Some(label) = kind.active_status() {
        if record.text("status") != Some(label) {
            return false;
        }
    }

    let Some(begin) = record.text("begin_date") else {
        return false;
    };
    if date_part(begin) > today {
        return false;
    }

    match record.text("end_date") {
        Some(end) => date_part(end) >= today,
        None => true,
    }
}

fn attach_position(record: &mut Record, kind: EntityKind) {
    let position = match kind.position_source() {
        Some(PositionSource::Pos) => record
            .remove(POS_FIELD)
            .and_then(|v| v.as_str().and_then(parse_position)),
        Some(PositionSource::Geometry) => record.text(GEOMETRY_FIELD).and_then(first_position),
        None => return,
    };

    if let Some((x, y)) = position {
        let (lat, lon) = rd_to_wgs84(x, y);
        record.set("rd_x", x);
        record.set("rd_y", y);
        record.set("latitude", lat);
        record.set("longitude", lon);
    }
}

fn structure_geometry(record: &mut Record, config: &KindConfig) {
    let Some(dimension) = config.kind.geometry_dimension() else {
        return;
    };

    let geometry = if config.parse_geometries {
        record
            .text(GEOMETRY_FIELD)
            .and_then(|ring| ring_to_polygon(ring, dimension))
            .map(|polygon| Value::Text(polygon_to_geojson(&polygon)))
            .unwrap_or(Value::Null)
    } else {
        Value::Null
    };
    record.set(GEOMETRY_FIELD, geometry);
}
