//! Built-in field maps: output column → (tag path, extraction mode).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::models::{EntityKind, PositionSource, Record, Value, GEOMETRY_FIELD, POS_FIELD};
use crate::xml::ExtractMode;

/// Where one output field comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSpec {
    pub path: Vec<String>,
    #[serde(default = "default_mode")]
    pub mode: ExtractMode,
}

fn default_mode() -> ExtractMode {
    ExtractMode::Field
}

impl FieldSpec {
    pub fn new(path: &[&str], mode: ExtractMode) -> Self {
        Self {
            path: path.iter().map(|s| s.to_string()).collect(),
            mode,
        }
    }
}

pub type FieldMap = BTreeMap<String, FieldSpec>;

/// Columns filled after extraction for kinds with a position.
pub const POSITION_FIELDS: &[&str] = &["rd_x", "rd_y", "latitude", "longitude"];

const LIFECYCLE: &[(&str, &str)] = &[
    ("begin_date", "beginGeldigheid"),
    ("end_date", "eindGeldigheid"),
    ("status", "status"),
];

fn insert(map: &mut FieldMap, field: &str, path: &[&str], mode: ExtractMode) {
    map.insert(field.to_string(), FieldSpec::new(path, mode));
}

fn field(map: &mut FieldMap, field: &str, tag: &str) {
    insert(map, field, &[tag], ExtractMode::Field);
}

fn lifecycle(map: &mut FieldMap) {
    for (name, tag) in LIFECYCLE {
        field(map, name, tag);
    }
}

/// Default field map of a kind.
///
/// Place and Building footprints are only extracted when geometries are
/// wanted; Berth and Pitch always need theirs for the position.
pub fn default_fields(kind: EntityKind, parse_geometries: bool) -> FieldMap {
    use ExtractMode::*;

    let mut map = FieldMap::new();
    match kind {
        EntityKind::Place => {
            field(&mut map, "id", "identificatie");
            field(&mut map, "name", "naam");
            lifecycle(&mut map);
            if parse_geometries {
                field(&mut map, GEOMETRY_FIELD, "posList");
            }
        }
        EntityKind::PlaceMunicipality => {
            field(&mut map, "begin_date", "begindatumTijdvakGeldigheid");
            field(&mut map, "end_date", "einddatumTijdvakGeldigheid");
            field(&mut map, "status", "status");
            insert(
                &mut map,
                "place_id",
                &["gerelateerdeWoonplaats", "identificatie"],
                Nested,
            );
            insert(
                &mut map,
                "municipality_id",
                &["gerelateerdeGemeente", "identificatie"],
                Nested,
            );
        }
        EntityKind::PublicSpace => {
            field(&mut map, "id", "identificatie");
            field(&mut map, "name", "naam");
            field(&mut map, "type", "type");
            lifecycle(&mut map);
            field(&mut map, "place_id", "WoonplaatsRef");
            insert(
                &mut map,
                "short_name",
                &["verkorteNaam", "VerkorteNaamOpenbareRuimte", "verkorteNaam"],
                Nested,
            );
        }
        EntityKind::Number => {
            field(&mut map, "id", "identificatie");
            field(&mut map, "postcode", "postcode");
            field(&mut map, "house_number", "huisnummer");
            field(&mut map, "house_letter", "huisletter");
            field(&mut map, "addition", "huisnummertoevoeging");
            lifecycle(&mut map);
            field(&mut map, "public_space_id", "OpenbareRuimteRef");
            field(&mut map, "place_id", "WoonplaatsRef");
        }
        EntityKind::Building => {
            field(&mut map, "id", "identificatie");
            field(&mut map, "construction_year", "oorspronkelijkBouwjaar");
            lifecycle(&mut map);
            if parse_geometries {
                field(&mut map, GEOMETRY_FIELD, "posList");
            }
        }
        EntityKind::Unit => {
            field(&mut map, "id", "identificatie");
            field(&mut map, "floor_area", "oppervlakte");
            insert(&mut map, "purposes", &["gebruiksdoel"], FieldMulti);
            field(&mut map, POS_FIELD, "pos");
            lifecycle(&mut map);
            insert(&mut map, "building_ids", &["PandRef"], FieldMulti);
            insert(
                &mut map,
                "number_id",
                &["heeftAlsHoofdadres", "NummeraanduidingRef"],
                Nested,
            );
            insert(
                &mut map,
                "secondary_number_ids",
                &["heeftAlsNevenadres", "NummeraanduidingRef"],
                NestedMulti,
            );
        }
        EntityKind::Berth | EntityKind::Pitch => {
            field(&mut map, "id", "identificatie");
            field(&mut map, GEOMETRY_FIELD, "posList");
            lifecycle(&mut map);
            insert(
                &mut map,
                "number_id",
                &["heeftAlsHoofdadres", "NummeraanduidingRef"],
                Nested,
            );
        }
    }
    map
}

/// Template every record starts from: all mapped fields null, plus the
/// derived position and geometry columns the kind fills later.
pub fn default_template(kind: EntityKind, fields: &FieldMap) -> Record {
    let mut template = Record::new();
    for name in fields.keys() {
        template.set(name, Value::Null);
    }
    if kind.position_source().is_some() {
        for name in POSITION_FIELDS {
            template.set(name, Value::Null);
        }
    }
    if kind.geometry_dimension().is_some() {
        template.set(GEOMETRY_FIELD, Value::Null);
    }
    if kind.position_source() == Some(PositionSource::Pos) {
        // Converted into rd_x/rd_y and never stored
        template.remove(POS_FIELD);
    }
    template
}
