//! Units that sit in more than one building.
//!
//! Their `building_ids` is a tab list, so the base join finds no building for
//! them. The list is unnested in SQL, each building joined on its own, and
//! the rows folded back into one aggregate per unit here.

use tracing::info;

use super::sql::{tab_list_json, unit_address_insert};
use crate::error::Result;
use crate::models::{Record, Value};
use crate::projection::union_footprints;
use crate::store::{schema, Store};

const AGGREGATES: &str = "unit_building_aggregates";

const CREATE_AGGREGATES: &str = "CREATE TEMP TABLE unit_building_aggregates (
    unit_id TEXT PRIMARY KEY,
    building_ids TEXT,
    construction_year INTEGER,
    geometry TEXT,
    begin_date TEXT,
    end_date TEXT)";

/// One (unit, referenced building) pair; building columns are null when the
/// building is not in the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuildingRow {
    pub unit_id: String,
    pub building_id: String,
    pub found: bool,
    pub construction_year: Option<i64>,
    pub geometry: Option<String>,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingAggregate {
    pub unit_id: String,
    /// Every referenced id, in reference order
    pub building_ids: Vec<String>,
    /// Oldest construction year
    pub construction_year: Option<i64>,
    /// Union of the footprints
    pub geometry: Option<String>,
    pub begin_date: Option<String>,
    /// `None` while any building is still valid
    pub end_date: Option<String>,
}

impl BuildingAggregate {
    fn to_record(&self) -> Record {
        let ids = serde_json::to_string(&self.building_ids).ok();
        [
            ("unit_id", Value::from(self.unit_id.as_str())),
            ("building_ids", Value::from(ids)),
            (
                "construction_year",
                self.construction_year.map(Value::Integer).unwrap_or_default(),
            ),
            ("geometry", Value::from(self.geometry.clone())),
            ("begin_date", Value::from(self.begin_date.clone())),
            ("end_date", Value::from(self.end_date.clone())),
        ]
        .into_iter()
        .collect()
    }
}

/// Fold rows, grouped by consecutive `unit_id`, into one aggregate per unit.
pub fn aggregate_buildings(rows: &[BuildingRow]) -> Vec<BuildingAggregate> {
    rows.chunk_by(|a, b| a.unit_id == b.unit_id)
        .map(|group| {
            let found: Vec<&BuildingRow> = group.iter().filter(|r| r.found).collect();
            let any_open = found.iter().any(|r| r.end_date.is_none());

            BuildingAggregate {
                unit_id: group[0].unit_id.clone(),
                building_ids: group.iter().map(|r| r.building_id.clone()).collect(),
                construction_year: found.iter().filter_map(|r| r.construction_year).min(),
                geometry: union_footprints(found.iter().filter_map(|r| r.geometry.as_deref())),
                begin_date: found.iter().filter_map(|r| r.begin_date.clone()).min(),
                end_date: if any_open {
                    None
                } else {
                    found.iter().filter_map(|r| r.end_date.clone()).max()
                },
            }
        })
        .collect()
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
    }
}

fn fetch_building_rows(store: &dyn Store) -> Result<Vec<BuildingRow>> {
    let query = format!(
        "SELECT u.id, j.value, b.id IS NOT NULL, b.construction_year, b.geometry, \
                b.begin_date, b.end_date \
         FROM units u, json_each({}) j \
         LEFT JOIN buildings b ON b.id = j.value \
         WHERE instr(u.building_ids, char(9)) > 0 \
         ORDER BY u.id, j.key",
        tab_list_json("u.building_ids")
    );

    let rows = store
        .fetch_rows(&query)?
        .into_iter()
        .filter_map(|row| match row.as_slice() {
            [unit, building, found, year, geometry, begin, end] => Some(BuildingRow {
                unit_id: text(unit)?,
                building_id: text(building)?,
                found: found.as_i64() == Some(1),
                construction_year: year.as_i64(),
                geometry: text(geometry),
                begin_date: text(begin),
                end_date: text(end),
            }),
            _ => None,
        })
        .collect();
    Ok(rows)
}

/// Replace the address rows of multi-building units with their aggregate.
pub fn apply(store: &mut dyn Store) -> Result<usize> {
    let rows = fetch_building_rows(store)?;
    let aggregates = aggregate_buildings(&rows);
    info!("{} units reference more than one building", aggregates.len());

    schema::recreate(store, AGGREGATES, CREATE_AGGREGATES)?;
    let records: Vec<Record> = aggregates.iter().map(BuildingAggregate::to_record).collect();
    store.bulk_insert(AGGREGATES, &records)?;

    let replaced = store.execute(&unit_address_insert(AGGREGATES))?;
    store.execute(&format!("DROP TABLE IF EXISTS {}", AGGREGATES))?;
    Ok(replaced)
}
