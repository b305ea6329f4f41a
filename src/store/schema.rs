//! Table definitions.
//!
//! Identifiers of places, public spaces and municipalities are numeric in the
//! BAG and stored as INTEGER so they join against the reference tables; the
//! other identifiers keep their leading zeros as TEXT.

use tracing::info;

use super::Store;
use crate::error::Result;
use crate::models::EntityKind;

pub const ADDRESSES: &str = "addresses";
pub const MUNICIPALITIES: &str = "municipalities";
pub const PROVINCES: &str = "provinces";

/// Column list of the canonical address relation, in table order.
pub const ADDRESS_COLUMNS: &[&str] = &[
    "number_id",
    "number_begin_date",
    "number_end_date",
    "building_ids",
    "building_begin_date",
    "building_end_date",
    "unit_id",
    "municipality_id",
    "place_id",
    "public_space_id",
    "object_type",
    "purposes",
    "postcode",
    "house_number",
    "house_letter",
    "addition",
    "street",
    "place_name",
    "floor_area",
    "rd_x",
    "rd_y",
    "longitude",
    "latitude",
    "lon_lat",
    "construction_year",
    "primary_number_id",
    "geometry",
];

/// CREATE statement for a kind's table
pub fn create_statement(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Place => {
            "CREATE TABLE places (
                id INTEGER PRIMARY KEY,
                name TEXT,
                municipality_id INTEGER,
                geometry TEXT,
                status TEXT,
                begin_date TEXT,
                end_date TEXT)"
        }
        EntityKind::PlaceMunicipality => {
            "CREATE TABLE place_municipalities (
                place_id INTEGER,
                municipality_id INTEGER,
                status TEXT,
                begin_date TEXT,
                end_date TEXT)"
        }
        EntityKind::PublicSpace => {
            "CREATE TABLE public_spaces (
                id INTEGER PRIMARY KEY,
                name TEXT,
                short_name TEXT,
                type TEXT,
                place_id INTEGER,
                status TEXT,
                begin_date TEXT,
                end_date TEXT)"
        }
        EntityKind::Number => {
            "CREATE TABLE numbers (
                id TEXT PRIMARY KEY,
                postcode TEXT,
                house_number INTEGER,
                house_letter TEXT,
                addition TEXT,
                place_id INTEGER,
                public_space_id INTEGER,
                status TEXT,
                begin_date TEXT,
                end_date TEXT)"
        }
        EntityKind::Building => {
            "CREATE TABLE buildings (
                id TEXT PRIMARY KEY,
                construction_year INTEGER,
                geometry TEXT,
                status TEXT,
                begin_date TEXT,
                end_date TEXT)"
        }
        EntityKind::Unit => {
            "CREATE TABLE units (
                id TEXT PRIMARY KEY,
                number_id TEXT,
                building_ids TEXT,
                floor_area REAL,
                rd_x REAL,
                rd_y REAL,
                latitude REAL,
                longitude REAL,
                lon_lat TEXT,
                purposes TEXT,
                secondary_number_ids TEXT,
                status TEXT,
                begin_date TEXT,
                end_date TEXT)"
        }
        EntityKind::Berth => {
            "CREATE TABLE berths (
                id TEXT PRIMARY KEY,
                number_id TEXT,
                rd_x REAL,
                rd_y REAL,
                latitude REAL,
                longitude REAL,
                lon_lat TEXT,
                geometry TEXT,
                status TEXT,
                begin_date TEXT,
                end_date TEXT)"
        }
        EntityKind::Pitch => {
            "CREATE TABLE pitches (
                id TEXT PRIMARY KEY,
                number_id TEXT,
                rd_x REAL,
                rd_y REAL,
                latitude REAL,
                longitude REAL,
                lon_lat TEXT,
                geometry TEXT,
                status TEXT,
                begin_date TEXT,
                end_date TEXT)"
        }
    }
}

pub const CREATE_ADDRESSES: &str = "CREATE TABLE addresses (
    number_id TEXT PRIMARY KEY,
    number_begin_date TEXT,
    number_end_date TEXT,
    building_ids TEXT,
    building_begin_date TEXT,
    building_end_date TEXT,
    unit_id TEXT,
    municipality_id INTEGER,
    place_id INTEGER,
    public_space_id INTEGER,
    object_type TEXT NOT NULL,
    purposes TEXT,
    postcode TEXT,
    house_number INTEGER,
    house_letter TEXT,
    addition TEXT,
    street TEXT,
    place_name TEXT,
    floor_area REAL,
    rd_x REAL,
    rd_y REAL,
    longitude REAL,
    latitude REAL,
    lon_lat TEXT,
    construction_year INTEGER,
    primary_number_id TEXT,
    geometry TEXT)";

pub const CREATE_MUNICIPALITIES: &str = "CREATE TABLE municipalities (
    id INTEGER PRIMARY KEY,
    code TEXT,
    name TEXT,
    province_id INTEGER)";

pub const CREATE_PROVINCES: &str = "CREATE TABLE provinces (
    id INTEGER PRIMARY KEY,
    code TEXT,
    name TEXT)";

/// SQL expression building a GeoJSON point from two columns.
pub fn point_json(lon: &str, lat: &str) -> String {
    format!(
        "json_object('type', 'Point', 'coordinates', json_array({}, {}))",
        lon, lat
    )
}

/// Drop and recreate a table; every ingest pass is a full replace.
pub fn recreate(store: &mut dyn Store, table: &str, create: &str) -> Result<()> {
    store.execute(&format!("DROP TABLE IF EXISTS {}", table))?;
    store.execute(create)?;
    Ok(())
}

pub fn recreate_table(store: &mut dyn Store, kind: EntityKind) -> Result<()> {
    recreate(store, kind.table(), create_statement(kind))
}

/// Kinds whose tables are not yet present in the store
pub fn missing_kind_tables(store: &dyn Store) -> Result<Vec<EntityKind>> {
    let mut missing = Vec::new();
    for kind in EntityKind::all() {
        if !store.table_exists(kind.table())? {
            missing.push(*kind);
        }
    }
    Ok(missing)
}

/// Drop the per-kind tables that only feed the address relation.
///
/// Places, public spaces and the link table stay: the address relation
/// refers to them by id.
pub fn drop_source_tables(store: &mut dyn Store) -> Result<()> {
    for kind in [
        EntityKind::Number,
        EntityKind::Building,
        EntityKind::Unit,
        EntityKind::Berth,
        EntityKind::Pitch,
    ] {
        info!("Dropping source table {}", kind.table());
        store.execute(&format!("DROP TABLE IF EXISTS {}", kind.table()))?;
    }
    Ok(())
}
