//! Statements behind the reconciliation steps.

use crate::store::schema::{point_json, ADDRESS_COLUMNS};

/// SQL expression turning a tab list column into a JSON array of strings.
///
/// BAG identifiers and purpose codes never contain quotes or backslashes.
pub fn tab_list_json(column: &str) -> String {
    format!(
        "CASE WHEN ({col}) IS NOT NULL THEN '[\"' || replace({col}, char(9), '\",\"') || '\"]' END",
        col = column
    )
}

fn insert_into_addresses() -> String {
    format!("INSERT OR REPLACE INTO addresses ({})", ADDRESS_COLUMNS.join(", "))
}

/// Select list of a unit-backed address row, in `ADDRESS_COLUMNS` order.
///
/// `g` names the building side: a building row or a building aggregate.
fn unit_address_columns(building_ids: &str) -> String {
    format!(
        "n.id, n.begin_date, n.end_date, \
         {building_ids}, g.begin_date, g.end_date, \
         u.id, w.municipality_id, o.place_id, n.public_space_id, 'unit', \
         {purposes}, \
         n.postcode, n.house_number, n.house_letter, n.addition, o.name, w.name, \
         u.floor_area, u.rd_x, u.rd_y, u.longitude, u.latitude, u.lon_lat, \
         g.construction_year, NULL, g.geometry",
        building_ids = building_ids,
        purposes = tab_list_json("u.purposes"),
    )
}

const NAME_JOINS: &str = "LEFT JOIN public_spaces o ON o.id = n.public_space_id \
                          LEFT JOIN places w ON w.id = o.place_id";

/// One row per number, with its primary unit and that unit's building.
pub fn base_join() -> String {
    format!(
        "{insert} SELECT {columns} \
         FROM numbers n \
         {names} \
         LEFT JOIN units u ON u.number_id = n.id \
         LEFT JOIN buildings g ON g.id = u.building_ids",
        insert = insert_into_addresses(),
        columns = unit_address_columns(&tab_list_json("u.building_ids")),
        names = NAME_JOINS,
    )
}

/// Replace the rows of units found in `aggregates` (one row per unit).
pub fn unit_address_insert(aggregates: &str) -> String {
    format!(
        "{insert} SELECT {columns} \
         FROM {aggregates} g \
         JOIN units u ON u.id = g.unit_id \
         JOIN numbers n ON n.id = u.number_id \
         {names}",
        insert = insert_into_addresses(),
        columns = unit_address_columns("g.building_ids"),
        aggregates = aggregates,
        names = NAME_JOINS,
    )
}

/// Overwrite position and geometry from a berth or pitch table.
pub fn import_positions(table: &str, object_type: &str) -> String {
    format!(
        "UPDATE addresses SET \
            rd_x = s.rd_x, \
            rd_y = s.rd_y, \
            latitude = s.latitude, \
            longitude = s.longitude, \
            lon_lat = CASE WHEN s.longitude IS NOT NULL AND s.latitude IS NOT NULL \
                      THEN {point} END, \
            geometry = s.geometry, \
            object_type = '{object_type}' \
         FROM {table} s \
         WHERE s.number_id = addresses.number_id",
        point = point_json("s.longitude", "s.latitude"),
        object_type = object_type,
        table = table,
    )
}

pub const BERTH_PITCH_OVERLAP: &str = "SELECT COUNT(DISTINCT l.number_id) \
     FROM berths l JOIN pitches s ON s.number_id = l.number_id";

pub const SHARED_PRIMARY_NUMBERS: &str = "SELECT COUNT(*) FROM ( \
     SELECT number_id FROM units WHERE number_id IS NOT NULL \
     GROUP BY number_id HAVING COUNT(*) > 1)";

/// A number's own place reference wins over the public space's place, as
/// long as that place is in the store.
pub const NUMBER_PLACES: &str = "UPDATE addresses SET \
        place_id = n.place_id, \
        place_name = w.name, \
        municipality_id = w.municipality_id \
     FROM numbers n JOIN places w ON w.id = n.place_id \
     WHERE n.id = addresses.number_id";

pub fn secondary_addresses() -> String {
    format!(
        "UPDATE addresses SET primary_number_id = s.primary_number_id \
         FROM ( \
            SELECT j.value AS number_id, u.number_id AS primary_number_id \
            FROM units u, json_each({}) j \
            WHERE u.secondary_number_ids IS NOT NULL AND u.number_id IS NOT NULL \
         ) s \
         WHERE s.number_id = addresses.number_id",
        tab_list_json("u.secondary_number_ids")
    )
}

pub fn derived_points() -> String {
    format!(
        "UPDATE addresses SET lon_lat = {} \
         WHERE lon_lat IS NULL AND longitude IS NOT NULL AND latitude IS NOT NULL",
        point_json("longitude", "latitude")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteStore, Store};

    #[test]
    fn test_tab_list_json() {
        let store = SqliteStore::open_in_memory().unwrap();
        let list = store
            .fetch_scalar(&format!("SELECT {}", tab_list_json("'P1' || char(9) || 'P2'")))
            .unwrap();
        assert_eq!(list.as_str(), Some(r#"["P1","P2"]"#));

        let single = store
            .fetch_scalar(&format!("SELECT {}", tab_list_json("'woonfunctie'")))
            .unwrap();
        assert_eq!(single.as_str(), Some(r#"["woonfunctie"]"#));

        let null = store
            .fetch_scalar(&format!("SELECT {}", tab_list_json("NULL")))
            .unwrap();
        assert!(null.is_null());
    }

    #[test]
    fn test_select_list_matches_address_columns() {
        let columns = unit_address_columns("x");
        // Top-level commas only: nested CASE/replace calls contain their own
        let mut depth = 0;
        let mut count = 1;
        for c in columns.chars() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => count += 1,
                _ => {}
            }
        }
        assert_eq!(count, ADDRESS_COLUMNS.len());
    }
}
