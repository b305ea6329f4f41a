//! Municipality and province reference tables.
//!
//! The BAG only carries municipality codes; names and provinces come from a
//! CBS-style CSV with the columns `Gemeentecode`, `GemeentecodeGM`,
//! `Gemeentenaam`, `Provinciecode`, `ProvinciecodePV` and `Provincienaam`.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{info, warn};

use crate::error::{BagError, Result};
use crate::models::{Record, Value};
use crate::store::{schema, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Municipality {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub province_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Province {
    pub id: i64,
    pub code: String,
    pub name: String,
}

fn column(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().trim_start_matches('\u{feff}') == name)
        .ok_or_else(|| BagError::Config(format!("reference CSV has no '{}' column", name)))
}

/// `;` when the header line has one, otherwise `,`.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    if header_line.contains(';') {
        b';'
    } else {
        b','
    }
}

/// Read municipalities and the provinces they belong to.
pub fn read_reference<R: Read>(
    reader: R,
    delimiter: u8,
) -> Result<(Vec<Municipality>, Vec<Province>)> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let municipality_idx = column(&headers, "Gemeentecode")?;
    let municipality_code_idx = column(&headers, "GemeentecodeGM")?;
    let municipality_name_idx = column(&headers, "Gemeentenaam")?;
    let province_idx = column(&headers, "Provinciecode")?;
    let province_code_idx = column(&headers, "ProvinciecodePV")?;
    let province_name_idx = column(&headers, "Provincienaam")?;

    let mut municipalities = Vec::new();
    let mut provinces = BTreeMap::new();

    for result in csv_reader.records() {
        let record = result?;
        let (Ok(id), Ok(province_id)) = (
            record[municipality_idx].parse::<i64>(),
            record[province_idx].parse::<i64>(),
        ) else {
            warn!("Skipping reference row with non-numeric code: {:?}", record);
            continue;
        };

        municipalities.push(Municipality {
            id,
            code: record[municipality_code_idx].to_string(),
            name: record[municipality_name_idx].to_string(),
            province_id,
        });
        provinces.entry(province_id).or_insert_with(|| Province {
            id: province_id,
            code: record[province_code_idx].to_string(),
            name: record[province_name_idx].to_string(),
        });
    }

    Ok((municipalities, provinces.into_values().collect()))
}

/// Replace the `municipalities` and `provinces` tables from a CSV file.
pub fn load_reference(store: &mut dyn Store, path: &Path) -> Result<(usize, usize)> {
    info!("Loading municipalities from {}", path.display());

    let content = fs::read_to_string(path)?;
    let delimiter = sniff_delimiter(content.lines().next().unwrap_or_default());
    let (municipalities, provinces) = read_reference(content.as_bytes(), delimiter)?;

    schema::recreate(store, schema::MUNICIPALITIES, schema::CREATE_MUNICIPALITIES)?;
    schema::recreate(store, schema::PROVINCES, schema::CREATE_PROVINCES)?;

    let municipality_rows: Vec<Record> = municipalities
        .iter()
        .map(|m| {
            [
                ("id", Value::Integer(m.id)),
                ("code", Value::from(m.code.as_str())),
                ("name", Value::from(m.name.as_str())),
                ("province_id", Value::Integer(m.province_id)),
            ]
            .into_iter()
            .collect()
        })
        .collect();
    let province_rows: Vec<Record> = provinces
        .iter()
        .map(|p| {
            [
                ("id", Value::Integer(p.id)),
                ("code", Value::from(p.code.as_str())),
                ("name", Value::from(p.name.as_str())),
            ]
            .into_iter()
            .collect()
        })
        .collect();

    let municipality_count = store.bulk_insert(schema::MUNICIPALITIES, &municipality_rows)?;
    let province_count = store.bulk_insert(schema::PROVINCES, &province_rows)?;
    info!(
        "Loaded {} municipalities in {} provinces",
        municipality_count, province_count
    );
    Ok((municipality_count, province_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use tempfile::TempDir;

    const CSV: &str = "Gemeentecode;GemeentecodeGM;Gemeentenaam;Provinciecode;ProvinciecodePV;Provincienaam\n\
                       363;GM0363;Amsterdam;27;PV27;Noord-Holland\n\
                       479;GM0479;Zaanstad;27;PV27;Noord-Holland\n\
                       1900;GM1900;Súdwest-Fryslân;21;PV21;Fryslân\n";

    #[test]
    fn test_read_reference_dedups_provinces() {
        let (municipalities, provinces) = read_reference(CSV.as_bytes(), b';').unwrap();
        assert_eq!(municipalities.len(), 3);
        assert_eq!(municipalities[2].name, "Súdwest-Fryslân");
        assert_eq!(
            provinces.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![21, 27]
        );
    }

    #[test]
    fn test_missing_column_is_config_error() {
        let err = read_reference("Gemeentecode,Naam\n1,x\n".as_bytes(), b',').unwrap_err();
        assert!(matches!(err, BagError::Config(_)));
    }

    #[test]
    fn test_load_reference_into_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gemeenten.csv");
        fs::write(&path, CSV).unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(load_reference(&mut store, &path).unwrap(), (3, 2));
        assert_eq!(
            store
                .fetch_scalar("SELECT name FROM municipalities WHERE id = 1900")
                .unwrap(),
            Value::from("Súdwest-Fryslân")
        );
        assert_eq!(
            store
                .fetch_scalar("SELECT province_id FROM municipalities WHERE code = 'GM0363'")
                .unwrap(),
            Value::Integer(27)
        );
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c"), b';');
        assert_eq!(sniff_delimiter("a,b,c"), b',');
    }
}
