//! Pipeline configuration.
//!
//! [`PipelineConfig`] is read from a TOML file (every key optional) and then
//! overridden from the command line. [`KindConfig`] is the immutable per-kind
//! view handed to the parser workers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BagError, Result};
use crate::models::{EntityKind, Record};
use crate::parser::fields::{default_fields, default_template, FieldMap, FieldSpec};
use crate::store::schema::point_json;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the per-kind `.zip` archives or `.xml` shards
    pub input_dir: PathBuf,
    /// SQLite database file
    pub database: PathBuf,
    /// Optional municipality/province reference CSV
    pub municipalities_file: Option<PathBuf>,
    pub active_only: bool,
    pub parse_geometries: bool,
    pub short_street_names: bool,
    pub create_addresses: bool,
    pub drop_source_tables: bool,
    pub delete_addresses_without_public_space_if_less_than: i64,
    /// Parser worker count; `None` picks one from the physical core count
    pub workers: Option<usize>,
    /// Per kind (name or XML tag): output field → extraction
    pub field_overrides: BTreeMap<String, BTreeMap<String, FieldSpec>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            database: PathBuf::from("bag.sqlite"),
            municipalities_file: None,
            active_only: true,
            parse_geometries: false,
            short_street_names: false,
            create_addresses: true,
            drop_source_tables: false,
            delete_addresses_without_public_space_if_less_than: 100,
            workers: None,
            field_overrides: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reject settings that would only fail halfway through a run.
    pub fn validate(&self) -> Result<()> {
        for kind in self.field_overrides.keys() {
            kind.parse::<EntityKind>()?;
        }
        if self.workers == Some(0) {
            return Err(BagError::Config("workers must be at least 1".into()));
        }
        if self.delete_addresses_without_public_space_if_less_than < 0 {
            return Err(BagError::Config(
                "delete_addresses_without_public_space_if_less_than must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| default_worker_count(num_cpus::get_physical()))
    }

    fn overrides_for(&self, kind: EntityKind) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.field_overrides
            .iter()
            .filter(move |(name, _)| name.parse::<EntityKind>().ok() == Some(kind))
            .flat_map(|(_, fields)| fields.iter())
    }
}

/// Leave headroom for the coordinating thread and the store on bigger machines.
pub fn default_worker_count(physical_cores: usize) -> usize {
    match physical_cores {
        0..=2 => 1,
        3 => 2,
        4 => 3,
        n => n - 2,
    }
}

/// Everything a worker needs to parse shards of one kind.
#[derive(Debug, Clone)]
pub struct KindConfig {
    pub kind: EntityKind,
    pub fields: FieldMap,
    /// Record template every extracted element starts from
    pub defaults: Record,
    pub active_only: bool,
    pub parse_geometries: bool,
    /// Statement run once after the last shard of the kind is stored
    pub post_load: Option<String>,
}

impl KindConfig {
    pub fn new(kind: EntityKind, config: &PipelineConfig) -> Self {
        let mut fields = default_fields(kind, config.parse_geometries);
        for (name, spec) in config.overrides_for(kind) {
            fields.insert(name.clone(), spec.clone());
        }
        let defaults = default_template(kind, &fields);

        Self {
            kind,
            fields,
            defaults,
            active_only: config.active_only,
            parse_geometries: config.parse_geometries,
            post_load: post_load_statement(kind, config),
        }
    }
}

fn post_load_statement(kind: EntityKind, config: &PipelineConfig) -> Option<String> {
    match kind {
        EntityKind::PublicSpace if config.short_street_names => Some(
            "UPDATE public_spaces SET name = short_name WHERE short_name IS NOT NULL".to_string(),
        ),
        EntityKind::Unit | EntityKind::Berth | EntityKind::Pitch => Some(format!(
            "UPDATE {} SET lon_lat = {} WHERE longitude IS NOT NULL AND latitude IS NOT NULL",
            kind.table(),
            point_json("longitude", "latitude")
        )),
        // Link rows are only unambiguous once inactive periods are filtered out
        EntityKind::PlaceMunicipality if config.active_only => Some(
            "UPDATE places SET municipality_id = pm.municipality_id \
             FROM place_municipalities pm WHERE pm.place_id = places.id"
                .to_string(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::ExtractMode;

    #[test]
    fn test_default_worker_count() {
        assert_eq!(default_worker_count(1), 1);
        assert_eq!(default_worker_count(2), 1);
        assert_eq!(default_worker_count(3), 2);
        assert_eq!(default_worker_count(4), 3);
        assert_eq!(default_worker_count(16), 14);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            parse_geometries = true
            workers = 4

            [field_overrides.unit]
            floor_area = { path = ["oppervlakte"], mode = "field_multi" }
            "#,
        )
        .unwrap();

        assert!(config.active_only);
        assert!(config.parse_geometries);
        assert_eq!(config.worker_count(), 4);
        assert_eq!(config.delete_addresses_without_public_space_if_less_than, 100);
        config.validate().unwrap();

        let unit = KindConfig::new(EntityKind::Unit, &config);
        assert_eq!(unit.fields["floor_area"].mode, ExtractMode::FieldMulti);
    }

    #[test]
    fn test_unknown_override_kind_rejected() {
        let config: PipelineConfig =
            toml::from_str("[field_overrides.perceel]\nid = { path = [\"identificatie\"] }")
                .unwrap();
        assert!(matches!(config.validate(), Err(BagError::UnknownKind(_))));
    }

    #[test]
    fn test_post_load_statements() {
        let mut config = PipelineConfig::default();
        assert!(KindConfig::new(EntityKind::PublicSpace, &config).post_load.is_none());
        assert!(KindConfig::new(EntityKind::PlaceMunicipality, &config).post_load.is_some());
        assert!(KindConfig::new(EntityKind::Berth, &config)
            .post_load
            .unwrap()
            .starts_with("UPDATE berths SET lon_lat"));

        config.short_street_names = true;
        config.active_only = false;
        assert!(KindConfig::new(EntityKind::PublicSpace, &config).post_load.is_some());
        assert!(KindConfig::new(EntityKind::PlaceMunicipality, &config).post_load.is_none());
    }
}
