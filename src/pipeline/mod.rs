//! End-to-end run: every kind in order, reference tables, the address
//! relation and its quality fixes.

mod orchestrator;
mod progress;
mod source;

pub use orchestrator::{ingest_kind, partition, KindStats};
pub use progress::{throughput, Progress, REPORT_INTERVAL};
pub use source::{discover_shards, Shard, ShardReader};

use tracing::{info, warn};

use crate::config::{KindConfig, PipelineConfig};
use crate::error::{BagError, Result};
use crate::models::EntityKind;
use crate::quality::{self, FixReport};
use crate::reconcile;
use crate::reference;
use crate::store::{schema, Store};

/// Today's date as compared against BAG validity dates.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub kinds: Vec<KindStats>,
    pub addresses_built: bool,
    pub fixes: Option<FixReport>,
}

/// Ingest `kinds` in the given order, one at a time.
pub fn ingest_kinds(
    store: &mut dyn Store,
    config: &PipelineConfig,
    kinds: &[EntityKind],
    today: &str,
    show_progress: bool,
) -> Result<Vec<KindStats>> {
    let workers = config.worker_count();
    let mut stats = Vec::with_capacity(kinds.len());

    for kind in kinds {
        let kind_config = KindConfig::new(*kind, config);
        let shards = discover_shards(&config.input_dir, *kind)?;
        if shards.is_empty() {
            warn!(
                "{}: no shards matching {} in {}",
                kind,
                kind.archive_code(),
                config.input_dir.display()
            );
        }
        stats.push(ingest_kind(
            store,
            &kind_config,
            &shards,
            workers,
            today,
            show_progress,
        )?);
    }
    Ok(stats)
}

/// Build `addresses` from already ingested kinds, then fix and optionally
/// drop the source tables.
pub fn build_addresses(store: &mut dyn Store, config: &PipelineConfig) -> Result<FixReport> {
    let missing = schema::missing_kind_tables(store)?;
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|k| k.table()).collect();
        return Err(BagError::Config(format!(
            "cannot build addresses, missing tables: {}",
            names.join(", ")
        )));
    }

    reconcile::build(store)?;
    let fixes = quality::apply_fixes(
        store,
        config.delete_addresses_without_public_space_if_less_than,
    )?;

    if config.drop_source_tables {
        schema::drop_source_tables(store)?;
    }
    Ok(fixes)
}

/// The full pipeline.
pub fn run(
    store: &mut dyn Store,
    config: &PipelineConfig,
    show_progress: bool,
) -> Result<RunSummary> {
    config.validate()?;

    let today = today();
    info!("Validity reference date: {}", today);

    let mut summary = RunSummary {
        kinds: ingest_kinds(store, config, EntityKind::all(), &today, show_progress)?,
        ..RunSummary::default()
    };

    if let Some(path) = &config.municipalities_file {
        reference::load_reference(store, path)?;
    }

    if !config.create_addresses {
        return Ok(summary);
    }
    if !config.active_only {
        warn!("Addresses are only built from active records; skipping (active_only = false)");
        return Ok(summary);
    }

    summary.fixes = Some(build_addresses(store, config)?);
    summary.addresses_built = true;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use crate::store::SqliteStore;
    use std::fs;
    use tempfile::TempDir;

    const BEGIN: &str = "<Historie:beginGeldigheid>2010-01-01</Historie:beginGeldigheid>";

    fn write(dir: &TempDir, name: &str, body: &str) {
        fs::write(
            dir.path().join(name),
            format!("<sl:bagStand><sl:standBestand>{}</sl:standBestand></sl:bagStand>", body),
        )
        .unwrap();
    }

    /// A tiny but complete extract: one place, street, number and unit.
    fn extract() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "9999WPL01012024-000001.xml",
            &format!(
                "<Objecten:Woonplaats><Objecten:identificatie>3594</Objecten:identificatie>\
                 <Objecten:naam>Amsterdam</Objecten:naam>\
                 <Objecten:status>Woonplaats aangewezen</Objecten:status>{}</Objecten:Woonplaats>",
                BEGIN
            ),
        );
        write(
            &dir,
            "GEM-WPL-RELATIE-01012024.xml",
            "<gwr-product:GemeenteWoonplaatsRelatie>\
             <gwr-product:tijdvakgeldigheid>\
             <bagtypes:begindatumTijdvakGeldigheid>2010-01-01</bagtypes:begindatumTijdvakGeldigheid>\
             </gwr-product:tijdvakgeldigheid>\
             <gwr-product:gerelateerdeWoonplaats><gwr-product:identificatie>3594</gwr-product:identificatie></gwr-product:gerelateerdeWoonplaats>\
             <gwr-product:gerelateerdeGemeente><gwr-product:identificatie>0363</gwr-product:identificatie></gwr-product:gerelateerdeGemeente>\
             <gwr-product:status>definitief</gwr-product:status>\
             </gwr-product:GemeenteWoonplaatsRelatie>",
        );
        write(
            &dir,
            "9999OPR01012024-000001.xml",
            &format!(
                "<Objecten:OpenbareRuimte><Objecten:identificatie>0363300000002701</Objecten:identificatie>\
                 <Objecten:naam>Damrak</Objecten:naam><Objecten:type>Weg</Objecten:type>\
                 <Objecten:status>Naamgeving uitgegeven</Objecten:status>{}\
                 <Objecten:ligtIn><Objecten-ref:WoonplaatsRef>3594</Objecten-ref:WoonplaatsRef></Objecten:ligtIn>\
                 </Objecten:OpenbareRuimte>",
                BEGIN
            ),
        );
        write(
            &dir,
            "9999NUM01012024-000001.xml",
            &format!(
                "<Objecten:Nummeraanduiding><Objecten:identificatie>0363200000000001</Objecten:identificatie>\
                 <Objecten:huisnummer>1</Objecten:huisnummer><Objecten:postcode>1012JS</Objecten:postcode>\
                 <Objecten:status>Naamgeving uitgegeven</Objecten:status>{}\
                 <Objecten:ligtAan><Objecten-ref:OpenbareRuimteRef>0363300000002701</Objecten-ref:OpenbareRuimteRef></Objecten:ligtAan>\
                 </Objecten:Nummeraanduiding>",
                BEGIN
            ),
        );
        write(
            &dir,
            "9999PND01012024-000001.xml",
            &format!(
                "<Objecten:Pand><Objecten:identificatie>0363100012345678</Objecten:identificatie>\
                 <Objecten:oorspronkelijkBouwjaar>1890</Objecten:oorspronkelijkBouwjaar>{}</Objecten:Pand>",
                BEGIN
            ),
        );
        write(
            &dir,
            "9999VBO01012024-000001.xml",
            &format!(
                "<Objecten:Verblijfsobject><Objecten:identificatie>0363010000000001</Objecten:identificatie>\
                 <Objecten:heeftAlsHoofdadres><Objecten-ref:NummeraanduidingRef>0363200000000001</Objecten-ref:NummeraanduidingRef></Objecten:heeftAlsHoofdadres>\
                 <gml:pos>121400.0 487400.0 0.0</gml:pos>\
                 <Objecten:oppervlakte>999999</Objecten:oppervlakte>\
                 <Objecten-ref:PandRef>0363100012345678</Objecten-ref:PandRef>{}\
                 </Objecten:Verblijfsobject>",
                BEGIN
            ),
        );
        dir
    }

    #[test]
    fn test_full_run_builds_addresses() {
        let input = extract();
        let config = PipelineConfig {
            input_dir: input.path().to_path_buf(),
            workers: Some(2),
            ..PipelineConfig::default()
        };
        let mut store = SqliteStore::open_in_memory().unwrap();

        let summary = run(&mut store, &config, false).unwrap();
        assert!(summary.addresses_built);
        assert_eq!(summary.kinds.len(), EntityKind::all().len());
        // Berth and pitch tables exist even without shards
        assert!(store.table_exists("pitches").unwrap());

        let row = store
            .fetch_rows(
                "SELECT street, place_name, municipality_id, construction_year, floor_area, \
                        building_ids, object_type FROM addresses",
            )
            .unwrap();
        assert_eq!(
            row,
            vec![vec![
                Value::from("Damrak"),
                Value::from("Amsterdam"),
                Value::Integer(363),
                Value::Integer(1890),
                Value::Null,
                Value::from(r#"["0363100012345678"]"#),
                Value::from("unit"),
            ]]
        );
        assert_eq!(summary.fixes.unwrap().floor_areas_cleared, 1);
        assert_eq!(
            store
                .count("SELECT COUNT(*) FROM addresses WHERE lon_lat IS NOT NULL")
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_inactive_run_skips_addresses() {
        let input = extract();
        let config = PipelineConfig {
            input_dir: input.path().to_path_buf(),
            active_only: false,
            ..PipelineConfig::default()
        };
        let mut store = SqliteStore::open_in_memory().unwrap();

        let summary = run(&mut store, &config, false).unwrap();
        assert!(!summary.addresses_built);
        assert!(!store.table_exists("addresses").unwrap());
        // Without the active filter places keep their municipality unset
        assert_eq!(
            store.fetch_scalar("SELECT municipality_id FROM places").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_drop_source_tables() {
        let input = extract();
        let config = PipelineConfig {
            input_dir: input.path().to_path_buf(),
            drop_source_tables: true,
            ..PipelineConfig::default()
        };
        let mut store = SqliteStore::open_in_memory().unwrap();
        run(&mut store, &config, false).unwrap();

        assert!(store.table_exists("addresses").unwrap());
        assert!(store.table_exists("places").unwrap());
        assert!(!store.table_exists("units").unwrap());
        assert!(!store.table_exists("numbers").unwrap());
    }

    #[test]
    fn test_build_addresses_needs_every_table() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        schema::recreate_table(&mut store, EntityKind::Number).unwrap();
        let err = build_addresses(&mut store, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, BagError::Config(ref m) if m.contains("units")));
    }
}
