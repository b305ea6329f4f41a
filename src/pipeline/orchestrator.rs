//! Parallel per-kind ingestion.
//!
//! Shards are split into contiguous batches, one per worker. Each worker
//! parses its batch in order and pushes results into its own bounded
//! channel; the calling thread drains the channels batch by batch, so store
//! writes happen one shard at a time and in discovery order.

use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use crossbeam_channel::bounded;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use super::progress::Progress;
use super::source::{Shard, ShardReader};
use crate::config::KindConfig;
use crate::error::{BagError, Result};
use crate::models::EntityKind;
use crate::parser::{parse_document, ParsedShard};
use crate::store::{schema, Store};

/// Parsed shards a worker may hold before the coordinator catches up.
const LOOKAHEAD: usize = 2;

/// Summary of one kind's ingest pass.
#[derive(Debug, Clone, PartialEq)]
pub struct KindStats {
    pub kind: EntityKind,
    pub shards: usize,
    pub elements: u64,
    pub records: u64,
    pub elapsed: Duration,
}

/// Split `n` items into at most `workers` contiguous, non-empty batches whose
/// sizes differ by at most one; earlier batches take the remainder.
pub fn partition(n: usize, workers: usize) -> Vec<Range<usize>> {
    let batches = workers.max(1).min(n);
    if batches == 0 {
        return Vec::new();
    }
    let base = n / batches;
    let extra = n % batches;

    let mut ranges = Vec::with_capacity(batches);
    let mut start = 0;
    for i in 0..batches {
        let len = base + usize::from(i < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

fn parse_shard(
    reader: &mut ShardReader,
    shard: &Shard,
    config: &KindConfig,
    today: &str,
) -> Result<ParsedShard> {
    let label = shard.label();
    catch_unwind(AssertUnwindSafe(|| {
        let xml = reader.read(shard)?;
        parse_document(&xml, &label, config, today)
    }))
    .unwrap_or_else(|_| Err(BagError::Worker(format!("parser panicked on {}", label))))
}

/// Replace the kind's table with the contents of `shards`.
pub fn ingest_kind(
    store: &mut dyn Store,
    config: &KindConfig,
    shards: &[Shard],
    workers: usize,
    today: &str,
    show_progress: bool,
) -> Result<KindStats> {
    let kind = config.kind;
    let table = kind.table();
    schema::recreate_table(store, kind)?;

    let batches = partition(shards.len(), workers);
    info!(
        "{}: {} shards over {} workers",
        kind,
        shards.len(),
        batches.len()
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(batches.len().max(1))
        .thread_name(|i| format!("bag-parser-{}", i))
        .build()
        .map_err(|e| BagError::Worker(e.to_string()))?;

    let mut progress = Progress::new(kind, shards.len(), show_progress);

    pool.in_place_scope(|scope| -> Result<()> {
        let mut receivers = Vec::with_capacity(batches.len());
        for batch in &batches {
            let (tx, rx) = bounded::<Result<ParsedShard>>(LOOKAHEAD);
            receivers.push(rx);
            let batch = &shards[batch.clone()];
            scope.spawn(move |_| {
                let mut reader = ShardReader::new();
                for shard in batch {
                    let result = parse_shard(&mut reader, shard, config, today);
                    let failed = result.is_err();
                    // A closed channel means the coordinator already gave up
                    if tx.send(result).is_err() || failed {
                        break;
                    }
                }
            });
        }

        for (index, (batch, rx)) in batches.iter().zip(&receivers).enumerate() {
            for position in batch.clone() {
                let parsed = rx.recv().map_err(|_| {
                    BagError::Worker(format!(
                        "worker {} stopped before {}",
                        index,
                        shards[position].label()
                    ))
                })??;
                store.bulk_insert(table, &parsed.records)?;
                progress.shard_done(parsed.raw_count, parsed.records.len());
            }
            debug!("{}: batch {} stored", kind, index);
        }
        Ok(())
    })?;

    if let Some(statement) = &config.post_load {
        info!("{}: running post-load statement", kind);
        let changed = store.execute(statement)?;
        debug!("{}: post-load changed {} rows", kind, changed);
    }

    let elements = progress.elements();
    let records = progress.records();
    let elapsed = progress.finish();

    Ok(KindStats {
        kind,
        shards: shards.len(),
        elements,
        records,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::models::{Record, Value};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_partition_is_balanced() {
        assert_eq!(partition(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(partition(9, 3), vec![0..3, 3..6, 6..9]);
        assert_eq!(partition(2, 4), vec![0..1, 1..2]);
        assert_eq!(partition(5, 1), vec![0..5]);
        assert!(partition(0, 4).is_empty());
    }

    #[test]
    fn test_partition_covers_every_item_once() {
        for n in 0..40 {
            for workers in 1..8 {
                let ranges = partition(n, workers);
                let covered: Vec<usize> = ranges.iter().cloned().flatten().collect();
                assert_eq!(covered, (0..n).collect::<Vec<_>>());
                let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
                if let (Some(max), Some(min)) = (sizes.iter().max(), sizes.iter().min()) {
                    assert!(max - min <= 1);
                }
            }
        }
    }

    /// Keeps every call so ordering can be checked.
    #[derive(Default)]
    struct RecordingStore {
        inserts: Vec<(String, Vec<Record>)>,
        statements: Vec<String>,
    }

    impl Store for RecordingStore {
        fn bulk_insert(&mut self, table: &str, rows: &[Record]) -> Result<usize> {
            self.inserts.push((table.to_string(), rows.to_vec()));
            Ok(rows.len())
        }

        fn execute(&mut self, statement: &str) -> Result<usize> {
            self.statements.push(statement.to_string());
            Ok(0)
        }

        fn table_exists(&self, _name: &str) -> Result<bool> {
            Ok(true)
        }

        fn fetch_scalar(&self, _query: &str) -> Result<Value> {
            Ok(Value::Null)
        }

        fn fetch_rows(&self, _query: &str) -> Result<Vec<Vec<Value>>> {
            Ok(Vec::new())
        }
    }

    fn berth_shard(dir: &TempDir, index: usize) -> Shard {
        let path = dir.path().join(format!("9999LIG-{:06}.xml", index));
        fs::write(
            &path,
            format!(
                "<bagStand><Ligplaats><identificatie>L{}</identificatie>\
                 <beginGeldigheid>2001-01-01</beginGeldigheid></Ligplaats></bagStand>",
                index
            ),
        )
        .unwrap();
        Shard::File(path)
    }

    #[test]
    fn test_shards_stored_in_submission_order() {
        let dir = TempDir::new().unwrap();
        let shards: Vec<Shard> = (0..10).map(|i| berth_shard(&dir, i)).collect();
        let config = KindConfig::new(EntityKind::Berth, &PipelineConfig::default());
        let mut store = RecordingStore::default();

        let stats = ingest_kind(&mut store, &config, &shards, 3, "2024-06-01", false).unwrap();

        assert_eq!(stats.shards, 10);
        assert_eq!(stats.elements, 10);
        assert_eq!(stats.records, 10);
        let ids: Vec<String> = store
            .inserts
            .iter()
            .map(|(table, rows)| {
                assert_eq!(table, "berths");
                rows[0].text("id").unwrap().to_string()
            })
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("L{}", i)).collect();
        assert_eq!(ids, expected);

        // Table recreated first, post-load statement last and only once
        assert!(store.statements[0].starts_with("DROP TABLE IF EXISTS berths"));
        let is_post_load = |s: &&String| s.starts_with("UPDATE berths SET lon_lat");
        assert!(is_post_load(&store.statements.last().unwrap()));
        assert_eq!(store.statements.iter().filter(is_post_load).count(), 1);
    }

    #[test]
    fn test_bad_shard_aborts_kind() {
        let dir = TempDir::new().unwrap();
        let mut shards: Vec<Shard> = (0..4).map(|i| berth_shard(&dir, i)).collect();
        let broken = dir.path().join("9999LIG-broken.xml");
        fs::write(&broken, "<bagStand><Ligplaats></bagStand>").unwrap();
        shards.insert(2, Shard::File(broken));

        let config = KindConfig::new(EntityKind::Berth, &PipelineConfig::default());
        let mut store = RecordingStore::default();
        let err = ingest_kind(&mut store, &config, &shards, 2, "2024-06-01", false).unwrap_err();

        assert!(matches!(err, BagError::Xml { .. }));
        assert!(store.statements[0].starts_with("DROP TABLE IF EXISTS berths"));
        assert!(!store
            .statements
            .iter()
            .any(|s| s.starts_with("UPDATE berths SET lon_lat")));
    }

    #[test]
    fn test_no_shards_still_recreates_table() {
        let config = KindConfig::new(EntityKind::Pitch, &PipelineConfig::default());
        let mut store = RecordingStore::default();
        let stats = ingest_kind(&mut store, &config, &[], 4, "2024-06-01", false).unwrap();
        assert_eq!(stats.elements, 0);
        assert!(store.inserts.is_empty());
        assert!(store.statements[1].starts_with("CREATE TABLE pitches"));
    }
}
