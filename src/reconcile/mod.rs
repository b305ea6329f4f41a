//! Builds the `addresses` relation from the per-kind tables.
//!
//! The relation is created by the base join and then patched in place by an
//! ordered list of steps. Each step reads the committed result of the one
//! before it; the patch steps can be re-run on a built relation without
//! changing it.

mod buildings;
mod sql;

pub use buildings::{aggregate_buildings, BuildingAggregate, BuildingRow};

use tracing::{info, warn};

use crate::error::Result;
use crate::store::{schema, Store};

/// One named reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    BaseJoin,
    MultiBuilding,
    Berths,
    Pitches,
    NumberPlaces,
    SecondaryAddresses,
    DerivedPoints,
}

/// Every step, in execution order.
pub const STEPS: &[Step] = &[
    Step::BaseJoin,
    Step::MultiBuilding,
    Step::Berths,
    Step::Pitches,
    Step::NumberPlaces,
    Step::SecondaryAddresses,
    Step::DerivedPoints,
];

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::BaseJoin => "base_join",
            Step::MultiBuilding => "multi_building",
            Step::Berths => "berths",
            Step::Pitches => "pitches",
            Step::NumberPlaces => "number_places",
            Step::SecondaryAddresses => "secondary_addresses",
            Step::DerivedPoints => "derived_points",
        }
    }

    /// Run the step, returning the number of rows it wrote.
    pub fn run(&self, store: &mut dyn Store) -> Result<usize> {
        match self {
            Step::BaseJoin => {
                let shared = store.count(sql::SHARED_PRIMARY_NUMBERS)?;
                if shared > 0 {
                    warn!("{} numbers are the main address of several units", shared);
                }
                store.execute(&sql::base_join())
            }
            Step::MultiBuilding => buildings::apply(store),
            Step::Berths => {
                let overlap = store.count(sql::BERTH_PITCH_OVERLAP)?;
                if overlap > 0 {
                    warn!(
                        "{} numbers belong to both a berth and a pitch; the pitch wins",
                        overlap
                    );
                }
                store.execute(&sql::import_positions("berths", "berth"))
            }
            Step::Pitches => store.execute(&sql::import_positions("pitches", "pitch")),
            Step::NumberPlaces => store.execute(sql::NUMBER_PLACES),
            Step::SecondaryAddresses => store.execute(&sql::secondary_addresses()),
            Step::DerivedPoints => store.execute(&sql::derived_points()),
        }
    }
}

fn run_steps(store: &mut dyn Store, steps: &[Step]) -> Result<()> {
    for step in steps {
        let rows = step.run(store)?;
        info!("addresses: {} ({} rows)", step.name(), rows);
    }
    Ok(())
}

/// Recreate `addresses` and run every step.
pub fn build(store: &mut dyn Store) -> Result<()> {
    info!("Building addresses");
    schema::recreate(store, schema::ADDRESSES, schema::CREATE_ADDRESSES)?;
    run_steps(store, STEPS)?;
    let total = store.count("SELECT COUNT(*) FROM addresses")?;
    info!("addresses: {} rows", total);
    Ok(())
}

/// Re-run every step after the base join on an existing relation.
pub fn patch(store: &mut dyn Store) -> Result<()> {
    run_steps(store, &STEPS[1..])
}
