//! Post-build data quality: dummy value fixes and verification checks.

use tracing::{error, info, warn};

use crate::error::{BagError, Result};
use crate::store::{schema, Store};

/// Last plausible construction year; the BAG has a few 9999s.
pub const LAST_VALID_CONSTRUCTION_YEAR: i64 = 2040;

/// Placeholder construction year used for a series of Amsterdam buildings.
pub const DUMMY_CONSTRUCTION_YEAR: i64 = 1005;

/// Placeholder floor areas.
pub const DUMMY_FLOOR_AREAS: [i64; 2] = [999_999, 1];

const WITHOUT_PUBLIC_SPACE: &str = "public_space_id IS NULL \
     OR public_space_id NOT IN (SELECT id FROM public_spaces)";

/// Examples shown in the log for each fix.
const EXAMPLE_LIMIT: usize = 10;

fn examples(store: &dyn Store, columns: &str, condition: &str) -> Result<String> {
    let rows = store.fetch_rows(&format!(
        "SELECT {} FROM addresses WHERE {} LIMIT {}",
        columns, condition, EXAMPLE_LIMIT
    ))?;
    Ok(rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| match v.as_str() {
                    Some(s) => s.to_string(),
                    None => v.as_i64().map(|i| i.to_string()).unwrap_or_default(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(", "))
}

/// Count rows matching `condition`, then null `column` on them.
fn null_where(
    store: &mut dyn Store,
    description: &str,
    column: &str,
    id_column: &str,
    condition: &str,
) -> Result<i64> {
    let count = store.count(&format!(
        "SELECT COUNT(*) FROM addresses WHERE {}",
        condition
    ))?;
    if count == 0 {
        info!("fix: {}: 0", description);
        return Ok(0);
    }

    let shown = examples(store, &format!("{}, {}", id_column, column), condition)?;
    info!("fix: {}: {} | {}", description, count, shown);
    store.execute(&format!(
        "UPDATE addresses SET {} = NULL WHERE {}",
        column, condition
    ))?;
    Ok(count)
}

/// Outcome of [`apply_fixes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixReport {
    pub construction_years_cleared: i64,
    pub floor_areas_cleared: i64,
    pub addresses_without_public_space: i64,
    pub addresses_deleted: i64,
}

/// Clear known dummy values and drop addresses without a public space when
/// there are fewer than `delete_threshold` of them.
pub fn apply_fixes(store: &mut dyn Store, delete_threshold: i64) -> Result<FixReport> {
    let mut report = FixReport::default();

    report.construction_years_cleared += null_where(
        store,
        "dummy construction year 1005",
        "construction_year",
        "building_ids",
        &format!("construction_year = {}", DUMMY_CONSTRUCTION_YEAR),
    )?;
    report.construction_years_cleared += null_where(
        store,
        &format!("construction year > {}", LAST_VALID_CONSTRUCTION_YEAR),
        "construction_year",
        "building_ids",
        &format!("construction_year > {}", LAST_VALID_CONSTRUCTION_YEAR),
    )?;
    for area in DUMMY_FLOOR_AREAS {
        report.floor_areas_cleared += null_where(
            store,
            &format!("dummy floor area {}", area),
            "floor_area",
            "unit_id",
            &format!("floor_area = {}", area),
        )?;
    }

    let orphans = store.count(&format!(
        "SELECT COUNT(*) FROM addresses WHERE {}",
        WITHOUT_PUBLIC_SPACE
    ))?;
    report.addresses_without_public_space = orphans;
    info!("fix: addresses without public space: {}", orphans);
    if orphans > 0 && orphans < delete_threshold {
        report.addresses_deleted = store.execute(&format!(
            "DELETE FROM addresses WHERE {}",
            WITHOUT_PUBLIC_SPACE
        ))? as i64;
        info!("fix: deleted {} addresses without public space", report.addresses_deleted);
    } else if orphans > 0 {
        warn!(
            "{} addresses without public space kept (threshold {})",
            orphans, delete_threshold
        );
    }

    Ok(report)
}

/// What a verification count must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Every matching row is an error
    Zero,
    AtLeast(i64),
    Exactly(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub name: String,
    pub count: i64,
    pub errors: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyReport {
    pub checks: Vec<CheckResult>,
}

impl VerifyReport {
    pub fn total_errors(&self) -> i64 {
        self.checks.iter().map(|c| c.errors).sum()
    }

    pub fn passed(&self) -> bool {
        self.total_errors() == 0
    }
}

struct Check {
    name: &'static str,
    query: String,
    expect: Expectation,
}

fn check(name: &'static str, query: impl Into<String>, expect: Expectation) -> Check {
    Check {
        name,
        query: query.into(),
        expect,
    }
}

fn structural_checks(with_reference: bool) -> Vec<Check> {
    use Expectation::Zero;

    let mut checks = Vec::new();
    if with_reference {
        checks.push(check(
            "municipalities without addresses",
            "SELECT COUNT(*) FROM municipalities WHERE id NOT IN \
             (SELECT DISTINCT municipality_id FROM addresses WHERE municipality_id IS NOT NULL)",
            Zero,
        ));
        checks.push(check(
            "places without municipality",
            "SELECT COUNT(*) FROM places WHERE municipality_id IS NULL \
             OR municipality_id NOT IN (SELECT id FROM municipalities)",
            Zero,
        ));
    } else {
        checks.push(check(
            "places without municipality",
            "SELECT COUNT(*) FROM places WHERE municipality_id IS NULL",
            Zero,
        ));
    }
    checks.extend([
        check(
            "addresses without public space",
            format!("SELECT COUNT(*) FROM addresses WHERE {}", WITHOUT_PUBLIC_SPACE),
            Zero,
        ),
        check(
            "addresses without place",
            "SELECT COUNT(*) FROM addresses WHERE place_id IS NULL",
            Zero,
        ),
        check(
            "addresses without municipality",
            "SELECT COUNT(*) FROM addresses WHERE municipality_id IS NULL",
            Zero,
        ),
        check(
            "buildings without location",
            "SELECT COUNT(*) FROM addresses WHERE latitude IS NULL AND building_ids IS NOT NULL",
            Zero,
        ),
        check(
            "berths without location",
            "SELECT COUNT(*) FROM addresses WHERE latitude IS NULL AND object_type = 'berth'",
            Zero,
        ),
        check(
            "pitches without location",
            "SELECT COUNT(*) FROM addresses WHERE latitude IS NULL AND object_type = 'pitch'",
            Zero,
        ),
    ]);
    checks
}

/// Row counts a complete national extract always exceeds.
fn national_checks(with_reference: bool) -> Vec<Check> {
    use Expectation::*;

    let mut checks = vec![
        check("addresses", "SELECT COUNT(*) FROM addresses", AtLeast(9_000_000)),
        check(
            "addresses with building",
            "SELECT COUNT(*) FROM addresses WHERE building_ids IS NOT NULL",
            AtLeast(9_000_000),
        ),
        check(
            "berth addresses",
            "SELECT COUNT(*) FROM addresses WHERE object_type = 'berth'",
            AtLeast(10_000),
        ),
        check(
            "pitch addresses",
            "SELECT COUNT(*) FROM addresses WHERE object_type = 'pitch'",
            AtLeast(20_000),
        ),
        check("public spaces", "SELECT COUNT(*) FROM public_spaces", AtLeast(250_000)),
        check("places", "SELECT COUNT(*) FROM places", AtLeast(2_000)),
    ];
    if with_reference {
        checks.push(check("municipalities", "SELECT COUNT(*) FROM municipalities", AtLeast(300)));
        checks.push(check("provinces", "SELECT COUNT(*) FROM provinces", Exactly(12)));
    }
    checks
}

fn errors_for(count: i64, expect: Expectation) -> i64 {
    match expect {
        Expectation::Zero => count,
        Expectation::AtLeast(min) => i64::from(count < min),
        Expectation::Exactly(n) => i64::from(count != n),
    }
}

/// Run the verification checks, logging one line per check and a total.
///
/// `national` adds minimum row counts that only hold for a full extract.
pub fn verify(store: &dyn Store, national: bool) -> Result<VerifyReport> {
    if !store.table_exists(schema::ADDRESSES)? {
        return Err(BagError::Config(
            "store has no addresses table; run the ingest first".into(),
        ));
    }

    let with_reference = store.table_exists(schema::MUNICIPALITIES)?
        && store.table_exists(schema::PROVINCES)?;
    if !with_reference {
        warn!("No reference tables; municipality checks limited");
    }

    let latest = store.fetch_scalar("SELECT MAX(number_begin_date) FROM addresses")?;
    info!("info: latest number begin date: {}", latest.as_str().unwrap_or("-"));

    let mut checks = structural_checks(with_reference);
    if national {
        checks.extend(national_checks(with_reference));
    }

    let mut report = VerifyReport::default();
    for check in checks {
        let count = store.count(&check.query)?;
        let errors = errors_for(count, check.expect);
        if errors > 0 {
            error!("check: {}: {}", check.name, count);
        } else {
            info!("check: {}: {}", check.name, count);
        }
        report.checks.push(CheckResult {
            name: check.name.to_string(),
            count,
            errors,
        });
    }

    if report.passed() {
        info!("check: total errors: 0");
    } else {
        error!("check: total errors: {}", report.total_errors());
    }
    Ok(report)
}
