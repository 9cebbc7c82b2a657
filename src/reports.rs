use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregate::{category_aggregate, FallbackPolicy};
use crate::categorizer::CategoryRules;
use crate::error::{CostError, Result};
use crate::importer::{read_ledger, read_reference, LedgerLayout, ReferenceLayout};
use crate::models::{LoadedUnit, UnitLedger, UnitReference};
use crate::months::{MonthSequence, PeriodKey};
use crate::pivot::{build_pivot, Category, PivotTable};
use crate::unit_views::{unit_views, UnitViews};

// ---------------------------------------------------------------------------
// Inputs and options
// ---------------------------------------------------------------------------

/// Where the two source tables live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeasonSources {
    pub ledger: PathBuf,
    pub reference: Option<PathBuf>,
}

/// Everything besides the source tables that shapes the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub months: MonthSequence,
    pub policy: FallbackPolicy,
    pub rules: CategoryRules,
    pub ledger_layout: LedgerLayout,
    pub reference_layout: ReferenceLayout,
}

// ---------------------------------------------------------------------------
// Per-unit reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    pub unit: String,
    pub pivot: PivotTable,
    /// `None` when the unit has no row in the reference table.
    pub views: Option<UnitViews>,
    pub area: Option<f64>,
}

impl UnitReport {
    pub fn views(&self) -> Result<&UnitViews> {
        self.views
            .as_ref()
            .ok_or_else(|| CostError::MissingReference(self.unit.clone()))
    }
}

#[derive(Debug)]
pub struct UnitOutcome {
    pub unit: String,
    pub result: Result<UnitReport>,
}

#[derive(Debug)]
pub struct SeasonReport {
    pub units: Vec<UnitOutcome>,
    /// Set when a reference table was configured but could not be read.
    pub reference_error: Option<String>,
    pub generated_at: DateTime<Local>,
}

impl SeasonReport {
    pub fn unit(&self, name: &str) -> Option<&UnitOutcome> {
        self.units.iter().find(|u| u.unit == name)
    }

    pub fn reports(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter_map(|u| u.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &CostError)> {
        self.units
            .iter()
            .filter_map(|u| u.result.as_ref().err().map(|e| (u.unit.as_str(), e)))
    }
}

pub fn analyze_unit(
    ledger: &UnitLedger,
    reference: Option<&UnitReference>,
    opts: &AnalysisOptions,
) -> Result<UnitReport> {
    let totals = category_aggregate(&ledger.rows, &opts.months, opts.policy);
    let pivot = build_pivot(&ledger.unit, &totals, &opts.months)?;
    debug!(
        unit = %ledger.unit,
        last_actual = ?totals.total.last_actual.map(|i| opts.months.code(i)),
        periods = pivot.rows.len(),
        "pivot built"
    );

    let views = match reference {
        Some(reference) => Some(unit_views(&pivot, reference)),
        None => {
            warn!(
                unit = %ledger.unit,
                "no reference record; skipping per-area and per-yield views"
            );
            None
        }
    };

    Ok(UnitReport {
        unit: ledger.unit.clone(),
        pivot,
        area: reference.and_then(|r| r.area),
        views,
    })
}

fn find_reference<'a>(references: &'a [UnitReference], unit: &str) -> Option<&'a UnitReference> {
    references.iter().find(|r| r.unit.trim() == unit.trim())
}

/// Run every loaded unit through the pipeline. Units fail independently.
pub fn analyze_season(
    units: Vec<LoadedUnit>,
    references: &[UnitReference],
    opts: &AnalysisOptions,
) -> SeasonReport {
    let units = units
        .into_iter()
        .map(|loaded| {
            let result = loaded.ledger.and_then(|ledger| {
                analyze_unit(&ledger, find_reference(references, &ledger.unit), opts)
            });
            if let Err(e) = &result {
                warn!(unit = %loaded.unit, error = %e, "unit skipped");
            }
            UnitOutcome {
                unit: loaded.unit,
                result,
            }
        })
        .collect();
    SeasonReport {
        units,
        reference_error: None,
        generated_at: Local::now(),
    }
}

/// Read both sources and analyze the season. A reference table that cannot be read leaves
/// every unit without views instead of failing the load.
pub fn load_season(sources: &SeasonSources, opts: &AnalysisOptions) -> Result<SeasonReport> {
    let units = read_ledger(&sources.ledger, &opts.ledger_layout, &opts.rules)?;

    let (references, reference_error) = match &sources.reference {
        Some(path) => match read_reference(path, &opts.reference_layout, &opts.months) {
            Ok(refs) => (refs, None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "reference table unavailable");
                (Vec::new(), Some(format!("{}: {e}", path.display())))
            }
        },
        None => (Vec::new(), None),
    };

    let mut report = analyze_season(units, &references, opts);
    report.reference_error = reference_error;
    Ok(report)
}

// ---------------------------------------------------------------------------
// Headline metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub unit: String,
    pub area: Option<f64>,
    pub budgeted: f64,
    pub latest_label: Option<String>,
    pub latest_total: Option<f64>,
    /// Latest adjusted total against budget, in percent.
    pub variance_pct: Option<f64>,
    pub budgeted_per_yield: Option<f64>,
    pub latest_per_yield: Option<f64>,
}

pub fn headline(report: &UnitReport) -> Headline {
    let budgeted = report
        .pivot
        .get(PeriodKey::Budgeted, Category::Total)
        .unwrap_or(0.0);
    let latest = report.pivot.latest();
    let latest_total = latest.map(|r| r.get(Category::Total));
    let variance_pct = match latest_total {
        Some(total) if budgeted != 0.0 => Some((total - budgeted) / budgeted * 100.0),
        _ => None,
    };

    let per_yield = |period: PeriodKey| {
        report
            .views
            .as_ref()
            .and_then(|v| v.per_yield.get(period, Category::Total))
            .and_then(|c| c.value())
    };

    Headline {
        unit: report.unit.clone(),
        area: report.area,
        budgeted,
        latest_label: latest.map(|r| r.label.clone()),
        latest_total,
        variance_pct,
        budgeted_per_yield: per_yield(PeriodKey::Budgeted),
        latest_per_yield: latest.and_then(|r| per_yield(r.period)),
    }
}
