use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{CostCategory, LedgerRow};
use crate::months::{MonthSequence, PeriodKey};
use crate::projection::{adjusted_total, blended_through, monthly_sums, AdjustedTotal};

/// How a category group is valued for months its own realized trail has not reached but the
/// unit total has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Blend every group at the unit's boundary, same rule as the total.
    #[default]
    Unified,
    /// Use the group's raw forecast for that single month, as the legacy workbook did.
    ForecastOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotals {
    pub total: AdjustedTotal,
    pub inputs: AdjustedTotal,
    pub harvest: AdjustedTotal,
    /// Derived as total − inputs − harvest; never summed from rows.
    pub fixed: AdjustedTotal,
}

fn rows_tagged(rows: &[LedgerRow], category: CostCategory) -> Vec<LedgerRow> {
    rows.iter().filter(|r| r.category == category).cloned().collect()
}

fn group_total(
    rows: &[LedgerRow],
    months: &MonthSequence,
    boundary: Option<usize>,
    policy: FallbackPolicy,
) -> AdjustedTotal {
    match policy {
        FallbackPolicy::Unified => blended_through(rows, months, boundary),
        FallbackPolicy::ForecastOnly => {
            let mut totals = adjusted_total(rows, months);
            let (_, forecast) = monthly_sums(rows);
            for (i, value) in forecast.iter().enumerate().take(months.len()) {
                totals.fill(PeriodKey::Month(i), *value);
            }
            totals
        }
    }
}

pub fn category_aggregate(
    rows: &[LedgerRow],
    months: &MonthSequence,
    policy: FallbackPolicy,
) -> CategoryTotals {
    let total = adjusted_total(rows, months);
    let boundary = total.last_actual;

    let inputs = group_total(&rows_tagged(rows, CostCategory::Input), months, boundary, policy);
    let harvest = group_total(&rows_tagged(rows, CostCategory::Harvest), months, boundary, policy);

    debug!(
        total = ?total.last_actual,
        inputs = ?inputs.last_actual,
        harvest = ?harvest.last_actual,
        ?policy,
        "category boundaries"
    );

    let mut values = BTreeMap::new();
    for key in total.periods() {
        if let (Some(t), Some(i), Some(h)) = (total.get(key), inputs.get(key), harvest.get(key)) {
            values.insert(key, t - i - h);
        }
    }
    let fixed = AdjustedTotal::derived(boundary, values);

    CategoryTotals {
        total,
        inputs,
        harvest,
        fixed,
    }
}
