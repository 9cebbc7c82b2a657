use serde::{Deserialize, Serialize};

use crate::aggregate::CategoryTotals;
use crate::error::{CostError, Result};
use crate::months::{MonthSequence, PeriodKey};
use crate::projection::AdjustedTotal;

/// Pivot columns, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Total,
    Inputs,
    Harvest,
    Fixed,
}

pub const CATEGORIES: [Category; 4] = [
    Category::Total,
    Category::Inputs,
    Category::Harvest,
    Category::Fixed,
];

impl Category {
    pub fn index(self) -> usize {
        match self {
            Self::Total => 0,
            Self::Inputs => 1,
            Self::Harvest => 2,
            Self::Fixed => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Total => "Total",
            Self::Inputs => "Inputs",
            Self::Harvest => "Harvest",
            Self::Fixed => "Fixed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub period: PeriodKey,
    pub label: String,
    /// Indexed by [`Category::index`].
    pub values: [f64; 4],
}

impl PivotRow {
    pub fn get(&self, category: Category) -> f64 {
        self.values[category.index()]
    }
}

/// Period × category matrix for one operating unit: Budgeted, then each elapsed month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    pub unit: String,
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    pub fn row(&self, period: PeriodKey) -> Option<&PivotRow> {
        self.rows.iter().find(|r| r.period == period)
    }

    pub fn get(&self, period: PeriodKey, category: Category) -> Option<f64> {
        self.row(period).map(|r| r.get(category))
    }

    /// The most recent elapsed month, if any month has realized spend.
    pub fn latest(&self) -> Option<&PivotRow> {
        self.rows
            .iter()
            .rev()
            .find(|r| matches!(r.period, PeriodKey::Month(_)))
    }
}

fn column(totals: &CategoryTotals, category: Category) -> &AdjustedTotal {
    match category {
        Category::Total => &totals.total,
        Category::Inputs => &totals.inputs,
        Category::Harvest => &totals.harvest,
        Category::Fixed => &totals.fixed,
    }
}

/// Assemble the pivot over Budgeted plus every month through the unit total's last realized
/// month. Every category must cover every one of those periods.
pub fn build_pivot(
    unit: &str,
    totals: &CategoryTotals,
    months: &MonthSequence,
) -> Result<PivotTable> {
    let periods = months.periods_through(totals.total.last_actual);
    let mut rows = Vec::with_capacity(periods.len());

    for period in periods {
        let mut values = [0.0; 4];
        for category in CATEGORIES {
            values[category.index()] = column(totals, category).get(period).ok_or_else(|| {
                CostError::malformed(
                    unit,
                    format!(
                        "{} has no value for {}",
                        category.label(),
                        months.label(period)
                    ),
                )
            })?;
        }
        rows.push(PivotRow {
            period,
            label: months.label(period).to_string(),
            values,
        });
    }

    Ok(PivotTable {
        unit: unit.to_string(),
        rows,
    })
}
