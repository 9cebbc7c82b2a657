use serde::{Deserialize, Serialize};

use crate::models::UnitReference;
use crate::months::PeriodKey;
use crate::pivot::{Category, PivotTable, CATEGORIES};

/// A normalized cost, or a marker that the denominator was zero or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum ViewCell {
    Value(f64),
    NonComputable,
}

impl ViewCell {
    fn ratio(numerator: f64, denominator: Option<f64>) -> Self {
        match denominator {
            Some(d) if d > 0.0 && d.is_finite() => Self::Value(numerator / d),
            _ => Self::NonComputable,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::NonComputable => None,
        }
    }

    pub fn is_computable(self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl From<ViewCell> for Option<f64> {
    fn from(cell: ViewCell) -> Self {
        cell.value()
    }
}

impl From<Option<f64>> for ViewCell {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Self::NonComputable, Self::Value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    PerArea,
    PerYield,
}

impl ViewKind {
    pub fn denominator_label(self) -> &'static str {
        match self {
            Self::PerArea => "Area (ha)",
            Self::PerYield => "Yield (boxes)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    pub period: PeriodKey,
    pub label: String,
    /// Indexed by [`Category::index`].
    pub cells: [ViewCell; 4],
    /// The area or yield this row was divided by, as given by the reference table.
    pub denominator: Option<f64>,
}

impl ViewRow {
    pub fn get(&self, category: Category) -> ViewCell {
        self.cells[category.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitView {
    pub unit: String,
    pub kind: ViewKind,
    pub rows: Vec<ViewRow>,
}

impl UnitView {
    pub fn row(&self, period: PeriodKey) -> Option<&ViewRow> {
        self.rows.iter().find(|r| r.period == period)
    }

    pub fn get(&self, period: PeriodKey, category: Category) -> Option<ViewCell> {
        self.row(period).map(|r| r.get(category))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitViews {
    pub per_area: UnitView,
    pub per_yield: UnitView,
}

fn divide(
    pivot: &PivotTable,
    kind: ViewKind,
    denominator: impl Fn(PeriodKey) -> Option<f64>,
) -> UnitView {
    let rows = pivot
        .rows
        .iter()
        .map(|row| {
            let d = denominator(row.period);
            let mut cells = [ViewCell::NonComputable; 4];
            for category in CATEGORIES {
                cells[category.index()] = ViewCell::ratio(row.get(category), d);
            }
            ViewRow {
                period: row.period,
                label: row.label.clone(),
                cells,
                denominator: d,
            }
        })
        .collect();
    UnitView {
        unit: pivot.unit.clone(),
        kind,
        rows,
    }
}

/// Cost per hectare and cost per yield unit for one pivot.
///
/// Every pivot row is divided by the unit's area. For the yield view, month rows use that
/// month's yield and the Budgeted row uses the initial season estimate. Zero or missing
/// denominators produce [`ViewCell::NonComputable`] cells.
pub fn unit_views(pivot: &PivotTable, reference: &UnitReference) -> UnitViews {
    let per_area = divide(pivot, ViewKind::PerArea, |_| reference.area);
    let per_yield = divide(pivot, ViewKind::PerYield, |period| match period {
        PeriodKey::Budgeted => reference.lifetime_yield,
        PeriodKey::Month(i) => reference.monthly_yield.get(i).copied().flatten(),
    });
    UnitViews {
        per_area,
        per_yield,
    }
}
