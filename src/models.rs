use serde::{Deserialize, Serialize};

use crate::months::SEASON_LEN;

/// Category tag attached to each ledger line once, at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Input,
    Harvest,
    Fixed,
}

/// One line item of a unit's cost ledger (OPEX only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub item: String,
    pub category: CostCategory,
    pub realized: [f64; SEASON_LEN],
    pub forecast: [f64; SEASON_LEN],
    pub lifetime_forecast: f64,
}

/// All line items of one operating unit, in sheet order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitLedger {
    pub unit: String,
    pub rows: Vec<LedgerRow>,
}

/// Area and yield figures for one operating unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReference {
    pub unit: String,
    /// Hectares.
    pub area: Option<f64>,
    /// Yield per season month; `None` where the table has no column for that month.
    pub monthly_yield: [Option<f64>; SEASON_LEN],
    /// Initial whole-season yield estimate.
    pub lifetime_yield: Option<f64>,
}

impl UnitReference {
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            area: None,
            monthly_yield: [None; SEASON_LEN],
            lifetime_yield: None,
        }
    }
}

/// Result of a ledger source read: per-unit ledgers, or the reason a unit could not be read.
#[derive(Debug)]
pub struct LoadedUnit {
    pub unit: String,
    pub ledger: crate::error::Result<UnitLedger>,
}
