use std::collections::BTreeMap;

use crate::models::LedgerRow;
use crate::months::{MonthSequence, PeriodKey, SEASON_LEN};

/// Blended season cost per period key for one row-set.
///
/// `Budgeted` is always present. Month `i` is present only for `i <= boundary`, where the
/// boundary is the row-set's last realized month unless the caller blended through a wider
/// one (see [`blended_through`]).
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedTotal {
    /// Last month index with strictly positive realized spend in this row-set.
    pub last_actual: Option<usize>,
    values: BTreeMap<PeriodKey, f64>,
}

impl AdjustedTotal {
    /// A total computed from other totals rather than from rows.
    pub(crate) fn derived(last_actual: Option<usize>, values: BTreeMap<PeriodKey, f64>) -> Self {
        Self { last_actual, values }
    }

    pub fn get(&self, key: PeriodKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    #[cfg(test)]
    pub fn budgeted(&self) -> f64 {
        self.values.get(&PeriodKey::Budgeted).copied().unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn contains(&self, key: PeriodKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn periods(&self) -> impl Iterator<Item = PeriodKey> + '_ {
        self.values.keys().copied()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (PeriodKey, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    /// Fill a period the blend did not produce. Existing values are never replaced.
    pub(crate) fn fill(&mut self, key: PeriodKey, value: f64) {
        self.values.entry(key).or_insert(value);
    }
}

/// Column sums of realized and forecast spend across a row-set.
pub(crate) fn monthly_sums(rows: &[LedgerRow]) -> ([f64; SEASON_LEN], [f64; SEASON_LEN]) {
    let mut realized = [0.0; SEASON_LEN];
    let mut forecast = [0.0; SEASON_LEN];
    for row in rows {
        for m in 0..SEASON_LEN {
            realized[m] += row.realized[m];
            forecast[m] += row.forecast[m];
        }
    }
    (realized, forecast)
}

pub fn last_actual_month(rows: &[LedgerRow]) -> Option<usize> {
    let (realized, _) = monthly_sums(rows);
    realized.iter().rposition(|&v| v > 0.0)
}

pub fn adjusted_total(rows: &[LedgerRow], months: &MonthSequence) -> AdjustedTotal {
    let last = last_actual_month(rows);
    blended_through(rows, months, last)
}

/// Blend every month `0..=boundary`: realized spend through the month plus forecast for the
/// months after it. `last_actual` still reports the row-set's own boundary.
pub fn blended_through(
    rows: &[LedgerRow],
    months: &MonthSequence,
    boundary: Option<usize>,
) -> AdjustedTotal {
    let (realized, forecast) = monthly_sums(rows);
    let n = months.len().min(SEASON_LEN);

    let mut values = BTreeMap::new();
    values.insert(
        PeriodKey::Budgeted,
        rows.iter().map(|r| r.lifetime_forecast).sum(),
    );

    if let Some(boundary) = boundary {
        for i in 0..=boundary.min(n - 1) {
            let spent: f64 = realized[..=i].iter().sum();
            let remaining: f64 = forecast[i + 1..n].iter().sum();
            values.insert(PeriodKey::Month(i), spent + remaining);
        }
    }

    AdjustedTotal {
        last_actual: realized[..n].iter().rposition(|&v| v > 0.0),
        values,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::CostCategory;

    pub(crate) fn row(
        item: &str,
        category: CostCategory,
        realized: &[f64],
        forecast: f64,
    ) -> LedgerRow {
        let mut r = [0.0; SEASON_LEN];
        r[..realized.len()].copy_from_slice(realized);
        LedgerRow {
            item: item.to_string(),
            category,
            realized: r,
            forecast: [forecast; SEASON_LEN],
            lifetime_forecast: forecast * SEASON_LEN as f64,
        }
    }

    #[test]
    fn test_two_realized_months_blend_with_forecast() {
        let rows = vec![row("Adubo", CostCategory::Input, &[100.0, 100.0], 100.0)];
        let months = MonthSequence::default();
        let totals = adjusted_total(&rows, &months);
        assert_eq!(totals.last_actual, Some(1));
        assert_eq!(totals.budgeted(), 1200.0);
        assert_eq!(totals.get(PeriodKey::Month(0)), Some(1200.0));
        assert_eq!(totals.get(PeriodKey::Month(1)), Some(1200.0));
        assert_eq!(totals.periods().count(), 3);
    }

    #[test]
    fn test_no_realized_spend_is_budget_only() {
        let rows = vec![
            row("Adubo", CostCategory::Input, &[], 50.0),
            row("Energia", CostCategory::Fixed, &[], 25.0),
        ];
        let totals = adjusted_total(&rows, &MonthSequence::default());
        assert_eq!(totals.last_actual, None);
        assert_eq!(totals.periods().collect::<Vec<_>>(), vec![PeriodKey::Budgeted]);
        assert_eq!(totals.budgeted(), 900.0);
    }

    #[test]
    fn test_empty_row_set() {
        let totals = adjusted_total(&[], &MonthSequence::default());
        assert_eq!(totals.budgeted(), 0.0);
        assert_eq!(totals.periods().count(), 1);
    }

    #[test]
    fn test_months_after_last_actual_are_excluded() {
        let rows = vec![row("Adubo", CostCategory::Input, &[10.0, 0.0, 30.0], 20.0)];
        let totals = adjusted_total(&rows, &MonthSequence::default());
        assert_eq!(totals.last_actual, Some(2));
        assert!(totals.contains(PeriodKey::Month(2)));
        assert!(!totals.contains(PeriodKey::Month(3)));
        // A zero month inside the realized trail is summed as zero.
        assert_eq!(totals.get(PeriodKey::Month(1)), Some(10.0 + 0.0 + 20.0 * 10.0));
    }

    #[test]
    fn test_fully_realized_season_has_no_forecast_remainder() {
        let realized = [90.0; SEASON_LEN];
        let rows = vec![row("Mao de obra", CostCategory::Fixed, &realized, 100.0)];
        let totals = adjusted_total(&rows, &MonthSequence::default());
        assert_eq!(totals.last_actual, Some(SEASON_LEN - 1));
        assert_eq!(
            totals.get(PeriodKey::Month(SEASON_LEN - 1)),
            Some(90.0 * SEASON_LEN as f64)
        );
    }

    #[test]
    fn test_blended_through_extends_past_own_boundary() {
        let rows = vec![row("Colheita", CostCategory::Harvest, &[40.0], 50.0)];
        let totals = blended_through(&rows, &MonthSequence::default(), Some(2));
        assert_eq!(totals.last_actual, Some(0));
        assert_eq!(totals.get(PeriodKey::Month(0)), Some(40.0 + 550.0));
        // Months 1 and 2 add no realized spend; only their forecast drops off.
        assert_eq!(totals.get(PeriodKey::Month(1)), Some(40.0 + 500.0));
        assert_eq!(totals.get(PeriodKey::Month(2)), Some(40.0 + 450.0));
    }

    #[test]
    fn test_recompute_is_bit_identical() {
        let rows = vec![
            row("Adubo", CostCategory::Input, &[0.1, 0.2, 0.3], 0.7),
            row("Frete", CostCategory::Harvest, &[1.1, 2.2], 3.3),
        ];
        let months = MonthSequence::default();
        let a = adjusted_total(&rows, &months);
        let b = adjusted_total(&rows, &months);
        for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
            assert_eq!(ka, kb);
            assert_eq!(va.to_bits(), vb.to_bits());
        }
    }
}
