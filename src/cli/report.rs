use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};
use serde::Serialize;

use crate::cli::{Context, ViewArg};
use crate::error::{CostError, Result};
use crate::fmt::{self, MoneyFormat};
use crate::pivot::{PivotTable, CATEGORIES};
use crate::reports::{headline, load_season, Headline, SeasonReport, UnitOutcome, UnitReport};
use crate::unit_views::UnitView;

fn header(first: &str) -> Vec<String> {
    std::iter::once(first.to_string())
        .chain(CATEGORIES.iter().map(|c| c.label().to_string()))
        .collect()
}

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

pub(crate) fn pivot_table(pivot: &PivotTable, money: &MoneyFormat) -> Table {
    let mut table = Table::new();
    table.set_header(header("Period"));
    for row in &pivot.rows {
        let mut cells = vec![Cell::new(&row.label)];
        cells.extend(CATEGORIES.iter().map(|c| right(fmt::money(row.get(*c), money))));
        table.add_row(cells);
    }
    table
}

pub(crate) fn view_table(view: &UnitView, money: &MoneyFormat) -> Table {
    let mut table = Table::new();
    let mut columns = header("Period");
    columns.push(view.kind.denominator_label().to_string());
    table.set_header(columns);
    for row in &view.rows {
        let mut cells = vec![Cell::new(&row.label)];
        cells.extend(CATEGORIES.iter().map(|c| right(fmt::cell(row.get(*c), money))));
        cells.push(right(fmt::optional_number(row.denominator, 2)));
        table.add_row(cells);
    }
    table
}

fn headline_block(h: &Headline, money: &MoneyFormat) -> String {
    let mut out = String::new();
    let area = h
        .area
        .map(|a| format!("  ({} ha)", fmt::number(a, 2)))
        .unwrap_or_default();
    out.push_str(&format!("{}{area}\n", h.unit.bold()));
    out.push_str(&format!("  Budgeted:        {}\n", fmt::money(h.budgeted, money)));

    match (&h.latest_label, h.latest_total) {
        (Some(label), Some(total)) => {
            let variance = fmt::percent(h.variance_pct);
            let variance = match h.variance_pct {
                Some(v) if v > 0.0 => variance.red(),
                Some(_) => variance.green(),
                None => variance.normal(),
            };
            out.push_str(&format!(
                "  Adjusted {label}:  {}  ({variance} vs budget)\n",
                fmt::money(total, money)
            ));
        }
        _ => out.push_str(&format!("  {}\n", "No realized spend yet".dimmed())),
    }

    if h.budgeted_per_yield.is_some() || h.latest_per_yield.is_some() {
        let budgeted = h
            .budgeted_per_yield
            .map_or_else(|| "-".to_string(), |v| fmt::money(v, money));
        let latest = h
            .latest_per_yield
            .map_or_else(|| "-".to_string(), |v| fmt::money(v, money));
        out.push_str(&format!(
            "  Cost per box:    {budgeted} budgeted, {latest} latest\n"
        ));
    }
    out
}

/// Render one unit's headline and the requested tables.
pub(crate) fn render_unit(report: &UnitReport, view: ViewArg, money: &MoneyFormat) -> String {
    let mut out = headline_block(&headline(report), money);

    if view.shows_totals() {
        out.push_str(&format!("\nAdjusted totals\n{}\n", pivot_table(&report.pivot, money)));
    }
    if view.shows_area() || view.shows_yield() {
        match report.views() {
            Ok(views) => {
                if view.shows_area() {
                    let table = view_table(&views.per_area, money);
                    out.push_str(&format!("\nCost per hectare\n{table}\n"));
                }
                if view.shows_yield() {
                    let table = view_table(&views.per_yield, money);
                    out.push_str(&format!("\nCost per box\n{table}\n"));
                }
            }
            Err(e) => out.push_str(&format!("\n{}\n", e.to_string().yellow())),
        }
    }
    out
}

/// Pick the requested units, or the last one in the ledger when none are named.
pub(crate) fn select<'a>(
    season: &'a SeasonReport,
    units: &[String],
    all: bool,
) -> Result<Vec<&'a UnitOutcome>> {
    if all {
        return Ok(season.units.iter().collect());
    }
    if units.is_empty() {
        return season
            .units
            .last()
            .map(|u| vec![u])
            .ok_or_else(|| CostError::Other("the ledger has no units".to_string()));
    }
    units
        .iter()
        .map(|name| {
            season
                .unit(name)
                .ok_or_else(|| CostError::UnknownUnit(name.clone()))
        })
        .collect()
}

#[derive(Serialize)]
struct UnitJson<'a> {
    unit: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    headline: Option<Headline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pivot: Option<&'a PivotTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    per_area: Option<&'a UnitView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    per_yield: Option<&'a UnitView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct SeasonJson<'a> {
    generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_error: Option<&'a str>,
    units: Vec<UnitJson<'a>>,
}

fn unit_json(outcome: &UnitOutcome, view: ViewArg) -> UnitJson<'_> {
    match &outcome.result {
        Ok(report) => {
            let views = report.views.as_ref();
            UnitJson {
                unit: &outcome.unit,
                headline: Some(headline(report)),
                pivot: view.shows_totals().then_some(&report.pivot),
                per_area: views.filter(|_| view.shows_area()).map(|v| &v.per_area),
                per_yield: views.filter(|_| view.shows_yield()).map(|v| &v.per_yield),
                error: None,
            }
        }
        Err(e) => UnitJson {
            unit: &outcome.unit,
            headline: None,
            pivot: None,
            per_area: None,
            per_yield: None,
            error: Some(e.to_string()),
        },
    }
}

pub(crate) fn to_json(
    season: &SeasonReport,
    selected: &[&UnitOutcome],
    view: ViewArg,
) -> Result<String> {
    let doc = SeasonJson {
        generated_at: season.generated_at.to_rfc3339(),
        reference_error: season.reference_error.as_deref(),
        units: selected.iter().map(|u| unit_json(u, view)).collect(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Render the selected units as text. A failed unit prints its error in place.
pub(crate) fn render(
    season: &SeasonReport,
    selected: &[&UnitOutcome],
    view: ViewArg,
    money: &MoneyFormat,
) -> String {
    let mut out = String::new();
    if let Some(e) = &season.reference_error {
        out.push_str(&format!("{} {e}\n\n", "Reference table unavailable:".yellow()));
    }
    for outcome in selected {
        match &outcome.result {
            Ok(report) => {
                out.push_str(&render_unit(report, view, money));
                out.push('\n');
            }
            Err(e) => out.push_str(&format!("{} {e}\n\n", "Skipped:".red().bold())),
        }
    }
    out.push_str(&format!(
        "{}\n",
        format!("Updated {}", season.generated_at.format("%Y-%m-%d %H:%M:%S")).dimmed()
    ));
    out
}

pub fn run(
    ctx: &Context,
    units: &[String],
    all: bool,
    view: ViewArg,
    json: bool,
    legacy_fallback: bool,
) -> Result<()> {
    let opts = ctx.settings.analysis_options(legacy_fallback)?;
    let season = load_season(&ctx.sources, &opts)?;
    let selected = select(&season, units, all)?;

    if json {
        println!("{}", to_json(&season, &selected, view)?);
    } else {
        print!("{}", render(&season, &selected, view, &ctx.money_format()));
    }

    if selected.iter().all(|u| u.result.is_err()) {
        return Err(CostError::Other("no selected unit could be analyzed".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::FallbackPolicy;
    use crate::models::{CostCategory, LoadedUnit, UnitLedger, UnitReference};
    use crate::projection::tests::row;
    use crate::reports::{analyze_season, AnalysisOptions};

    fn season() -> SeasonReport {
        let ledger = |unit: &str| UnitLedger {
            unit: unit.to_string(),
            rows: vec![
                row("Adubo", CostCategory::Input, &[100.0, 100.0], 100.0),
                row("Energia", CostCategory::Fixed, &[50.0], 50.0),
            ],
        };
        let mut reference = UnitReference::new("Fazenda A");
        reference.area = Some(0.0);
        reference.lifetime_yield = Some(1000.0);
        let units = vec![
            LoadedUnit {
                unit: "Fazenda A".to_string(),
                ledger: Ok(ledger("Fazenda A")),
            },
            LoadedUnit {
                unit: "Fazenda B".to_string(),
                ledger: Ok(ledger("Fazenda B")),
            },
            LoadedUnit {
                unit: "Fazenda C".to_string(),
                ledger: Err(CostError::malformed("Fazenda C", "bad amount")),
            },
        ];
        let opts = AnalysisOptions {
            policy: FallbackPolicy::Unified,
            ..AnalysisOptions::default()
        };
        analyze_season(units, &[reference], &opts)
    }

    #[test]
    fn test_default_selection_is_last_unit() {
        let season = season();
        let selected = select(&season, &[], false).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].unit, "Fazenda C");
    }

    #[test]
    fn test_unknown_unit() {
        let season = season();
        let err = select(&season, &["Fazenda Z".to_string()], false).unwrap_err();
        assert!(matches!(err, CostError::UnknownUnit(name) if name == "Fazenda Z"));
    }

    #[test]
    fn test_render_marks_non_computable_cells() {
        colored::control::set_override(false);
        let season = season();
        let selected = select(&season, &["Fazenda A".to_string()], false).unwrap();
        let text = render(&season, &selected, ViewArg::Area, &MoneyFormat::default());
        assert!(text.contains("Cost per hectare"));
        assert!(text.contains(" - "), "got:\n{text}");
        assert!(!text.contains("Adjusted totals"));
    }

    #[test]
    fn test_render_missing_reference_notice() {
        colored::control::set_override(false);
        let season = season();
        let selected = select(&season, &["Fazenda B".to_string()], false).unwrap();
        let text = render(&season, &selected, ViewArg::All, &MoneyFormat::default());
        assert!(text.contains("Adjusted totals"));
        assert!(text.contains("No reference record for unit: Fazenda B"), "got:\n{text}");
    }

    #[test]
    fn test_json_has_null_for_non_computable() {
        let season = season();
        let selected = select(&season, &[], true).unwrap();
        let json = to_json(&season, &selected, ViewArg::All).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        let units = doc["units"].as_array().unwrap();
        assert_eq!(units.len(), 3);
        assert_eq!(units[0]["headline"]["budgeted"], 1800.0);
        assert!(units[0]["per_area"]["rows"][0]["cells"][0].is_null());
        assert!(units[1].get("per_area").is_none());
        assert_eq!(units[2]["error"], "Malformed input in Fazenda C: bad amount");
    }
}
