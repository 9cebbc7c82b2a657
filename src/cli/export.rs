use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::Context;
use crate::error::Result;
use crate::pivot::{PivotTable, CATEGORIES};
use crate::reports::{load_season, UnitReport};
use crate::unit_views::UnitView;

const DEFAULT_DIR: &str = "farmcost-export";

fn file_stem(unit: &str) -> String {
    unit.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn csv_header(extra: Option<&str>) -> Vec<String> {
    std::iter::once("Period".to_string())
        .chain(CATEGORIES.iter().map(|c| c.label().to_string()))
        .chain(extra.map(str::to_string))
        .collect()
}

fn write_pivot(path: &Path, pivot: &PivotTable) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(csv_header(None))?;
    for row in &pivot.rows {
        let mut record = vec![row.label.clone()];
        record.extend(CATEGORIES.iter().map(|c| row.get(*c).to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Non-computable cells and unknown denominators are written as empty fields.
fn write_view(path: &Path, view: &UnitView) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(csv_header(Some(view.kind.denominator_label())))?;
    for row in &view.rows {
        let mut record = vec![row.label.clone()];
        record.extend(
            CATEGORIES
                .iter()
                .map(|c| row.get(*c).value().map(|v| v.to_string()).unwrap_or_default()),
        );
        record.push(row.denominator.map(|d| d.to_string()).unwrap_or_default());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write one unit's files; returns the paths written.
pub(crate) fn export_unit(dir: &Path, report: &UnitReport) -> Result<Vec<PathBuf>> {
    let stem = file_stem(&report.unit);
    let mut written = Vec::new();

    let totals = dir.join(format!("{stem}_totals.csv"));
    write_pivot(&totals, &report.pivot)?;
    written.push(totals);

    if let Some(views) = &report.views {
        let per_area = dir.join(format!("{stem}_per_area.csv"));
        write_view(&per_area, &views.per_area)?;
        written.push(per_area);

        let per_yield = dir.join(format!("{stem}_per_yield.csv"));
        write_view(&per_yield, &views.per_yield)?;
        written.push(per_yield);
    }
    Ok(written)
}

pub fn run(ctx: &Context, output_dir: Option<String>, legacy_fallback: bool) -> Result<()> {
    let opts = ctx.settings.analysis_options(legacy_fallback)?;
    let season = load_season(&ctx.sources, &opts)?;
    let dir = PathBuf::from(output_dir.as_deref().unwrap_or(DEFAULT_DIR));
    std::fs::create_dir_all(&dir)?;

    let mut count = 0;
    for report in season.reports() {
        for path in export_unit(&dir, report)? {
            println!("Wrote {}", path.display());
            count += 1;
        }
        if report.views.is_none() {
            println!("  {}: no reference record, totals only", report.unit);
        }
    }
    for (unit, e) in season.failures() {
        eprintln!("Skipped {unit}: {e}");
    }
    info!(files = count, dir = %dir.display(), "export finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CostCategory, UnitLedger, UnitReference};
    use crate::projection::tests::row;
    use crate::reports::{analyze_unit, AnalysisOptions};

    fn report(with_reference: bool) -> UnitReport {
        let ledger = UnitLedger {
            unit: "Fazenda A/Norte".to_string(),
            rows: vec![row("Adubo", CostCategory::Input, &[100.0], 100.0)],
        };
        let mut reference = UnitReference::new("Fazenda A/Norte");
        reference.area = Some(50.0);
        reference.monthly_yield[0] = Some(0.0);
        analyze_unit(
            &ledger,
            with_reference.then_some(&reference),
            &AnalysisOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_export_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let written = export_unit(dir.path(), &report(true)).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "Fazenda_A_Norte_totals.csv",
                "Fazenda_A_Norte_per_area.csv",
                "Fazenda_A_Norte_per_yield.csv"
            ]
        );

        let totals = std::fs::read_to_string(&written[0]).unwrap();
        let mut lines = totals.lines();
        assert_eq!(lines.next(), Some("Period,Total,Inputs,Harvest,Fixed"));
        assert_eq!(lines.next(), Some("Budgeted,1200,1200,0,0"));
        assert_eq!(lines.next(), Some("Jun24,1200,1200,0,0"));
    }

    #[test]
    fn test_non_computable_exports_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let written = export_unit(dir.path(), &report(true)).unwrap();
        let per_yield = std::fs::read_to_string(&written[2]).unwrap();
        let lines: Vec<&str> = per_yield.lines().collect();
        assert_eq!(lines[0], "Period,Total,Inputs,Harvest,Fixed,Yield (boxes)");
        // No lifetime estimate and zero Jun24 yield.
        assert_eq!(lines[1], "Budgeted,,,,,");
        assert_eq!(lines[2], "Jun24,,,,,0");
    }

    #[test]
    fn test_missing_reference_exports_totals_only() {
        let dir = tempfile::tempdir().unwrap();
        let written = export_unit(dir.path(), &report(false)).unwrap();
        assert_eq!(written.len(), 1);
    }
}
