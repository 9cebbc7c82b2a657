use std::time::Duration;

use colored::Colorize;
use tracing::warn;

use crate::cache::SeasonCache;
use crate::cli::report::{render, select};
use crate::cli::{Context, ViewArg};
use crate::error::{CostError, Result};
use crate::reports::AnalysisOptions;

/// Check the sources once. Returns the rendered report only when their contents changed.
///
/// Unit names are resolved on every call, so an unknown unit fails each poll rather than
/// only the one that first loaded the season.
pub(crate) fn poll(
    cache: &mut SeasonCache,
    ctx: &Context,
    opts: &AnalysisOptions,
    units: &[String],
    view: ViewArg,
) -> Result<Option<String>> {
    let (season, fresh) = cache.get_or_load(&ctx.sources, opts)?;
    let selected = select(&season, units, false)?;
    if !fresh {
        return Ok(None);
    }
    Ok(Some(render(&season, &selected, view, &ctx.money_format())))
}

pub fn run(
    ctx: &Context,
    interval: u64,
    units: &[String],
    view: ViewArg,
    legacy_fallback: bool,
) -> Result<()> {
    let opts = ctx.settings.analysis_options(legacy_fallback)?;
    let mut cache = SeasonCache::default();
    let interval = Duration::from_secs(interval.max(1));

    println!(
        "{}",
        format!("Watching {} (Ctrl-C to stop)", ctx.sources.ledger.display()).dimmed()
    );
    loop {
        match poll(&mut cache, ctx, &opts, units, view) {
            Ok(Some(text)) => {
                // Clear the screen and home the cursor before each redraw.
                print!("\x1B[2J\x1B[H{text}");
            }
            Ok(None) => {}
            Err(e @ CostError::UnknownUnit(_)) => return Err(e),
            // A source caught mid-save fails to parse; try again next tick.
            Err(e) => warn!(error = %e, "could not refresh"),
        }
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::tests::{ledger_grid, reference_grid, write_csv};
    use crate::reports::SeasonSources;
    use crate::settings::Settings;

    #[test]
    fn test_poll_renders_only_on_change() {
        colored::control::set_override(false);
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("custos");
        std::fs::create_dir(&ledger).unwrap();
        let sheet = ledger.join("Fazenda A.csv");
        write_csv(&sheet, &ledger_grid(&[("Adubo", 1200.0, 100.0, vec![100.0])]));
        let reference = dir.path().join("safra.csv");
        write_csv(&reference, &reference_grid());

        let ctx = Context {
            settings: Settings::default(),
            sources: SeasonSources {
                ledger,
                reference: Some(reference),
            },
        };
        let opts = AnalysisOptions::default();
        let mut cache = SeasonCache::default();

        let first = poll(&mut cache, &ctx, &opts, &[], ViewArg::Totals).unwrap();
        assert!(first.unwrap().contains("Jun24"));
        assert!(poll(&mut cache, &ctx, &opts, &[], ViewArg::Totals).unwrap().is_none());

        write_csv(&sheet, &ledger_grid(&[("Adubo", 1200.0, 100.0, vec![100.0, 80.0])]));
        let updated = poll(&mut cache, &ctx, &opts, &[], ViewArg::Totals).unwrap();
        assert!(updated.unwrap().contains("Jul24"));
    }

    #[test]
    fn test_unknown_unit_fails_every_poll() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("custos");
        std::fs::create_dir(&ledger).unwrap();
        write_csv(
            &ledger.join("Fazenda A.csv"),
            &ledger_grid(&[("Adubo", 1200.0, 100.0, vec![100.0])]),
        );
        let ctx = Context {
            settings: Settings::default(),
            sources: SeasonSources {
                ledger,
                reference: None,
            },
        };
        let opts = AnalysisOptions::default();
        let mut cache = SeasonCache::default();
        let units = vec!["Fazenda Z".to_string()];

        for _ in 0..2 {
            let err = poll(&mut cache, &ctx, &opts, &units, ViewArg::Totals).unwrap_err();
            assert!(matches!(err, CostError::UnknownUnit(name) if name == "Fazenda Z"));
        }
        assert_eq!(cache.hits, 1);
    }
}
