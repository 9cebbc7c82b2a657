use std::path::Path;

use crate::cli::Context;
use crate::error::Result;
use crate::importer::SourceKind;
use crate::reports::load_season;
use crate::settings::{settings_file_exists, settings_path};

fn describe(path: &Path) -> String {
    if !path.exists() {
        return "(not found)".to_string();
    }
    match SourceKind::detect(path) {
        Ok(kind) => {
            let modified = std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map(|t| {
                    chrono::DateTime::<chrono::Local>::from(t)
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                })
                .unwrap_or_default();
            format!("{}, modified {modified}", kind.key())
        }
        Err(e) => e.to_string(),
    }
}

pub fn run(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;
    let config = settings_path();
    println!(
        "Settings:   {}{}",
        config.display(),
        if settings_file_exists() { "" } else { " (defaults)" }
    );
    println!(
        "Ledger:     {}  [{}]",
        ctx.sources.ledger.display(),
        describe(&ctx.sources.ledger)
    );
    match &ctx.sources.reference {
        Some(path) => println!("Reference:  {}  [{}]", path.display(), describe(path)),
        None => println!("Reference:  (none)"),
    }

    let opts = settings.analysis_options(false)?;
    println!(
        "Season:     {} .. {}",
        opts.months.code(0),
        opts.months.code(opts.months.len() - 1)
    );
    println!("Fallback:   {:?}", opts.policy);
    println!("Currency:   {} ({} decimals)", settings.currency_symbol, settings.decimals);

    if ctx.sources.ledger.exists() {
        let season = load_season(&ctx.sources, &opts)?;
        let failed = season.failures().count();
        let without_reference = season.reports().filter(|r| r.views.is_none()).count();
        println!();
        println!("Units:             {}", season.units.len());
        println!("Failed to parse:   {failed}");
        println!("No reference:      {without_reference}");
    } else {
        println!();
        println!("Ledger not found. Run `farmcost init --ledger <path>` to set it.");
    }
    Ok(())
}
