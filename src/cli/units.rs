use colored::Colorize;
use comfy_table::{Cell, Table};
use tracing::warn;

use crate::categorizer::summarize_tags;
use crate::cli::Context;
use crate::error::Result;
use crate::importer::{read_ledger, read_reference};
use crate::projection::last_actual_month;

pub fn run(ctx: &Context) -> Result<()> {
    let opts = ctx.settings.analysis_options(false)?;
    let units = read_ledger(&ctx.sources.ledger, &opts.ledger_layout, &opts.rules)?;
    let references = match &ctx.sources.reference {
        Some(path) => {
            read_reference(path, &opts.reference_layout, &opts.months).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "reference table unavailable");
                Vec::new()
            })
        }
        None => Vec::new(),
    };

    let mut table = Table::new();
    table.set_header(vec![
        "Unit", "Items", "Inputs", "Harvest", "Fixed", "Last realized", "Reference",
    ]);
    for loaded in &units {
        let has_reference = references.iter().any(|r| r.unit.trim() == loaded.unit.trim());
        let reference = if has_reference {
            "yes".green()
        } else {
            "missing".yellow()
        };
        match &loaded.ledger {
            Ok(ledger) => {
                let tags = summarize_tags(&ledger.rows);
                let last = last_actual_month(&ledger.rows)
                    .map(|i| opts.months.code(i).to_string())
                    .unwrap_or_else(|| "-".to_string());
                table.add_row(vec![
                    Cell::new(&loaded.unit),
                    Cell::new(ledger.rows.len()),
                    Cell::new(tags.inputs),
                    Cell::new(tags.harvest),
                    Cell::new(tags.fixed),
                    Cell::new(last),
                    Cell::new(reference),
                ]);
            }
            Err(e) => {
                table.add_row(vec![
                    Cell::new(&loaded.unit),
                    Cell::new(format!("{}", "error".red())),
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(reference),
                ]);
                eprintln!("{}: {e}", loaded.unit);
            }
        }
    }
    println!("{table}");
    Ok(())
}
