use crate::error::Result;
use crate::settings::{save_settings, settings_path, shellexpand_path, Settings};

pub fn run(
    mut settings: Settings,
    ledger: Option<String>,
    reference: Option<String>,
    season_start: Option<String>,
    currency: Option<String>,
) -> Result<()> {
    if let Some(path) = ledger {
        settings.ledger_path = shellexpand_path(&path);
    }
    if let Some(path) = reference {
        settings.reference_path = if path.is_empty() { path } else { shellexpand_path(&path) };
    }
    if let Some(start) = season_start {
        settings.season_start = Some(start);
    }
    if let Some(symbol) = currency {
        settings.currency_symbol = symbol;
    }

    // Reject a bad season before writing anything.
    let months = settings.season()?;
    save_settings(&settings)?;

    println!("Saved settings to {}", settings_path().display());
    println!("Ledger:     {}", settings.ledger_path);
    println!(
        "Reference:  {}",
        if settings.reference_path.is_empty() {
            "(none)"
        } else {
            &settings.reference_path
        }
    );
    println!(
        "Season:     {} .. {}",
        months.code(0),
        months.code(months.len() - 1)
    );
    Ok(())
}
