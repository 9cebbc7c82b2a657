mod aggregate;
mod cache;
mod categorizer;
mod cli;
mod error;
mod fmt;
mod importer;
mod logging;
mod models;
mod months;
mod pivot;
mod projection;
mod reports;
mod settings;
mod unit_views;

use clap::Parser;

use cli::{Cli, Commands, Context};

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let ledger = cli.ledger.as_deref();
    let reference = cli.reference.as_deref();

    let result = match cli.command {
        Commands::Init {
            season_start,
            currency,
        } => cli::init::run(
            settings::load_settings(),
            cli.ledger.clone(),
            cli.reference.clone(),
            season_start,
            currency,
        ),
        Commands::Units => cli::units::run(&Context::resolve(ledger, reference)),
        Commands::Report {
            unit,
            all,
            view,
            json,
            legacy_fallback,
        } => cli::report::run(
            &Context::resolve(ledger, reference),
            &unit,
            all,
            view,
            json,
            legacy_fallback,
        ),
        Commands::Export {
            output_dir,
            legacy_fallback,
        } => cli::export::run(&Context::resolve(ledger, reference), output_dir, legacy_fallback),
        Commands::Watch {
            interval,
            unit,
            view,
            legacy_fallback,
        } => cli::watch::run(
            &Context::resolve(ledger, reference),
            interval,
            &unit,
            view,
            legacy_fallback,
        ),
        Commands::Status => cli::status::run(&Context::resolve(ledger, reference)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
