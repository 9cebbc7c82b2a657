pub mod export;
pub mod init;
pub mod report;
pub mod status;
pub mod units;
pub mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::fmt::MoneyFormat;
use crate::reports::SeasonSources;
use crate::settings::{load_settings, Settings};

#[derive(Parser)]
#[command(
    name = "farmcost",
    version,
    about = "Season cost ledger for farm operating units: adjusted totals, category pivots \
             and unit economics."
)]
pub struct Cli {
    /// Ledger workbook, CSV file, or directory of per-unit CSV files
    #[arg(long, global = true)]
    pub ledger: Option<String>,
    /// Area and yield reference table (workbook or CSV)
    #[arg(long, global = true)]
    pub reference: Option<String>,
    /// Log more (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    /// Pivot of adjusted totals
    #[default]
    Totals,
    /// Cost per hectare
    Area,
    /// Cost per yield unit
    Yield,
    /// Everything above
    All,
}

impl ViewArg {
    pub fn shows_totals(self) -> bool {
        matches!(self, Self::Totals | Self::All)
    }

    pub fn shows_area(self) -> bool {
        matches!(self, Self::Area | Self::All)
    }

    pub fn shows_yield(self) -> bool {
        matches!(self, Self::Yield | Self::All)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save source paths and season settings.
    Init {
        /// First month of the season as YYYY-MM (e.g. 2024-06)
        #[arg(long = "season-start")]
        season_start: Option<String>,
        /// Currency symbol used when printing amounts
        #[arg(long)]
        currency: Option<String>,
    },
    /// List the operating units found in the ledger.
    Units,
    /// Show headline metrics and cost tables per unit.
    Report {
        /// Unit to report on; repeatable (default: the last unit in the ledger)
        #[arg(long)]
        unit: Vec<String>,
        /// Report on every unit
        #[arg(long, conflicts_with = "unit")]
        all: bool,
        #[arg(long, value_enum, default_value_t = ViewArg::Totals)]
        view: ViewArg,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
        /// Fill missing category months from forecast only
        #[arg(long = "legacy-fallback")]
        legacy_fallback: bool,
    },
    /// Write totals, per-area and per-yield CSV files for every unit.
    Export {
        /// Directory for the CSV files (default: ./farmcost-export)
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
        #[arg(long = "legacy-fallback")]
        legacy_fallback: bool,
    },
    /// Re-render the report whenever either source changes.
    Watch {
        /// Seconds between checks
        #[arg(long, default_value_t = 2)]
        interval: u64,
        #[arg(long)]
        unit: Vec<String>,
        #[arg(long, value_enum, default_value_t = ViewArg::Totals)]
        view: ViewArg,
        #[arg(long = "legacy-fallback")]
        legacy_fallback: bool,
    },
    /// Show settings and the state of the source files.
    Status,
}

/// Settings with command-line overrides applied.
pub struct Context {
    pub settings: Settings,
    pub sources: SeasonSources,
}

impl Context {
    pub fn resolve(ledger: Option<&str>, reference: Option<&str>) -> Self {
        let settings = load_settings();
        let ledger = PathBuf::from(ledger.unwrap_or(&settings.ledger_path));
        let reference = match reference {
            Some(path) => Some(PathBuf::from(path)),
            None if settings.reference_path.is_empty() => None,
            None => Some(PathBuf::from(&settings.reference_path)),
        };
        Self {
            settings,
            sources: SeasonSources { ledger, reference },
        }
    }

    pub fn money_format(&self) -> MoneyFormat {
        MoneyFormat {
            symbol: self.settings.currency_symbol.clone(),
            decimals: self.settings.decimals,
        }
    }
}
