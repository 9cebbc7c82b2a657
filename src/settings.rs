use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::FallbackPolicy;
use crate::categorizer::CategoryRules;
use crate::error::{CostError, Result};
use crate::importer::{LedgerLayout, ReferenceLayout};
use crate::months::{MonthSequence, DEFAULT_MONTH_NAMES};
use crate::reports::AnalysisOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,
    /// Empty means no reference table; reports then carry no per-area or per-yield views.
    #[serde(default = "default_reference_path")]
    pub reference_path: String,
    #[serde(default)]
    pub months: MonthSequence,
    /// `YYYY-MM` of the first season month. Overrides `months` when set.
    #[serde(default)]
    pub season_start: Option<String>,
    #[serde(default)]
    pub categories: CategoryRules,
    #[serde(default)]
    pub fallback: FallbackPolicy,
    #[serde(default)]
    pub ledger_layout: LedgerLayout,
    #[serde(default)]
    pub reference_layout: ReferenceLayout,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: usize,
}

fn default_ledger_path() -> String {
    "custos.xlsx".to_string()
}

fn default_reference_path() -> String {
    "safra.xlsx".to_string()
}

fn default_currency_symbol() -> String {
    "R$".to_string()
}

fn default_decimals() -> usize {
    2
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            reference_path: default_reference_path(),
            months: MonthSequence::default(),
            season_start: None,
            categories: CategoryRules::default(),
            fallback: FallbackPolicy::default(),
            ledger_layout: LedgerLayout::default(),
            reference_layout: ReferenceLayout::default(),
            currency_symbol: default_currency_symbol(),
            decimals: default_decimals(),
        }
    }
}

impl Settings {
    /// The season's month codes, generated from `season_start` when present.
    pub fn season(&self) -> Result<MonthSequence> {
        let Some(start) = self.season_start.as_deref() else {
            return Ok(self.months.clone());
        };
        let (year, month) = start
            .split_once('-')
            .and_then(|(y, m)| Some((y.trim().parse::<i32>().ok()?, m.trim().parse::<u32>().ok()?)))
            .ok_or_else(|| {
                CostError::Settings(format!("season_start must look like 2024-06, got '{start}'"))
            })?;
        MonthSequence::from_start(year, month, &DEFAULT_MONTH_NAMES)
    }

    pub fn analysis_options(&self, legacy_fallback: bool) -> Result<AnalysisOptions> {
        Ok(AnalysisOptions {
            months: self.season()?,
            policy: if legacy_fallback {
                FallbackPolicy::ForecastOnly
            } else {
                self.fallback
            },
            rules: self.categories.clone(),
            ledger_layout: self.ledger_layout.clone(),
            reference_layout: self.reference_layout.clone(),
        })
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("farmcost")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    let content = std::fs::read_to_string(&path).unwrap_or_default();
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "unreadable settings; using defaults");
        Settings::default()
    })
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CostError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            ledger_path: "/data/custos".to_string(),
            currency_symbol: "$".to_string(),
            decimals: 0,
            fallback: FallbackPolicy::ForecastOnly,
            ..Settings::default()
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.ledger_path, "custos.xlsx");
        assert_eq!(s.reference_path, "safra.xlsx");
        assert_eq!(s.currency_symbol, "R$");
        assert_eq!(s.decimals, 2);
        assert_eq!(s.fallback, FallbackPolicy::Unified);
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"ledger_path": "/tmp/custos.xlsx", "fallback": "forecast_only"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.ledger_path, "/tmp/custos.xlsx");
        assert_eq!(s.fallback, FallbackPolicy::ForecastOnly);
        assert_eq!(s.reference_path, "safra.xlsx");
        assert_eq!(s.ledger_layout, LedgerLayout::default());
        assert_eq!(s.months, MonthSequence::default());
    }

    #[test]
    fn test_season_start_generates_months() {
        let s = Settings {
            season_start: Some("2025-06".to_string()),
            ..Settings::default()
        };
        let months = s.season().unwrap();
        assert_eq!(months.code(0), "Jun25");
        assert_eq!(months.code(11), "Mai26");
    }

    #[test]
    fn test_bad_season_start() {
        let s = Settings {
            season_start: Some("june".to_string()),
            ..Settings::default()
        };
        assert!(matches!(s.season(), Err(CostError::Settings(_))));
    }

    #[test]
    fn test_legacy_flag_overrides_policy() {
        let s = Settings::default();
        assert_eq!(s.analysis_options(false).unwrap().policy, FallbackPolicy::Unified);
        assert_eq!(s.analysis_options(true).unwrap().policy, FallbackPolicy::ForecastOnly);
    }
}
