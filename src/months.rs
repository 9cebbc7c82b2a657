use std::collections::HashSet;

use chrono::{Datelike, Months, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};

/// Number of periods in a season.
pub const SEASON_LEN: usize = 12;

pub const BUDGETED_LABEL: &str = "Budgeted";

/// Month abbreviations used by the source spreadsheets, January first.
pub const DEFAULT_MONTH_NAMES: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

const DEFAULT_SEASON: [&str; SEASON_LEN] = [
    "Jun24", "Jul24", "Ago24", "Set24", "Out24", "Nov24", "Dez24", "Jan25", "Fev25", "Mar25",
    "Abr25", "Mai25",
];

/// Row key of every projection table: the full-season budget, or one month of the season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PeriodKey {
    Budgeted,
    Month(usize),
}

/// The ordered period codes of one season. Order is positional only; codes are never
/// interpreted as calendar dates once the sequence exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct MonthSequence {
    codes: Vec<String>,
}

impl MonthSequence {
    pub fn new(codes: Vec<String>) -> Result<Self> {
        if codes.len() != SEASON_LEN {
            return Err(CostError::Settings(format!(
                "a season needs {SEASON_LEN} month codes, got {}",
                codes.len()
            )));
        }
        let mut seen = HashSet::new();
        for code in &codes {
            if code.trim().is_empty() {
                return Err(CostError::Settings("empty month code".to_string()));
            }
            if !seen.insert(code.as_str()) {
                return Err(CostError::Settings(format!("duplicate month code: {code}")));
            }
        }
        Ok(Self { codes })
    }

    /// Build the twelve codes of a season starting at `year`-`month`, e.g. `Jun24`.
    pub fn from_start(year: i32, month: u32, names: &[&str; 12]) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            CostError::Settings(format!("invalid season start: {year}-{month:02}"))
        })?;
        let mut codes = Vec::with_capacity(SEASON_LEN);
        for offset in 0..SEASON_LEN as u32 {
            let date = start
                .checked_add_months(Months::new(offset))
                .ok_or_else(|| CostError::Settings("season start out of range".to_string()))?;
            codes.push(format!("{}{:02}", names[date.month0() as usize], date.year() % 100));
        }
        Self::new(codes)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn code(&self, index: usize) -> &str {
        &self.codes[index]
    }

    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.codes.iter().position(|c| c.eq_ignore_ascii_case(code))
    }

    pub fn label(&self, key: PeriodKey) -> &str {
        match key {
            PeriodKey::Budgeted => BUDGETED_LABEL,
            PeriodKey::Month(i) => self.code(i),
        }
    }

    /// Budgeted followed by every month through `last` inclusive.
    pub fn periods_through(&self, last: Option<usize>) -> Vec<PeriodKey> {
        let mut keys = vec![PeriodKey::Budgeted];
        if let Some(last) = last {
            keys.extend((0..=last.min(self.len() - 1)).map(PeriodKey::Month));
        }
        keys
    }
}

impl Default for MonthSequence {
    fn default() -> Self {
        Self {
            codes: DEFAULT_SEASON.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for MonthSequence {
    type Error = CostError;

    fn try_from(codes: Vec<String>) -> Result<Self> {
        Self::new(codes)
    }
}

impl From<MonthSequence> for Vec<String> {
    fn from(seq: MonthSequence) -> Self {
        seq.codes
    }
}

/// Matches yield column headers such as `Safra Jun/24` and yields the month code `Jun24`.
pub struct YieldHeaderMatcher {
    re: Regex,
}

impl YieldHeaderMatcher {
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = format!(
            r"(?i)^\s*{}\s+(\p{{L}}{{3}})\s*/\s*(\d{{2}})\s*$",
            regex::escape(prefix)
        );
        let re = Regex::new(&pattern).map_err(|e| CostError::Settings(e.to_string()))?;
        Ok(Self { re })
    }

    pub fn month_code(&self, header: &str) -> Option<String> {
        let caps = self.re.captures(header)?;
        Some(format!("{}{}", &caps[1], &caps[2]))
    }
}
