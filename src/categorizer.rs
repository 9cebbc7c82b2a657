use serde::{Deserialize, Serialize};

use crate::models::{CostCategory, LedgerRow};

/// Line items counted as Inputs by default (exact names from the cost sheets).
pub const DEFAULT_INPUT_ITEMS: &[&str] = &[
    "Adubo",
    "Corretivo de Solo",
    "Fertilizante Orgânico",
    "Semente",
    "Herbicidas",
    "Fungicida",
    "Inseticida",
    "Acaricida",
    "Óleo",
    "Reguladores Vegetais",
];

/// Item-name prefixes reserved for harvest and freight lines.
pub const DEFAULT_HARVEST_PREFIXES: &[&str] = &["Colheita", "Frete", "Harvest", "Freight"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchType {
    Exact,
    StartsWith,
}

fn matches(item: &str, pattern: &str, match_type: MatchType) -> bool {
    let item = item.trim();
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }
    match match_type {
        MatchType::Exact => item == pattern,
        MatchType::StartsWith => item.starts_with(pattern),
    }
}

/// Explicit membership rules that tag each ledger line exactly once.
///
/// Input membership is checked before harvest prefixes, so a name that satisfies both is an
/// Input and is never counted twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryRules {
    pub input_items: Vec<String>,
    pub harvest_prefixes: Vec<String>,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            input_items: DEFAULT_INPUT_ITEMS.iter().map(|s| s.to_string()).collect(),
            harvest_prefixes: DEFAULT_HARVEST_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CategoryRules {
    pub fn classify(&self, item: &str) -> CostCategory {
        if self
            .input_items
            .iter()
            .any(|p| matches(item, p, MatchType::Exact))
        {
            CostCategory::Input
        } else if self
            .harvest_prefixes
            .iter()
            .any(|p| matches(item, p, MatchType::StartsWith))
        {
            CostCategory::Harvest
        } else {
            CostCategory::Fixed
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TagSummary {
    pub inputs: usize,
    pub harvest: usize,
    pub fixed: usize,
}

pub fn summarize_tags(rows: &[LedgerRow]) -> TagSummary {
    let mut summary = TagSummary::default();
    for row in rows {
        match row.category {
            CostCategory::Input => summary.inputs += 1,
            CostCategory::Harvest => summary.harvest += 1,
            CostCategory::Fixed => summary.fixed += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_input_names() {
        let rules = CategoryRules::default();
        assert_eq!(rules.classify("Adubo"), CostCategory::Input);
        assert_eq!(rules.classify("  Semente "), CostCategory::Input);
        // Inputs are exact matches, not prefixes.
        assert_eq!(rules.classify("Adubo Foliar"), CostCategory::Fixed);
    }

    #[test]
    fn test_harvest_prefixes() {
        let rules = CategoryRules::default();
        assert_eq!(rules.classify("Colheita Manual"), CostCategory::Harvest);
        assert_eq!(rules.classify("Frete Packing"), CostCategory::Harvest);
        assert_eq!(rules.classify("Pré-Colheita"), CostCategory::Fixed);
    }

    #[test]
    fn test_unmatched_is_fixed() {
        let rules = CategoryRules::default();
        assert_eq!(rules.classify("Energia Elétrica"), CostCategory::Fixed);
        assert_eq!(rules.classify(""), CostCategory::Fixed);
    }

    #[test]
    fn test_input_wins_over_prefix() {
        let rules = CategoryRules {
            input_items: vec!["Frete Adubo".to_string()],
            harvest_prefixes: vec!["Frete".to_string()],
        };
        assert_eq!(rules.classify("Frete Adubo"), CostCategory::Input);
        assert_eq!(rules.classify("Frete Caixas"), CostCategory::Harvest);
    }

    #[test]
    fn test_empty_prefix_never_matches() {
        let rules = CategoryRules {
            input_items: vec![],
            harvest_prefixes: vec!["".to_string()],
        };
        assert_eq!(rules.classify("Anything"), CostCategory::Fixed);
    }

    #[test]
    fn test_summarize_tags() {
        use crate::projection::tests::row;
        let rows = vec![
            row("Adubo", CostCategory::Input, &[], 1.0),
            row("Colheita", CostCategory::Harvest, &[], 1.0),
            row("Frete", CostCategory::Harvest, &[], 1.0),
        ];
        let s = summarize_tags(&rows);
        assert_eq!(s, TagSummary { inputs: 1, harvest: 2, fixed: 0 });
    }
}
