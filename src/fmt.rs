use crate::unit_views::ViewCell;

/// Presentation options for amounts. Never passed into the cost pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyFormat {
    pub symbol: String,
    pub decimals: usize,
}

impl Default for MoneyFormat {
    fn default() -> Self {
        Self {
            symbol: "R$".to_string(),
            decimals: 2,
        }
    }
}

fn group_thousands(int_part: &str) -> String {
    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    with_commas.chars().rev().collect()
}

/// Format a number with thousands separators: 1,234.56
pub fn number(val: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, val.abs());
    let (int_part, dec_part) = match fixed.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (fixed.as_str(), None),
    };
    let sign = if val < 0.0 && fixed.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match dec_part {
        Some(d) => format!("{sign}{}.{d}", group_thousands(int_part)),
        None => format!("{sign}{}", group_thousands(int_part)),
    }
}

/// Format an amount with the configured currency symbol: R$1,234.56
pub fn money(val: f64, format: &MoneyFormat) -> String {
    let formatted = number(val, format.decimals);
    match formatted.strip_prefix('-') {
        Some(abs) => format!("-{}{abs}", format.symbol),
        None => format!("{}{formatted}", format.symbol),
    }
}

/// A view cell as money, or `-` when it could not be computed.
pub fn cell(cell: ViewCell, format: &MoneyFormat) -> String {
    match cell {
        ViewCell::Value(v) => money(v, format),
        ViewCell::NonComputable => "-".to_string(),
    }
}

pub fn optional_number(val: Option<f64>, decimals: usize) -> String {
    val.map_or_else(|| "-".to_string(), |v| number(v, decimals))
}

pub fn percent(val: Option<f64>) -> String {
    match val {
        Some(v) => format!("{v:+.1}%"),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        let f = MoneyFormat {
            symbol: "$".to_string(),
            decimals: 2,
        };
        assert_eq!(money(1234.56, &f), "$1,234.56");
        assert_eq!(money(-500.00, &f), "-$500.00");
        assert_eq!(money(0.0, &f), "$0.00");
        assert_eq!(money(1000000.99, &f), "$1,000,000.99");
        assert_eq!(money(42.10, &f), "$42.10");
    }

    #[test]
    fn test_money_default_symbol_and_no_decimals() {
        assert_eq!(money(2400.0, &MoneyFormat::default()), "R$2,400.00");
        let whole = MoneyFormat {
            symbol: "R$ ".to_string(),
            decimals: 0,
        };
        assert_eq!(money(1234567.4, &whole), "R$ 1,234,567");
    }

    #[test]
    fn test_tiny_negative_rounds_to_unsigned_zero() {
        assert_eq!(number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_non_computable_cell() {
        let f = MoneyFormat::default();
        assert_eq!(cell(ViewCell::NonComputable, &f), "-");
        assert_eq!(cell(ViewCell::Value(5.0), &f), "R$5.00");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(Some(-4.1666)), "-4.2%");
        assert_eq!(percent(Some(3.0)), "+3.0%");
        assert_eq!(percent(None), "-");
    }
}
