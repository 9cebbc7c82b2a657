use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::categorizer::{summarize_tags, CategoryRules};
use crate::error::{CostError, Result};
use crate::models::{CostCategory, LedgerRow, LoadedUnit, UnitLedger, UnitReference};
use crate::months::{MonthSequence, YieldHeaderMatcher, SEASON_LEN};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve thousands and decimal separators to a plain `1234.56` form.
///
/// When both `.` and `,` appear, the later one is the decimal mark, so `1.234,56` and
/// `1,234.56` both read as 1234.56. A lone separator repeated in groups of three is a
/// thousands separator; a single `,` otherwise is a decimal comma.
fn normalize_separators(s: &str) -> Option<String> {
    let thousands_groups = |sep: char| s.split(sep).skip(1).all(|g| g.len() == 3);
    match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => {
            Some(s.replace('.', "").replace(',', "."))
        }
        (Some(_), Some(_)) => Some(s.replace(',', "")),
        (None, Some(_)) if thousands_groups(',') => Some(s.replace(',', "")),
        (None, Some(_)) if s.matches(',').count() == 1 => Some(s.replace(',', ".")),
        (None, Some(_)) => None,
        (Some(_), None) if s.matches('.').count() > 1 => {
            thousands_groups('.').then(|| s.replace('.', ""))
        }
        _ => Some(s.to_string()),
    }
}

/// Parse a spreadsheet amount: thousands separators, currency symbols and parenthesized
/// negatives are accepted. Returns `None` for anything that is not a finite number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace('"', "").replace("R$", "").replace('$', "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (s, negate) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (inner.trim(), true),
        None => (s, false),
    };
    // `str::parse` also accepts "inf" and "NaN"; those stay text.
    let value = normalize_separators(s)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())?;
    Some(if negate { -value } else { value })
}

/// A cell value as read from any source format.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Number(f64),
    Text(String),
}

impl RawCell {
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else if let Some(v) = parse_amount(trimmed) {
            Self::Number(v)
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    fn label(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Number(v) => Some(v.to_string()),
            Self::Text(s) if s.trim().is_empty() => None,
            Self::Text(s) => Some(s.trim().to_string()),
        }
    }
}

/// One sheet (or CSV file) as a grid of cells, row 0 being the first row of the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<RawCell>>,
}

fn cell(row: &[RawCell], col: usize) -> &RawCell {
    row.get(col).unwrap_or(&RawCell::Empty)
}

// ---------------------------------------------------------------------------
// Source kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    #[cfg(feature = "xlsx")]
    Workbook,
    CsvFile,
    CsvDir,
}

impl SourceKind {
    pub fn key(&self) -> &'static str {
        match self {
            #[cfg(feature = "xlsx")]
            Self::Workbook => "workbook",
            Self::CsvFile => "csv",
            Self::CsvDir => "csv_dir",
        }
    }

    pub fn detect(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::CsvDir);
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::CsvFile),
            #[cfg(feature = "xlsx")]
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(Self::Workbook),
            _ => Err(CostError::UnknownSource(path.display().to_string())),
        }
    }

    pub fn read_sheets(&self, path: &Path) -> Result<Vec<RawSheet>> {
        match self {
            #[cfg(feature = "xlsx")]
            Self::Workbook => read_workbook(path),
            Self::CsvFile => Ok(vec![read_csv_sheet(path)?]),
            Self::CsvDir => read_csv_dir(path),
        }
    }
}

fn read_csv_sheet(path: &Path) -> Result<RawSheet> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(RawCell::from_text).collect());
    }
    let name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    Ok(RawSheet { name, rows })
}

fn read_csv_dir(dir: &Path) -> Result<Vec<RawSheet>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .map_or(false, |e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();
    paths.iter().map(|p| read_csv_sheet(p)).collect()
}

#[cfg(feature = "xlsx")]
fn read_workbook(path: &Path) -> Result<Vec<RawSheet>> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(path)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        // Ranges start at the first used cell; pad so indices match the sheet's own grid.
        let (row0, col0) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<RawCell>> = vec![Vec::new(); row0 as usize];
        for row in range.rows() {
            let mut cells = vec![RawCell::Empty; col0 as usize];
            cells.extend(row.iter().map(|c| match c {
                Data::Empty => RawCell::Empty,
                Data::Float(f) => RawCell::Number(*f),
                Data::Int(i) => RawCell::Number(*i as f64),
                Data::String(s) => RawCell::from_text(s),
                other => RawCell::Text(other.to_string()),
            }));
            rows.push(cells);
        }
        sheets.push(RawSheet { name, rows });
    }
    Ok(sheets)
}

// ---------------------------------------------------------------------------
// Ledger sheets
// ---------------------------------------------------------------------------

/// Fixed column schema of a unit's cost sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerLayout {
    /// Rows above the header row.
    pub preamble_rows: usize,
    /// Data rows read below the header row.
    pub max_rows: usize,
    pub item_col: usize,
    pub lifetime_forecast_col: usize,
    pub first_month_col: usize,
    /// Columns per month: forecast, forecast OPEX, forecast CAPEX, realized OPEX,
    /// realized CAPEX, realized total, percent.
    pub month_block_width: usize,
    pub forecast_offset: usize,
    pub realized_offset: usize,
    pub total_row_label: String,
}

impl Default for LedgerLayout {
    fn default() -> Self {
        Self {
            preamble_rows: 3,
            max_rows: 55,
            item_col: 0,
            lifetime_forecast_col: 2,
            first_month_col: 11,
            month_block_width: 7,
            forecast_offset: 1,
            realized_offset: 3,
            total_row_label: "TOTAL".to_string(),
        }
    }
}

impl LedgerLayout {
    pub fn required_width(&self) -> usize {
        self.first_month_col + self.month_block_width * SEASON_LEN
    }

    pub fn validate(&self) -> Result<()> {
        if self.month_block_width == 0
            || self.forecast_offset >= self.month_block_width
            || self.realized_offset >= self.month_block_width
            || self.forecast_offset == self.realized_offset
        {
            return Err(CostError::Settings(
                "ledger layout month offsets must be distinct and inside the month block"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn forecast_col(&self, month: usize) -> usize {
        self.first_month_col + month * self.month_block_width + self.forecast_offset
    }

    fn realized_col(&self, month: usize) -> usize {
        self.first_month_col + month * self.month_block_width + self.realized_offset
    }
}

fn amount(unit: &str, item: &str, field: &str, raw: &RawCell) -> Result<f64> {
    match raw {
        RawCell::Empty => Ok(0.0),
        RawCell::Number(v) if !v.is_finite() => Err(CostError::malformed(
            unit,
            format!("non-finite {field} for '{item}': {v}"),
        )),
        RawCell::Number(v) if *v < 0.0 => Err(CostError::malformed(
            unit,
            format!("negative {field} for '{item}': {v}"),
        )),
        RawCell::Number(v) => Ok(*v),
        RawCell::Text(s) => Err(CostError::malformed(
            unit,
            format!("non-numeric {field} for '{item}': {s:?}"),
        )),
    }
}

fn parse_row(unit: &str, item: &str, row: &[RawCell], layout: &LedgerLayout) -> Result<LedgerRow> {
    if row.len() < layout.required_width() {
        return Err(CostError::malformed(
            unit,
            format!(
                "row '{item}' has {} columns, expected {}",
                row.len(),
                layout.required_width()
            ),
        ));
    }
    let mut realized = [0.0; SEASON_LEN];
    let mut forecast = [0.0; SEASON_LEN];
    for m in 0..SEASON_LEN {
        realized[m] = amount(unit, item, "realized OPEX", cell(row, layout.realized_col(m)))?;
        forecast[m] = amount(unit, item, "forecast OPEX", cell(row, layout.forecast_col(m)))?;
    }
    let lifetime_forecast = amount(
        unit,
        item,
        "lifetime forecast OPEX",
        cell(row, layout.lifetime_forecast_col),
    )?;
    Ok(LedgerRow {
        item: item.to_string(),
        category: CostCategory::Fixed,
        realized,
        forecast,
        lifetime_forecast,
    })
}

fn differs(a: f64, b: f64) -> bool {
    (a - b).abs() > 0.01_f64.max(b.abs() * 1e-9)
}

/// Compare the sheet's own TOTAL line against the sum of its items.
fn check_control_total(unit: &str, rows: &[LedgerRow], control: &LedgerRow) {
    let lifetime: f64 = rows.iter().map(|r| r.lifetime_forecast).sum();
    if differs(lifetime, control.lifetime_forecast) {
        warn!(
            unit,
            items = lifetime,
            sheet = control.lifetime_forecast,
            "lifetime forecast differs from the sheet's TOTAL row"
        );
    }
    for m in 0..SEASON_LEN {
        let realized: f64 = rows.iter().map(|r| r.realized[m]).sum();
        if differs(realized, control.realized[m]) {
            warn!(
                unit,
                month = m,
                items = realized,
                sheet = control.realized[m],
                "realized OPEX differs from the sheet's TOTAL row"
            );
        }
    }
}

/// Parse one unit's cost sheet into tagged line items.
pub fn parse_ledger_sheet(
    sheet: &RawSheet,
    layout: &LedgerLayout,
    rules: &CategoryRules,
) -> Result<UnitLedger> {
    let unit = sheet.name.as_str();
    let header_row = layout.preamble_rows;
    let header = sheet
        .rows
        .get(header_row)
        .ok_or_else(|| {
            CostError::malformed(unit, format!("no header row at line {}", header_row + 1))
        })?;
    if header.len() < layout.required_width() {
        return Err(CostError::malformed(
            unit,
            format!(
                "sheet has {} columns, expected {}",
                header.len(),
                layout.required_width()
            ),
        ));
    }

    let mut rows = Vec::new();
    let mut control = None;
    for raw in sheet.rows.iter().skip(header_row + 1).take(layout.max_rows) {
        let Some(item) = cell(raw, layout.item_col).label() else {
            continue;
        };
        let parsed = parse_row(unit, &item, raw, layout)?;
        if item.eq_ignore_ascii_case(&layout.total_row_label) {
            control = Some(parsed);
            continue;
        }
        rows.push(LedgerRow {
            category: rules.classify(&item),
            ..parsed
        });
    }

    match &control {
        Some(control) => check_control_total(unit, &rows, control),
        None => debug!(unit, "sheet has no TOTAL row"),
    }

    let tags = summarize_tags(&rows);
    debug!(
        unit,
        items = rows.len(),
        inputs = tags.inputs,
        harvest = tags.harvest,
        fixed = tags.fixed,
        "ledger sheet parsed"
    );

    Ok(UnitLedger {
        unit: unit.to_string(),
        rows,
    })
}

/// Read every unit sheet from a ledger source. A sheet that fails to parse is reported in its
/// own [`LoadedUnit`] and does not stop the others.
pub fn read_ledger(
    path: &Path,
    layout: &LedgerLayout,
    rules: &CategoryRules,
) -> Result<Vec<LoadedUnit>> {
    layout.validate()?;
    let kind = SourceKind::detect(path)?;
    let sheets = kind.read_sheets(path)?;
    let units: Vec<LoadedUnit> = sheets
        .iter()
        .map(|sheet| LoadedUnit {
            unit: sheet.name.clone(),
            ledger: parse_ledger_sheet(sheet, layout, rules),
        })
        .collect();
    info!(
        source = kind.key(),
        path = %path.display(),
        units = units.len(),
        "ledger loaded"
    );
    Ok(units)
}

// ---------------------------------------------------------------------------
// Reference table
// ---------------------------------------------------------------------------

/// Column names of the area/yield reference table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceLayout {
    pub unit_column: String,
    pub area_column: String,
    pub lifetime_yield_column: String,
    /// Per-month yield headers look like `<prefix> Jun/24`.
    pub yield_prefix: String,
    pub total_row_label: String,
}

impl Default for ReferenceLayout {
    fn default() -> Self {
        Self {
            unit_column: "Fazenda".to_string(),
            area_column: "area".to_string(),
            lifetime_yield_column: "Estimativa_Inicial".to_string(),
            yield_prefix: "Safra".to_string(),
            total_row_label: "TOTAL".to_string(),
        }
    }
}

fn quantity(unit: &str, field: &str, raw: &RawCell) -> Option<f64> {
    match raw {
        RawCell::Number(v) if *v >= 0.0 && v.is_finite() => Some(*v),
        RawCell::Empty => None,
        other => {
            warn!(unit, field, value = ?other, "ignoring unusable reference value");
            None
        }
    }
}

pub fn parse_reference_sheet(
    sheet: &RawSheet,
    layout: &ReferenceLayout,
    months: &MonthSequence,
) -> Result<Vec<UnitReference>> {
    let Some((header_idx, header)) = sheet
        .rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.iter().any(|c| *c != RawCell::Empty))
    else {
        return Ok(Vec::new());
    };

    let find = |name: &str| {
        header.iter().position(|c| {
            c.label()
                .map_or(false, |h| h.eq_ignore_ascii_case(name.trim()))
        })
    };
    let unit_col = find(&layout.unit_column).ok_or_else(|| {
        CostError::malformed(
            &sheet.name,
            format!("reference table has no '{}' column", layout.unit_column),
        )
    })?;
    let area_col = find(&layout.area_column);
    let lifetime_col = find(&layout.lifetime_yield_column);

    let matcher = YieldHeaderMatcher::new(&layout.yield_prefix)?;
    let mut yield_cols = Vec::new();
    for (col, c) in header.iter().enumerate() {
        let Some(code) = c.label().and_then(|h| matcher.month_code(&h)) else {
            continue;
        };
        match months.index_of(&code) {
            Some(month) => yield_cols.push((month, col)),
            None => debug!(code = %code, "yield column outside the season"),
        }
    }

    let mut seen = HashSet::new();
    let mut references = Vec::new();
    for raw in sheet.rows.iter().skip(header_idx + 1) {
        let Some(unit) = cell(raw, unit_col).label() else {
            continue;
        };
        if unit.eq_ignore_ascii_case(&layout.total_row_label) {
            continue;
        }
        if !seen.insert(unit.clone()) {
            warn!(unit = %unit, "duplicate reference row; keeping the first");
            continue;
        }
        let mut reference = UnitReference::new(&unit);
        reference.area = area_col.and_then(|c| quantity(&unit, "area", cell(raw, c)));
        reference.lifetime_yield =
            lifetime_col.and_then(|c| quantity(&unit, "lifetime yield", cell(raw, c)));
        for &(month, col) in &yield_cols {
            reference.monthly_yield[month] = quantity(&unit, "monthly yield", cell(raw, col));
        }
        references.push(reference);
    }
    Ok(references)
}

/// Read the reference table: the first sheet of a workbook, or a single CSV file.
pub fn read_reference(
    path: &Path,
    layout: &ReferenceLayout,
    months: &MonthSequence,
) -> Result<Vec<UnitReference>> {
    let kind = SourceKind::detect(path)?;
    if kind == SourceKind::CsvDir {
        return Err(CostError::UnknownSource(format!(
            "{} (the reference table must be a single file)",
            path.display()
        )));
    }
    let sheets = kind.read_sheets(path)?;
    let first = sheets
        .first()
        .ok_or_else(|| CostError::Other(format!("{} has no sheets", path.display())))?;
    let references = parse_reference_sheet(first, layout, months)?;
    info!(
        source = kind.key(),
        path = %path.display(),
        units = references.len(),
        "reference table loaded"
    );
    Ok(references)
}
