use thiserror::Error;

#[derive(Error, Debug)]
pub enum CostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "xlsx")]
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// A unit's sheet or the pivot it produced breaks the expected shape.
    #[error("Malformed input in {unit}: {detail}")]
    MalformedInput { unit: String, detail: String },

    #[error("No reference record for unit: {0}")]
    MissingReference(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Unsupported source: {0}")]
    UnknownSource(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl CostError {
    pub fn malformed(unit: &str, detail: impl Into<String>) -> Self {
        Self::MalformedInput {
            unit: unit.to_string(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CostError>;
