use std::fmt;

use polars::prelude::PolarsError;
use thiserror::Error;

/// One cell that could not be coerced into the typed model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIssue {
    pub table: String,
    /// Spreadsheet row number (the header is row 1).
    pub row: usize,
    pub column: String,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} row {}, column '{}': {} (value: {:?})",
            self.table, self.row, self.column, self.reason, self.value
        )
    }
}

fn describe_issues(issues: &[DataIssue]) -> String {
    match issues {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

#[derive(Error, Debug)]
pub enum MisError {
    #[error("Missing column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    #[error("Invalid data: {}", describe_issues(.0))]
    InvalidData(Vec<DataIssue>),

    #[error("Duplicate zone '{zone}' in allocations at row {row}")]
    DuplicateZone { zone: String, row: usize },

    #[error("Record source error: {0}")]
    Source(String),

    #[error("Message relay error: {0}")]
    Relay(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl MisError {
    /// Offending cells, when this is a validation failure.
    pub fn issues(&self) -> &[DataIssue] {
        match self {
            MisError::InvalidData(issues) => issues,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, MisError>;
