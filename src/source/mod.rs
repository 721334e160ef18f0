//! Record Source - read-only access to the daily log and the zone allocations

pub mod csv_source;
pub mod sheet_source;

pub use csv_source::CsvSource;
pub use sheet_source::SheetSource;

use crate::error::{MisError, Result};
use async_trait::async_trait;
use csv::ReaderBuilder;

/// A fetched table before validation: trimmed headers plus raw cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Parse a CSV payload with a header line. Short rows are padded with blanks.
    pub fn from_csv(name: impl Into<String>, csv_text: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_text.as_bytes());

        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let row = (0..headers.len())
                .map(|idx| record.get(idx).unwrap_or("").to_string())
                .collect();
            rows.push(row);
        }

        Ok(Self::new(name, headers, rows))
    }

    /// Index of a header, trimmed and case-insensitive.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        let wanted = column.trim();
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MisError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Where the two input tables come from.
///
/// The caller owns the lifecycle: `connect`, any number of fetches, then
/// `disconnect`. The aggregation never talks to a source directly.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn fetch_daily_entries(&self) -> Result<RawTable>;

    async fn fetch_zone_allocations(&self) -> Result<RawTable>;

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Short label for logs, e.g. "csv" or "sheet".
    fn source_type(&self) -> &str;
}
