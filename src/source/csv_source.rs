//! CSV Source - serves the two tables from CSV payloads or files

use crate::error::{MisError, Result};
use crate::source::{RawTable, RecordSource};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DAILY_TABLE: &str = "daily entries";
pub const ALLOCATION_TABLE: &str = "zone allocations";

enum Payload {
    Text(String),
    File(PathBuf),
}

impl Payload {
    async fn read(&self) -> Result<String> {
        match self {
            Payload::Text(text) => Ok(text.clone()),
            Payload::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                MisError::Source(format!("Failed to read {}: {}", path.display(), e))
            }),
        }
    }
}

pub struct CsvSource {
    daily: Payload,
    allocations: Payload,
}

impl CsvSource {
    pub fn from_text(daily_csv: impl Into<String>, allocations_csv: impl Into<String>) -> Self {
        Self {
            daily: Payload::Text(daily_csv.into()),
            allocations: Payload::Text(allocations_csv.into()),
        }
    }

    pub fn from_paths(daily: impl AsRef<Path>, allocations: impl AsRef<Path>) -> Self {
        Self {
            daily: Payload::File(daily.as_ref().to_path_buf()),
            allocations: Payload::File(allocations.as_ref().to_path_buf()),
        }
    }
}

#[async_trait]
impl RecordSource for CsvSource {
    async fn fetch_daily_entries(&self) -> Result<RawTable> {
        let table = RawTable::from_csv(DAILY_TABLE, &self.daily.read().await?)?;
        debug!("Read {} daily rows", table.len());
        Ok(table)
    }

    async fn fetch_zone_allocations(&self) -> Result<RawTable> {
        let table = RawTable::from_csv(ALLOCATION_TABLE, &self.allocations.read().await?)?;
        debug!("Read {} allocation rows", table.len());
        Ok(table)
    }

    fn source_type(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_payloads() {
        let source = CsvSource::from_text(
            "Zone,Date,Meters Patched\nA,2024-01-01,10\nB,2024-01-02\n",
            " Zone , Total Meters Assigned \nA,100\n",
        );

        let daily = source.fetch_daily_entries().await.unwrap();
        assert_eq!(daily.headers, vec!["Zone", "Date", "Meters Patched"]);
        assert_eq!(daily.rows.len(), 2);
        // short rows are padded
        assert_eq!(daily.rows[1], vec!["B", "2024-01-02", ""]);

        let alloc = source.fetch_zone_allocations().await.unwrap();
        assert_eq!(alloc.headers, vec!["Zone", "Total Meters Assigned"]);
        assert_eq!(alloc.column_index("total meters assigned").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = std::env::temp_dir().join("mis_csv_source_missing");
        let source = CsvSource::from_paths(dir.join("daily.csv"), dir.join("alloc.csv"));
        let err = source.fetch_daily_entries().await.unwrap_err();
        assert!(matches!(err, MisError::Source(_)));
    }

    #[test]
    fn test_missing_column() {
        let table = RawTable::from_csv(DAILY_TABLE, "Zone,Date\n").unwrap();
        match table.column_index("Meters Patched") {
            Err(MisError::MissingColumn { table, column }) => {
                assert_eq!(table, DAILY_TABLE);
                assert_eq!(column, "Meters Patched");
            }
            other => panic!("expected missing column, got {:?}", other),
        }
    }
}
