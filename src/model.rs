use crate::error::Result;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column names of the summary table handed to presentation and export.
pub const ZONE: &str = "zone";
pub const TOTAL_ASSIGNED: &str = "total_assigned";
pub const TOTAL_PATCHED: &str = "total_patched";
pub const PENDING: &str = "pending";
pub const PATCHED_TODAY: &str = "patched_today";

/// Zone label of the synthetic total row.
pub const TOTAL_LABEL: &str = "Total";

/// One row of the daily progress log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DailyEntry {
    pub zone: String,
    pub date: NaiveDate,
    pub meters_patched: i64,
}

impl DailyEntry {
    pub fn new(zone: impl Into<String>, date: NaiveDate, meters_patched: i64) -> Self {
        Self {
            zone: zone.into(),
            date,
            meters_patched,
        }
    }
}

/// Target count for a zone. The allocation table is the list of known zones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneAllocation {
    pub zone: String,
    pub total_assigned: i64,
}

impl ZoneAllocation {
    pub fn new(zone: impl Into<String>, total_assigned: i64) -> Self {
        Self {
            zone: zone.into(),
            total_assigned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneSummaryRow {
    pub zone: String,
    pub total_assigned: i64,
    pub total_patched: i64,
    /// `total_assigned - total_patched`; negative when a zone is over target.
    pub pending: i64,
    pub patched_today: i64,
}

/// Per-zone progress as of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub as_of: NaiveDate,
    /// One row per allocated zone, in allocation order.
    pub rows: Vec<ZoneSummaryRow>,
    pub total: Option<ZoneSummaryRow>,
    /// Zones seen in the daily log but missing from the allocations.
    /// They never contribute to `rows`.
    pub unknown_zones: Vec<String>,
}

impl ZoneSummary {
    pub fn rows_with_total(&self) -> impl Iterator<Item = &ZoneSummaryRow> {
        self.rows.iter().chain(self.total.iter())
    }

    pub fn row(&self, zone: &str) -> Option<&ZoneSummaryRow> {
        self.rows.iter().find(|r| r.zone == zone)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let rows: Vec<&ZoneSummaryRow> = self.rows_with_total().collect();

        let zones: Vec<&str> = rows.iter().map(|r| r.zone.as_str()).collect();
        let assigned: Vec<i64> = rows.iter().map(|r| r.total_assigned).collect();
        let patched: Vec<i64> = rows.iter().map(|r| r.total_patched).collect();
        let pending: Vec<i64> = rows.iter().map(|r| r.pending).collect();
        let today: Vec<i64> = rows.iter().map(|r| r.patched_today).collect();

        let df = DataFrame::new(vec![
            Series::new(ZONE, zones),
            Series::new(TOTAL_ASSIGNED, assigned),
            Series::new(TOTAL_PATCHED, patched),
            Series::new(PENDING, pending),
            Series::new(PATCHED_TODAY, today),
        ])?;

        Ok(df)
    }
}
