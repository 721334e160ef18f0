//! Aggregation Engine - per-zone progress against allocation targets
//!
//! The allocation table drives the output: cumulative and same-day sums are
//! left-joined onto it and missing matches become zero, so every allocated
//! zone appears exactly once however sparse the daily log is.

use crate::error::{MisError, Result};
use crate::model::{
    DailyEntry, ZoneAllocation, ZoneSummary, ZoneSummaryRow, PATCHED_TODAY, PENDING,
    TOTAL_ASSIGNED, TOTAL_LABEL, TOTAL_PATCHED, ZONE,
};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

const DATE: &str = "date";
const METERS_PATCHED: &str = "meters_patched";
const ROW_ORDER: &str = "row_order";

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since 1970-01-01, the physical representation of a polars `Date`.
fn epoch_days(date: NaiveDate) -> Result<i32> {
    i32::try_from(date.signed_duration_since(epoch()).num_days())
        .map_err(|_| MisError::Aggregation(format!("Date out of range: {}", date)))
}

#[derive(Debug, Clone, Copy)]
pub struct AggregationEngine {
    include_total: bool,
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AggregationEngine {
    pub fn new(include_total: bool) -> Self {
        Self { include_total }
    }

    pub fn include_total(&self) -> bool {
        self.include_total
    }

    /// Summarize the daily log against the allocations as of `as_of`.
    ///
    /// Pure: the result depends only on the arguments, never on the clock.
    pub fn summarize(
        &self,
        entries: &[DailyEntry],
        allocations: &[ZoneAllocation],
        as_of: NaiveDate,
    ) -> Result<ZoneSummary> {
        check_count_overflow(entries, allocations, as_of)?;

        let entries_df = entries_frame(entries)?;
        let allocations_df = allocations_frame(allocations)?;

        let joined = self.join_progress(entries_df, allocations_df, as_of)?;
        let rows = frame_to_rows(&joined)?;
        debug!("Summarized {} zones as of {}", rows.len(), as_of);

        let unknown_zones = unknown_zones(entries, allocations);
        if !unknown_zones.is_empty() {
            warn!(
                "Ignoring daily entries for zones without an allocation: {}",
                unknown_zones.join(", ")
            );
        }

        let total = if self.include_total {
            Some(total_row(&rows)?)
        } else {
            None
        };

        Ok(ZoneSummary {
            as_of,
            rows,
            total,
            unknown_zones,
        })
    }

    fn join_progress(
        &self,
        entries: DataFrame,
        allocations: DataFrame,
        as_of: NaiveDate,
    ) -> Result<DataFrame> {
        let on = [col(ZONE)];

        // Cumulative to date; zones without entries are absent here, not zero.
        let cumulative = entries
            .clone()
            .lazy()
            .group_by([col(ZONE)])
            .agg([col(METERS_PATCHED).sum().alias(TOTAL_PATCHED)]);

        let today = entries
            .lazy()
            .filter(col(DATE).eq(lit(epoch_days(as_of)?).cast(DataType::Date)))
            .group_by([col(ZONE)])
            .agg([col(METERS_PATCHED).sum().alias(PATCHED_TODAY)]);

        let summary = allocations
            .lazy()
            .join(cumulative, on.clone(), on.clone(), JoinArgs::new(JoinType::Left))
            .with_columns([col(TOTAL_PATCHED).fill_null(lit(0i64))])
            .with_columns([(col(TOTAL_ASSIGNED) - col(TOTAL_PATCHED)).alias(PENDING)])
            .join(today, on.clone(), on, JoinArgs::new(JoinType::Left))
            .with_columns([col(PATCHED_TODAY).fill_null(lit(0i64))])
            .select([
                col(ROW_ORDER),
                col(ZONE),
                col(TOTAL_ASSIGNED).cast(DataType::Int64),
                col(TOTAL_PATCHED).cast(DataType::Int64),
                col(PENDING).cast(DataType::Int64),
                col(PATCHED_TODAY).cast(DataType::Int64),
            ])
            .collect()?;

        Ok(summary)
    }
}

/// Summarize with the total row appended.
pub fn summarize(
    entries: &[DailyEntry],
    allocations: &[ZoneAllocation],
    as_of: NaiveDate,
) -> Result<ZoneSummary> {
    AggregationEngine::default().summarize(entries, allocations, as_of)
}

fn entries_frame(entries: &[DailyEntry]) -> Result<DataFrame> {
    let zones: Vec<&str> = entries.iter().map(|e| e.zone.as_str()).collect();
    let days = entries
        .iter()
        .map(|e| epoch_days(e.date))
        .collect::<Result<Vec<i32>>>()?;
    let counts: Vec<i64> = entries.iter().map(|e| e.meters_patched).collect();

    let df = DataFrame::new(vec![
        Series::new(ZONE, zones),
        Series::new(DATE, days).cast(&DataType::Date)?,
        Series::new(METERS_PATCHED, counts),
    ])?;
    Ok(df)
}

fn allocations_frame(allocations: &[ZoneAllocation]) -> Result<DataFrame> {
    let order: Vec<u32> = (0..allocations.len() as u32).collect();
    let zones: Vec<&str> = allocations.iter().map(|a| a.zone.as_str()).collect();
    let assigned: Vec<i64> = allocations.iter().map(|a| a.total_assigned).collect();

    let df = DataFrame::new(vec![
        Series::new(ROW_ORDER, order),
        Series::new(ZONE, zones),
        Series::new(TOTAL_ASSIGNED, assigned),
    ])?;
    Ok(df)
}

/// Read the joined frame back into rows, restoring allocation order.
fn frame_to_rows(df: &DataFrame) -> Result<Vec<ZoneSummaryRow>> {
    let order = df.column(ROW_ORDER)?.u32()?;
    let zones = df.column(ZONE)?.str()?;
    let assigned = df.column(TOTAL_ASSIGNED)?.i64()?;
    let patched = df.column(TOTAL_PATCHED)?.i64()?;
    let pending = df.column(PENDING)?.i64()?;
    let today = df.column(PATCHED_TODAY)?.i64()?;

    let missing = |column: &str, idx: usize| {
        MisError::Aggregation(format!("Null {} in summary row {}", column, idx))
    };

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let position = order.get(idx).ok_or_else(|| missing(ROW_ORDER, idx))?;
        let row = ZoneSummaryRow {
            zone: zones.get(idx).ok_or_else(|| missing(ZONE, idx))?.to_string(),
            total_assigned: assigned.get(idx).ok_or_else(|| missing(TOTAL_ASSIGNED, idx))?,
            total_patched: patched.get(idx).ok_or_else(|| missing(TOTAL_PATCHED, idx))?,
            pending: pending.get(idx).ok_or_else(|| missing(PENDING, idx))?,
            patched_today: today.get(idx).ok_or_else(|| missing(PATCHED_TODAY, idx))?,
        };
        rows.push((position, row));
    }

    rows.sort_by_key(|(position, _)| *position);
    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

fn total_row(rows: &[ZoneSummaryRow]) -> Result<ZoneSummaryRow> {
    let mut total = ZoneSummaryRow {
        zone: TOTAL_LABEL.to_string(),
        total_assigned: 0,
        total_patched: 0,
        pending: 0,
        patched_today: 0,
    };

    for row in rows {
        total.total_assigned =
            add_count(total.total_assigned, row.total_assigned, TOTAL_ASSIGNED)?;
        total.total_patched = add_count(total.total_patched, row.total_patched, TOTAL_PATCHED)?;
        total.pending = add_count(total.pending, row.pending, PENDING)?;
        total.patched_today =
            add_count(total.patched_today, row.patched_today, PATCHED_TODAY)?;
    }

    Ok(total)
}

fn add_count(acc: i64, value: i64, column: &str) -> Result<i64> {
    acc.checked_add(value)
        .ok_or_else(|| MisError::Aggregation(format!("count overflow in {} total", column)))
}

/// The polars sums wrap on overflow, so check each group the joins will sum.
fn check_count_overflow(
    entries: &[DailyEntry],
    allocations: &[ZoneAllocation],
    as_of: NaiveDate,
) -> Result<()> {
    let mut sums: HashMap<&str, (i64, i64)> = HashMap::new();
    for entry in entries {
        let overflow = || {
            MisError::Aggregation(format!(
                "count overflow summing {} for zone '{}'",
                METERS_PATCHED, entry.zone
            ))
        };
        let (cumulative, today) = sums.entry(entry.zone.as_str()).or_default();
        *cumulative = cumulative.checked_add(entry.meters_patched).ok_or_else(overflow)?;
        if entry.date == as_of {
            *today = today.checked_add(entry.meters_patched).ok_or_else(overflow)?;
        }
    }

    for allocation in allocations {
        let patched = sums.get(allocation.zone.as_str()).map_or(0, |(c, _)| *c);
        if allocation.total_assigned.checked_sub(patched).is_none() {
            return Err(MisError::Aggregation(format!(
                "count overflow computing {} for zone '{}'",
                PENDING, allocation.zone
            )));
        }
    }
    Ok(())
}

/// Zones in the log with no allocation, in order of first appearance.
fn unknown_zones(entries: &[DailyEntry], allocations: &[ZoneAllocation]) -> Vec<String> {
    let known: HashSet<&str> = allocations.iter().map(|a| a.zone.as_str()).collect();
    let mut seen = HashSet::new();
    entries
        .iter()
        .map(|e| e.zone.as_str())
        .filter(|zone| !known.contains(zone) && seen.insert(*zone))
        .map(str::to_string)
        .collect()
}
