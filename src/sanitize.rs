//! Raw rows to typed model: header lookup, blank-row policy, value coercion

use crate::config::{ColumnNames, SanitizeOptions};
use crate::error::{DataIssue, MisError, Result};
use crate::model::{DailyEntry, ZoneAllocation};
use crate::source::RawTable;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::num::IntErrorKind;
use tracing::debug;

/// Header line is spreadsheet row 1, so data row `i` is row `i + 2`.
fn sheet_row(idx: usize) -> usize {
    idx + 2
}

fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

/// Parse a count cell as a non-negative whole number.
///
/// Spreadsheet exports often render integers as `10.0`; the integer part is
/// parsed exactly and any non-zero fraction is rejected.
pub fn parse_count(value: &str) -> std::result::Result<i64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("missing value".to_string());
    }

    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err("not a number".to_string());
        }
    }

    let parsed = whole.parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => "count out of range".to_string(),
        _ => "not a number".to_string(),
    })?;

    if fraction.is_some_and(|f| f.bytes().any(|b| b != b'0')) {
        return Err("fractional count".to_string());
    }

    if parsed < 0 {
        return Err("negative count".to_string());
    }
    Ok(parsed)
}

/// Parse a date cell at calendar-day granularity; any time of day is dropped.
pub fn parse_day(value: &str, options: &SanitizeOptions) -> std::result::Result<NaiveDate, String> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.date());
        }
    }
    for format in &options.date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date);
        }
    }

    Err("unparseable date".to_string())
}

fn issue(table: &RawTable, idx: usize, column: &str, value: &str, reason: String) -> DataIssue {
    DataIssue {
        table: table.name.clone(),
        row: sheet_row(idx),
        column: column.to_string(),
        value: value.to_string(),
        reason,
    }
}

/// Validate the daily log. Rows with a blank zone or date are dropped;
/// every other malformed cell fails the whole table.
pub fn sanitize_daily(
    raw: &RawTable,
    columns: &ColumnNames,
    options: &SanitizeOptions,
) -> Result<Vec<DailyEntry>> {
    let zone_idx = raw.column_index(&columns.zone)?;
    let date_idx = raw.column_index(&columns.date)?;
    let count_idx = raw.column_index(&columns.meters_patched)?;

    let mut entries = Vec::with_capacity(raw.len());
    let mut issues = Vec::new();
    let mut dropped = 0usize;

    for (idx, row) in raw.rows.iter().enumerate() {
        if is_blank_row(row) {
            continue;
        }

        let zone = cell(row, zone_idx);
        let date = cell(row, date_idx);
        if zone.is_empty() || date.is_empty() {
            debug!("Dropping {} row {}: blank zone or date", raw.name, sheet_row(idx));
            dropped += 1;
            continue;
        }

        let date = parse_day(date, options)
            .map_err(|reason| issue(raw, idx, &columns.date, date, reason));
        let count_cell = cell(row, count_idx);
        let count = parse_count(count_cell)
            .map_err(|reason| issue(raw, idx, &columns.meters_patched, count_cell, reason));

        match (date, count) {
            (Ok(date), Ok(count)) => entries.push(DailyEntry::new(zone, date, count)),
            (date, count) => {
                issues.extend(date.err());
                issues.extend(count.err());
            }
        }
    }

    if !issues.is_empty() {
        return Err(MisError::InvalidData(issues));
    }

    debug!("{}: {} entries kept, {} dropped", raw.name, entries.len(), dropped);
    Ok(entries)
}

/// Validate the allocation table, keeping its row order.
pub fn sanitize_allocations(raw: &RawTable, columns: &ColumnNames) -> Result<Vec<ZoneAllocation>> {
    let zone_idx = raw.column_index(&columns.zone)?;
    let assigned_idx = raw.column_index(&columns.total_assigned)?;

    let mut allocations: Vec<ZoneAllocation> = Vec::with_capacity(raw.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut issues = Vec::new();

    for (idx, row) in raw.rows.iter().enumerate() {
        if is_blank_row(row) {
            continue;
        }

        let zone = cell(row, zone_idx);
        let assigned = cell(row, assigned_idx);
        if zone.is_empty() || assigned.is_empty() {
            debug!("Dropping {} row {}: incomplete allocation", raw.name, sheet_row(idx));
            continue;
        }

        if seen.insert(zone.to_string(), idx).is_some() {
            return Err(MisError::DuplicateZone {
                zone: zone.to_string(),
                row: sheet_row(idx),
            });
        }

        match parse_count(assigned) {
            Ok(total) => allocations.push(ZoneAllocation::new(zone, total)),
            Err(reason) => issues.push(issue(raw, idx, &columns.total_assigned, assigned, reason)),
        }
    }

    if !issues.is_empty() {
        return Err(MisError::InvalidData(issues));
    }

    Ok(allocations)
}
