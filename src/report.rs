//! Text and CSV renderings of a zone summary for downstream consumers

use crate::error::Result;
use crate::model::{ZoneSummary, ZoneSummaryRow};
use polars::prelude::*;
use std::io::Write;

pub const REPORT_TITLE: &str = "MIS Summary Report";

const HEADERS: [&str; 5] = [
    "Zone",
    "Total Meters Assigned",
    "Total Meters Patched",
    "Meters Pending",
    "Meters Patched Today",
];

/// Display form of the as-of day, e.g. `02-01-2024`.
pub fn format_as_of(summary: &ZoneSummary) -> String {
    summary.as_of.format("%d-%m-%Y").to_string()
}

fn cells(row: &ZoneSummaryRow) -> [String; 5] {
    [
        row.zone.clone(),
        row.total_assigned.to_string(),
        row.total_patched.to_string(),
        row.pending.to_string(),
        row.patched_today.to_string(),
    ]
}

/// Plain-text report, suitable as a chat message body.
pub fn render_text(summary: &ZoneSummary) -> String {
    let body: Vec<[String; 5]> = summary.rows_with_total().map(cells).collect();

    let mut widths = HEADERS.map(str::len);
    for row in &body {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = format!("{}\nAs of {}\n", REPORT_TITLE, format_as_of(summary));

    let header: Vec<String> = HEADERS
        .iter()
        .zip(widths.iter())
        .map(|(h, w)| format!("{:>w$}", h, w = *w))
        .collect();
    out.push_str(&header.join("  "));
    out.push('\n');

    for row in &body {
        let line: Vec<String> = row
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{:>w$}", c, w = *w))
            .collect();
        out.push_str(&line.join("  "));
        out.push('\n');
    }

    if !summary.unknown_zones.is_empty() {
        out.push_str(&format!(
            "Not allocated (ignored): {}\n",
            summary.unknown_zones.join(", ")
        ));
    }

    out
}

/// Write the summary table, total row included, as CSV.
pub fn write_csv<W: Write>(summary: &ZoneSummary, writer: &mut W) -> Result<()> {
    let mut df = summary.to_dataframe()?;
    CsvWriter::new(writer).finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::summarize;
    use crate::model::{DailyEntry, ZoneAllocation};
    use chrono::NaiveDate;

    fn summary() -> ZoneSummary {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        summarize(
            &[
                DailyEntry::new("A", day, 5),
                DailyEntry::new("Unlisted", day, 2),
            ],
            &[ZoneAllocation::new("A", 100), ZoneAllocation::new("B", 50)],
            day,
        )
        .unwrap()
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&summary());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], REPORT_TITLE);
        assert_eq!(lines[1], "As of 02-01-2024");
        assert!(lines[2].starts_with(" Zone  Total Meters Assigned"));
        assert!(lines[3].ends_with("5"));
        assert!(lines[5].trim_start().starts_with("Total"));
        assert_eq!(lines[6], "Not allocated (ignored): Unlisted");
        // every table line has the same width
        assert_eq!(lines[2].len(), lines[3].len());
        assert_eq!(lines[2].len(), lines[5].len());
    }

    #[test]
    fn test_write_csv() {
        let mut out = Vec::new();
        write_csv(&summary(), &mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "zone,total_assigned,total_patched,pending,patched_today");
        assert_eq!(lines[1], "A,100,5,95,5");
        assert_eq!(lines[2], "B,50,0,50,0");
        assert_eq!(lines[3], "Total,150,5,145,5");
    }
}
