use crate::config::{ColumnNames, SanitizeOptions};
use crate::engine::AggregationEngine;
use crate::error::Result;
use crate::model::ZoneSummary;
use crate::sanitize::{sanitize_allocations, sanitize_daily};
use crate::source::RecordSource;
use chrono::NaiveDate;
use tracing::info;

/// Everything the pipeline needs besides the source and the day.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub columns: ColumnNames,
    pub sanitize: SanitizeOptions,
    pub engine: AggregationEngine,
}

/// Fetch both tables from a connected source, validate them and summarize.
///
/// All I/O happens before aggregation starts; a validation failure returns
/// no partial summary.
pub async fn run_pipeline(
    source: &dyn RecordSource,
    settings: &PipelineSettings,
    as_of: NaiveDate,
) -> Result<ZoneSummary> {
    let (raw_daily, raw_alloc) = tokio::try_join!(
        source.fetch_daily_entries(),
        source.fetch_zone_allocations()
    )?;
    info!(
        "Fetched {} daily rows and {} allocation rows from {} source",
        raw_daily.len(),
        raw_alloc.len(),
        source.source_type()
    );

    let entries = sanitize_daily(&raw_daily, &settings.columns, &settings.sanitize)?;
    let allocations = sanitize_allocations(&raw_alloc, &settings.columns)?;

    let summary = settings.engine.summarize(&entries, &allocations, as_of)?;
    info!("Summary ready: {} zones as of {}", summary.rows.len(), as_of);
    Ok(summary)
}
