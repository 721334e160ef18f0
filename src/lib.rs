pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod relay;
pub mod report;
pub mod sanitize;
pub mod source;

#[cfg(test)]
mod test_server;

pub use engine::{summarize, AggregationEngine};
pub use error::{MisError, Result};
pub use model::{DailyEntry, ZoneAllocation, ZoneSummary, ZoneSummaryRow};
pub use pipeline::{run_pipeline, PipelineSettings};
