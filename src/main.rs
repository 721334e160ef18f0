use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use meter_patch_mis::config::{AppConfig, ColumnNames};
use meter_patch_mis::relay::{MessageRelay, TwilioRelay};
use meter_patch_mis::report;
use meter_patch_mis::source::{CsvSource, RecordSource, SheetSource};
use meter_patch_mis::{run_pipeline, AggregationEngine, PipelineSettings};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Parser)]
#[command(name = "mis")]
#[command(about = "Meter patching progress per zone against allocation targets")]
struct Args {
    /// Daily entries CSV (Zone, Date, Meters Patched); uses the spreadsheet when omitted
    #[arg(long, requires = "allocations")]
    daily: Option<PathBuf>,

    /// Zone allocation CSV (Zone, Total Meters Assigned)
    #[arg(long, requires = "daily")]
    allocations: Option<PathBuf>,

    /// Day to report "patched today" for (YYYY-MM-DD, default: today)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Leave out the Total row
    #[arg(long)]
    no_total: bool,

    /// JSON file overriding the sheet column headers
    #[arg(long)]
    columns: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Forward the text report through the configured message relay
    #[arg(long)]
    send: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    let columns = match &args.columns {
        Some(path) => ColumnNames::load(path)?,
        None => config.columns()?,
    };
    let settings = PipelineSettings {
        columns,
        sanitize: config.sanitize.clone(),
        engine: AggregationEngine::new(!args.no_total),
    };

    // The only clock read: the engine itself always takes an explicit day.
    let as_of = args.as_of.unwrap_or_else(|| chrono::Local::now().date_naive());
    info!("Building MIS summary as of {}", as_of);

    let mut source: Box<dyn RecordSource> = match (&args.daily, &args.allocations, &config.sheet) {
        (Some(daily), Some(allocations), _) => Box::new(CsvSource::from_paths(daily, allocations)),
        (None, None, Some(sheet)) => Box::new(SheetSource::new(sheet.clone())),
        _ => bail!("Pass --daily and --allocations, or set MIS_SHEET_ID"),
    };

    source.connect().await.context("Failed to connect to record source")?;
    let result = run_pipeline(source.as_ref(), &settings, as_of).await;
    if let Err(e) = source.disconnect().await {
        error!("Failed to disconnect record source: {}", e);
    }
    let summary = result.context("Failed to build summary")?;

    match args.format {
        OutputFormat::Text => print!("{}", report::render_text(&summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Csv => report::write_csv(&summary, &mut std::io::stdout())?,
    }

    if args.send {
        let twilio = config
            .twilio
            .clone()
            .context("--send needs TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_FROM and TWILIO_TO")?;
        let relay = TwilioRelay::new(twilio);
        let sid = relay.send(&report::render_text(&summary)).await?;
        eprintln!("Message sent with SID: {}", sid);
    }

    Ok(())
}
