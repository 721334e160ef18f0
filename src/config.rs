use crate::error::{MisError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DAILY_WORKSHEET: &str = "Daily Data Entry";
pub const DEFAULT_ALLOCATION_WORKSHEET: &str = "Total Meter Allocation per Zone";

/// Header names of the source sheets. Matching is trimmed and case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub zone: String,
    pub date: String,
    pub meters_patched: String,
    pub total_assigned: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            zone: "Zone".to_string(),
            date: "Date".to_string(),
            meters_patched: "Meters Patched".to_string(),
            total_assigned: "Total Meters Assigned".to_string(),
        }
    }
}

impl ColumnNames {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MisError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| MisError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// Calendar-day formats tried in order after the ISO datetime forms.
    /// Ambiguous numeric days are read month first by default.
    pub date_formats: Vec<String>,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%m/%d/%Y".to_string(),
                "%m-%d-%Y".to_string(),
            ],
        }
    }
}

impl SanitizeOptions {
    /// Parse a comma-separated list of `chrono` day formats.
    pub fn from_format_list(list: &str) -> Result<Self> {
        let date_formats: Vec<String> = list
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if date_formats.is_empty() {
            return Err(MisError::Config("MIS_DATE_FORMATS lists no formats".to_string()));
        }
        Ok(Self { date_formats })
    }
}

#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub sheet_id: String,
    pub access_token: Option<String>,
    pub daily_worksheet: String,
    pub allocation_worksheet: String,
    pub timeout: Duration,
    pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: String,
}

/// Runtime settings gathered from the environment (and `.env`).
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub sheet: Option<SheetConfig>,
    pub twilio: Option<TwilioConfig>,
    pub columns_file: Option<PathBuf>,
    pub sanitize: SanitizeOptions,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let sheet = match get("MIS_SHEET_ID") {
            Some(sheet_id) => Some(SheetConfig {
                sheet_id,
                access_token: get("MIS_SHEET_TOKEN"),
                daily_worksheet: get("MIS_DAILY_WORKSHEET")
                    .unwrap_or_else(|| DEFAULT_DAILY_WORKSHEET.to_string()),
                allocation_worksheet: get("MIS_ALLOCATION_WORKSHEET")
                    .unwrap_or_else(|| DEFAULT_ALLOCATION_WORKSHEET.to_string()),
                timeout: Duration::from_secs(parse_number(
                    "MIS_FETCH_TIMEOUT_SECS",
                    get("MIS_FETCH_TIMEOUT_SECS"),
                    30,
                )?),
                retries: parse_number("MIS_FETCH_RETRIES", get("MIS_FETCH_RETRIES"), 2)?,
            }),
            None => None,
        };

        let twilio = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_FROM"),
            get("TWILIO_TO"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from), Some(to)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from,
                to,
            }),
            (None, None, None, None) => None,
            _ => {
                return Err(MisError::Config(
                    "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_FROM and TWILIO_TO must be set together"
                        .to_string(),
                ))
            }
        };

        let sanitize = match get("MIS_DATE_FORMATS") {
            Some(list) => SanitizeOptions::from_format_list(&list)?,
            None => SanitizeOptions::default(),
        };

        Ok(Self {
            sheet,
            twilio,
            columns_file: get("MIS_COLUMNS_FILE").map(PathBuf::from),
            sanitize,
        })
    }

    pub fn columns(&self) -> Result<ColumnNames> {
        match &self.columns_file {
            Some(path) => ColumnNames::load(path),
            None => Ok(ColumnNames::default()),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| MisError::Config(format!("{} must be a whole number, got '{}'", key, v))),
        None => Ok(default),
    }
}
