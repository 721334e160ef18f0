//! Spreadsheet Source - downloads each worksheet as CSV over HTTP

use crate::config::SheetConfig;
use crate::error::{MisError, Result};
use crate::source::{RawTable, RecordSource};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub struct SheetSource {
    config: SheetConfig,
    base_url: String,
    client: Option<reqwest::Client>,
}

impl SheetSource {
    pub fn new(config: SheetConfig) -> Self {
        Self {
            config,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: None,
        }
    }

    /// Point the source at another host, e.g. a local mirror.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn export_url(&self) -> String {
        format!("{}/{}/gviz/tq", self.base_url, self.config.sheet_id)
    }

    async fn fetch_worksheet(&self, worksheet: &str) -> Result<RawTable> {
        let client = self.client.as_ref().ok_or_else(|| {
            MisError::Source("Spreadsheet source used before connect()".to_string())
        })?;

        let attempts = self.config.retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.download(client, worksheet).await {
                Ok(csv_text) => {
                    let table = RawTable::from_csv(worksheet, &csv_text)?;
                    debug!("Fetched {} rows from worksheet '{}'", table.len(), worksheet);
                    return Ok(table);
                }
                Err(e) => {
                    warn!(
                        "Fetching worksheet '{}' failed (attempt {}/{}): {}",
                        worksheet, attempt, attempts, e
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            MisError::Source(format!("No attempt made for worksheet '{}'", worksheet))
        }))
    }

    async fn download(&self, client: &reqwest::Client, worksheet: &str) -> Result<String> {
        let mut request = client
            .get(self.export_url())
            .query(&[("tqx", "out:csv"), ("sheet", worksheet)]);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MisError::Source(format!("Request for '{}' failed: {}", worksheet, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MisError::Source(format!(
                "Worksheet '{}' returned HTTP {}",
                worksheet, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| MisError::Source(format!("Failed to read '{}': {}", worksheet, e)))
    }
}

#[async_trait]
impl RecordSource for SheetSource {
    async fn connect(&mut self) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()?;
        self.client = Some(client);
        info!("Connected to spreadsheet {}", self.config.sheet_id);
        Ok(())
    }

    async fn fetch_daily_entries(&self) -> Result<RawTable> {
        self.fetch_worksheet(&self.config.daily_worksheet).await
    }

    async fn fetch_zone_allocations(&self) -> Result<RawTable> {
        self.fetch_worksheet(&self.config.allocation_worksheet).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client = None;
        Ok(())
    }

    fn source_type(&self) -> &str {
        "sheet"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{CannedResponse, CannedServer};

    fn config() -> SheetConfig {
        SheetConfig {
            sheet_id: "sheet-1".to_string(),
            access_token: None,
            daily_worksheet: "Daily Data Entry".to_string(),
            allocation_worksheet: "Total Meter Allocation per Zone".to_string(),
            timeout: Duration::from_secs(1),
            retries: 0,
        }
    }

    fn server_error() -> CannedResponse {
        CannedResponse::new("500 Internal Server Error", "text/plain", "backend error")
    }

    #[tokio::test]
    async fn test_fetch_requires_connect() {
        let source = SheetSource::new(config());
        let err = source.fetch_daily_entries().await.unwrap_err();
        assert!(matches!(err, MisError::Source(_)));
    }

    #[tokio::test]
    async fn test_connect_lifecycle() {
        let mut source = SheetSource::new(config()).with_base_url("http://127.0.0.1:9/");
        assert!(!source.is_connected());
        source.connect().await.unwrap();
        assert!(source.is_connected());
        assert_eq!(source.export_url(), "http://127.0.0.1:9/sheet-1/gviz/tq");
        source.disconnect().await.unwrap();
        assert!(!source.is_connected());
    }

    #[tokio::test]
    async fn test_fetch_retries_after_server_error() {
        let server = CannedServer::start(vec![
            server_error(),
            CannedResponse::new(
                "200 OK",
                "text/csv",
                "\"Zone\",\"Date\",\"Meters Patched\"\n\"A\",\"2024-01-02\",\"5\"\n",
            ),
        ])
        .await;
        let config = SheetConfig {
            access_token: Some("token-1".to_string()),
            retries: 1,
            ..config()
        };
        let mut source = SheetSource::new(config).with_base_url(&server.base_url);
        source.connect().await.unwrap();

        let table = source.fetch_daily_entries().await.unwrap();
        assert_eq!(table.headers, vec!["Zone", "Date", "Meters Patched"]);
        assert_eq!(table.rows, vec![vec!["A", "2024-01-02", "5"]]);

        let requests = server.requests().await;
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert!(request.starts_with("GET /sheet-1/gviz/tq?"));
            assert!(request.contains("tqx=out%3Acsv"));
            assert!(request.contains("sheet=Daily+Data+Entry"));
            assert!(request.to_lowercase().contains("authorization: bearer token-1"));
        }
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_retries() {
        let server = CannedServer::start(vec![server_error(), server_error()]).await;
        let config = SheetConfig {
            retries: 1,
            ..config()
        };
        let mut source = SheetSource::new(config).with_base_url(&server.base_url);
        source.connect().await.unwrap();

        match source.fetch_zone_allocations().await.unwrap_err() {
            MisError::Source(message) => assert!(message.contains("HTTP 500")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(server.requests().await.len(), 2);
        assert!(!server.requests().await[0].to_lowercase().contains("authorization"));
    }
}
