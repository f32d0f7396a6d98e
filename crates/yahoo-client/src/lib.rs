use analysis_core::{AnalysisError, FinancialStatements, FinancialsProvider, StatementFrequency};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub mod timeseries;

pub use timeseries::{series_types, StatementRow};

use timeseries::TimeseriesResponse;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
const TIMESERIES_PATH: &str = "/ws/fundamentals-timeseries/v1/finance/timeseries";
/// Earliest `period1` Yahoo accepts for fundamentals (1985-08-24)
const PERIOD_START: i64 = 493_590_046;
const MAX_ATTEMPTS: u32 = 3;
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)";

/// Outbound request budget: `max_requests` sends per rolling `window`.
#[derive(Clone)]
struct RateLimiter {
    sent: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            sent: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    /// Claim a slot at `now`, or report how long until the oldest send
    /// leaves the window.
    async fn try_acquire(&self, now: Instant) -> Result<(), Duration> {
        let mut sent = self.sent.lock().await;
        while sent
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= self.window)
        {
            sent.pop_front();
        }

        if sent.len() < self.max_requests {
            sent.push_back(now);
            return Ok(());
        }

        let oldest = sent.front().copied().unwrap_or(now);
        Err((oldest + self.window).saturating_duration_since(now))
    }

    async fn acquire(&self) {
        while let Err(wait) = self.try_acquire(Instant::now()).await {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Yahoo request budget spent");
            tokio::time::sleep(wait).await;
        }
    }
}

/// Connection settings for [`YahooClient`]
#[derive(Debug, Clone)]
pub struct YahooClientConfig {
    pub base_url: String,
    /// Requests allowed per `rate_window`
    pub rate_limit: usize,
    pub rate_window: Duration,
    pub timeout: Duration,
    /// Pause before retrying a 429
    pub retry_wait: Duration,
}

impl Default for YahooClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit: 60,
            rate_window: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
            retry_wait: Duration::from_secs(5),
        }
    }
}

/// Yahoo Finance fundamentals client
#[derive(Clone)]
pub struct YahooClient {
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
    retry_wait: Duration,
}

impl YahooClient {
    pub fn new(config: YahooClientConfig) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            rate_limiter: RateLimiter::new(config.rate_limit, config.rate_window),
            retry_wait: config.retry_wait,
        }
    }

    /// Execute `request` under the rate limiter, backing off on HTTP 429.
    async fn send_request(&self, request: reqwest::Request) -> Result<reqwest::Response, AnalysisError> {
        let mut attempt = 1;
        loop {
            self.rate_limiter.acquire().await;
            let attempt_request = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("request body is not cloneable".to_string()))?;
            let response = self
                .client
                .execute(attempt_request)
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        retry_in_ms = self.retry_wait.as_millis() as u64,
                        "Yahoo throttled {}",
                        request.url().path()
                    );
                    tokio::time::sleep(self.retry_wait).await;
                    attempt += 1;
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    return Err(AnalysisError::ApiError(format!(
                        "Yahoo still throttling after {} attempts",
                        MAX_ATTEMPTS
                    )));
                }
                _ => return Ok(response),
            }
        }
    }

    fn timeseries_url(&self, symbol: &str) -> Result<Url, AnalysisError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, TIMESERIES_PATH))
            .map_err(|e| AnalysisError::ApiError(format!("Bad base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| AnalysisError::ApiError(format!("Bad base URL {}", self.base_url)))?
            .push(symbol);
        Ok(url)
    }

    /// Get cash-flow and income statements for a symbol, newest period first
    pub async fn get_statements(
        &self,
        symbol: &str,
        frequency: StatementFrequency,
    ) -> Result<FinancialStatements, AnalysisError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(AnalysisError::InvalidTicker("empty symbol".to_string()));
        }

        let url = self.timeseries_url(symbol)?;
        let period2 = chrono::Utc::now().timestamp().to_string();

        let request = self
            .client
            .get(url)
            .query(&[
                ("symbol", symbol),
                ("type", series_types(frequency).as_str()),
                ("period1", PERIOD_START.to_string().as_str()),
                ("period2", period2.as_str()),
            ])
            .build()
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;
        let response = self.send_request(request).await?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let ts_response: TimeseriesResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let results = ts_response.timeseries.into_results()?;
        let statements = timeseries::build_statements(symbol, frequency, results);

        tracing::debug!(
            "Fetched {} {} statements: {} cash flow periods, {} income periods",
            symbol,
            frequency,
            statements.cash_flow.len(),
            statements.income.len()
        );

        Ok(statements)
    }
}

#[async_trait]
impl FinancialsProvider for YahooClient {
    async fn get_statements(
        &self,
        symbol: &str,
        frequency: StatementFrequency,
    ) -> Result<FinancialStatements, AnalysisError> {
        YahooClient::get_statements(self, symbol, frequency).await
    }
}
