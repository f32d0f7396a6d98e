use analysis_core::StatementFrequency;
use analysis_orchestrator::DEFAULT_CACHE_CAPACITY;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use yahoo_client::{YahooClientConfig, DEFAULT_BASE_URL};

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum number of ticker handles kept in memory
    pub cache_capacity: usize,
    pub statement_frequency: StatementFrequency,
    pub request_timeout: Duration,
    pub yahoo: YahooClientConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("HOST")
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let base_url = lookup("YAHOO_BASE_URL")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            host,
            port: parse_or(&lookup, "PORT", 5001),
            cache_capacity: parse_or(&lookup, "CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY),
            statement_frequency: parse_or(&lookup, "STATEMENT_FREQUENCY", StatementFrequency::Annual),
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)),
            yahoo: YahooClientConfig {
                base_url,
                rate_limit: parse_or(&lookup, "YAHOO_RATE_LIMIT", 60),
                rate_window: Duration::from_secs(parse_or(&lookup, "YAHOO_RATE_WINDOW_SECS", 60_u64).max(1)),
                ..YahooClientConfig::default()
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Invalid {}='{}' ({}), using default {}", key, raw, e, default);
                default
            }
        },
    }
}
