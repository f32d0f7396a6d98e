use analysis_core::{AnalysisError, AtfcfResult, FinancialsProvider, StatementFrequency};
use fundamental_analysis::AtfcfCalculator;
use std::sync::Arc;

pub mod cache;
pub use cache::{HandleCache, TickerHandle};

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Wires the statement provider, the handle cache and the ATFCF calculator.
pub struct AnalysisOrchestrator {
    provider: Arc<dyn FinancialsProvider>,
    frequency: StatementFrequency,
    calculator: AtfcfCalculator,
    /// Provider handles per normalized ticker (LRU-bounded, no TTL)
    handles: HandleCache,
}

impl AnalysisOrchestrator {
    pub fn new(provider: Arc<dyn FinancialsProvider>) -> Self {
        Self {
            provider,
            frequency: StatementFrequency::default(),
            calculator: AtfcfCalculator::new(),
            handles: HandleCache::new(DEFAULT_CACHE_CAPACITY),
        }
    }

    pub fn with_frequency(mut self, frequency: StatementFrequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.handles = HandleCache::new(capacity);
        self
    }

    pub fn frequency(&self) -> StatementFrequency {
        self.frequency
    }

    pub fn cached_tickers(&self) -> usize {
        self.handles.len()
    }

    /// Memoized provider handle for `ticker`
    pub fn handle(&self, ticker: &str) -> Result<Arc<TickerHandle>, AnalysisError> {
        let key = ticker.trim().to_uppercase();
        if key.is_empty() {
            return Err(AnalysisError::InvalidTicker("ticker is empty".to_string()));
        }

        Ok(self.handles.get_or_insert_with(&key, || {
            TickerHandle::new(key.clone(), self.frequency, self.provider.clone())
        }))
    }

    /// Compute after-tax free cash flow for a ticker from its latest statements
    pub async fn calculate_atfcf(&self, ticker: &str) -> Result<AtfcfResult, AnalysisError> {
        let handle = self.handle(ticker)?;
        let statements = handle.statements().await?;
        self.calculator.calculate(statements)
    }
}
