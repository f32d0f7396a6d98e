//! Bounded memoization of per-ticker provider handles.

use analysis_core::{AnalysisError, FinancialStatements, FinancialsProvider, StatementFrequency};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Provider handle for one ticker.
///
/// Statements are fetched on first use and kept for the life of the handle.
/// A failed fetch leaves the handle empty so the next caller tries again.
pub struct TickerHandle {
    symbol: String,
    frequency: StatementFrequency,
    provider: Arc<dyn FinancialsProvider>,
    statements: OnceCell<FinancialStatements>,
}

impl TickerHandle {
    pub fn new(symbol: String, frequency: StatementFrequency, provider: Arc<dyn FinancialsProvider>) -> Self {
        Self {
            symbol,
            frequency,
            provider,
            statements: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.statements.initialized()
    }

    pub async fn statements(&self) -> Result<&FinancialStatements, AnalysisError> {
        self.statements
            .get_or_try_init(|| async {
                tracing::debug!("Fetching {} statements for {}", self.frequency, self.symbol);
                self.provider.get_statements(&self.symbol, self.frequency).await
            })
            .await
    }
}

struct CacheEntry {
    handle: Arc<TickerHandle>,
    last_used: AtomicU64,
}

/// LRU-bounded map of ticker handles
pub struct HandleCache {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
    clock: AtomicU64,
}

impl HandleCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Return the handle for `key`, creating it with `make` on a miss.
    pub fn get_or_insert_with(&self, key: &str, make: impl FnOnce() -> TickerHandle) -> Arc<TickerHandle> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = self.entries.get(key) {
            entry.last_used.store(tick, Ordering::Relaxed);
            return entry.handle.clone();
        }

        let handle = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry {
                handle: Arc::new(make()),
                last_used: AtomicU64::new(tick),
            })
            .handle
            .clone();

        while self.entries.len() > self.capacity {
            if !self.evict_lru(key) {
                break;
            }
        }

        handle
    }

    /// Drop the least recently used entry other than `keep`.
    fn evict_lru(&self, keep: &str) -> bool {
        let oldest = self
            .entries
            .iter()
            .filter(|e| e.key() != keep)
            .min_by_key(|e| e.last_used.load(Ordering::Relaxed))
            .map(|e| e.key().clone());

        match oldest {
            Some(key) => {
                self.entries.remove(&key);
                tracing::debug!("Evicted {} from ticker cache (capacity {})", key, self.capacity);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingProvider {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl FinancialsProvider for CountingProvider {
        async fn get_statements(
            &self,
            symbol: &str,
            frequency: StatementFrequency,
        ) -> Result<FinancialStatements, AnalysisError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(AnalysisError::ApiError("transient".to_string()));
            }
            Ok(FinancialStatements {
                symbol: symbol.to_string(),
                frequency,
                cash_flow: vec![],
                income: vec![],
            })
        }
    }

    fn provider(fail_first: bool) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail_first,
        })
    }

    fn handle(symbol: &str, provider: Arc<CountingProvider>) -> TickerHandle {
        TickerHandle::new(symbol.to_string(), StatementFrequency::Annual, provider)
    }

    #[tokio::test]
    async fn test_handle_fetches_once() {
        let p = provider(false);
        let h = handle("AAPL", p.clone());

        assert!(!h.is_loaded());
        h.statements().await.unwrap();
        h.statements().await.unwrap();

        assert!(h.is_loaded());
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_memoized() {
        let p = provider(true);
        let h = handle("AAPL", p.clone());

        assert!(h.statements().await.is_err());
        assert!(!h.is_loaded());
        assert_eq!(h.statements().await.unwrap().symbol, "AAPL");
        assert_eq!(p.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_returns_same_handle() {
        let p = provider(false);
        let cache = HandleCache::new(10);

        let a = cache.get_or_insert_with("AAPL", || handle("AAPL", p.clone()));
        let b = cache.get_or_insert_with("AAPL", || panic!("should hit cache"));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let p = provider(false);
        let cache = HandleCache::new(2);

        cache.get_or_insert_with("A", || handle("A", p.clone()));
        cache.get_or_insert_with("B", || handle("B", p.clone()));
        // touch A so B becomes the eviction candidate
        cache.get_or_insert_with("A", || handle("A", p.clone()));
        cache.get_or_insert_with("C", || handle("C", p.clone()));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("A"));
        assert!(!cache.contains("B"));
        assert!(cache.contains("C"));
    }

    #[test]
    fn test_cache_never_exceeds_capacity() {
        let p = provider(false);
        let cache = HandleCache::new(5);

        for i in 0..50 {
            let key = format!("T{}", i);
            cache.get_or_insert_with(&key, || handle(&key, p.clone()));
            assert!(cache.len() <= 5);
        }
        assert!(cache.contains("T49"));
        assert!(!cache.contains("T0"));
    }

    #[test]
    fn test_zero_capacity_still_holds_latest() {
        let p = provider(false);
        let cache = HandleCache::new(0);

        cache.get_or_insert_with("A", || handle("A", p.clone()));
        cache.get_or_insert_with("B", || handle("B", p.clone()));

        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("B"));
    }
}
