// Per-session cache of fetched pricing data.
//
// Owned by one session; there is no process-wide cache. Entries expire after
// the TTL, and `invalidate`/`force_refresh` give explicit control.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::DEFAULT_CACHE_TTL_SECS;
use crate::error::DataFetchError;
use crate::source::{prepare_pricing_data, PricingData, PricingDataSource};

#[derive(Debug)]
struct CacheEntry {
    data: Arc<PricingData>,
    stored_at: Instant,
}

/// TTL cache in front of a `PricingDataSource`, keyed by league id.
pub struct PricingDataCache<S> {
    source: S,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl<S: PricingDataSource> PricingDataCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        PricingDataCache {
            source,
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Whether a non-expired entry exists for the league.
    pub fn is_fresh(&self, league_id: &str) -> bool {
        self.entries
            .get(league_id)
            .is_some_and(|e| e.stored_at.elapsed() < self.ttl)
    }

    /// Cached data if fresh, otherwise fetch and store.
    pub async fn get(&mut self, league_id: &str) -> Result<Arc<PricingData>, DataFetchError> {
        if let Some(entry) = self.entries.get(league_id) {
            if entry.stored_at.elapsed() < self.ttl {
                debug!("cache hit for league {}", league_id);
                return Ok(Arc::clone(&entry.data));
            }
            debug!("cache entry for league {} expired", league_id);
        }
        self.force_refresh(league_id).await
    }

    /// Fetch unconditionally. On failure the previous entry, if any, is kept.
    pub async fn force_refresh(
        &mut self,
        league_id: &str,
    ) -> Result<Arc<PricingData>, DataFetchError> {
        let data = Arc::new(prepare_pricing_data(&self.source, league_id).await?);
        self.entries.insert(
            league_id.to_string(),
            CacheEntry {
                data: Arc::clone(&data),
                stored_at: Instant::now(),
            },
        );
        Ok(data)
    }

    /// Drop one league's entry. Returns whether anything was cached.
    pub fn invalidate(&mut self, league_id: &str) -> bool {
        self.entries.remove(league_id).is_some()
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
