// A pricing session: one league, its cached data, and the current price set.

use std::sync::Arc;

use tracing::info;

use crate::cache::PricingDataCache;
use crate::error::PricingError;
use crate::price_set::PriceSet;
use crate::source::{PricingData, PricingDataSource};
use crate::valuation::adjust::{apply_adjustment, revert_overrides, set_manual_price, AdjustmentRequest};
use crate::valuation::budget::BudgetConfig;
use crate::valuation::category::LeagueScoringConfig;
use crate::valuation::generate_prices_with;
use crate::valuation::normalize::SeasonWeights;

/// Somewhere a finalized price set can be written.
pub trait PriceSetStore {
    /// Persist the set and return its id.
    fn save_price_set(&self, league_id: &str, price_set: &PriceSet) -> anyhow::Result<i64>;
}

/// Owns everything needed to price one league.
///
/// The session has exclusive write access to its price set: every mutation
/// swaps in a complete new set, and a failed operation leaves the previous
/// one in place.
pub struct PricingSession<S> {
    league_id: String,
    cache: PricingDataCache<S>,
    budget: BudgetConfig,
    weights: SeasonWeights,
    scoring_override: Option<LeagueScoringConfig>,
    price_set: Option<PriceSet>,
}

impl<S: PricingDataSource> PricingSession<S> {
    pub fn new(league_id: impl Into<String>, cache: PricingDataCache<S>, budget: BudgetConfig) -> Self {
        PricingSession {
            league_id: league_id.into(),
            cache,
            budget,
            weights: SeasonWeights::default(),
            scoring_override: None,
            price_set: None,
        }
    }

    pub fn with_season_weights(mut self, weights: SeasonWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Use this scoring selection instead of the one fetched with the data.
    pub fn with_scoring(mut self, scoring: LeagueScoringConfig) -> Self {
        self.scoring_override = Some(scoring);
        self
    }

    pub fn league_id(&self) -> &str {
        &self.league_id
    }

    pub fn budget(&self) -> &BudgetConfig {
        &self.budget
    }

    pub fn cache_mut(&mut self) -> &mut PricingDataCache<S> {
        &mut self.cache
    }

    /// Fetch through the cache.
    pub async fn prepare(&mut self) -> Result<Arc<PricingData>, PricingError> {
        Ok(self.cache.get(&self.league_id).await?)
    }

    /// Bypass the cache and fetch fresh data.
    pub async fn refresh(&mut self) -> Result<Arc<PricingData>, PricingError> {
        Ok(self.cache.force_refresh(&self.league_id).await?)
    }

    /// Fetch (cached) and run the full pipeline, replacing the current set.
    /// Any previous overrides are discarded.
    pub async fn generate(&mut self) -> Result<&PriceSet, PricingError> {
        let data = self.prepare().await?;
        let scoring = self
            .scoring_override
            .as_ref()
            .unwrap_or(&data.scoring_categories);
        let set = generate_prices_with(&data.players, scoring, &self.budget, &self.weights)?;
        info!(
            "League {}: generated {} prices from data fetched at {}",
            self.league_id,
            set.len(),
            data.fetched_at
        );
        Ok(self.price_set.insert(set))
    }

    /// The current price set, if one has been generated.
    pub fn price_set(&self) -> Option<&PriceSet> {
        self.price_set.as_ref()
    }

    fn current(&self) -> Result<&PriceSet, PricingError> {
        self.price_set
            .as_ref()
            .ok_or_else(|| PricingError::NotGenerated(self.league_id.clone()))
    }

    fn replace(&mut self, next: PriceSet) -> &PriceSet {
        self.price_set.insert(next)
    }

    pub fn apply(&mut self, request: &AdjustmentRequest) -> Result<&PriceSet, PricingError> {
        let next = apply_adjustment(self.current()?, request)?;
        Ok(self.replace(next))
    }

    pub fn set_manual_price(&mut self, player_id: &str, price: f64) -> Result<&PriceSet, PricingError> {
        let next = set_manual_price(self.current()?, player_id, price)?;
        Ok(self.replace(next))
    }

    pub fn revert(&mut self, player_ids: &[String]) -> Result<&PriceSet, PricingError> {
        let next = revert_overrides(self.current()?, player_ids)?;
        Ok(self.replace(next))
    }

    /// Persist the current set. Returns the store's id for it.
    pub fn finalize(&self, store: &dyn PriceSetStore) -> Result<i64, PricingError> {
        let set = self.current()?;
        store
            .save_price_set(&self.league_id, set)
            .map_err(PricingError::Persist)
    }
}
