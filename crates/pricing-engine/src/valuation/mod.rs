// Valuation pipeline: normalize -> category standings -> budget allocation.

pub mod adjust;
pub mod budget;
pub mod category;
pub mod distribution;
pub mod normalize;
pub mod schema;
pub mod standing;

use tracing::info;

use crate::error::ConfigurationError;
use crate::player::Player;
use crate::price_set::PriceSet;
use budget::{allocate, BudgetConfig};
use category::{LeagueScoringConfig, Side};
use normalize::{normalize_pool, SeasonWeights};
use standing::valuate;

/// Generate a fresh price set with the default season weights.
pub fn generate_prices(
    players: &[Player],
    scoring: &LeagueScoringConfig,
    budget: &BudgetConfig,
) -> Result<PriceSet, ConfigurationError> {
    generate_prices_with(players, scoring, budget, &SeasonWeights::default())
}

/// Generate a fresh price set.
///
/// Budget and scoring are validated before anything is computed. Output is
/// deterministic for identical input, independent of input order apart from
/// the stable tie-break on `player_id`.
pub fn generate_prices_with(
    players: &[Player],
    scoring: &LeagueScoringConfig,
    budget: &BudgetConfig,
    weights: &SeasonWeights,
) -> Result<PriceSet, ConfigurationError> {
    budget.validate()?;

    let normalized = normalize_pool(players, weights);
    let mut sides_in_use = Vec::with_capacity(2);
    for side in [Side::Hitting, Side::Pitching] {
        if normalized.iter().any(|p| p.has_any_stats && p.side == side) {
            sides_in_use.push(side);
        }
    }
    scoring.validate(&sides_in_use)?;

    let valuation = valuate(&normalized, scoring);
    let price_set = allocate(&normalized, &valuation, budget)?;

    info!(
        "Generated prices for {} players: total ${}, max ${}",
        price_set.len(),
        price_set.summary().total_salary,
        price_set.summary().max_salary
    );
    Ok(price_set)
}
