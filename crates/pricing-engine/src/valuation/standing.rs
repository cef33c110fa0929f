// Category valuation: per-category pool statistics and each player's
// relative standing, combined into one valuation score per player.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::valuation::category::{Category, LeagueScoringConfig, Side};
use crate::valuation::normalize::NormalizedPlayer;

/// Spread below which a category is treated as having no spread.
const SPREAD_EPSILON: f64 = 1e-9;

/// Standing assigned when every qualifying player has the same value.
pub const NEUTRAL_STANDING: f64 = 0.5;

// ---------------------------------------------------------------------------
// Pool statistics
// ---------------------------------------------------------------------------

/// Mean, min and max of a category's values across the qualifying pool.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CategoryPoolStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    /// Volume-weighted pool rate (total hits over total at-bats for AVG).
    /// Only set for rate categories.
    pub pool_rate: Option<f64>,
}

impl CategoryPoolStats {
    pub fn spread(&self) -> f64 {
        self.max - self.min
    }
}

/// Compute pool stats for a slice of values. An empty slice yields all zeros.
pub fn compute_pool_stats(values: &[f64]) -> CategoryPoolStats {
    if values.is_empty() {
        return CategoryPoolStats::default();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    CategoryPoolStats {
        mean,
        min,
        max,
        count: values.len(),
        pool_rate: None,
    }
}

/// Mean-centered standing in `[0, 1]`: the pool mean sits at 0.5 and the
/// distance from the mean is scaled by the pool's min-max spread. Lower is
/// better categories flip the sign of the centered term.
///
/// Returns 0.0 for an empty pool and `NEUTRAL_STANDING` when the pool has no
/// spread.
pub fn relative_standing(value: f64, stats: &CategoryPoolStats, lower_is_better: bool) -> f64 {
    if stats.count == 0 {
        return 0.0;
    }
    let spread = stats.spread();
    if spread < SPREAD_EPSILON {
        return NEUTRAL_STANDING;
    }
    let mut centered = (value - stats.mean) / spread;
    if lower_is_better {
        centered = -centered;
    }
    (0.5 + 0.5 * centered).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Scoring values
// ---------------------------------------------------------------------------

/// Volume for a rate category: AB for hitting rates, IP for pitching rates.
fn rate_volume(player: &NormalizedPlayer, side: Side) -> f64 {
    player.blended.volume(side)
}

fn raw_value(player: &NormalizedPlayer, category: Category) -> f64 {
    match category.side() {
        Side::Hitting => category.hitting_value(player.hitting()),
        Side::Pitching => category.pitching_value(player.pitching()),
    }
}

/// Volume-weighted pool rate, e.g. total hits over total at-bats for AVG.
fn pool_rate(pool: &[&NormalizedPlayer], category: Category) -> f64 {
    let side = category.side();
    let (num, den) = pool.iter().fold((0.0, 0.0), |(n, d), p| {
        let vol = rate_volume(p, side);
        (n + vol * raw_value(p, category), d + vol)
    });
    if den < SPREAD_EPSILON {
        0.0
    } else {
        num / den
    }
}

/// The number a category is actually scored on. Counting categories use the
/// raw blended value; rate categories use `volume * (rate - pool_rate)` so a
/// handful of at-bats cannot top the AVG column.
fn scoring_value(player: &NormalizedPlayer, category: Category, pool_rate: f64) -> f64 {
    let value = raw_value(player, category);
    if category.is_rate() {
        rate_volume(player, category.side()) * (value - pool_rate)
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One player's standing in one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryStanding {
    pub category: Category,
    /// The blended raw stat (the rate itself for rate categories).
    pub value: f64,
    pub standing: f64,
}

/// A player's combined valuation score. `score` is `None` for players with
/// no stats in any window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerScore {
    pub player_id: String,
    pub side: Side,
    pub score: Option<f64>,
    pub standings: Vec<CategoryStanding>,
}

/// Pool statistics for every selected category plus a score per player in
/// input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryValuation {
    /// Stats of the blended category values themselves.
    pub pool_stats: BTreeMap<Category, CategoryPoolStats>,
    /// Stats of the values standings are ranked on. Same as `pool_stats` for
    /// counting categories; `volume * (rate - pool_rate)` for rate categories.
    pub scoring_stats: BTreeMap<Category, CategoryPoolStats>,
    pub scores: Vec<PlayerScore>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Score every player against the qualifying pool of their side.
///
/// Steps:
/// 1. Split players with stats into hitting and pitching pools.
/// 2. For each selected category, compute the pool stats of the blended
///    values and of the scoring values (these differ only for rate
///    categories, which also record the volume-weighted pool rate).
/// 3. Score each player with stats as the weighted mean of their standings
///    across their side's selected categories.
///
/// The scoring config is assumed to have been validated.
pub fn valuate(players: &[NormalizedPlayer], scoring: &LeagueScoringConfig) -> CategoryValuation {
    let mut pool_stats = BTreeMap::new();
    let mut scoring_stats = BTreeMap::new();
    let mut pool_rates = BTreeMap::new();

    for side in [Side::Hitting, Side::Pitching] {
        let pool: Vec<&NormalizedPlayer> = players
            .iter()
            .filter(|p| p.has_any_stats && p.side == side)
            .collect();

        for &category in scoring.categories(side) {
            let rate = if category.is_rate() {
                pool_rate(&pool, category)
            } else {
                0.0
            };
            let raw: Vec<f64> = pool.iter().map(|p| raw_value(p, category)).collect();
            let mut stats = compute_pool_stats(&raw);
            let scored = if category.is_rate() {
                stats.pool_rate = Some(rate);
                let values: Vec<f64> = pool
                    .iter()
                    .map(|p| scoring_value(p, category, rate))
                    .collect();
                compute_pool_stats(&values)
            } else {
                stats
            };
            debug!(
                "category {}: n={} mean={:.3} min={:.3} max={:.3} pool_rate={:?}",
                category, stats.count, stats.mean, stats.min, stats.max, stats.pool_rate
            );
            pool_stats.insert(category, stats);
            scoring_stats.insert(category, scored);
            pool_rates.insert(category, rate);
        }
    }

    let scores = players
        .iter()
        .map(|player| {
            if !player.has_any_stats {
                return PlayerScore {
                    player_id: player.player_id.clone(),
                    side: player.side,
                    score: None,
                    standings: Vec::new(),
                };
            }

            let categories = scoring.categories(player.side);
            let standings: Vec<CategoryStanding> = categories
                .iter()
                .map(|&category| {
                    let stats = scoring_stats.get(&category).copied().unwrap_or_default();
                    let rate = pool_rates.get(&category).copied().unwrap_or(0.0);
                    let scored = scoring_value(player, category, rate);
                    CategoryStanding {
                        category,
                        value: raw_value(player, category),
                        standing: relative_standing(scored, &stats, category.lower_is_better()),
                    }
                })
                .collect();

            let (weighted, total_weight) =
                standings.iter().fold((0.0, 0.0), |(sum, wsum), s| {
                    let w = scoring.weight(s.category);
                    (sum + s.standing * w, wsum + w)
                });
            let score = if total_weight > 0.0 {
                weighted / total_weight
            } else {
                0.0
            };

            PlayerScore {
                player_id: player.player_id.clone(),
                side: player.side,
                score: Some(score),
                standings,
            }
        })
        .collect();

    CategoryValuation {
        pool_stats,
        scoring_stats,
        scores,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use crate::valuation::normalize::{normalize_pool, SeasonWeights};
    use serde_json::json;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn player(id: &str, position: &str, current: serde_json::Value) -> Player {
        Player {
            player_id: id.into(),
            name: id.to_uppercase(),
            position: position.into(),
            team: "TST".into(),
            current: serde_json::from_value(current).unwrap(),
            ..Player::default()
        }
    }

    fn score_of(valuation: &CategoryValuation, id: &str) -> Option<f64> {
        valuation
            .scores
            .iter()
            .find(|s| s.player_id == id)
            .and_then(|s| s.score)
    }

    // ---- pool stats ----

    #[test]
    fn pool_stats_known_values() {
        let stats = compute_pool_stats(&[2.0, 4.0, 9.0]);
        assert!(approx_eq(stats.mean, 5.0, 1e-12));
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn pool_stats_empty() {
        assert_eq!(compute_pool_stats(&[]), CategoryPoolStats::default());
    }

    // ---- standing ----

    #[test]
    fn standing_is_centered_on_the_mean() {
        let stats = compute_pool_stats(&[10.0, 20.0, 30.0]);
        assert!(approx_eq(relative_standing(20.0, &stats, false), 0.5, 1e-12));
        assert!(approx_eq(relative_standing(30.0, &stats, false), 0.75, 1e-12));
        assert!(approx_eq(relative_standing(10.0, &stats, false), 0.25, 1e-12));
    }

    #[test]
    fn lower_is_better_inverts() {
        let stats = compute_pool_stats(&[2.5, 4.5]);
        let ace = relative_standing(2.5, &stats, true);
        let mop_up = relative_standing(4.5, &stats, true);
        assert!(ace > mop_up);
        assert!(approx_eq(ace, 0.75, 1e-12));
    }

    #[test]
    fn empty_pool_contributes_zero_and_flat_pool_is_neutral() {
        assert_eq!(relative_standing(12.0, &CategoryPoolStats::default(), false), 0.0);
        let flat = compute_pool_stats(&[7.0, 7.0]);
        assert_eq!(relative_standing(7.0, &flat, false), NEUTRAL_STANDING);
    }

    // ---- valuate ----

    #[test]
    fn stronger_hitter_scores_higher_and_rookie_is_unscored() {
        let players = vec![
            player("p1", "1B", json!({"ab": 550, "h": 170, "hr": 38, "rbi": 110})),
            player("p2", "SS", json!({})),
            player("p3", "2B", json!({"ab": 500, "h": 130, "hr": 15, "rbi": 65})),
        ];
        let pool = normalize_pool(&players, &SeasonWeights::default());
        let scoring = LeagueScoringConfig::new(
            vec![Category::BattingAverage, Category::HomeRuns, Category::RunsBattedIn],
            vec![],
        );
        let valuation = valuate(&pool, &scoring);

        let p1 = score_of(&valuation, "p1").unwrap();
        let p3 = score_of(&valuation, "p3").unwrap();
        assert!(p1 > p3);
        assert!(p3 > 0.0);
        assert_eq!(score_of(&valuation, "p2"), None);
        // The rookie is excluded from the pool averages.
        assert_eq!(valuation.pool_stats[&Category::HomeRuns].count, 2);
        assert!(approx_eq(valuation.pool_stats[&Category::HomeRuns].mean, 26.5, 1e-9));
    }

    #[test]
    fn tiny_sample_does_not_win_a_rate_category() {
        let players = vec![
            player("regular", "OF", json!({"ab": 600, "h": 186})),
            player("callup", "OF", json!({"ab": 4, "h": 3})),
            player("weak", "OF", json!({"ab": 500, "h": 110})),
        ];
        let pool = normalize_pool(&players, &SeasonWeights::default());
        let scoring = LeagueScoringConfig::new(vec![Category::BattingAverage], vec![]);
        let valuation = valuate(&pool, &scoring);
        let regular = score_of(&valuation, "regular").unwrap();
        let callup = score_of(&valuation, "callup").unwrap();
        assert!(regular > callup, "{regular} should beat {callup}");
    }

    #[test]
    fn rate_category_pool_stats_describe_the_rate() {
        let players = vec![
            player("a", "OF", json!({"ab": 600, "h": 180})),
            player("b", "OF", json!({"ab": 600, "h": 150})),
            player("c", "OF", json!({"ab": 600, "h": 165})),
        ];
        let pool = normalize_pool(&players, &SeasonWeights::default());
        let scoring = LeagueScoringConfig::new(vec![Category::BattingAverage], vec![]);
        let valuation = valuate(&pool, &scoring);

        let avg = valuation.pool_stats[&Category::BattingAverage];
        assert!(approx_eq(avg.mean, 0.275, 1e-12));
        assert!(approx_eq(avg.min, 0.250, 1e-12));
        assert!(approx_eq(avg.max, 0.300, 1e-12));
        assert!(approx_eq(avg.pool_rate.unwrap(), 0.275, 1e-12));

        // Standings are still ranked on hits above the pool rate.
        let contribution = valuation.scoring_stats[&Category::BattingAverage];
        assert!(approx_eq(contribution.mean, 0.0, 1e-9));
        assert!(approx_eq(contribution.max, 15.0, 1e-9));
        assert!(score_of(&valuation, "a").unwrap() > score_of(&valuation, "c").unwrap());
    }

    #[test]
    fn counting_categories_have_no_pool_rate() {
        let players = vec![
            player("a", "OF", json!({"ab": 500, "hr": 30})),
            player("b", "OF", json!({"ab": 500, "hr": 10})),
        ];
        let pool = normalize_pool(&players, &SeasonWeights::default());
        let scoring = LeagueScoringConfig::new(vec![Category::HomeRuns], vec![]);
        let valuation = valuate(&pool, &scoring);
        let hr = valuation.pool_stats[&Category::HomeRuns];
        assert_eq!(hr.pool_rate, None);
        assert_eq!(valuation.scoring_stats[&Category::HomeRuns], hr);
    }

    #[test]
    fn pitchers_score_only_on_pitching_categories() {
        let players = vec![
            player("ace", "SP", json!({"ip": 200, "er": 50, "so": 230, "w": 16})),
            player("back", "SP", json!({"ip": 150, "er": 80, "so": 120, "w": 8})),
            player("bat", "C", json!({"ab": 400, "hr": 20})),
        ];
        let pool = normalize_pool(&players, &SeasonWeights::default());
        let scoring = LeagueScoringConfig::new(
            vec![Category::HomeRuns],
            vec![Category::EarnedRunAverage, Category::Strikeouts],
        );
        let valuation = valuate(&pool, &scoring);

        let ace = valuation.scores.iter().find(|s| s.player_id == "ace").unwrap();
        assert_eq!(ace.standings.len(), 2);
        assert!(ace.score.unwrap() > score_of(&valuation, "back").unwrap());
        // A lone hitter has no spread in HR.
        assert_eq!(score_of(&valuation, "bat"), Some(NEUTRAL_STANDING));
    }

    #[test]
    fn weights_shift_the_score() {
        let players = vec![
            player("power", "OF", json!({"ab": 500, "hr": 40, "sb": 2})),
            player("speed", "OF", json!({"ab": 500, "hr": 5, "sb": 45})),
        ];
        let pool = normalize_pool(&players, &SeasonWeights::default());
        let mut scoring =
            LeagueScoringConfig::new(vec![Category::HomeRuns, Category::StolenBases], vec![]);
        let even = valuate(&pool, &scoring);
        assert!(approx_eq(
            score_of(&even, "power").unwrap(),
            score_of(&even, "speed").unwrap(),
            1e-12
        ));

        scoring.weights.insert(Category::HomeRuns, 2.0);
        let weighted = valuate(&pool, &scoring);
        assert!(score_of(&weighted, "power").unwrap() > score_of(&weighted, "speed").unwrap());
    }
}
