// Budget allocation.
//
// Converts valuation scores into auction salaries for the league's budget
// envelope. The top `num_teams * roster_size` scored players form the
// representative drafted pool; every one of them is guaranteed the floor and
// the remaining dollars are distributed in proportion to surplus score over
// replacement level. Rounding to the increment is the final pass.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigurationError;
use crate::price_set::{PriceEntry, PriceSet};
use crate::valuation::normalize::NormalizedPlayer;
use crate::valuation::schema::SCHEMA_VERSION;
use crate::valuation::standing::CategoryValuation;

// ---------------------------------------------------------------------------
// Rounding rule
// ---------------------------------------------------------------------------

/// Floor and increment every salary must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundingRule {
    pub min_salary: u32,
    pub salary_increment: u32,
}

impl RoundingRule {
    /// Build a validated rule.
    pub fn new(min_salary: u32, salary_increment: u32) -> Result<Self, ConfigurationError> {
        let rule = RoundingRule {
            min_salary,
            salary_increment,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.salary_increment == 0 {
            return Err(ConfigurationError::NonPositiveIncrement);
        }
        if self.min_salary < 1 || self.checked_floor().is_none() {
            return Err(ConfigurationError::InvalidMinSalary(self.min_salary));
        }
        Ok(())
    }

    /// The smallest increment multiple at or above `min_salary`, or `None`
    /// when that multiple does not fit in `u32`.
    fn checked_floor(&self) -> Option<u32> {
        self.min_salary
            .div_ceil(self.salary_increment)
            .checked_mul(self.salary_increment)
    }

    /// The lowest legal salary: the smallest increment multiple at or above
    /// `min_salary`. Saturates at `ceiling()` for rules `validate` rejects.
    pub fn floor(&self) -> u32 {
        self.checked_floor().unwrap_or_else(|| self.ceiling())
    }

    /// The highest legal salary representable as `u32`.
    fn ceiling(&self) -> u32 {
        (u32::MAX / self.salary_increment) * self.salary_increment
    }

    /// Round to the nearest increment, then clamp up to the floor.
    ///
    /// Callers must pass a finite value; non-finite input lands on the floor.
    pub fn apply(&self, raw: f64) -> u32 {
        let inc = self.salary_increment as f64;
        let rounded = (raw / inc).round() * inc;
        if !rounded.is_finite() || rounded < self.floor() as f64 {
            self.floor()
        } else if rounded >= self.ceiling() as f64 {
            self.ceiling()
        } else {
            rounded as u32
        }
    }

    /// Whether a salary already satisfies the rule.
    pub fn is_valid(&self, salary: u32) -> bool {
        salary >= self.min_salary && salary % self.salary_increment == 0
    }
}

// ---------------------------------------------------------------------------
// Budget config
// ---------------------------------------------------------------------------

/// How a team's budget is structured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapStructure {
    Single { salary_cap: u32 },
    Dual { draft_cap: u32, season_cap: u32 },
}

impl CapStructure {
    /// Total budget available to one team.
    pub fn team_budget(&self) -> u64 {
        match *self {
            CapStructure::Single { salary_cap } => salary_cap as u64,
            CapStructure::Dual {
                draft_cap,
                season_cap,
            } => draft_cap as u64 + season_cap as u64,
        }
    }
}

pub const DEFAULT_USAGE_TARGET: f64 = 1.0;
pub const DEFAULT_CURVE_EXPONENT: f64 = 1.0;

/// Everything the allocator needs to turn scores into salaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub cap: CapStructure,
    pub min_salary: u32,
    pub salary_increment: u32,
    /// Expected fraction of each team's budget spent at auction. Scales the
    /// league envelope; never enforced as a hard limit.
    pub draft_cap_usage_target: f64,
    pub num_teams: u32,
    pub roster_size: u32,
    /// Price for players with no stats in any window. Defaults to the floor.
    pub rookie_price: Option<u32>,
    /// Shape of the valuation curve: surplus is raised to this power before
    /// dollars are distributed. 1.0 is linear.
    pub curve_exponent: f64,
}

impl BudgetConfig {
    /// A single-cap config with library defaults for everything else.
    pub fn single(salary_cap: u32, min_salary: u32, salary_increment: u32) -> Self {
        BudgetConfig {
            cap: CapStructure::Single { salary_cap },
            min_salary,
            salary_increment,
            draft_cap_usage_target: DEFAULT_USAGE_TARGET,
            num_teams: 1,
            roster_size: 23,
            rookie_price: None,
            curve_exponent: DEFAULT_CURVE_EXPONENT,
        }
    }

    pub fn rounding(&self) -> RoundingRule {
        RoundingRule {
            min_salary: self.min_salary,
            salary_increment: self.salary_increment,
        }
    }

    /// Reject any invalid field before a single price is computed.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let rule = self.rounding();
        rule.validate()?;

        match self.cap {
            CapStructure::Single { salary_cap: 0 } => {
                return Err(invalid("salary_cap", "must be greater than 0".into()));
            }
            CapStructure::Dual { draft_cap: 0, .. } => {
                return Err(invalid("draft_cap", "must be greater than 0".into()));
            }
            _ => {}
        }

        let target = self.draft_cap_usage_target;
        if !target.is_finite() || target <= 0.0 || target > 1.0 {
            return Err(invalid(
                "draft_cap_usage_target",
                format!("must be in (0, 1], got {target}"),
            ));
        }
        if self.num_teams == 0 {
            return Err(invalid("num_teams", "must be greater than 0".into()));
        }
        if self.roster_size == 0 {
            return Err(invalid("roster_size", "must be greater than 0".into()));
        }
        if !self.curve_exponent.is_finite() || self.curve_exponent <= 0.0 {
            return Err(invalid(
                "curve_exponent",
                format!("must be a positive number, got {}", self.curve_exponent),
            ));
        }
        if let Some(price) = self.rookie_price {
            if !rule.is_valid(price) {
                return Err(invalid(
                    "rookie_price",
                    format!(
                        "must be >= {} and a multiple of {}, got {price}",
                        self.min_salary, self.salary_increment
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Baseline salary for players with no stats.
    pub fn rookie_price(&self) -> u32 {
        self.rookie_price.unwrap_or_else(|| self.rounding().floor())
    }

    /// Dollars the whole league is expected to spend at auction.
    pub fn league_envelope(&self) -> f64 {
        self.num_teams as f64 * self.cap.team_budget() as f64 * self.draft_cap_usage_target
    }

    pub fn league_roster_slots(&self) -> usize {
        self.num_teams as usize * self.roster_size as usize
    }
}

fn invalid(field: &'static str, message: String) -> ConfigurationError {
    ConfigurationError::InvalidBudget { field, message }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// The numbers behind an allocation, kept on the price set for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub league_envelope: f64,
    pub distributable: f64,
    pub dollars_per_point: f64,
    pub replacement_score: f64,
    pub drafted_pool_size: usize,
    pub rookie_price: u32,
    pub schema_version: u32,
}

/// Allocate salaries to every player.
///
/// `players` and `valuation.scores` must be parallel (same order, same
/// length), as produced by `normalize_pool` and `valuate`.
///
/// Algorithm:
/// 1. Validate the budget; nothing is computed on invalid input.
/// 2. Rank scored players by score (ties by player_id).
/// 3. The top `num_teams * roster_size` form the drafted pool; replacement
///    level is the best score outside it, or 0 if everyone fits.
/// 4. `distributable` = envelope - floor for each drafted player - rookie
///    price for each rookie needed to fill the remaining slots.
/// 5. Each drafted player gets `floor + surplus^exponent * dollars_per_point`;
///    undrafted scored players get the floor; rookies get the rookie price.
/// 6. Round to the increment and clamp to the floor.
pub fn allocate(
    players: &[NormalizedPlayer],
    valuation: &CategoryValuation,
    budget: &BudgetConfig,
) -> Result<PriceSet, ConfigurationError> {
    budget.validate()?;
    let rule = budget.rounding();
    let floor = rule.floor();
    let rookie_price = budget.rookie_price();

    // ---- 1. Rank scored players ----
    let mut ranked: Vec<(usize, f64)> = valuation
        .scores
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.score.map(|score| (i, score)))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| players[a.0].player_id.cmp(&players[b.0].player_id))
    });
    let rookie_count = valuation.scores.len() - ranked.len();

    // ---- 2. Drafted pool and replacement level ----
    let slots = budget.league_roster_slots();
    let drafted = ranked.len().min(slots);
    let replacement_score = ranked.get(slots).map(|(_, s)| *s).unwrap_or(0.0);
    let rookie_slots = (slots - drafted).min(rookie_count);

    // ---- 3. Distributable dollars ----
    let league_envelope = budget.league_envelope();
    let reserved = drafted as f64 * floor as f64 + rookie_slots as f64 * rookie_price as f64;
    let distributable = (league_envelope - reserved).max(0.0);

    let surplus = |score: f64| (score - replacement_score).max(0.0).powf(budget.curve_exponent);
    let total_surplus: f64 = ranked[..drafted].iter().map(|(_, s)| surplus(*s)).sum();
    let dollars_per_point = if total_surplus > 0.0 {
        distributable / total_surplus
    } else {
        0.0
    };

    debug!(
        "allocation: envelope={:.1} reserved={:.1} distributable={:.1} replacement={:.4} $/pt={:.2}",
        league_envelope, reserved, distributable, replacement_score, dollars_per_point
    );

    // ---- 4. Raw prices ----
    let mut raw_prices = vec![floor as f64; players.len()];
    for (i, score) in &ranked[..drafted] {
        raw_prices[*i] = floor as f64 + surplus(*score) * dollars_per_point;
    }

    // ---- 5. Entries, rounding last ----
    let entries: Vec<PriceEntry> = players
        .iter()
        .zip(&valuation.scores)
        .zip(raw_prices)
        .map(|((player, score), raw)| {
            let salary = if player.has_any_stats {
                rule.apply(raw)
            } else {
                rookie_price
            };
            PriceEntry {
                player_id: player.player_id.clone(),
                player_name: player.name.clone(),
                position: player.position.clone(),
                team: player.team.clone(),
                salary,
                manual_price: None,
                original_salary: None,
                computed_salary: salary,
                data_quality: player.data_quality,
                valuation_score: score.score,
            }
        })
        .collect();

    info!(
        "Priced {} players ({} drafted, {} rookies) against a ${:.0} envelope",
        entries.len(),
        drafted,
        rookie_count,
        league_envelope
    );

    let allocation = AllocationSummary {
        league_envelope,
        distributable,
        dollars_per_point,
        replacement_score,
        drafted_pool_size: drafted,
        rookie_price,
        schema_version: SCHEMA_VERSION,
    };

    Ok(PriceSet::new(rule, entries, allocation))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::DataQuality;
    use crate::valuation::category::Side;
    use crate::valuation::normalize::SeasonStats;
    use crate::valuation::standing::PlayerScore;
    use std::collections::BTreeMap;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn scored(id: &str, score: Option<f64>) -> (NormalizedPlayer, PlayerScore) {
        let mut seasons = [SeasonStats::default(); 3];
        if score.is_some() {
            seasons[0].hitting.at_bats = 400.0;
        }
        let player = NormalizedPlayer {
            player_id: id.into(),
            name: id.to_uppercase(),
            position: "OF".into(),
            team: "TST".into(),
            side: Side::Hitting,
            seasons,
            blended: seasons[0],
            data_quality: if score.is_some() {
                DataQuality::Full
            } else {
                DataQuality::None
            },
            has_any_stats: score.is_some(),
        };
        let score = PlayerScore {
            player_id: id.into(),
            side: Side::Hitting,
            score,
            standings: Vec::new(),
        };
        (player, score)
    }

    fn pool(entries: &[(&str, Option<f64>)]) -> (Vec<NormalizedPlayer>, CategoryValuation) {
        let (players, scores) = entries.iter().map(|(id, s)| scored(id, *s)).unzip();
        (
            players,
            CategoryValuation {
                pool_stats: BTreeMap::new(),
                scoring_stats: BTreeMap::new(),
                scores,
            },
        )
    }

    fn salary(set: &PriceSet, id: &str) -> u32 {
        set.entry(id).unwrap().salary
    }

    // ---- rounding ----

    #[test]
    fn rounding_rule_rounds_then_floors() {
        let rule = RoundingRule::new(1, 1).unwrap();
        assert_eq!(rule.apply(21.5), 22);
        assert_eq!(rule.apply(21.49), 21);
        assert_eq!(rule.apply(0.2), 1);
        assert_eq!(rule.apply(-40.0), 1);

        let five = RoundingRule::new(3, 5).unwrap();
        assert_eq!(five.floor(), 5);
        assert_eq!(five.apply(12.4), 10);
        assert_eq!(five.apply(12.5), 15);
        assert_eq!(five.apply(1.0), 5);
        assert_eq!(five.apply(f64::NAN), 5);
        assert_eq!(five.apply(1e20) % 5, 0);
    }

    #[test]
    fn rounding_rule_rejects_bad_config() {
        assert_eq!(
            RoundingRule::new(1, 0),
            Err(ConfigurationError::NonPositiveIncrement)
        );
        assert_eq!(
            RoundingRule::new(0, 1),
            Err(ConfigurationError::InvalidMinSalary(0))
        );
    }

    #[test]
    fn floor_that_overflows_is_rejected() {
        assert_eq!(
            RoundingRule::new(u32::MAX, 2),
            Err(ConfigurationError::InvalidMinSalary(u32::MAX))
        );
        // Already a multiple of the increment, so the floor fits.
        assert_eq!(RoundingRule::new(u32::MAX, 1).unwrap().floor(), u32::MAX);

        let (players, valuation) = pool(&[("a", Some(0.9)), ("b", None)]);
        let budget = BudgetConfig::single(260, u32::MAX, 2);
        assert_eq!(
            budget.validate(),
            Err(ConfigurationError::InvalidMinSalary(u32::MAX))
        );
        assert_eq!(
            allocate(&players, &valuation, &budget),
            Err(ConfigurationError::InvalidMinSalary(u32::MAX))
        );

        let unchecked = RoundingRule {
            min_salary: u32::MAX,
            salary_increment: 2,
        };
        assert_eq!(unchecked.floor(), u32::MAX - 1);
    }

    // ---- budget validation ----

    #[test]
    fn budget_validation_fails_fast() {
        let (players, valuation) = pool(&[("a", Some(0.9))]);

        let mut budget = BudgetConfig::single(260, 1, 0);
        assert_eq!(
            allocate(&players, &valuation, &budget),
            Err(ConfigurationError::NonPositiveIncrement)
        );

        budget = BudgetConfig::single(260, 1, 1);
        budget.draft_cap_usage_target = 1.5;
        assert!(matches!(
            allocate(&players, &valuation, &budget),
            Err(ConfigurationError::InvalidBudget { field: "draft_cap_usage_target", .. })
        ));

        budget = BudgetConfig::single(260, 2, 2);
        budget.rookie_price = Some(3);
        assert!(matches!(
            budget.validate(),
            Err(ConfigurationError::InvalidBudget { field: "rookie_price", .. })
        ));

        budget = BudgetConfig::single(0, 1, 1);
        assert!(budget.validate().is_err());
    }

    #[test]
    fn dual_cap_budget_combines_caps() {
        let mut budget = BudgetConfig::single(260, 1, 1);
        budget.cap = CapStructure::Dual {
            draft_cap: 200,
            season_cap: 100,
        };
        budget.num_teams = 12;
        budget.draft_cap_usage_target = 0.9;
        assert!(approx_eq(budget.league_envelope(), 12.0 * 300.0 * 0.9, 1e-9));
    }

    // ---- allocation ----

    #[test]
    fn envelope_is_spent_when_pool_fits() {
        let (players, valuation) = pool(&[("a", Some(0.75)), ("b", None), ("c", Some(0.25))]);
        let mut budget = BudgetConfig::single(260, 1, 1);
        budget.roster_size = 3;
        let set = allocate(&players, &valuation, &budget).unwrap();

        // distributable = 260 - 2*1 - 1*1 = 257, split 3:1
        assert_eq!(set.allocation().drafted_pool_size, 2);
        assert!(approx_eq(set.allocation().distributable, 257.0, 1e-9));
        assert_eq!(salary(&set, "a"), 194);
        assert_eq!(salary(&set, "c"), 65);
        assert_eq!(salary(&set, "b"), 1);
        assert_eq!(set.summary().total_salary, 260);
    }

    #[test]
    fn dual_cap_allocates_the_combined_envelope() {
        let (players, valuation) = pool(&[("a", Some(0.75)), ("b", None), ("c", Some(0.25))]);
        let mut budget = BudgetConfig::single(260, 1, 1);
        budget.cap = CapStructure::Dual {
            draft_cap: 200,
            season_cap: 60,
        };
        budget.roster_size = 3;
        let set = allocate(&players, &valuation, &budget).unwrap();

        assert!(approx_eq(set.allocation().league_envelope, 260.0, 1e-9));
        assert_eq!(salary(&set, "a"), 194);
        assert_eq!(salary(&set, "c"), 65);
        assert_eq!(salary(&set, "b"), 1);
        assert_eq!(set.summary().total_salary, 260);
    }

    #[test]
    fn undrafted_players_get_the_floor() {
        let (players, valuation) = pool(&[
            ("a", Some(0.9)),
            ("b", Some(0.6)),
            ("c", Some(0.5)),
            ("d", Some(0.1)),
        ]);
        let mut budget = BudgetConfig::single(100, 1, 1);
        budget.roster_size = 2;
        let set = allocate(&players, &valuation, &budget).unwrap();

        // Replacement level is c (0.5): surplus a=0.4, b=0.1; 98 distributable.
        assert!(approx_eq(set.allocation().replacement_score, 0.5, 1e-12));
        assert_eq!(salary(&set, "a"), 1 + 78);
        assert_eq!(salary(&set, "b"), 1 + 20);
        assert_eq!(salary(&set, "c"), 1);
        assert_eq!(salary(&set, "d"), 1);
    }

    #[test]
    fn rookies_get_the_configured_price() {
        let (players, valuation) = pool(&[("a", Some(0.8)), ("r", None)]);
        let mut budget = BudgetConfig::single(260, 1, 1);
        budget.rookie_price = Some(3);
        let set = allocate(&players, &valuation, &budget).unwrap();
        assert_eq!(salary(&set, "r"), 3);
        assert_eq!(set.allocation().rookie_price, 3);
    }

    #[test]
    fn every_salary_respects_floor_and_increment() {
        let entries: Vec<(String, Option<f64>)> = (0..40)
            .map(|i| (format!("p{i:02}"), (i % 7 != 0).then(|| (i as f64 * 0.37) % 1.0)))
            .collect();
        let refs: Vec<(&str, Option<f64>)> =
            entries.iter().map(|(id, s)| (id.as_str(), *s)).collect();
        let (players, valuation) = pool(&refs);

        let mut budget = BudgetConfig::single(300, 3, 5);
        budget.num_teams = 2;
        budget.roster_size = 10;
        let set = allocate(&players, &valuation, &budget).unwrap();
        for entry in set.entries() {
            assert!(entry.salary >= 3, "{} below floor", entry.player_id);
            assert_eq!(entry.salary % 5, 0, "{} off increment", entry.player_id);
        }
    }

    #[test]
    fn steeper_curve_concentrates_dollars_at_the_top() {
        let (players, valuation) = pool(&[("a", Some(0.9)), ("b", Some(0.45))]);
        let mut budget = BudgetConfig::single(200, 1, 1);
        budget.roster_size = 2;
        let linear = allocate(&players, &valuation, &budget).unwrap();
        budget.curve_exponent = 2.0;
        let steep = allocate(&players, &valuation, &budget).unwrap();
        assert!(salary(&steep, "a") > salary(&linear, "a"));
        assert!(salary(&steep, "b") < salary(&linear, "b"));
    }

    #[test]
    fn tied_scores_break_on_player_id() {
        let (players, valuation) = pool(&[("b", Some(0.5)), ("a", Some(0.5)), ("c", Some(0.2))]);
        let mut budget = BudgetConfig::single(50, 1, 1);
        budget.roster_size = 1;
        let set = allocate(&players, &valuation, &budget).unwrap();
        // Only one slot: "a" wins the tie, replacement level is 0.5.
        assert_eq!(set.allocation().drafted_pool_size, 1);
        assert_eq!(salary(&set, "a"), 1);
        assert_eq!(salary(&set, "b"), 1);
    }
}
