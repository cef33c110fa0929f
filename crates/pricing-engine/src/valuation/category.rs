// Scoring category vocabulary and league scoring selection.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::valuation::normalize::{HittingLine, PitchingLine};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Which half of the pool a category (or player) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Hitting,
    Pitching,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Hitting => write!(f, "hitting"),
            Side::Pitching => write!(f, "pitching"),
        }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A scoring category from the fixed league vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    // Hitting
    Runs,
    HomeRuns,
    RunsBattedIn,
    StolenBases,
    BattingAverage,
    OnBasePlusSlugging,
    Hits,
    Doubles,
    Triples,
    Walks,
    // Pitching
    Wins,
    Saves,
    Strikeouts,
    EarnedRunAverage,
    Whip,
    QualityStarts,
    Losses,
    Holds,
    InningsPitched,
    StrikeoutsPerNine,
}

impl Category {
    pub const ALL: [Category; 20] = [
        Category::Runs,
        Category::HomeRuns,
        Category::RunsBattedIn,
        Category::StolenBases,
        Category::BattingAverage,
        Category::OnBasePlusSlugging,
        Category::Hits,
        Category::Doubles,
        Category::Triples,
        Category::Walks,
        Category::Wins,
        Category::Saves,
        Category::Strikeouts,
        Category::EarnedRunAverage,
        Category::Whip,
        Category::QualityStarts,
        Category::Losses,
        Category::Holds,
        Category::InningsPitched,
        Category::StrikeoutsPerNine,
    ];

    /// Canonical short code (`HR`, `ERA`, `K/9`, ...).
    pub fn code(self) -> &'static str {
        match self {
            Category::Runs => "R",
            Category::HomeRuns => "HR",
            Category::RunsBattedIn => "RBI",
            Category::StolenBases => "SB",
            Category::BattingAverage => "AVG",
            Category::OnBasePlusSlugging => "OPS",
            Category::Hits => "H",
            Category::Doubles => "2B",
            Category::Triples => "3B",
            Category::Walks => "BB",
            Category::Wins => "W",
            Category::Saves => "SV",
            Category::Strikeouts => "K",
            Category::EarnedRunAverage => "ERA",
            Category::Whip => "WHIP",
            Category::QualityStarts => "QS",
            Category::Losses => "L",
            Category::Holds => "HD",
            Category::InningsPitched => "IP",
            Category::StrikeoutsPerNine => "K/9",
        }
    }

    pub fn side(self) -> Side {
        match self {
            Category::Runs
            | Category::HomeRuns
            | Category::RunsBattedIn
            | Category::StolenBases
            | Category::BattingAverage
            | Category::OnBasePlusSlugging
            | Category::Hits
            | Category::Doubles
            | Category::Triples
            | Category::Walks => Side::Hitting,
            _ => Side::Pitching,
        }
    }

    /// ERA, WHIP and losses: a smaller number is a better season.
    pub fn lower_is_better(self) -> bool {
        matches!(
            self,
            Category::EarnedRunAverage | Category::Whip | Category::Losses
        )
    }

    /// Rate categories are scored on a volume-weighted contribution rather
    /// than the raw rate.
    pub fn is_rate(self) -> bool {
        matches!(
            self,
            Category::BattingAverage
                | Category::OnBasePlusSlugging
                | Category::EarnedRunAverage
                | Category::Whip
                | Category::StrikeoutsPerNine
        )
    }

    /// Raw category value from a hitting line. Pitching categories read 0.
    pub fn hitting_value(self, line: &HittingLine) -> f64 {
        match self {
            Category::Runs => line.runs,
            Category::HomeRuns => line.home_runs,
            Category::RunsBattedIn => line.rbi,
            Category::StolenBases => line.stolen_bases,
            Category::BattingAverage => line.avg,
            Category::OnBasePlusSlugging => line.ops,
            Category::Hits => line.hits,
            Category::Doubles => line.doubles,
            Category::Triples => line.triples,
            Category::Walks => line.walks,
            _ => 0.0,
        }
    }

    /// Raw category value from a pitching line. Hitting categories read 0.
    pub fn pitching_value(self, line: &PitchingLine) -> f64 {
        match self {
            Category::Wins => line.wins,
            Category::Saves => line.saves,
            Category::Strikeouts => line.strikeouts,
            Category::EarnedRunAverage => line.era,
            Category::Whip => line.whip,
            Category::QualityStarts => line.quality_starts,
            Category::Losses => line.losses,
            Category::Holds => line.holds,
            Category::InningsPitched => line.innings_pitched,
            Category::StrikeoutsPerNine => line.k_per_9,
            _ => 0.0,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = ConfigurationError;

    /// Accepts the canonical code or one of the long-form spellings,
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let category = match key.as_str() {
            "r" | "runs" => Category::Runs,
            "hr" | "home_runs" | "homeruns" => Category::HomeRuns,
            "rbi" | "runs_batted_in" => Category::RunsBattedIn,
            "sb" | "stolen_bases" | "steals" => Category::StolenBases,
            "avg" | "ba" | "batting_average" => Category::BattingAverage,
            "ops" => Category::OnBasePlusSlugging,
            "h" | "hits" => Category::Hits,
            "2b" | "doubles" => Category::Doubles,
            "3b" | "triples" => Category::Triples,
            "bb" | "walks" => Category::Walks,
            "w" | "wins" => Category::Wins,
            "sv" | "saves" => Category::Saves,
            "k" | "so" | "strikeouts" => Category::Strikeouts,
            "era" => Category::EarnedRunAverage,
            "whip" => Category::Whip,
            "qs" | "quality_starts" => Category::QualityStarts,
            "l" | "losses" => Category::Losses,
            "hd" | "hld" | "holds" => Category::Holds,
            "ip" | "innings_pitched" | "innings" => Category::InningsPitched,
            "k/9" | "k9" | "k_per_9" | "strikeouts_per_nine" => Category::StrikeoutsPerNine,
            _ => return Err(ConfigurationError::UnknownCategory(s.to_string())),
        };
        Ok(category)
    }
}

impl TryFrom<String> for Category {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.code().to_string()
    }
}

// ---------------------------------------------------------------------------
// League scoring selection
// ---------------------------------------------------------------------------

/// The categories a league scores on, per side, with optional weights.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LeagueScoringConfig {
    #[serde(default, alias = "hitting_categories")]
    pub hitting: Vec<Category>,
    #[serde(default, alias = "pitching_categories")]
    pub pitching: Vec<Category>,
    /// Categories absent from this map weigh 1.0.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weights: BTreeMap<Category, f64>,
}

impl LeagueScoringConfig {
    pub fn new(hitting: Vec<Category>, pitching: Vec<Category>) -> Self {
        LeagueScoringConfig {
            hitting,
            pitching,
            weights: BTreeMap::new(),
        }
    }

    pub fn categories(&self, side: Side) -> &[Category] {
        match side {
            Side::Hitting => &self.hitting,
            Side::Pitching => &self.pitching,
        }
    }

    pub fn weight(&self, category: Category) -> f64 {
        self.weights.get(&category).copied().unwrap_or(1.0)
    }

    /// Check that every category sits on its declared side, appears once,
    /// carries a sane weight, and that each side in `sides_in_use` has at
    /// least one category.
    pub fn validate(&self, sides_in_use: &[Side]) -> Result<(), ConfigurationError> {
        for side in [Side::Hitting, Side::Pitching] {
            let selected = self.categories(side);
            for (i, category) in selected.iter().enumerate() {
                if category.side() != side {
                    return Err(ConfigurationError::WrongSide {
                        category: *category,
                        expected: side,
                        actual: category.side(),
                    });
                }
                if selected[..i].contains(category) {
                    return Err(ConfigurationError::DuplicateCategory(*category));
                }
            }
            if selected.is_empty() && sides_in_use.contains(&side) {
                return Err(ConfigurationError::EmptyCategorySelection { side });
            }
        }

        for (category, weight) in &self.weights {
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(ConfigurationError::InvalidWeight {
                    category: *category,
                    weight: *weight,
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
