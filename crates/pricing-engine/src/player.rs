// Raw player records as delivered by the data source.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One season's stats exactly as the source spelled them.
pub type RawSeason = BTreeMap<String, Value>;

/// The three season windows a player record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonWindow {
    Current,
    Prior,
    TwoYearsAgo,
}

impl SeasonWindow {
    pub const ALL: [SeasonWindow; 3] = [
        SeasonWindow::Current,
        SeasonWindow::Prior,
        SeasonWindow::TwoYearsAgo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SeasonWindow::Current => "current",
            SeasonWindow::Prior => "prior",
            SeasonWindow::TwoYearsAgo => "two_years_ago",
        }
    }
}

impl fmt::Display for SeasonWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" | "current_year" | "0" => Ok(SeasonWindow::Current),
            "prior" | "prior_year" | "last_year" | "1" => Ok(SeasonWindow::Prior),
            "two_years_ago" | "2" => Ok(SeasonWindow::TwoYearsAgo),
            other => Err(format!("unknown season window `{other}`")),
        }
    }
}

/// Reliability tier derived from sample size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    None,
    Minimal,
    Partial,
    Full,
}

pub const FULL_AT_BATS: f64 = 350.0;
pub const FULL_INNINGS: f64 = 120.0;
pub const PARTIAL_AT_BATS: f64 = 100.0;
pub const PARTIAL_INNINGS: f64 = 50.0;

impl DataQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            DataQuality::None => "none",
            DataQuality::Minimal => "minimal",
            DataQuality::Partial => "partial",
            DataQuality::Full => "full",
        }
    }

    /// Parse a stored tier name; anything unrecognized is `None`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "minimal" => DataQuality::Minimal,
            "partial" => DataQuality::Partial,
            "full" => DataQuality::Full,
            _ => DataQuality::None,
        }
    }

    /// Classify a sample by at-bats and innings pitched.
    pub fn classify(at_bats: f64, innings_pitched: f64) -> Self {
        if at_bats >= FULL_AT_BATS || innings_pitched >= FULL_INNINGS {
            DataQuality::Full
        } else if at_bats >= PARTIAL_AT_BATS || innings_pitched >= PARTIAL_INNINGS {
            DataQuality::Partial
        } else if at_bats > 0.0 || innings_pitched > 0.0 {
            DataQuality::Minimal
        } else {
            DataQuality::None
        }
    }
}

/// A player as fetched: identity plus three raw season snapshots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Player {
    #[serde(deserialize_with = "string_or_number", alias = "id")]
    pub player_id: String,
    #[serde(alias = "player_name")]
    pub name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default, alias = "mlb_team")]
    pub team: String,
    #[serde(default, alias = "current_year", alias = "current_stats")]
    pub current: RawSeason,
    #[serde(default, alias = "prior_year", alias = "prior_stats")]
    pub prior: RawSeason,
    #[serde(default, alias = "two_years_ago_stats")]
    pub two_years_ago: RawSeason,
}

impl Player {
    pub fn season(&self, window: SeasonWindow) -> &RawSeason {
        match window {
            SeasonWindow::Current => &self.current,
            SeasonWindow::Prior => &self.prior,
            SeasonWindow::TwoYearsAgo => &self.two_years_ago,
        }
    }

    pub fn season_mut(&mut self, window: SeasonWindow) -> &mut RawSeason {
        match window {
            SeasonWindow::Current => &mut self.current,
            SeasonWindow::Prior => &mut self.prior,
            SeasonWindow::TwoYearsAgo => &mut self.two_years_ago,
        }
    }
}

/// Player ids arrive as strings from some sources and integers from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "player_id must be a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_quality_thresholds() {
        assert_eq!(DataQuality::classify(0.0, 0.0), DataQuality::None);
        assert_eq!(DataQuality::classify(12.0, 0.0), DataQuality::Minimal);
        assert_eq!(DataQuality::classify(0.0, 0.1), DataQuality::Minimal);
        assert_eq!(DataQuality::classify(100.0, 0.0), DataQuality::Partial);
        assert_eq!(DataQuality::classify(0.0, 50.0), DataQuality::Partial);
        assert_eq!(DataQuality::classify(349.0, 119.9), DataQuality::Partial);
        assert_eq!(DataQuality::classify(350.0, 0.0), DataQuality::Full);
        assert_eq!(DataQuality::classify(0.0, 120.0), DataQuality::Full);
    }

    #[test]
    fn player_accepts_numeric_ids_and_alias_keys() {
        let json = r#"{
            "id": 4521,
            "player_name": "Ada Pitcher",
            "position": "SP",
            "mlb_team": "SEA",
            "prior_year": {"ip": 140.2}
        }"#;
        let player: Player = serde_json::from_str(json).unwrap();
        assert_eq!(player.player_id, "4521");
        assert_eq!(player.name, "Ada Pitcher");
        assert_eq!(player.team, "SEA");
        assert!(player.current.is_empty());
        assert_eq!(player.season(SeasonWindow::Prior).len(), 1);
    }

    #[test]
    fn season_window_parsing() {
        assert_eq!("prior_year".parse::<SeasonWindow>(), Ok(SeasonWindow::Prior));
        assert_eq!("Current".parse::<SeasonWindow>(), Ok(SeasonWindow::Current));
        assert!("next".parse::<SeasonWindow>().is_err());
    }
}
