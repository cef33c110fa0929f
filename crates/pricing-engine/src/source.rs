// Pricing data sources: where players and the league's scoring selection come
// from. Fetching is the only I/O in the pipeline.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DataFetchError;
use crate::player::Player;
use crate::valuation::category::LeagueScoringConfig;

/// Everything the pipeline needs for one league.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingData {
    pub league_id: String,
    pub players: Vec<Player>,
    pub scoring_categories: LeagueScoringConfig,
    pub fetched_at: DateTime<Utc>,
}

/// Supplies raw pricing data for a league.
#[async_trait]
pub trait PricingDataSource: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    async fn fetch(&self, league_id: &str) -> Result<PricingData, DataFetchError>;
}

#[async_trait]
impl<T: PricingDataSource + ?Sized> PricingDataSource for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, league_id: &str) -> Result<PricingData, DataFetchError> {
        (**self).fetch(league_id).await
    }
}

/// Fetch and check pricing data. Any failure stops the pipeline before
/// valuation.
pub async fn prepare_pricing_data<S>(
    source: &S,
    league_id: &str,
) -> Result<PricingData, DataFetchError>
where
    S: PricingDataSource + ?Sized,
{
    let data = source.fetch(league_id).await?;
    validate_pricing_data(&data)?;
    debug!(
        "fetched {} players for league {} from {}",
        data.players.len(),
        league_id,
        source.name()
    );
    Ok(data)
}

/// Reject data the pipeline cannot price: an empty pool, blank ids, or the
/// same id twice.
pub fn validate_pricing_data(data: &PricingData) -> Result<(), DataFetchError> {
    let malformed = |message: String| DataFetchError::Malformed {
        league_id: data.league_id.clone(),
        message,
    };

    if data.players.is_empty() {
        return Err(malformed("player pool is empty".into()));
    }
    let mut seen = HashSet::with_capacity(data.players.len());
    for player in &data.players {
        if player.player_id.trim().is_empty() {
            return Err(malformed(format!(
                "player `{}` has an empty player_id",
                player.name
            )));
        }
        if !seen.insert(player.player_id.as_str()) {
            return Err(malformed(format!(
                "duplicate player_id `{}`",
                player.player_id
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON file source
// ---------------------------------------------------------------------------

/// On-disk layout of `<league_id>.json`.
#[derive(Debug, Deserialize)]
struct LeagueFile {
    players: Vec<Player>,
    #[serde(default)]
    scoring_categories: LeagueScoringConfig,
}

/// Reads `<dir>/<league_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonFileSource { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn league_path(&self, league_id: &str) -> Option<PathBuf> {
        let valid = !league_id.is_empty()
            && league_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.dir.join(format!("{league_id}.json")))
    }
}

#[async_trait]
impl PricingDataSource for JsonFileSource {
    fn name(&self) -> &str {
        "json"
    }

    async fn fetch(&self, league_id: &str) -> Result<PricingData, DataFetchError> {
        let path = self
            .league_path(league_id)
            .ok_or_else(|| DataFetchError::LeagueNotFound(league_id.to_string()))?;

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataFetchError::LeagueNotFound(league_id.to_string()));
            }
            Err(source) => {
                return Err(DataFetchError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        let file: LeagueFile =
            serde_json::from_str(&text).map_err(|source| DataFetchError::Json {
                path: path.display().to_string(),
                source,
            })?;

        Ok(PricingData {
            league_id: league_id.to_string(),
            players: file.players,
            scoring_categories: file.scoring_categories,
            fetched_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
