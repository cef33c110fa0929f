// SQLite persistence: player pools, league scoring selections and finalized
// price sets.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::DataFetchError;
use crate::player::{DataQuality, Player, RawSeason, SeasonWindow};
use crate::price_set::{PriceEntry, PriceSet};
use crate::session::PriceSetStore;
use crate::source::{PricingData, PricingDataSource};
use crate::valuation::budget::{AllocationSummary, RoundingRule};
use crate::valuation::category::LeagueScoringConfig;

/// A price set as it was persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedPriceSet {
    pub id: i64,
    pub league_id: String,
    pub finalized_at: DateTime<Utc>,
    pub price_set: PriceSet,
}

/// SQLite-backed store for pricing inputs and finalized outputs.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                league_id TEXT NOT NULL,
                player_id TEXT NOT NULL,
                name      TEXT NOT NULL,
                position  TEXT NOT NULL,
                team      TEXT NOT NULL,
                PRIMARY KEY (league_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS player_seasons (
                league_id   TEXT NOT NULL,
                player_id   TEXT NOT NULL,
                season      TEXT NOT NULL,
                stats       TEXT NOT NULL,
                PRIMARY KEY (league_id, player_id, season),
                FOREIGN KEY (league_id, player_id)
                    REFERENCES players(league_id, player_id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS league_scoring (
                league_id TEXT PRIMARY KEY,
                scoring   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS price_sets (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id        TEXT NOT NULL,
                finalized_at     TEXT NOT NULL,
                min_salary       INTEGER NOT NULL,
                salary_increment INTEGER NOT NULL,
                league_envelope  REAL NOT NULL,
                distributable    REAL NOT NULL,
                dollars_per_point REAL NOT NULL,
                replacement_score REAL NOT NULL,
                drafted_pool_size INTEGER NOT NULL,
                rookie_price     INTEGER NOT NULL,
                schema_version   INTEGER NOT NULL,
                summary          TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS price_entries (
                price_set_id    INTEGER NOT NULL REFERENCES price_sets(id) ON DELETE CASCADE,
                player_id       TEXT NOT NULL,
                player_name     TEXT NOT NULL,
                position        TEXT NOT NULL,
                team            TEXT NOT NULL,
                salary          INTEGER NOT NULL,
                manual_price    INTEGER,
                original_salary INTEGER,
                computed_salary INTEGER NOT NULL,
                data_quality    TEXT NOT NULL,
                valuation_score REAL,
                PRIMARY KEY (price_set_id, player_id)
            );

            CREATE INDEX IF NOT EXISTS idx_price_sets_league ON price_sets(league_id, id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection. A poisoned lock is recovered; every
    /// write runs in a transaction, so the connection is never left mid-write.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // Pricing inputs
    // ------------------------------------------------------------------

    /// Insert or replace players and all of their season snapshots in a
    /// single transaction. A window missing from the new record is removed.
    pub fn upsert_players(&self, league_id: &str, players: &[Player]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;

        for player in players {
            tx.execute(
                "INSERT INTO players (league_id, player_id, name, position, team)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(league_id, player_id) DO UPDATE SET
                    name     = excluded.name,
                    position = excluded.position,
                    team     = excluded.team",
                params![league_id, player.player_id, player.name, player.position, player.team],
            )
            .with_context(|| format!("failed to upsert player {}", player.player_id))?;

            tx.execute(
                "DELETE FROM player_seasons WHERE league_id = ?1 AND player_id = ?2",
                params![league_id, player.player_id],
            )
            .context("failed to clear player seasons")?;

            for window in SeasonWindow::ALL {
                let season = player.season(window);
                if season.is_empty() {
                    continue;
                }
                let stats =
                    serde_json::to_string(season).context("failed to serialize season stats")?;
                tx.execute(
                    "INSERT INTO player_seasons (league_id, player_id, season, stats)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![league_id, player.player_id, window.as_str(), stats],
                )
                .context("failed to insert season stats")?;
            }
        }

        tx.commit().context("failed to commit player import")?;
        info!("Stored {} players for league {}", players.len(), league_id);
        Ok(players.len())
    }

    /// Store the league's scoring selection, replacing any previous one.
    pub fn set_scoring(&self, league_id: &str, scoring: &LeagueScoringConfig) -> Result<()> {
        let conn = self.conn();
        let json = serde_json::to_string(scoring).context("failed to serialize scoring")?;
        conn.execute(
            "INSERT OR REPLACE INTO league_scoring (league_id, scoring) VALUES (?1, ?2)",
            params![league_id, json],
        )
        .context("failed to save league scoring")?;
        Ok(())
    }

    pub fn player_count(&self, league_id: &str) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM players WHERE league_id = ?1",
                params![league_id],
                |row| row.get(0),
            )
            .context("failed to count players")?;
        Ok(count as usize)
    }

    /// Load a league's players and scoring. `None` when the league has
    /// neither players nor a scoring selection.
    pub fn load_pricing_data(&self, league_id: &str) -> Result<Option<PricingData>> {
        let conn = self.conn();

        let scoring: Option<String> = conn
            .query_row(
                "SELECT scoring FROM league_scoring WHERE league_id = ?1",
                params![league_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query league scoring")?;

        let mut stmt = conn
            .prepare(
                "SELECT player_id, name, position, team FROM players
                 WHERE league_id = ?1 ORDER BY player_id",
            )
            .context("failed to prepare players query")?;
        let mut players = stmt
            .query_map(params![league_id], |row| {
                Ok(Player {
                    player_id: row.get(0)?,
                    name: row.get(1)?,
                    position: row.get(2)?,
                    team: row.get(3)?,
                    ..Player::default()
                })
            })
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;

        if players.is_empty() && scoring.is_none() {
            return Ok(None);
        }

        let mut stmt = conn
            .prepare("SELECT player_id, season, stats FROM player_seasons WHERE league_id = ?1")
            .context("failed to prepare seasons query")?;
        let rows = stmt
            .query_map(params![league_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("failed to query player seasons")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map season rows")?;

        let index: BTreeMap<String, usize> = players
            .iter()
            .enumerate()
            .map(|(i, p)| (p.player_id.clone(), i))
            .collect();
        for (player_id, season, stats) in rows {
            let Some(&i) = index.get(&player_id) else {
                continue;
            };
            let window: SeasonWindow = season
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("bad season for player {player_id}"))?;
            let raw: RawSeason = serde_json::from_str(&stats)
                .with_context(|| format!("bad stats JSON for player {player_id}"))?;
            *players[i].season_mut(window) = raw;
        }

        let scoring_categories = match scoring {
            Some(json) => serde_json::from_str(&json).context("bad scoring JSON")?,
            None => LeagueScoringConfig::default(),
        };

        Ok(Some(PricingData {
            league_id: league_id.to_string(),
            players,
            scoring_categories,
            fetched_at: Utc::now(),
        }))
    }

    // ------------------------------------------------------------------
    // Finalized price sets
    // ------------------------------------------------------------------

    /// Persist a price set with its entries and summary. Returns the new id.
    pub fn save_price_set(&self, league_id: &str, price_set: &PriceSet) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let rule = price_set.rounding();
        let alloc = price_set.allocation();
        let summary =
            serde_json::to_string(price_set.summary()).context("failed to serialize summary")?;

        let id: i64 = tx
            .query_row(
                "INSERT INTO price_sets
                    (league_id, finalized_at, min_salary, salary_increment,
                     league_envelope, distributable, dollars_per_point, replacement_score,
                     drafted_pool_size, rookie_price, schema_version, summary)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 RETURNING id",
                params![
                    league_id,
                    Utc::now().to_rfc3339(),
                    rule.min_salary,
                    rule.salary_increment,
                    alloc.league_envelope,
                    alloc.distributable,
                    alloc.dollars_per_point,
                    alloc.replacement_score,
                    alloc.drafted_pool_size as i64,
                    alloc.rookie_price,
                    alloc.schema_version,
                    summary,
                ],
                |row| row.get(0),
            )
            .context("failed to insert price set")?;

        for entry in price_set.entries() {
            tx.execute(
                "INSERT INTO price_entries
                    (price_set_id, player_id, player_name, position, team, salary,
                     manual_price, original_salary, computed_salary, data_quality, valuation_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    id,
                    entry.player_id,
                    entry.player_name,
                    entry.position,
                    entry.team,
                    entry.salary,
                    entry.manual_price,
                    entry.original_salary,
                    entry.computed_salary,
                    entry.data_quality.as_str(),
                    entry.valuation_score,
                ],
            )
            .context("failed to insert price entry")?;
        }

        tx.commit().context("failed to commit price set")?;
        info!(
            "Finalized price set {} for league {} ({} players)",
            id,
            league_id,
            price_set.len()
        );
        Ok(id)
    }

    /// The most recently finalized price set for a league.
    pub fn load_latest_price_set(&self, league_id: &str) -> Result<Option<FinalizedPriceSet>> {
        let conn = self.conn();
        let header = conn
            .query_row(
                "SELECT id, finalized_at, min_salary, salary_increment,
                        league_envelope, distributable, dollars_per_point, replacement_score,
                        drafted_pool_size, rookie_price, schema_version
                 FROM price_sets WHERE league_id = ?1 ORDER BY id DESC LIMIT 1",
                params![league_id],
                |row| {
                    let rounding = RoundingRule {
                        min_salary: row.get(2)?,
                        salary_increment: row.get(3)?,
                    };
                    let allocation = AllocationSummary {
                        league_envelope: row.get(4)?,
                        distributable: row.get(5)?,
                        dollars_per_point: row.get(6)?,
                        replacement_score: row.get(7)?,
                        drafted_pool_size: row.get::<_, i64>(8)? as usize,
                        rookie_price: row.get(9)?,
                        schema_version: row.get(10)?,
                    };
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, rounding, allocation))
                },
            )
            .optional()
            .context("failed to query latest price set")?;

        let Some((id, finalized_at, rounding, allocation)) = header else {
            return Ok(None);
        };

        let finalized_at = DateTime::parse_from_rfc3339(&finalized_at)
            .context("bad finalized_at timestamp")?
            .with_timezone(&Utc);

        let mut stmt = conn
            .prepare(
                "SELECT player_id, player_name, position, team, salary, manual_price,
                        original_salary, computed_salary, data_quality, valuation_score
                 FROM price_entries WHERE price_set_id = ?1",
            )
            .context("failed to prepare price entries query")?;
        let entries = stmt
            .query_map(params![id], |row| {
                Ok(PriceEntry {
                    player_id: row.get(0)?,
                    player_name: row.get(1)?,
                    position: row.get(2)?,
                    team: row.get(3)?,
                    salary: row.get(4)?,
                    manual_price: row.get(5)?,
                    original_salary: row.get(6)?,
                    computed_salary: row.get(7)?,
                    data_quality: DataQuality::from_str_lossy(&row.get::<_, String>(8)?),
                    valuation_score: row.get(9)?,
                })
            })
            .context("failed to query price entries")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map price entry rows")?;

        Ok(Some(FinalizedPriceSet {
            id,
            league_id: league_id.to_string(),
            finalized_at,
            price_set: PriceSet::new(rounding, entries, allocation),
        }))
    }
}

#[async_trait]
impl PricingDataSource for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn fetch(&self, league_id: &str) -> Result<PricingData, DataFetchError> {
        self.load_pricing_data(league_id)
            .map_err(DataFetchError::Source)?
            .ok_or_else(|| DataFetchError::LeagueNotFound(league_id.to_string()))
    }
}

impl PriceSetStore for Database {
    fn save_price_set(&self, league_id: &str, price_set: &PriceSet) -> Result<i64> {
        Database::save_price_set(self, league_id, price_set)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::category::Category;
    use serde_json::json;

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory db")
    }

    fn player(id: &str, ab: u32) -> Player {
        let mut p = Player {
            player_id: id.into(),
            name: format!("Player {id}"),
            position: "OF".into(),
            team: "TST".into(),
            ..Player::default()
        };
        p.current.insert("AB".into(), json!(ab));
        p.prior.insert("HR".into(), json!(12));
        p
    }

    fn entry(id: &str, salary: u32) -> PriceEntry {
        PriceEntry {
            player_id: id.into(),
            player_name: id.to_uppercase(),
            position: "SS".into(),
            team: "TST".into(),
            salary,
            manual_price: None,
            original_salary: None,
            computed_salary: salary,
            data_quality: DataQuality::Partial,
            valuation_score: Some(0.42),
        }
    }

    #[test]
    fn players_and_scoring_round_trip() {
        let db = test_db();
        db.upsert_players("lg", &[player("1", 400), player("2", 50)]).unwrap();
        let scoring = LeagueScoringConfig::new(vec![Category::HomeRuns], vec![Category::Wins]);
        db.set_scoring("lg", &scoring).unwrap();

        let data = db.load_pricing_data("lg").unwrap().unwrap();
        assert_eq!(data.players.len(), 2);
        assert_eq!(data.players[0].player_id, "1");
        assert_eq!(data.players[0].current["AB"], json!(400));
        assert_eq!(data.players[0].prior["HR"], json!(12));
        assert!(data.players[0].two_years_ago.is_empty());
        assert_eq!(data.scoring_categories, scoring);
    }

    #[test]
    fn upsert_replaces_seasons() {
        let db = test_db();
        db.upsert_players("lg", &[player("1", 400)]).unwrap();

        let mut updated = player("1", 410);
        updated.prior.clear();
        updated.name = "Renamed".into();
        db.upsert_players("lg", &[updated]).unwrap();

        assert_eq!(db.player_count("lg").unwrap(), 1);
        let data = db.load_pricing_data("lg").unwrap().unwrap();
        assert_eq!(data.players[0].name, "Renamed");
        assert_eq!(data.players[0].current["AB"], json!(410));
        assert!(data.players[0].prior.is_empty());
    }

    #[test]
    fn leagues_are_isolated() {
        let db = test_db();
        db.upsert_players("a", &[player("1", 400)]).unwrap();
        assert!(db.load_pricing_data("b").unwrap().is_none());
        assert_eq!(db.player_count("b").unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_league_is_a_fetch_error() {
        let db = test_db();
        assert!(matches!(
            db.fetch("nope").await,
            Err(DataFetchError::LeagueNotFound(_))
        ));
    }

    #[test]
    fn price_set_round_trip_keeps_latest() {
        let db = test_db();
        let rule = RoundingRule::new(1, 1).unwrap();
        let mut overridden = entry("b", 9);
        overridden.manual_price = Some(9);
        overridden.original_salary = Some(4);

        let first = PriceSet::new(rule, vec![entry("a", 30)], AllocationSummary::default());
        let second = PriceSet::new(
            rule,
            vec![entry("a", 31), overridden],
            AllocationSummary {
                league_envelope: 260.0,
                ..AllocationSummary::default()
            },
        );

        let id1 = db.save_price_set("lg", &first).unwrap();
        let id2 = db.save_price_set("lg", &second).unwrap();
        assert!(id2 > id1);

        let latest = db.load_latest_price_set("lg").unwrap().unwrap();
        assert_eq!(latest.id, id2);
        assert_eq!(latest.price_set, second);
        assert_eq!(latest.price_set.entry("b").unwrap().original_salary, Some(4));
        assert_eq!(latest.price_set.summary().total_salary, 40);

        assert!(db.load_latest_price_set("other").unwrap().is_none());
    }
}
