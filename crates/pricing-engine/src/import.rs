// CSV import of player pools.
//
// One row per player per season window. Identity columns are `player_id`,
// `name`, `position`, `team` and `window`; every other column is a stat and
// is kept under its original header so the schema table can resolve it.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::player::{Player, SeasonWindow};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("missing required column `{0}`")]
    MissingColumn(&'static str),
}

// ---------------------------------------------------------------------------
// Header layout
// ---------------------------------------------------------------------------

struct Columns {
    player_id: usize,
    name: usize,
    window: usize,
    position: Option<usize>,
    team: Option<usize>,
    stats: Vec<(usize, String)>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ImportError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let player_id = find(&["player_id", "id"]).ok_or(ImportError::MissingColumn("player_id"))?;
        let name = find(&["name", "player_name"]).ok_or(ImportError::MissingColumn("name"))?;
        let window = find(&["window", "season"]).ok_or(ImportError::MissingColumn("window"))?;
        let position = find(&["position", "pos"]);
        let team = find(&["team", "mlb_team"]);

        let identity = [Some(player_id), Some(name), Some(window), position, team];
        let stats = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !identity.contains(&Some(*i)))
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();

        Ok(Columns {
            player_id,
            name,
            window,
            position,
            team,
            stats,
        })
    }
}

/// Numbers are stored as numbers; anything else is kept as text and left
/// for the normalizer to default.
fn stat_value(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => serde_json::Number::from_f64(v).map(Value::Number),
        _ => Some(Value::String(raw.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Reader-based loader
// ---------------------------------------------------------------------------

/// Parse players from CSV. Rows with no id or an unknown window are skipped
/// with a warning; players are returned in first-seen order.
pub fn load_players_from_reader<R: Read>(rdr: R) -> Result<Vec<Player>, ImportError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers = reader
        .headers()
        .map_err(|e| ImportError::Csv {
            path: "<reader>".into(),
            source: e,
        })?
        .clone();
    let columns = Columns::from_headers(&headers)?;

    let mut players: Vec<Player> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed row {}: {}", line + 2, e);
                continue;
            }
        };
        let field = |i: usize| record.get(i).map(str::trim).unwrap_or("");

        let player_id = field(columns.player_id);
        if player_id.is_empty() {
            warn!("skipping row {}: empty player_id", line + 2);
            continue;
        }
        let window: SeasonWindow = match field(columns.window).parse() {
            Ok(w) => w,
            Err(e) => {
                warn!("skipping row {} for player '{}': {}", line + 2, player_id, e);
                continue;
            }
        };

        let i = *index.entry(player_id.to_string()).or_insert_with(|| {
            players.push(Player {
                player_id: player_id.to_string(),
                name: field(columns.name).to_string(),
                position: columns.position.map(field).unwrap_or("").to_string(),
                team: columns.team.map(field).unwrap_or("").to_string(),
                ..Player::default()
            });
            players.len() - 1
        });

        let season = players[i].season_mut(window);
        if !season.is_empty() {
            warn!(
                "duplicate {} row for player '{}', using the later one",
                window, player_id
            );
            season.clear();
        }
        for (col, header) in &columns.stats {
            if let Some(value) = stat_value(field(*col)) {
                season.insert(header.clone(), value);
            }
        }
    }

    Ok(players)
}

/// Load players from a CSV file.
pub fn load_players_csv(path: &Path) -> Result<Vec<Player>, ImportError> {
    let file = std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let players = load_players_from_reader(file).map_err(|e| match e {
        ImportError::Csv { source, .. } => ImportError::Csv {
            path: path.display().to_string(),
            source,
        },
        other => other,
    })?;
    info!("Imported {} players from {}", players.len(), path.display());
    Ok(players)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
