// Canonical stat schema and the versioned key-spelling table used to read
// raw season snapshots.

use std::collections::BTreeMap;

use serde_json::Value;

/// Bumped whenever an alias is added, removed, or reordered, or a field's
/// reading changes.
pub const SCHEMA_VERSION: u32 = 2;

/// Every stat the engine reads from a raw season snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatField {
    // Hitting
    AtBats,
    Runs,
    Hits,
    Doubles,
    Triples,
    HomeRuns,
    RunsBattedIn,
    StolenBases,
    Walks,
    Strikeouts,
    Avg,
    Obp,
    Slg,
    Ops,
    // Pitching
    InningsPitched,
    Games,
    GamesStarted,
    Wins,
    Losses,
    Saves,
    BlownSaves,
    Holds,
    QualityStarts,
    EarnedRuns,
    HitsAllowed,
    WalksAllowed,
    PitchingStrikeouts,
    Era,
    Whip,
}

/// Accepted spellings per field, in resolution order. Keys are compared
/// lowercase; the first spelling present in the snapshot wins.
///
/// Pitching fields list their pitcher-specific spellings before the generic
/// ones shared with hitting (`bb`, `h`, `so`), since a pitcher's snapshot
/// uses the generic keys for allowed totals.
pub const FIELD_ALIASES: &[(StatField, &[&str])] = &[
    (StatField::AtBats, &["ab", "at_bats", "atbats"]),
    (StatField::Runs, &["r", "runs"]),
    (StatField::Hits, &["h", "hits"]),
    (StatField::Doubles, &["2b", "doubles"]),
    (StatField::Triples, &["3b", "triples"]),
    (StatField::HomeRuns, &["hr", "home_runs", "homeruns"]),
    (StatField::RunsBattedIn, &["rbi", "runs_batted_in"]),
    (StatField::StolenBases, &["sb", "stolen_bases", "steals"]),
    (StatField::Walks, &["bb", "walks", "base_on_balls"]),
    (StatField::Strikeouts, &["so", "k", "strikeouts"]),
    (StatField::Avg, &["avg", "ba", "batting_average"]),
    (StatField::Obp, &["obp", "on_base_percentage"]),
    (StatField::Slg, &["slg", "slugging", "slugging_percentage"]),
    (StatField::Ops, &["ops"]),
    (StatField::InningsPitched, &["ip", "innings_pitched", "innings"]),
    (StatField::Games, &["g", "games", "games_played", "gp"]),
    (StatField::GamesStarted, &["gs", "games_started"]),
    (StatField::Wins, &["w", "wins"]),
    (StatField::Losses, &["l", "losses"]),
    (StatField::Saves, &["sv", "saves"]),
    (StatField::BlownSaves, &["bs", "blown_saves"]),
    (StatField::Holds, &["hld", "hd", "holds"]),
    (StatField::QualityStarts, &["qs", "quality_starts"]),
    (StatField::EarnedRuns, &["er", "earned_runs"]),
    (
        StatField::HitsAllowed,
        &["hits_allowed", "h_allowed", "ha", "h", "hits"],
    ),
    (
        StatField::WalksAllowed,
        &["walks_allowed", "bb_allowed", "bb", "walks", "base_on_balls"],
    ),
    (
        StatField::PitchingStrikeouts,
        &["pitching_strikeouts", "p_so", "so", "k", "strikeouts"],
    ),
    (StatField::Era, &["era", "earned_run_average"]),
    (StatField::Whip, &["whip"]),
];

/// Interpret a raw JSON value as a finite number. Numeric strings are
/// accepted; anything else reads as `None`.
pub fn numeric_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Innings as written in box scores: the digit after the point counts outs,
/// so `205.1` is 205 1/3 innings and `140.2` is 140 2/3. Any other fraction
/// is already decimal innings and passes through.
pub fn innings_from_outs(ip: f64) -> f64 {
    let whole = ip.trunc();
    let tenths = ((ip - whole) * 10.0).round();
    if (ip - whole - tenths / 10.0).abs() > 1e-9 {
        return ip;
    }
    match tenths as i64 {
        1 => whole + 1.0 / 3.0,
        2 => whole + 2.0 / 3.0,
        _ => ip,
    }
}

/// A raw snapshot resolved once against `FIELD_ALIASES`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSnapshot {
    values: BTreeMap<StatField, f64>,
}

impl ResolvedSnapshot {
    /// Resolve every field of the schema against a raw key/value snapshot.
    pub fn resolve(raw: &BTreeMap<String, Value>) -> Self {
        let lowered: BTreeMap<String, f64> = raw
            .iter()
            .filter_map(|(k, v)| numeric_value(v).map(|n| (k.trim().to_ascii_lowercase(), n)))
            .collect();

        let mut values: BTreeMap<StatField, f64> = FIELD_ALIASES
            .iter()
            .filter_map(|(field, aliases)| {
                aliases
                    .iter()
                    .find_map(|alias| lowered.get(*alias))
                    .map(|v| (*field, *v))
            })
            .collect();
        if let Some(ip) = values.get_mut(&StatField::InningsPitched) {
            *ip = innings_from_outs(*ip);
        }

        ResolvedSnapshot { values }
    }

    /// The resolved value, if any spelling of the field was present.
    pub fn get(&self, field: StatField) -> Option<f64> {
        self.values.get(&field).copied()
    }

    /// The resolved value, or zero when missing.
    pub fn value(&self, field: StatField) -> f64 {
        self.get(field).unwrap_or(0.0)
    }
}
