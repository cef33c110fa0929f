// Stat normalization: raw season snapshots -> canonical season lines, a
// blended valuation line, and a data-quality tier.

use serde::{Deserialize, Serialize};

use crate::player::{DataQuality, Player, RawSeason, SeasonWindow};
use crate::valuation::category::Side;
use crate::valuation::schema::{ResolvedSnapshot, StatField};

/// Volumes below this are treated as zero when deriving rates.
const VOLUME_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Canonical lines
// ---------------------------------------------------------------------------

/// Canonical hitting stats for one season (or a blend of seasons).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HittingLine {
    pub at_bats: f64,
    pub runs: f64,
    pub hits: f64,
    pub doubles: f64,
    pub triples: f64,
    pub home_runs: f64,
    pub rbi: f64,
    pub stolen_bases: f64,
    pub walks: f64,
    pub strikeouts: f64,
    pub avg: f64,
    pub obp: f64,
    pub slg: f64,
    pub ops: f64,
}

/// Canonical pitching stats for one season (or a blend of seasons).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PitchingLine {
    pub innings_pitched: f64,
    pub games: f64,
    pub games_started: f64,
    pub wins: f64,
    pub losses: f64,
    pub saves: f64,
    pub blown_saves: f64,
    pub holds: f64,
    pub quality_starts: f64,
    pub earned_runs: f64,
    pub hits_allowed: f64,
    pub walks_allowed: f64,
    pub strikeouts: f64,
    pub era: f64,
    pub whip: f64,
    pub k_per_9: f64,
}

impl HittingLine {
    /// Read a hitting line from a resolved snapshot, deriving any missing
    /// rate from its components.
    pub fn from_snapshot(snap: &ResolvedSnapshot) -> Self {
        let at_bats = snap.value(StatField::AtBats);
        let hits = snap.value(StatField::Hits);
        let doubles = snap.value(StatField::Doubles);
        let triples = snap.value(StatField::Triples);
        let home_runs = snap.value(StatField::HomeRuns);
        let walks = snap.value(StatField::Walks);
        let total_bases = hits + doubles + 2.0 * triples + 3.0 * home_runs;

        let avg = snap
            .get(StatField::Avg)
            .unwrap_or_else(|| ratio(hits, at_bats));
        let obp = snap
            .get(StatField::Obp)
            .unwrap_or_else(|| ratio(hits + walks, at_bats + walks));
        let slg = snap
            .get(StatField::Slg)
            .unwrap_or_else(|| ratio(total_bases, at_bats));
        let ops = snap.get(StatField::Ops).unwrap_or(obp + slg);

        HittingLine {
            at_bats,
            runs: snap.value(StatField::Runs),
            hits,
            doubles,
            triples,
            home_runs,
            rbi: snap.value(StatField::RunsBattedIn),
            stolen_bases: snap.value(StatField::StolenBases),
            walks,
            strikeouts: snap.value(StatField::Strikeouts),
            avg,
            obp,
            slg,
            ops,
        }
    }
}

impl PitchingLine {
    /// Read a pitching line from a resolved snapshot, deriving any missing
    /// rate from its components.
    pub fn from_snapshot(snap: &ResolvedSnapshot) -> Self {
        let ip = snap.value(StatField::InningsPitched);
        let earned_runs = snap.value(StatField::EarnedRuns);
        let hits_allowed = snap.value(StatField::HitsAllowed);
        let walks_allowed = snap.value(StatField::WalksAllowed);
        let strikeouts = snap.value(StatField::PitchingStrikeouts);

        PitchingLine {
            innings_pitched: ip,
            games: snap.value(StatField::Games),
            games_started: snap.value(StatField::GamesStarted),
            wins: snap.value(StatField::Wins),
            losses: snap.value(StatField::Losses),
            saves: snap.value(StatField::Saves),
            blown_saves: snap.value(StatField::BlownSaves),
            holds: snap.value(StatField::Holds),
            quality_starts: snap.value(StatField::QualityStarts),
            earned_runs,
            hits_allowed,
            walks_allowed,
            strikeouts,
            era: snap
                .get(StatField::Era)
                .unwrap_or_else(|| ratio(earned_runs * 9.0, ip)),
            whip: snap
                .get(StatField::Whip)
                .unwrap_or_else(|| ratio(walks_allowed + hits_allowed, ip)),
            k_per_9: ratio(strikeouts * 9.0, ip),
        }
    }
}

/// `num / den`, or zero when the denominator is (near) zero.
fn ratio(num: f64, den: f64) -> f64 {
    if den.abs() < VOLUME_EPSILON {
        0.0
    } else {
        num / den
    }
}

/// Both canonical lines for one season snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SeasonStats {
    pub hitting: HittingLine,
    pub pitching: PitchingLine,
}

impl SeasonStats {
    pub fn from_raw(raw: &RawSeason) -> Self {
        let snap = ResolvedSnapshot::resolve(raw);
        SeasonStats {
            hitting: HittingLine::from_snapshot(&snap),
            pitching: PitchingLine::from_snapshot(&snap),
        }
    }

    pub fn has_volume(&self) -> bool {
        self.hitting.at_bats > 0.0 || self.pitching.innings_pitched > 0.0
    }

    /// AB for hitters, IP for pitchers.
    pub fn volume(&self, side: Side) -> f64 {
        match side {
            Side::Hitting => self.hitting.at_bats,
            Side::Pitching => self.pitching.innings_pitched,
        }
    }
}

// ---------------------------------------------------------------------------
// Season blending
// ---------------------------------------------------------------------------

/// Relative weight of each season window in the blended valuation line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonWeights {
    pub current: f64,
    pub prior: f64,
    pub two_years_ago: f64,
}

impl Default for SeasonWeights {
    fn default() -> Self {
        SeasonWeights {
            current: 0.5,
            prior: 0.3,
            two_years_ago: 0.2,
        }
    }
}

impl SeasonWeights {
    pub fn get(&self, window: SeasonWindow) -> f64 {
        match window {
            SeasonWindow::Current => self.current,
            SeasonWindow::Prior => self.prior,
            SeasonWindow::TwoYearsAgo => self.two_years_ago,
        }
    }
}

/// Weighted mean over `(value, weight)` pairs; zero when the weights sum to zero.
fn weighted_mean(pairs: impl Iterator<Item = (f64, f64)>) -> f64 {
    let (num, den) = pairs.fold((0.0, 0.0), |(n, d), (value, weight)| {
        (n + value * weight, d + weight)
    });
    ratio(num, den)
}

/// Blend season lines for one side. Only windows with volume on that side
/// participate; counting stats use the season weight, rates additionally
/// weight by volume.
fn blend(seasons: &[(SeasonStats, f64)], side: Side) -> SeasonStats {
    let active: Vec<(SeasonStats, f64)> = seasons
        .iter()
        .filter(|(s, w)| s.volume(side) > 0.0 && *w > 0.0)
        .copied()
        .collect();
    if active.is_empty() {
        return SeasonStats::default();
    }

    let count = |f: fn(&SeasonStats) -> f64| weighted_mean(active.iter().map(|(s, w)| (f(s), *w)));
    let rate = |f: fn(&SeasonStats) -> f64| {
        weighted_mean(active.iter().map(|(s, w)| (f(s), *w * s.volume(side))))
    };

    match side {
        Side::Hitting => SeasonStats {
            hitting: HittingLine {
                at_bats: count(|s| s.hitting.at_bats),
                runs: count(|s| s.hitting.runs),
                hits: count(|s| s.hitting.hits),
                doubles: count(|s| s.hitting.doubles),
                triples: count(|s| s.hitting.triples),
                home_runs: count(|s| s.hitting.home_runs),
                rbi: count(|s| s.hitting.rbi),
                stolen_bases: count(|s| s.hitting.stolen_bases),
                walks: count(|s| s.hitting.walks),
                strikeouts: count(|s| s.hitting.strikeouts),
                avg: rate(|s| s.hitting.avg),
                obp: rate(|s| s.hitting.obp),
                slg: rate(|s| s.hitting.slg),
                ops: rate(|s| s.hitting.ops),
            },
            pitching: PitchingLine::default(),
        },
        Side::Pitching => SeasonStats {
            hitting: HittingLine::default(),
            pitching: PitchingLine {
                innings_pitched: count(|s| s.pitching.innings_pitched),
                games: count(|s| s.pitching.games),
                games_started: count(|s| s.pitching.games_started),
                wins: count(|s| s.pitching.wins),
                losses: count(|s| s.pitching.losses),
                saves: count(|s| s.pitching.saves),
                blown_saves: count(|s| s.pitching.blown_saves),
                holds: count(|s| s.pitching.holds),
                quality_starts: count(|s| s.pitching.quality_starts),
                earned_runs: count(|s| s.pitching.earned_runs),
                hits_allowed: count(|s| s.pitching.hits_allowed),
                walks_allowed: count(|s| s.pitching.walks_allowed),
                strikeouts: count(|s| s.pitching.strikeouts),
                era: rate(|s| s.pitching.era),
                whip: rate(|s| s.pitching.whip),
                k_per_9: rate(|s| s.pitching.k_per_9),
            },
        },
    }
}

// ---------------------------------------------------------------------------
// Normalized player
// ---------------------------------------------------------------------------

/// A player after normalization, ready for category valuation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPlayer {
    pub player_id: String,
    pub name: String,
    pub position: String,
    pub team: String,
    pub side: Side,
    /// Per-window lines, indexed in `SeasonWindow::ALL` order.
    pub seasons: [SeasonStats; 3],
    /// Season-weighted blend used for valuation.
    pub blended: SeasonStats,
    pub data_quality: DataQuality,
    pub has_any_stats: bool,
}

impl NormalizedPlayer {
    pub fn season(&self, window: SeasonWindow) -> &SeasonStats {
        &self.seasons[window as usize]
    }

    pub fn hitting(&self) -> &HittingLine {
        &self.blended.hitting
    }

    pub fn pitching(&self) -> &PitchingLine {
        &self.blended.pitching
    }
}

/// Pitching positions as they appear in rosters and projection files.
const PITCHER_POSITIONS: &[&str] = &["P", "SP", "RP", "RHP", "LHP", "CL"];

/// Decide which side a player is valued on. An explicit pitching position
/// wins; without a position, innings with no at-bats means pitcher.
pub fn classify_side(position: &str, seasons: &[SeasonStats; 3]) -> Side {
    let pos = position.trim().to_ascii_uppercase();
    if !pos.is_empty() {
        let is_pitcher = pos
            .split(['/', ',', ' '])
            .filter(|p| !p.is_empty())
            .all(|p| PITCHER_POSITIONS.contains(&p));
        return if is_pitcher { Side::Pitching } else { Side::Hitting };
    }
    let ab: f64 = seasons.iter().map(|s| s.hitting.at_bats).sum();
    let ip: f64 = seasons.iter().map(|s| s.pitching.innings_pitched).sum();
    if ip > 0.0 && ab <= 0.0 {
        Side::Pitching
    } else {
        Side::Hitting
    }
}

/// Normalize one raw player record. Pure: identical input gives identical output.
pub fn normalize_player(player: &Player, weights: &SeasonWeights) -> NormalizedPlayer {
    let seasons = SeasonWindow::ALL.map(|w| SeasonStats::from_raw(player.season(w)));
    let side = classify_side(&player.position, &seasons);
    let has_any_stats = seasons.iter().any(SeasonStats::has_volume);

    // Tier on the largest single-season sample across the three windows.
    let max_ab = seasons.iter().map(|s| s.hitting.at_bats).fold(0.0, f64::max);
    let max_ip = seasons
        .iter()
        .map(|s| s.pitching.innings_pitched)
        .fold(0.0, f64::max);
    let data_quality = DataQuality::classify(max_ab, max_ip);

    let weighted: Vec<(SeasonStats, f64)> = SeasonWindow::ALL
        .iter()
        .map(|w| (seasons[*w as usize], weights.get(*w)))
        .collect();
    let blended = blend(&weighted, side);

    NormalizedPlayer {
        player_id: player.player_id.clone(),
        name: player.name.clone(),
        position: player.position.clone(),
        team: player.team.clone(),
        side,
        seasons,
        blended,
        data_quality,
        has_any_stats,
    }
}

/// Normalize a full pool, preserving input order.
pub fn normalize_pool(players: &[Player], weights: &SeasonWeights) -> Vec<NormalizedPlayer> {
    players.iter().map(|p| normalize_player(p, weights)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn season(value: serde_json::Value) -> RawSeason {
        serde_json::from_value(value).unwrap()
    }

    fn hitter(id: &str, current: serde_json::Value, prior: serde_json::Value) -> Player {
        Player {
            player_id: id.into(),
            name: format!("Hitter {id}"),
            position: "OF".into(),
            team: "TST".into(),
            current: season(current),
            prior: season(prior),
            two_years_ago: RawSeason::new(),
        }
    }

    #[test]
    fn missing_values_default_to_zero() {
        let p = hitter("h1", json!({"ab": 200}), json!({}));
        let n = normalize_player(&p, &SeasonWeights::default());
        let line = n.season(SeasonWindow::Current).hitting;
        assert_eq!(line.at_bats, 200.0);
        assert_eq!(line.home_runs, 0.0);
        assert_eq!(line.avg, 0.0);
        assert_eq!(n.season(SeasonWindow::Prior).hitting, HittingLine::default());
    }

    #[test]
    fn rates_are_derived_from_components() {
        let p = hitter(
            "h1",
            json!({"ab": 400, "h": 120, "obp": 0.350, "slg": 0.480}),
            json!({}),
        );
        let n = normalize_player(&p, &SeasonWeights::default());
        let line = n.season(SeasonWindow::Current).hitting;
        assert!(approx_eq(line.avg, 0.300, 1e-12));
        assert!(approx_eq(line.ops, 0.830, 1e-12));

        let sp = Player {
            player_id: "p1".into(),
            name: "Pitcher".into(),
            position: "SP".into(),
            current: season(json!({"ip": 90, "er": 30, "hits_allowed": 80, "walks_allowed": 28, "so": 100})),
            ..Player::default()
        };
        let n = normalize_player(&sp, &SeasonWeights::default());
        let line = n.season(SeasonWindow::Current).pitching;
        assert!(approx_eq(line.era, 3.0, 1e-12));
        assert!(approx_eq(line.whip, 1.2, 1e-12));
        assert!(approx_eq(line.k_per_9, 10.0, 1e-12));
    }

    #[test]
    fn on_base_and_slugging_are_derived_from_counts() {
        let p = hitter(
            "h1",
            json!({"ab": 500, "h": 150, "2b": 30, "3b": 5, "hr": 25, "bb": 60}),
            json!({}),
        );
        let n = normalize_player(&p, &SeasonWeights::default());
        let line = n.season(SeasonWindow::Current).hitting;
        // (150 + 60) / (500 + 60)
        assert!(approx_eq(line.obp, 0.375, 1e-12));
        // TB = 150 + 30 + 2*5 + 3*25 = 265
        assert!(approx_eq(line.slg, 0.530, 1e-12));
        assert!(approx_eq(line.ops, 0.905, 1e-12));
    }

    #[test]
    fn innings_in_outs_notation_feed_the_rates() {
        let sp = Player {
            player_id: "p1".into(),
            name: "Pitcher".into(),
            position: "SP".into(),
            current: season(json!({"ip": 7.2, "er": 2, "h": 5, "bb": 1, "so": 9})),
            ..Player::default()
        };
        let n = normalize_player(&sp, &SeasonWeights::default());
        let line = n.season(SeasonWindow::Current).pitching;
        let innings = 23.0 / 3.0;
        assert!(approx_eq(line.innings_pitched, innings, 1e-12));
        assert!(approx_eq(line.era, 18.0 / innings, 1e-12));
        assert!(approx_eq(line.whip, 6.0 / innings, 1e-12));
        assert!(approx_eq(line.k_per_9, 81.0 / innings, 1e-12));
    }

    #[test]
    fn reported_rate_beats_derived_rate() {
        let p = hitter("h1", json!({"ab": 400, "h": 120, "avg": 0.301}), json!({}));
        let n = normalize_player(&p, &SeasonWeights::default());
        assert_eq!(n.season(SeasonWindow::Current).hitting.avg, 0.301);
    }

    #[test]
    fn has_any_stats_requires_at_bats_or_innings() {
        let rookie = hitter("r1", json!({"hr": 3}), json!({}));
        let n = normalize_player(&rookie, &SeasonWeights::default());
        assert!(!n.has_any_stats);
        assert_eq!(n.data_quality, DataQuality::None);

        let vet = hitter("v1", json!({}), json!({"ab": 120}));
        let n = normalize_player(&vet, &SeasonWeights::default());
        assert!(n.has_any_stats);
        assert_eq!(n.data_quality, DataQuality::Partial);
    }

    #[test]
    fn blend_renormalizes_over_seasons_with_data() {
        // Only current (0.5) and prior (0.3) have at-bats.
        let p = hitter(
            "h1",
            json!({"ab": 500, "hr": 40, "avg": 0.300}),
            json!({"ab": 100, "hr": 8, "avg": 0.200}),
        );
        let n = normalize_player(&p, &SeasonWeights::default());
        let line = n.hitting();
        // HR: (40*0.5 + 8*0.3) / 0.8 = 28.0
        assert!(approx_eq(line.home_runs, 28.0, 1e-9));
        // AVG weighted by 0.5*500 and 0.3*100: (0.3*250 + 0.2*30) / 280
        assert!(approx_eq(line.avg, (0.3 * 250.0 + 0.2 * 30.0) / 280.0, 1e-12));
    }

    #[test]
    fn blend_is_empty_without_volume() {
        let p = hitter("h1", json!({"hr": 10}), json!({}));
        let n = normalize_player(&p, &SeasonWeights::default());
        assert_eq!(n.blended, SeasonStats::default());
    }

    #[test]
    fn side_classification() {
        let empty = [SeasonStats::default(); 3];
        assert_eq!(classify_side("SP", &empty), Side::Pitching);
        assert_eq!(classify_side("rp", &empty), Side::Pitching);
        assert_eq!(classify_side("1B/OF", &empty), Side::Hitting);
        assert_eq!(classify_side("", &empty), Side::Hitting);

        let mut pitched = [SeasonStats::default(); 3];
        pitched[1].pitching.innings_pitched = 60.0;
        assert_eq!(classify_side("", &pitched), Side::Pitching);
    }

    #[test]
    fn normalization_is_pure() {
        let p = hitter("h1", json!({"ab": 500, "hr": "31"}), json!({"at_bats": 480}));
        let a = normalize_player(&p, &SeasonWeights::default());
        let b = normalize_player(&p, &SeasonWeights::default());
        assert_eq!(a, b);
    }
}
