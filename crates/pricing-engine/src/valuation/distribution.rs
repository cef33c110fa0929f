// Distribution summary of a price set: mean/max, a fixed-bucket histogram,
// and the most expensive players. Always computed from scratch.

use serde::{Deserialize, Serialize};

use crate::price_set::PriceEntry;

/// How many players the top-N audit lists.
pub const TOP_N: usize = 10;

/// Fixed salary buckets, most expensive first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SalaryBucket {
    Over50,
    From40To49,
    From30To39,
    From20To29,
    From10To19,
    From5To9,
    From1To4,
}

impl SalaryBucket {
    pub const ALL: [SalaryBucket; 7] = [
        SalaryBucket::Over50,
        SalaryBucket::From40To49,
        SalaryBucket::From30To39,
        SalaryBucket::From20To29,
        SalaryBucket::From10To19,
        SalaryBucket::From5To9,
        SalaryBucket::From1To4,
    ];

    /// Every salary lands in exactly one bucket.
    pub fn for_salary(salary: u32) -> Self {
        match salary {
            50.. => SalaryBucket::Over50,
            40..=49 => SalaryBucket::From40To49,
            30..=39 => SalaryBucket::From30To39,
            20..=29 => SalaryBucket::From20To29,
            10..=19 => SalaryBucket::From10To19,
            5..=9 => SalaryBucket::From5To9,
            _ => SalaryBucket::From1To4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SalaryBucket::Over50 => "$50+",
            SalaryBucket::From40To49 => "$40-49",
            SalaryBucket::From30To39 => "$30-39",
            SalaryBucket::From20To29 => "$20-29",
            SalaryBucket::From10To19 => "$10-19",
            SalaryBucket::From5To9 => "$5-9",
            SalaryBucket::From1To4 => "$1-4",
        }
    }
}

/// Per-bucket player counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryDistribution {
    pub over50: usize,
    #[serde(rename = "from40to49")]
    pub from40_to49: usize,
    #[serde(rename = "from30to39")]
    pub from30_to39: usize,
    #[serde(rename = "from20to29")]
    pub from20_to29: usize,
    #[serde(rename = "from10to19")]
    pub from10_to19: usize,
    #[serde(rename = "from5to9")]
    pub from5_to9: usize,
    #[serde(rename = "from1to4")]
    pub from1_to4: usize,
}

impl SalaryDistribution {
    pub fn count(&self, bucket: SalaryBucket) -> usize {
        match bucket {
            SalaryBucket::Over50 => self.over50,
            SalaryBucket::From40To49 => self.from40_to49,
            SalaryBucket::From30To39 => self.from30_to39,
            SalaryBucket::From20To29 => self.from20_to29,
            SalaryBucket::From10To19 => self.from10_to19,
            SalaryBucket::From5To9 => self.from5_to9,
            SalaryBucket::From1To4 => self.from1_to4,
        }
    }

    fn count_mut(&mut self, bucket: SalaryBucket) -> &mut usize {
        match bucket {
            SalaryBucket::Over50 => &mut self.over50,
            SalaryBucket::From40To49 => &mut self.from40_to49,
            SalaryBucket::From30To39 => &mut self.from30_to39,
            SalaryBucket::From20To29 => &mut self.from20_to29,
            SalaryBucket::From10To19 => &mut self.from10_to19,
            SalaryBucket::From5To9 => &mut self.from5_to9,
            SalaryBucket::From1To4 => &mut self.from1_to4,
        }
    }

    pub fn total(&self) -> usize {
        SalaryBucket::ALL.iter().map(|b| self.count(*b)).sum()
    }
}

/// A row in the top-N audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPlayer {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub salary: u32,
}

/// Commissioner-facing summary of a price set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    pub player_count: usize,
    pub total_salary: u64,
    pub avg_salary: f64,
    pub max_salary: u32,
    pub distribution: SalaryDistribution,
    pub top_players: Vec<TopPlayer>,
}

/// Summarize a slice of entries. Pure; the order of `entries` does not matter.
pub fn analyze(entries: &[PriceEntry]) -> PriceSummary {
    let mut distribution = SalaryDistribution::default();
    for entry in entries {
        *distribution.count_mut(SalaryBucket::for_salary(entry.salary)) += 1;
    }

    let total_salary: u64 = entries.iter().map(|e| e.salary as u64).sum();
    let max_salary = entries.iter().map(|e| e.salary).max().unwrap_or(0);
    let avg_salary = if entries.is_empty() {
        0.0
    } else {
        total_salary as f64 / entries.len() as f64
    };

    let mut ranked: Vec<&PriceEntry> = entries.iter().collect();
    ranked.sort_by(|a, b| {
        b.salary
            .cmp(&a.salary)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    let top_players = ranked
        .into_iter()
        .take(TOP_N)
        .map(|e| TopPlayer {
            player_id: e.player_id.clone(),
            player_name: e.player_name.clone(),
            position: e.position.clone(),
            salary: e.salary,
        })
        .collect();

    PriceSummary {
        player_count: entries.len(),
        total_salary,
        avg_salary,
        max_salary,
        distribution,
        top_players,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::DataQuality;

    fn entry(id: &str, salary: u32) -> PriceEntry {
        PriceEntry {
            player_id: id.into(),
            player_name: format!("Player {id}"),
            position: "OF".into(),
            team: "TST".into(),
            salary,
            manual_price: None,
            original_salary: None,
            computed_salary: salary,
            data_quality: DataQuality::Full,
            valuation_score: None,
        }
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(SalaryBucket::for_salary(50), SalaryBucket::Over50);
        assert_eq!(SalaryBucket::for_salary(49), SalaryBucket::From40To49);
        assert_eq!(SalaryBucket::for_salary(30), SalaryBucket::From30To39);
        assert_eq!(SalaryBucket::for_salary(29), SalaryBucket::From20To29);
        assert_eq!(SalaryBucket::for_salary(10), SalaryBucket::From10To19);
        assert_eq!(SalaryBucket::for_salary(9), SalaryBucket::From5To9);
        assert_eq!(SalaryBucket::for_salary(5), SalaryBucket::From5To9);
        assert_eq!(SalaryBucket::for_salary(4), SalaryBucket::From1To4);
        assert_eq!(SalaryBucket::for_salary(1), SalaryBucket::From1To4);
    }

    #[test]
    fn summary_values() {
        let entries = vec![entry("a", 55), entry("b", 22), entry("c", 3), entry("d", 20)];
        let summary = analyze(&entries);
        assert_eq!(summary.player_count, 4);
        assert_eq!(summary.total_salary, 100);
        assert_eq!(summary.avg_salary, 25.0);
        assert_eq!(summary.max_salary, 55);
        assert_eq!(summary.distribution.over50, 1);
        assert_eq!(summary.distribution.from20_to29, 2);
        assert_eq!(summary.distribution.from1_to4, 1);
        assert_eq!(summary.distribution.total(), 4);
    }

    #[test]
    fn top_players_are_capped_and_ties_break_by_id() {
        let entries: Vec<PriceEntry> = (0..15)
            .map(|i| entry(&format!("p{:02}", 14 - i), if i < 4 { 30 } else { 10 + i as u32 }))
            .collect();
        let summary = analyze(&entries);
        assert_eq!(summary.top_players.len(), TOP_N);
        assert_eq!(summary.top_players[0].salary, 30);
        // Four players tied at $30 come out in id order.
        let tied: Vec<&str> = summary.top_players[..4]
            .iter()
            .map(|t| t.player_id.as_str())
            .collect();
        assert_eq!(tied, vec!["p11", "p12", "p13", "p14"]);
        assert_eq!(summary.top_players[4].salary, 24);
    }

    #[test]
    fn empty_set_summary() {
        let summary = analyze(&[]);
        assert_eq!(summary, PriceSummary::default());
    }

    #[test]
    fn summary_serializes_camel_case() {
        let summary = analyze(&[entry("a", 31)]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["avgSalary"], 31.0);
        assert_eq!(json["maxSalary"], 31);
        assert_eq!(json["distribution"]["from30to39"], 1);
        assert_eq!(json["topPlayers"][0]["playerId"], "a");
    }
}
