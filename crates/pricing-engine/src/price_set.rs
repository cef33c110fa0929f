// PriceSet: the value type produced by allocation and replaced, never
// patched, by every override.

use serde::{Deserialize, Serialize};

use crate::player::DataQuality;
use crate::valuation::budget::{AllocationSummary, RoundingRule};
use crate::valuation::distribution::{analyze, PriceSummary};

/// One priced player. The first seven fields are the exchange shape shared
/// with callers and persistence; the rest explain where the price came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub team: String,
    pub salary: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_price: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_salary: Option<u32>,
    /// The engine's own price, before any override.
    #[serde(default)]
    pub computed_salary: u32,
    #[serde(default = "unknown_quality")]
    pub data_quality: DataQuality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_score: Option<f64>,
}

fn unknown_quality() -> DataQuality {
    DataQuality::None
}

impl PriceEntry {
    pub fn is_overridden(&self) -> bool {
        self.manual_price.is_some()
    }
}

/// Prices for one pricing run plus a summary that always matches them.
///
/// Entries are ordered by salary descending, ties by `player_id`. The
/// summary is recomputed whenever a new set is built, including on
/// deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PriceSetRecord")]
pub struct PriceSet {
    rounding: RoundingRule,
    entries: Vec<PriceEntry>,
    summary: PriceSummary,
    allocation: AllocationSummary,
}

#[derive(Deserialize)]
struct PriceSetRecord {
    rounding: RoundingRule,
    entries: Vec<PriceEntry>,
    #[serde(default)]
    allocation: AllocationSummary,
}

impl From<PriceSetRecord> for PriceSet {
    fn from(record: PriceSetRecord) -> Self {
        PriceSet::new(record.rounding, record.entries, record.allocation)
    }
}

impl PriceSet {
    pub fn new(
        rounding: RoundingRule,
        mut entries: Vec<PriceEntry>,
        allocation: AllocationSummary,
    ) -> Self {
        sort_entries(&mut entries);
        let summary = analyze(&entries);
        PriceSet {
            rounding,
            entries,
            summary,
            allocation,
        }
    }

    /// A new set with the same rounding and allocation but replaced entries.
    pub fn with_entries(&self, entries: Vec<PriceEntry>) -> Self {
        PriceSet::new(self.rounding, entries, self.allocation)
    }

    pub fn rounding(&self) -> RoundingRule {
        self.rounding
    }

    pub fn entries(&self) -> &[PriceEntry] {
        &self.entries
    }

    pub fn summary(&self) -> &PriceSummary {
        &self.summary
    }

    pub fn allocation(&self) -> &AllocationSummary {
        &self.allocation
    }

    pub fn entry(&self, player_id: &str) -> Option<&PriceEntry> {
        self.entries.iter().find(|e| e.player_id == player_id)
    }

    pub fn salary(&self, player_id: &str) -> Option<u32> {
        self.entry(player_id).map(|e| e.salary)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sort_entries(entries: &mut [PriceEntry]) {
    entries.sort_by(|a, b| {
        b.salary
            .cmp(&a.salary)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
}
