// Manual and bulk price overrides.
//
// Every operation takes the current price set by reference and returns a new
// one. A batch is validated in full before any entry is rebuilt, so a
// rejected request leaves the caller's set exactly as it was.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AdjustmentError, PricingError};
use crate::price_set::PriceSet;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// How an adjustment value is applied to a salary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    /// `new = old * (1 + value / 100)`
    Percentage,
    /// `new = old + value`
    Fixed,
    /// `new = value`
    Set,
}

impl AdjustmentKind {
    pub fn apply(self, old: u32, value: f64) -> f64 {
        let old = old as f64;
        match self {
            AdjustmentKind::Percentage => old * (1.0 + value / 100.0),
            AdjustmentKind::Fixed => old + value,
            AdjustmentKind::Set => value,
        }
    }
}

impl fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentKind::Percentage => write!(f, "percentage"),
            AdjustmentKind::Fixed => write!(f, "fixed"),
            AdjustmentKind::Set => write!(f, "set"),
        }
    }
}

impl FromStr for AdjustmentKind {
    type Err = AdjustmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" | "percent" | "pct" | "%" => Ok(AdjustmentKind::Percentage),
            "fixed" | "delta" => Ok(AdjustmentKind::Fixed),
            "set" => Ok(AdjustmentKind::Set),
            other => Err(AdjustmentError::UnknownKind(other.to_string())),
        }
    }
}

/// A typed override request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub player_ids: Vec<String>,
    pub kind: AdjustmentKind,
    pub value: f64,
}

impl AdjustmentRequest {
    pub fn new(player_ids: Vec<String>, kind: AdjustmentKind, value: f64) -> Self {
        AdjustmentRequest {
            player_ids,
            kind,
            value,
        }
    }

    /// Build a request from untyped input, e.g. form fields or CLI args.
    pub fn parse(player_ids: Vec<String>, kind: &str, value: &str) -> Result<Self, AdjustmentError> {
        let kind = kind.parse()?;
        let value = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| AdjustmentError::NonNumeric(value.to_string()))?;
        Ok(AdjustmentRequest::new(player_ids, kind, value))
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Validate the selection against the set and return it de-duplicated.
fn resolve_selection(
    price_set: &PriceSet,
    player_ids: &[String],
) -> Result<BTreeSet<String>, AdjustmentError> {
    if player_ids.is_empty() {
        return Err(AdjustmentError::EmptySelection);
    }
    let selected: BTreeSet<String> = player_ids.iter().map(|id| id.trim().to_string()).collect();
    if let Some(missing) = selected.iter().find(|id| price_set.entry(id).is_none()) {
        return Err(AdjustmentError::UnknownPlayer(missing.clone()));
    }
    Ok(selected)
}

/// Apply one adjustment to every selected player.
///
/// Each new salary goes through the set's rounding rule. A player's first
/// override captures the pre-override salary in `original_salary`; later
/// overrides leave it alone. The summary is rebuilt from the new entries.
pub fn apply_adjustment(
    price_set: &PriceSet,
    request: &AdjustmentRequest,
) -> Result<PriceSet, PricingError> {
    let rule = price_set.rounding();
    rule.validate()?;

    if !request.value.is_finite() {
        return Err(AdjustmentError::NonNumeric(request.value.to_string()).into());
    }
    let selected = resolve_selection(price_set, &request.player_ids)?;

    // Compute every new salary before touching anything.
    let mut updates = Vec::with_capacity(selected.len());
    for entry in price_set.entries() {
        if !selected.contains(&entry.player_id) {
            continue;
        }
        let raw = request.kind.apply(entry.salary, request.value);
        if !raw.is_finite() {
            return Err(AdjustmentError::NonNumericResult(entry.player_id.clone()).into());
        }
        updates.push((entry.player_id.clone(), rule.apply(raw)));
    }

    let entries = price_set
        .entries()
        .iter()
        .map(|entry| {
            let mut entry = entry.clone();
            if let Some((_, salary)) = updates.iter().find(|(id, _)| *id == entry.player_id) {
                if entry.original_salary.is_none() {
                    entry.original_salary = Some(entry.salary);
                }
                entry.salary = *salary;
                entry.manual_price = Some(*salary);
            }
            entry
        })
        .collect();

    info!(
        "Applied {} adjustment ({}) to {} players",
        request.kind,
        request.value,
        updates.len()
    );
    Ok(price_set.with_entries(entries))
}

/// Single-player manual price edit.
pub fn set_manual_price(
    price_set: &PriceSet,
    player_id: &str,
    price: f64,
) -> Result<PriceSet, PricingError> {
    let request = AdjustmentRequest::new(vec![player_id.to_string()], AdjustmentKind::Set, price);
    apply_adjustment(price_set, &request)
}

/// Undo overrides for the selected players: salary returns to
/// `original_salary` and `manual_price` is cleared. `original_salary` itself
/// is kept so a later override cannot capture an overridden value. Players
/// without an override are left as they are.
pub fn revert_overrides(
    price_set: &PriceSet,
    player_ids: &[String],
) -> Result<PriceSet, PricingError> {
    let selected = resolve_selection(price_set, player_ids)?;
    let entries = price_set
        .entries()
        .iter()
        .map(|entry| {
            let mut entry = entry.clone();
            if selected.contains(&entry.player_id) && entry.manual_price.is_some() {
                if let Some(original) = entry.original_salary {
                    entry.salary = original;
                }
                entry.manual_price = None;
            }
            entry
        })
        .collect();
    Ok(price_set.with_entries(entries))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
