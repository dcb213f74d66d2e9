//! Listing evaluation.
//!
//! Pure decision logic: does a listed item satisfy an acquisition goal?
//! Checks run cheapest-first (type, rarity, price) before stat
//! matching. Stat requirements are satisfied greedily in their
//! configured order against the item's non-primary stats, each stat
//! consumable by at most one requirement.

use crate::types::{AcquisitionGoal, ListedItem, MatchResult, Stat};

/// Evaluate a listing against a goal. Returns the match evidence when
/// every requirement is satisfied, `None` on the first failed check.
pub fn evaluate(item: &ListedItem, goal: &AcquisitionGoal) -> Option<MatchResult> {
    if !goal.equipment.matches(&item.equipment_type) {
        return None;
    }
    if let Some(ref rarity) = goal.rarity {
        if item.rarity.as_deref() != Some(rarity.as_str()) {
            return None;
        }
    }
    if item.price > goal.max_price {
        return None;
    }

    // Primary stats are intrinsic to the equipment type and never count
    // toward substat requirements.
    let mut available: Vec<&Stat> = item.stats.iter().filter(|s| !s.primary).collect();
    let mut matched = Vec::with_capacity(goal.required_stats.len());

    for req in &goal.required_stats {
        let pos = available
            .iter()
            .position(|s| s.stat == req.stat && s.level >= req.min_level)?;
        matched.push(available.remove(pos).clone());
    }

    Some(MatchResult {
        listing_id: item.listing_id.clone(),
        name: item.name.clone(),
        price: item.price,
        matched_stats: matched,
    })
}
