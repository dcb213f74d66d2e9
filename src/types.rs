//! Shared types for the GEARHOUND agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that marketplace, engine,
//! and config modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Smallest-unit scaling factor for the in-game currency.
/// The marketplace quotes prices in nano units; display divides by this.
pub const AMOUNT_SCALE: u64 = 1_000_000_000;

/// Render a nano-unit amount in display units with two decimals.
pub fn format_amount(nano: u64) -> String {
    format!("{:.2}", nano as f64 / AMOUNT_SCALE as f64)
}

/// Convert a display-unit amount (as configured by the operator) to
/// nano units. Non-positive inputs clamp to zero.
pub fn to_nano(display: f64) -> u64 {
    if display <= 0.0 {
        0
    } else {
        (display * AMOUNT_SCALE as f64).round() as u64
    }
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

/// Equipment-type filter on a goal: match anything or one exact type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EquipmentFilter {
    Any,
    Exact(String),
}

impl EquipmentFilter {
    /// Whether an item's equipment type passes this filter.
    pub fn matches(&self, equipment_type: &str) -> bool {
        match self {
            EquipmentFilter::Any => true,
            EquipmentFilter::Exact(t) => t == equipment_type,
        }
    }

    /// The exact type name, if this filter is not a wildcard.
    pub fn exact(&self) -> Option<&str> {
        match self {
            EquipmentFilter::Any => None,
            EquipmentFilter::Exact(t) => Some(t.as_str()),
        }
    }
}

impl From<String> for EquipmentFilter {
    fn from(s: String) -> Self {
        match s.trim() {
            "" | "*" | "any" | "Any" | "ANY" => EquipmentFilter::Any,
            t => EquipmentFilter::Exact(t.to_string()),
        }
    }
}

impl From<EquipmentFilter> for String {
    fn from(f: EquipmentFilter) -> String {
        match f {
            EquipmentFilter::Any => "any".to_string(),
            EquipmentFilter::Exact(t) => t,
        }
    }
}

impl fmt::Display for EquipmentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquipmentFilter::Any => write!(f, "any"),
            EquipmentFilter::Exact(t) => write!(f, "{t}"),
        }
    }
}

/// One required stat on a goal: the stat name and the minimum severity
/// level an item's roll must reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRequirement {
    pub stat: String,
    pub min_level: u8,
}

impl fmt::Display for StatRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}≥{}", self.stat, self.min_level)
    }
}

/// A configured acquisition target. Created once at session start from
/// the goal document; `fulfilled` is the only field mutated afterwards,
/// and only by the engine's purchase-success path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionGoal {
    pub equipment: EquipmentFilter,
    #[serde(default)]
    pub rarity: Option<String>,
    /// Price ceiling in nano units.
    pub max_price: u64,
    /// Ordered list — matching is greedy first-fit in this order.
    #[serde(default)]
    pub required_stats: Vec<StatRequirement>,
    /// Target quantity, always ≥ 1.
    pub quantity: u32,
    /// Count of completed purchases toward `quantity`. Starts at 0.
    #[serde(default)]
    pub fulfilled: u32,
}

impl AcquisitionGoal {
    /// Whether this goal has reached its target quantity.
    pub fn is_complete(&self) -> bool {
        self.fulfilled >= self.quantity
    }

    /// Remaining purchases needed.
    pub fn remaining(&self) -> u32 {
        self.quantity.saturating_sub(self.fulfilled)
    }

    /// Helper to build a test goal with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        AcquisitionGoal {
            equipment: EquipmentFilter::Exact("weapon".to_string()),
            rarity: None,
            max_price: 100 * AMOUNT_SCALE,
            required_stats: vec![StatRequirement {
                stat: "crit-chance".to_string(),
                min_level: 3,
            }],
            quantity: 1,
            fulfilled: 0,
        }
    }
}

impl fmt::Display for AcquisitionGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats: Vec<String> =
            self.required_stats.iter().map(|r| r.to_string()).collect();
        write!(
            f,
            "{} ≤{} [{}] ({}/{})",
            self.equipment,
            format_amount(self.max_price),
            stats.join(", "),
            self.fulfilled,
            self.quantity,
        )
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Display tier for a stat roll's severity level.
///
/// Five tiers: levels ≥5, 4, 3, 2, and {1, 0 or missing} at the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeverityTier {
    C,
    B,
    A,
    S,
    SS,
}

impl SeverityTier {
    /// Map a raw severity level to its display tier.
    pub fn from_level(level: u8) -> Self {
        match level {
            l if l >= 5 => SeverityTier::SS,
            4 => SeverityTier::S,
            3 => SeverityTier::A,
            2 => SeverityTier::B,
            _ => SeverityTier::C,
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityTier::SS => write!(f, "SS"),
            SeverityTier::S => write!(f, "S"),
            SeverityTier::A => write!(f, "A"),
            SeverityTier::B => write!(f, "B"),
            SeverityTier::C => write!(f, "C"),
        }
    }
}

/// One stat roll on a listed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub stat: String,
    /// Severity level (0–5+). Higher is stronger.
    pub level: u8,
    /// Display magnitude of the roll.
    pub value: i64,
    /// Primary stats are fixed per equipment type and excluded from matching.
    #[serde(default)]
    pub primary: bool,
}

impl Stat {
    pub fn tier(&self) -> SeverityTier {
        SeverityTier::from_level(self.level)
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}({})", self.stat, self.tier(), self.level)
    }
}

/// One purchasable listing, ephemeral per page fetch.
///
/// A purchase targets `listing_id`; `equipment_id` identifies the
/// underlying item instance and is never submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedItem {
    pub listing_id: String,
    pub equipment_id: String,
    pub equipment_type: String,
    pub name: String,
    #[serde(default)]
    pub rarity: Option<String>,
    /// Asking price in nano units.
    pub price: u64,
    #[serde(default)]
    pub stats: Vec<Stat>,
}

impl ListedItem {
    /// Helper to build a test listing with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        ListedItem {
            listing_id: "lst-001".to_string(),
            equipment_id: "eq-9001".to_string(),
            equipment_type: "weapon".to_string(),
            name: "Dread Saber".to_string(),
            rarity: Some("epic".to_string()),
            price: 80 * AMOUNT_SCALE,
            stats: vec![
                Stat {
                    stat: "attack".to_string(),
                    level: 4,
                    value: 1200,
                    primary: true,
                },
                Stat {
                    stat: "crit-chance".to_string(),
                    level: 4,
                    value: 17,
                    primary: false,
                },
            ],
        }
    }
}

impl fmt::Display for ListedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} ({} stats)",
            self.name,
            self.equipment_type,
            format_amount(self.price),
            self.stats.len(),
        )
    }
}

/// Filter parameters for one listing-page fetch, derived from the
/// active goal: type/rarity filters, price ascending, and (when the
/// goal has stat requirements) the first required stat descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub equipment: Option<String>,
    pub rarity: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub sort_stat: Option<String>,
}

impl ListingQuery {
    /// Build the query for a goal at a given page cursor.
    pub fn for_goal(goal: &AcquisitionGoal, page: u32, page_size: u32) -> Self {
        ListingQuery {
            equipment: goal.equipment.exact().map(str::to_string),
            rarity: goal.rarity.clone(),
            page,
            page_size,
            sort_stat: goal.required_stats.first().map(|r| r.stat.clone()),
        }
    }
}

/// One fetched listing page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub items: Vec<ListedItem>,
    pub total: u64,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// An accepted item: the evaluation outcome handed to the purchase path.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub listing_id: String,
    pub name: String,
    /// Price in nano units.
    pub price: u64,
    /// The stats consumed by the goal's requirements, in requirement order.
    pub matched_stats: Vec<Stat>,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats: Vec<String> =
            self.matched_stats.iter().map(|s| s.to_string()).collect();
        write!(
            f,
            "{} @ {} [{}]",
            self.name,
            format_amount(self.price),
            stats.join(", "),
        )
    }
}

// ---------------------------------------------------------------------------
// Claimed listings
// ---------------------------------------------------------------------------

/// Process-lifetime set of listing ids already purchased or mid-purchase.
///
/// Entries are added before a purchase completes and never removed — the
/// marketplace never reuses a listing id, so a claimed id is permanently
/// out of consideration.
#[derive(Debug, Default)]
pub struct ClaimedIds {
    ids: HashSet<String>,
}

impl ClaimedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a listing id. Returns false if it was already claimed.
    pub fn claim(&mut self, listing_id: &str) -> bool {
        self.ids.insert(listing_id.to_string())
    }

    pub fn contains(&self, listing_id: &str) -> bool {
        self.ids.contains(listing_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Purchases & session outcome
// ---------------------------------------------------------------------------

/// Receipt returned by the marketplace for an accepted purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub order_id: String,
    pub listing_id: String,
    /// Price paid in nano units.
    pub price: u64,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for PurchaseReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} for {} [{}]",
            self.listing_id,
            format_amount(self.price),
            self.order_id,
        )
    }
}

/// Why a session aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The remote service rejected this many consecutive requests;
    /// the session needs an external restart.
    RateRejections(u32),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::RateRejections(n) => {
                write!(f, "{n} consecutive rate rejections")
            }
        }
    }
}

/// Terminal result of a scanning session. `Completed` is the deliberate
/// success stop; `Aborted` requires a supervisor restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Aborted(AbortReason),
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Completed => write!(f, "completed"),
            SessionOutcome::Aborted(r) => write!(f, "aborted: {r}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Startup-time errors. All variants are fatal: the session never begins.
#[derive(Debug, thiserror::Error)]
pub enum GearhoundError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Goal document error: {0}")]
    Goals(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
