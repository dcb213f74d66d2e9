//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the credential-refresh token) are referenced by env-var name
//! in the config and resolved at runtime via `std::env::var`.
//!
//! The goal document lives in its own TOML file (ordered `[[goals]]`
//! records) and is validated here; a malformed or empty document is
//! fatal at startup — the session never begins.

use anyhow::{Context, Result};
use secrecy::Secret;
use serde::Deserialize;
use std::fs;

use crate::types::{to_nano, AcquisitionGoal, EquipmentFilter, GearhoundError, StatRequirement};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub marketplace: MarketplaceConfig,
    pub traversal: TraversalSection,
    pub rate: RateSection,
    pub purchase: PurchaseSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub name: String,
    pub currency: String,
    pub goals_path: String,
    /// Inter-request delay is drawn uniformly from [min, max] seconds.
    pub request_delay_min_secs: f64,
    pub request_delay_max_secs: f64,
    #[serde(default = "default_transient_backoff")]
    pub transient_backoff_secs: u64,
    #[serde(default = "default_rate_backoff")]
    pub rate_backoff_secs: u64,
    #[serde(default = "default_auth_cooldown")]
    pub auth_cooldown_secs: u64,
    #[serde(default = "default_max_auth_expiries")]
    pub max_auth_expiries: u32,
    #[serde(default = "default_max_rate_rejections")]
    pub max_rate_rejections: u32,
    /// Fix the random walk and delay jitter for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketplaceConfig {
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Env var holding the opaque refresh token for credential renewal.
    pub refresh_token_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TraversalSection {
    pub page_horizon: u32,
    #[serde(default = "default_empty_flip_threshold")]
    pub empty_page_flip_threshold: u32,
    #[serde(default = "default_backtrack_min")]
    pub backtrack_min: u32,
    #[serde(default = "default_backtrack_max")]
    pub backtrack_max: u32,
    #[serde(default = "default_flip_after_min")]
    pub flip_after_min_secs: u64,
    #[serde(default = "default_flip_after_max")]
    pub flip_after_max_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateSection {
    pub max_requests: u32,
    pub window_secs: u64,
    #[serde(default = "default_safety_margin_ms")]
    pub safety_margin_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PurchaseSection {
    #[serde(default = "default_purchase_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_purchase_retry_secs")]
    pub retry_delay_secs: u64,
}

fn default_transient_backoff() -> u64 {
    30
}
fn default_rate_backoff() -> u64 {
    60
}
fn default_auth_cooldown() -> u64 {
    1800
}
fn default_max_auth_expiries() -> u32 {
    3
}
fn default_max_rate_rejections() -> u32 {
    5
}
fn default_page_size() -> u32 {
    20
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_empty_flip_threshold() -> u32 {
    3
}
fn default_backtrack_min() -> u32 {
    1
}
fn default_backtrack_max() -> u32 {
    3
}
fn default_flip_after_min() -> u64 {
    60
}
fn default_flip_after_max() -> u64 {
    1200
}
fn default_safety_margin_ms() -> u64 {
    250
}
fn default_purchase_attempts() -> u32 {
    3
}
fn default_purchase_retry_secs() -> u64 {
    5
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.traversal.page_horizon < 1 {
            return Err(GearhoundError::Config(
                "traversal.page_horizon must be >= 1".to_string(),
            )
            .into());
        }
        if self.traversal.backtrack_min < 1
            || self.traversal.backtrack_max < self.traversal.backtrack_min
        {
            return Err(GearhoundError::Config(
                "traversal backtrack range must satisfy 1 <= min <= max".to_string(),
            )
            .into());
        }
        if self.rate.max_requests == 0 || self.rate.window_secs == 0 {
            return Err(GearhoundError::Config(
                "rate.max_requests and rate.window_secs must be >= 1".to_string(),
            )
            .into());
        }
        if self.session.request_delay_min_secs < 0.0
            || self.session.request_delay_max_secs < self.session.request_delay_min_secs
        {
            return Err(GearhoundError::Config(
                "session request delay range must satisfy 0 <= min <= max".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value, wrapped so the
    /// secret never appears in logs.
    pub fn resolve_secret(env_name: &str) -> Result<Secret<String>> {
        std::env::var(env_name)
            .map(Secret::new)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

// ---------------------------------------------------------------------------
// Goal document
// ---------------------------------------------------------------------------

/// On-disk shape of the goal document.
#[derive(Debug, Deserialize)]
struct GoalsDocument {
    #[serde(default)]
    goals: Vec<GoalRecord>,
}

/// One goal record as written by the operator. `max_price` is given in
/// display units and converted to nano units at load.
#[derive(Debug, Deserialize)]
struct GoalRecord {
    equipment: String,
    #[serde(default)]
    rarity: Option<String>,
    max_price: f64,
    #[serde(default)]
    stats: Vec<StatRecord>,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct StatRecord {
    stat: String,
    min_level: u8,
}

fn default_quantity() -> u32 {
    1
}

/// Load and validate the ordered goal list from a TOML document.
pub fn load_goals(path: &str) -> Result<Vec<AcquisitionGoal>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read goal document: {path}"))?;
    parse_goals(&contents)
}

/// Parse a goal document from its TOML text. Split out from `load_goals`
/// so tests can feed documents without touching the filesystem.
pub fn parse_goals(contents: &str) -> Result<Vec<AcquisitionGoal>> {
    let doc: GoalsDocument =
        toml::from_str(contents).context("Failed to parse goal document")?;

    if doc.goals.is_empty() {
        return Err(GearhoundError::Goals("no goals defined".to_string()).into());
    }

    let mut goals = Vec::with_capacity(doc.goals.len());
    for (idx, record) in doc.goals.into_iter().enumerate() {
        if record.quantity < 1 {
            return Err(GearhoundError::Goals(format!(
                "goal #{idx}: quantity must be >= 1"
            ))
            .into());
        }
        if record.max_price <= 0.0 {
            return Err(GearhoundError::Goals(format!(
                "goal #{idx}: max_price must be positive"
            ))
            .into());
        }
        for (s_idx, stat) in record.stats.iter().enumerate() {
            if stat.stat.trim().is_empty() {
                return Err(GearhoundError::Goals(format!(
                    "goal #{idx}: stat #{s_idx} has an empty name"
                ))
                .into());
            }
        }

        goals.push(AcquisitionGoal {
            equipment: EquipmentFilter::from(record.equipment),
            rarity: record.rarity,
            max_price: to_nano(record.max_price),
            required_stats: record
                .stats
                .into_iter()
                .map(|s| StatRequirement {
                    stat: s.stat,
                    min_level: s.min_level,
                })
                .collect(),
            quantity: record.quantity,
            fulfilled: 0,
        });
    }

    Ok(goals)
}
