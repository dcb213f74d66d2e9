//! GEARHOUND — Autonomous Marketplace Acquisition Agent
//!
//! Entry point. Loads configuration and the goal document, initialises
//! structured logging, builds the HTTP marketplace client, and runs the
//! scan→match→buy loop with graceful shutdown.

use anyhow::{bail, Context, Result};
use secrecy::Secret;
use tracing::{error, info};

use gearhound::config::{self, AppConfig};
use gearhound::engine::SessionEngine;
use gearhound::marketplace::http::HttpMarketplace;
use gearhound::types::{format_amount, SessionOutcome};

const BANNER: &str = r#"
  ____ _____    _    ____  _   _  ___  _   _ _   _ ____
 / ___| ____|  / \  |  _ \| | | |/ _ \| | | | \ | |  _ \
| |  _|  _|   / _ \ | |_) | |_| | | | | | | |  \| | | | |
| |_| | |___ / ___ \|  _ <|  _  | |_| | |_| | |\  | |_| |
 \____|_____/_/   \_\_| \_\_| |_|\___/ \___/|_| \_|____/

  Goal-driven Equipment Acquisition Agent
  v0.1.0 — Autonomous Session
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging(&cfg);

    // Print startup banner
    println!("{BANNER}");
    info!(
        session_name = %cfg.session.name,
        currency = %cfg.session.currency,
        page_horizon = cfg.traversal.page_horizon,
        rate_limit = cfg.rate.max_requests,
        window_secs = cfg.rate.window_secs,
        "GEARHOUND starting up"
    );

    // -- Goal document ----------------------------------------------------

    let goals = config::load_goals(&cfg.session.goals_path)?;
    for (idx, goal) in goals.iter().enumerate() {
        info!(
            index = idx,
            goal = %goal,
            max_price = %format_amount(goal.max_price),
            "Goal loaded"
        );
    }

    // -- Marketplace client -----------------------------------------------

    let refresh_token = AppConfig::resolve_secret(&cfg.marketplace.refresh_token_env)?;
    let initial_token = std::env::var("GEARHOUND_ACCESS_TOKEN")
        .ok()
        .map(Secret::new);
    let has_initial = initial_token.is_some();

    let market = HttpMarketplace::new(
        &cfg.marketplace,
        initial_token.unwrap_or_else(|| Secret::new(String::new())),
        refresh_token,
    )?;

    if !has_initial {
        use gearhound::marketplace::Marketplace;
        market
            .refresh_credentials()
            .await
            .context("Initial credential refresh failed")?;
        info!("Obtained access token via credential refresh");
    }

    // -- Session ----------------------------------------------------------

    let mut engine = SessionEngine::new(market, cfg, goals);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering scan loop. Press Ctrl+C to stop.");

    tokio::select! {
        outcome = engine.run() => match outcome? {
            SessionOutcome::Completed => {
                info!("GEARHOUND shut down cleanly: all goals complete.");
            }
            SessionOutcome::Aborted(reason) => {
                error!(%reason, "GEARHOUND aborted");
                bail!("session aborted: {reason}");
            }
        },
        _ = &mut shutdown => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gearhound=info"));

    let json_logging = std::env::var("GEARHOUND_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    let _ = cfg;
}
