//! End-to-end session scenarios.
//!
//! Drives a full `SessionEngine` against the scripted mock marketplace
//! under paused tokio time, so backoffs and pacing delays cost nothing
//! and every run is deterministic.

use gearhound::config::{
    self, AppConfig, MarketplaceConfig, PurchaseSection, RateSection, SessionConfig,
    TraversalSection,
};
use gearhound::engine::SessionEngine;
use gearhound::marketplace::MarketError;
use gearhound::types::{AbortReason, AcquisitionGoal, SessionOutcome, AMOUNT_SCALE};

use crate::mock_marketplace::{listing, MockMarketplace};

fn app_config(seed: u64) -> AppConfig {
    AppConfig {
        session: SessionConfig {
            name: "sim".to_string(),
            currency: "TOK".to_string(),
            goals_path: "goals.toml".to_string(),
            request_delay_min_secs: 1.0,
            request_delay_max_secs: 3.0,
            transient_backoff_secs: 5,
            rate_backoff_secs: 10,
            auth_cooldown_secs: 60,
            max_auth_expiries: 3,
            max_rate_rejections: 5,
            seed: Some(seed),
        },
        marketplace: MarketplaceConfig {
            base_url: "https://mock.example.com".to_string(),
            page_size: 20,
            timeout_secs: 20,
            user_agent: "sim".to_string(),
            refresh_token_env: "GEARHOUND_REFRESH_TOKEN".to_string(),
        },
        traversal: TraversalSection {
            page_horizon: 10,
            empty_page_flip_threshold: 3,
            backtrack_min: 1,
            backtrack_max: 3,
            flip_after_min_secs: 600,
            flip_after_max_secs: 1200,
        },
        rate: RateSection {
            max_requests: 30,
            window_secs: 60,
            safety_margin_ms: 250,
        },
        purchase: PurchaseSection {
            max_attempts: 3,
            retry_delay_secs: 2,
        },
    }
}

fn weapon_goals(document: &str) -> Vec<AcquisitionGoal> {
    config::parse_goals(document).unwrap()
}

const ONE_WEAPON: &str = r#"
    [[goals]]
    equipment = "weapon"
    max_price = 100.0

    [[goals.stats]]
    stat = "crit-chance"
    min_level = 3
"#;

#[tokio::test(start_paused = true)]
async fn test_single_goal_completes_among_decoys() {
    let market = MockMarketplace::new("sim").with_page(
        1,
        vec![
            // Too expensive.
            listing("lst-dear", "weapon", 150 * AMOUNT_SCALE, &[("crit-chance", 5, false)]),
            // Wrong equipment type.
            listing("lst-helm", "helmet", 20 * AMOUNT_SCALE, &[("crit-chance", 4, false)]),
            // Stat level below the bar.
            listing("lst-weak", "weapon", 50 * AMOUNT_SCALE, &[("crit-chance", 2, false)]),
            // Right stat but primary, so it does not count.
            listing("lst-prim", "weapon", 50 * AMOUNT_SCALE, &[("crit-chance", 5, true)]),
            // The one that qualifies.
            listing("lst-good", "weapon", 80 * AMOUNT_SCALE, &[("crit-chance", 4, false)]),
        ],
    );

    let mut engine = SessionEngine::new(market.clone(), app_config(1), weapon_goals(ONE_WEAPON));
    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    let receipts = market.receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].listing_id, "lst-good");
}

#[tokio::test(start_paused = true)]
async fn test_walk_reaches_match_past_empty_page() {
    let market = MockMarketplace::new("sim")
        .with_page(1, vec![])
        .with_page(2, vec![listing("lst-good", "weapon", 80 * AMOUNT_SCALE, &[("crit-chance", 3, false)])]);

    let mut engine = SessionEngine::new(market.clone(), app_config(2), weapon_goals(ONE_WEAPON));
    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    assert!(market.fetch_count() >= 2);
    assert_eq!(market.receipts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_quantity_goal_buys_across_pages() {
    let goals = weapon_goals(
        r#"
        [[goals]]
        equipment = "weapon"
        max_price = 100.0
        quantity = 2

        [[goals.stats]]
        stat = "crit-chance"
        min_level = 3
    "#,
    );
    let market = MockMarketplace::new("sim")
        .with_page(1, vec![listing("lst-a", "weapon", 70 * AMOUNT_SCALE, &[("crit-chance", 3, false)])])
        .with_page(2, vec![listing("lst-b", "weapon", 90 * AMOUNT_SCALE, &[("crit-chance", 4, false)])]);

    let mut engine = SessionEngine::new(market.clone(), app_config(3), goals);
    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    let mut bought: Vec<String> = market
        .receipts()
        .into_iter()
        .map(|r| r.listing_id)
        .collect();
    bought.sort();
    assert_eq!(bought, vec!["lst-a".to_string(), "lst-b".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_lost_listing_falls_back_to_alternative() {
    let market = MockMarketplace::new("sim").with_page(
        1,
        vec![
            listing("lst-lost", "weapon", 60 * AMOUNT_SCALE, &[("crit-chance", 4, false)]),
            listing("lst-alt", "weapon", 80 * AMOUNT_SCALE, &[("crit-chance", 3, false)]),
        ],
    );
    market.set_lost("lst-lost");

    let mut engine = SessionEngine::new(market.clone(), app_config(4), weapon_goals(ONE_WEAPON));
    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    let receipts = market.receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].listing_id, "lst-alt");
}

#[tokio::test(start_paused = true)]
async fn test_three_empty_pages_turn_the_walk_around() {
    // No pages scripted: every fetch comes back empty. After the third
    // consecutive empty page the walk must move backward. The session
    // is then cut off with rate rejections so the run terminates.
    let market = MockMarketplace::new("sim");
    market.fail_after(8);

    let mut engine = SessionEngine::new(market.clone(), app_config(8), weapon_goals(ONE_WEAPON));
    let outcome = engine.run().await.unwrap();

    assert_eq!(
        outcome,
        SessionOutcome::Aborted(AbortReason::RateRejections(5))
    );
    let pages = market.pages_fetched();
    // Forward to page 3, then the empty streak flips the walk back.
    assert_eq!(&pages[..4], &[1, 2, 3, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_rate_rejections_abort_session() {
    let market = MockMarketplace::new("sim")
        .with_page(1, vec![listing("lst-good", "weapon", 80 * AMOUNT_SCALE, &[("crit-chance", 4, false)])]);
    for _ in 0..5 {
        market.push_fetch_error(MarketError::RateRejected);
    }

    let mut engine = SessionEngine::new(market.clone(), app_config(5), weapon_goals(ONE_WEAPON));
    let outcome = engine.run().await.unwrap();

    assert_eq!(
        outcome,
        SessionOutcome::Aborted(AbortReason::RateRejections(5))
    );
    assert!(market.receipts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover_in_place() {
    let market = MockMarketplace::new("sim")
        .with_page(1, vec![listing("lst-good", "weapon", 80 * AMOUNT_SCALE, &[("crit-chance", 4, false)])]);
    market.push_fetch_error(MarketError::transient(anyhow::anyhow!("connection reset")));
    market.push_fetch_error(MarketError::transient(anyhow::anyhow!("read timed out")));

    let mut engine = SessionEngine::new(market.clone(), app_config(9), weapon_goals(ONE_WEAPON));
    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    // Both failed cycles re-fetched page 1; nothing was skipped.
    assert_eq!(market.pages_fetched(), vec![1, 1, 1]);
    assert_eq!(market.receipts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auth_expiry_recovers_and_completes() {
    let market = MockMarketplace::new("sim")
        .with_page(1, vec![listing("lst-good", "weapon", 80 * AMOUNT_SCALE, &[("crit-chance", 4, false)])]);
    market.push_fetch_error(MarketError::AuthExpired);

    let mut engine = SessionEngine::new(market.clone(), app_config(6), weapon_goals(ONE_WEAPON));
    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(market.refresh_count(), 1);
    assert_eq!(market.receipts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_goals_in_order() {
    let goals = weapon_goals(
        r#"
        [[goals]]
        equipment = "weapon"
        max_price = 100.0

        [[goals.stats]]
        stat = "crit-chance"
        min_level = 3

        [[goals]]
        equipment = "helmet"
        max_price = 50.0

        [[goals.stats]]
        stat = "hp"
        min_level = 2
    "#,
    );
    let market = MockMarketplace::new("sim").with_page(
        1,
        vec![
            listing("lst-w", "weapon", 80 * AMOUNT_SCALE, &[("crit-chance", 4, false)]),
            listing("lst-h", "helmet", 30 * AMOUNT_SCALE, &[("hp", 3, false)]),
        ],
    );

    let mut engine = SessionEngine::new(market.clone(), app_config(7), goals);
    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    let bought: Vec<String> = market
        .receipts()
        .into_iter()
        .map(|r| r.listing_id)
        .collect();
    assert_eq!(bought, vec!["lst-w".to_string(), "lst-h".to_string()]);
}
