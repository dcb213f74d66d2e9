//! Session orchestration.
//!
//! `SessionEngine` owns the scan loop: admit through the rate gate,
//! fetch the traversal's current page for the active goal, evaluate
//! each unclaimed listing, buy matches, and advance the walk. The loop
//! runs until every goal is complete or repeated remote rate
//! rejections force an abort.
//!
//! Error recovery is signal-driven. Expired credentials trigger a
//! refresh (with a long cooldown after repeated expiries), remote rate
//! rejections back off and eventually abort, transient transport
//! failures just wait and retry. Consecutive-failure counters reset on
//! any successful request.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::engine::goals::GoalTracker;
use crate::engine::matcher;
use crate::engine::purchaser::PurchaseExecutor;
use crate::engine::rate::RateGate;
use crate::engine::traversal::PageTraversal;
use crate::marketplace::{MarketError, Marketplace};
use crate::types::{
    format_amount, AbortReason, AcquisitionGoal, ClaimedIds, ListedItem, ListingQuery,
    SessionOutcome,
};

pub struct SessionEngine<M: Marketplace> {
    market: M,
    cfg: AppConfig,
    goals: GoalTracker,
    traversal: PageTraversal,
    gate: RateGate,
    purchaser: PurchaseExecutor,
    claimed: ClaimedIds,
    /// Jitter source for inter-request delays.
    rng: StdRng,
    consecutive_auth_expiries: u32,
    consecutive_rate_rejections: u32,
}

impl<M: Marketplace> SessionEngine<M> {
    pub fn new(market: M, cfg: AppConfig, goals: Vec<AcquisitionGoal>) -> Self {
        let (walk_rng, jitter_rng) = match cfg.session.seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (StdRng::from_entropy(), StdRng::from_entropy()),
        };

        let traversal = PageTraversal::new(cfg.traversal.clone(), walk_rng, Instant::now());
        let gate = RateGate::new(&cfg.rate);
        let purchaser = PurchaseExecutor::new(cfg.purchase.clone());

        Self {
            market,
            cfg,
            goals: GoalTracker::new(goals),
            traversal,
            gate,
            purchaser,
            claimed: ClaimedIds::new(),
            rng: jitter_rng,
            consecutive_auth_expiries: 0,
            consecutive_rate_rejections: 0,
        }
    }

    /// Drive the scan loop to a terminal state.
    pub async fn run(&mut self) -> Result<SessionOutcome> {
        info!(
            market = self.market.name(),
            goals = self.goals.goals().len(),
            "Session starting"
        );

        loop {
            let goal = match self.goals.current() {
                Some(g) => g.clone(),
                None => {
                    info!(
                        purchases = self.goals.total_fulfilled(),
                        "All goals complete"
                    );
                    return Ok(SessionOutcome::Completed);
                }
            };

            self.gate.admit().await;

            let page_no = self.traversal.current_page();
            let query = ListingQuery::for_goal(&goal, page_no, self.cfg.marketplace.page_size);

            match self.market.fetch_listing_page(&query).await {
                Ok(page) => {
                    self.consecutive_auth_expiries = 0;
                    self.consecutive_rate_rejections = 0;
                    let item_count = page.items.len();
                    debug!(
                        page = page_no,
                        items = item_count,
                        total = page.total,
                        goal = self.goals.cursor(),
                        "Scanned page"
                    );

                    match self.scan_items(&goal, page.items).await {
                        Ok(goal_finished) => {
                            if goal_finished {
                                // New goal means a new listing ordering;
                                // restart the walk and the pacing window.
                                // Claims survive across goals.
                                self.traversal.reset(Instant::now());
                                self.gate.reset();
                            } else {
                                self.traversal.on_page_result(item_count, Instant::now());
                            }
                        }
                        Err(err) => {
                            if let Some(outcome) = self.handle_signal(err).await {
                                return Ok(outcome);
                            }
                        }
                    }
                }
                Err(err) => {
                    if let Some(outcome) = self.handle_signal(err).await {
                        return Ok(outcome);
                    }
                }
            }

            self.pause_between_requests().await;
        }
    }

    /// Evaluate one page of listings against the active goal, buying
    /// matches as they are found. Returns true when the purchase
    /// completed the goal; the remainder of the page is left for the
    /// next goal's own scan.
    async fn scan_items(
        &mut self,
        goal: &AcquisitionGoal,
        items: Vec<ListedItem>,
    ) -> Result<bool, MarketError> {
        for item in items {
            if self.claimed.contains(&item.listing_id) {
                continue;
            }
            let Some(m) = matcher::evaluate(&item, goal) else {
                continue;
            };
            // Claim before attempting so a lost purchase is never retried.
            if !self.claimed.claim(&item.listing_id) {
                continue;
            }

            info!(
                name = %m.name,
                listing_id = %m.listing_id,
                price = %format_amount(m.price),
                stats = ?m.matched_stats.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Match found"
            );

            let bought = self.purchaser.purchase(&self.market, &item.listing_id).await?;
            if bought && self.goals.record_fulfilled() {
                self.goals.advance();
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// React to an error signal. Returns a terminal outcome when the
    /// session cannot continue.
    async fn handle_signal(&mut self, err: MarketError) -> Option<SessionOutcome> {
        match err {
            MarketError::AuthExpired => {
                self.consecutive_auth_expiries += 1;
                warn!(
                    consecutive = self.consecutive_auth_expiries,
                    "Authentication expired"
                );
                if self.consecutive_auth_expiries >= self.cfg.session.max_auth_expiries {
                    warn!(
                        cooldown_secs = self.cfg.session.auth_cooldown_secs,
                        "Repeated expiry right after refresh, cooling down"
                    );
                    tokio::time::sleep(Duration::from_secs(self.cfg.session.auth_cooldown_secs))
                        .await;
                    self.consecutive_auth_expiries = 0;
                }
                match self.market.refresh_credentials().await {
                    Ok(_) => info!("Credentials refreshed"),
                    Err(refresh_err) => {
                        warn!(error = %refresh_err, "Credential refresh failed, backing off");
                        tokio::time::sleep(Duration::from_secs(
                            self.cfg.session.transient_backoff_secs,
                        ))
                        .await;
                    }
                }
                None
            }
            MarketError::RateRejected => {
                self.consecutive_rate_rejections += 1;
                warn!(
                    consecutive = self.consecutive_rate_rejections,
                    limit = self.cfg.session.max_rate_rejections,
                    "Remote rate rejection"
                );
                if self.consecutive_rate_rejections >= self.cfg.session.max_rate_rejections {
                    error!("Persistent remote rate rejections, aborting session");
                    return Some(SessionOutcome::Aborted(AbortReason::RateRejections(
                        self.consecutive_rate_rejections,
                    )));
                }
                // Our window is clearly out of sync with the remote one.
                self.gate.reset();
                tokio::time::sleep(Duration::from_secs(self.cfg.session.rate_backoff_secs)).await;
                None
            }
            MarketError::Listing(reason) => {
                // Purchase paths absorb this signal; seeing it here
                // means a fetch produced it, which is unexpected but
                // harmless.
                warn!(%reason, "Listing rejection outside a purchase");
                None
            }
            MarketError::Transient(err) => {
                warn!(error = %err, "Transient failure, backing off");
                tokio::time::sleep(Duration::from_secs(self.cfg.session.transient_backoff_secs))
                    .await;
                None
            }
        }
    }

    /// Sleep a uniformly jittered delay between requests.
    async fn pause_between_requests(&mut self) {
        let secs = self.rng.gen_range(
            self.cfg.session.request_delay_min_secs..=self.cfg.session.request_delay_max_secs,
        );
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }
}
