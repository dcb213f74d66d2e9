//! Purchase execution.
//!
//! One matched listing, a bounded number of submission attempts.
//! Transient transport failures are retried after a fixed delay;
//! a listing rejection means someone else got there first and is
//! reported as a miss, not an error. Auth and rate signals are the
//! session's business and propagate unchanged.

use std::time::Duration;
use tracing::{info, warn};

use crate::config::PurchaseSection;
use crate::marketplace::{MarketError, Marketplace};
use crate::types::format_amount;

pub struct PurchaseExecutor {
    cfg: PurchaseSection,
}

impl PurchaseExecutor {
    pub fn new(cfg: PurchaseSection) -> Self {
        Self { cfg }
    }

    /// Attempt to buy a listing. Returns `Ok(true)` on a confirmed
    /// purchase, `Ok(false)` when the listing was lost or attempts ran
    /// out, and `Err` only for signals the session must handle.
    pub async fn purchase<M: Marketplace + ?Sized>(
        &self,
        market: &M,
        listing_id: &str,
    ) -> Result<bool, MarketError> {
        for attempt in 1..=self.cfg.max_attempts {
            match market.submit_purchase(listing_id).await {
                Ok(receipt) => {
                    info!(
                        listing_id,
                        order_id = %receipt.order_id,
                        price = %format_amount(receipt.price),
                        "Purchase confirmed"
                    );
                    return Ok(true);
                }
                Err(MarketError::Listing(reason)) => {
                    // Sold or delisted under us. Not worth retrying.
                    warn!(listing_id, %reason, "Listing lost");
                    return Ok(false);
                }
                Err(err @ (MarketError::AuthExpired | MarketError::RateRejected)) => {
                    return Err(err);
                }
                Err(MarketError::Transient(err)) => {
                    warn!(
                        listing_id,
                        attempt,
                        max_attempts = self.cfg.max_attempts,
                        error = %err,
                        "Purchase attempt failed"
                    );
                    if attempt < self.cfg.max_attempts {
                        tokio::time::sleep(Duration::from_secs(self.cfg.retry_delay_secs)).await;
                    }
                }
            }
        }
        warn!(listing_id, "Purchase attempts exhausted");
        Ok(false)
    }
}
