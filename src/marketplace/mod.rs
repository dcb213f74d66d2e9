//! Marketplace integration.
//!
//! Defines the `Marketplace` trait — the seam between the scanning
//! engine and the remote listing service — plus the error signal
//! taxonomy the engine interprets. The HTTP implementation lives in
//! `http`; tests substitute deterministic in-memory implementations.

pub mod http;

use async_trait::async_trait;
use secrecy::Secret;

use crate::types::{ListingPage, ListingQuery, PurchaseReceipt};

/// Opaque bearer token returned by credential refresh. Wrapped so the
/// value never appears in logs or debug output.
pub type AuthToken = Secret<String>;

/// Error signals a marketplace operation can produce. The engine's
/// recovery policy differs per variant, so transports must map their
/// failures onto exactly one of these.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// The session token is no longer accepted. Recoverable: the engine
    /// refreshes credentials and retries.
    #[error("authentication expired")]
    AuthExpired,

    /// The remote service rejected the request for sending too fast
    /// (distinct from our own proactive RateGate throttling).
    #[error("request rejected by remote rate limiting")]
    RateRejected,

    /// The marketplace refused this specific listing (already sold,
    /// delisted, invalid). Non-retryable; treated as a normal miss.
    #[error("listing rejected: {0}")]
    Listing(String),

    /// Network/transport-level failure. Retryable.
    #[error("transient transport failure: {0}")]
    Transient(anyhow::Error),
}

impl MarketError {
    /// Shorthand for wrapping any error as a transient failure.
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        MarketError::Transient(err.into())
    }
}

/// Abstraction over the remote marketplace service.
///
/// Implementors provide listing-page fetches, purchase submission, and
/// credential refresh. The engine never sees transport details — only
/// the `MarketError` signal taxonomy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Fetch one listing page for the given filter parameters.
    async fn fetch_listing_page(
        &self,
        query: &ListingQuery,
    ) -> Result<ListingPage, MarketError>;

    /// Submit a purchase for a listing id. Targets the listing, never
    /// the underlying equipment id.
    async fn submit_purchase(
        &self,
        listing_id: &str,
    ) -> Result<PurchaseReceipt, MarketError>;

    /// Obtain a fresh auth token, replacing the one used for
    /// subsequent requests. Invoked by the engine on `AuthExpired`.
    async fn refresh_credentials(&self) -> Result<AuthToken, MarketError>;

    /// Marketplace name for logging and identification.
    fn name(&self) -> &str;
}
