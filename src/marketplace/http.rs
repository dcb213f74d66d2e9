//! HTTP marketplace client.
//!
//! Talks to the remote listing service over its JSON API and maps its
//! failure modes onto the `MarketError` signal taxonomy:
//! 401/403 → `AuthExpired`, 429 → `RateRejected`, 400 with a message on
//! a purchase → `Listing`, everything else → `Transient`.
//!
//! The service wraps payloads in a `{ "data": ... }` envelope and
//! expects browser-like headers alongside the bearer token, so the
//! client sends a fixed Origin/Referer set with a configurable
//! user agent.

use anyhow::Context;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{AuthToken, MarketError, Marketplace};
use crate::config::MarketplaceConfig;
use crate::types::{ListedItem, ListingPage, ListingQuery, PurchaseReceipt, Stat};
use async_trait::async_trait;

const MARKET_NAME: &str = "marketplace";

// ---------------------------------------------------------------------------
// API response types (service JSON → Rust)
// ---------------------------------------------------------------------------

/// Every endpoint wraps its payload in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireListingPage {
    #[serde(default)]
    items: Vec<WireListing>,
    #[serde(default)]
    total: u64,
}

/// One listing as returned by the search endpoint. Only the fields the
/// engine needs are deserialized.
#[derive(Debug, Deserialize)]
struct WireListing {
    id: String,
    equipment_id: String,
    equipment_type: String,
    name: String,
    #[serde(default)]
    rarity: Option<String>,
    price: u64,
    #[serde(default)]
    stats: Vec<WireStat>,
}

#[derive(Debug, Deserialize)]
struct WireStat {
    #[serde(rename = "type")]
    stat: String,
    level: u8,
    #[serde(default)]
    value: i64,
    #[serde(default)]
    is_primary: bool,
}

#[derive(Debug, Deserialize)]
struct WireOrder {
    order_id: String,
    listing_id: String,
    price: u64,
}

#[derive(Debug, Deserialize)]
struct WireTokenResponse {
    access_token: String,
}

impl From<WireListing> for ListedItem {
    fn from(w: WireListing) -> Self {
        ListedItem {
            listing_id: w.id,
            equipment_id: w.equipment_id,
            equipment_type: w.equipment_type,
            name: w.name,
            rarity: w.rarity,
            price: w.price,
            stats: w
                .stats
                .into_iter()
                .map(|s| Stat {
                    stat: s.stat,
                    level: s.level,
                    value: s.value,
                    primary: s.is_primary,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Marketplace client over the remote JSON API.
pub struct HttpMarketplace {
    http: Client,
    base_url: String,
    /// Current bearer token. Replaced in place on credential refresh.
    token: RwLock<Secret<String>>,
    /// Opaque refresh token presented to the auth endpoint.
    refresh_token: Secret<String>,
}

impl HttpMarketplace {
    /// Build a client from config, an initial access token, and the
    /// refresh secret resolved from the environment.
    pub fn new(
        cfg: &MarketplaceConfig,
        initial_token: Secret<String>,
        refresh_token: Secret<String>,
    ) -> anyhow::Result<Self> {
        let origin = reqwest::Url::parse(&cfg.base_url)
            .context("Invalid marketplace base URL")?
            .origin()
            .ascii_serialization();
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ORIGIN,
            origin.parse().context("Invalid Origin header")?,
        );
        headers.insert(
            reqwest::header::REFERER,
            format!("{origin}/").parse().context("Invalid Referer header")?,
        );

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client for marketplace")?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(initial_token),
            refresh_token,
        })
    }

    /// Build the search URL for a listing query: price ascending, and
    /// the goal's first required stat descending when present.
    fn search_url(&self, query: &ListingQuery) -> String {
        let mut url = format!(
            "{}/market/items?sort=price_asc&page={}&size={}",
            self.base_url, query.page, query.page_size,
        );
        if let Some(ref t) = query.equipment {
            url.push_str(&format!("&type={}", urlencoding::encode(t)));
        }
        if let Some(ref r) = query.rarity {
            url.push_str(&format!("&rarity={}", urlencoding::encode(r)));
        }
        if let Some(ref s) = query.sort_stat {
            url.push_str(&format!("&stat_sort={}_desc", urlencoding::encode(s)));
        }
        url
    }

    /// Map a non-success response to the engine's signal taxonomy.
    async fn map_error(resp: reqwest::Response, purchasing: bool) -> MarketError {
        let status = resp.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MarketError::AuthExpired,
            StatusCode::TOO_MANY_REQUESTS => MarketError::RateRejected,
            StatusCode::BAD_REQUEST if purchasing => {
                let message = resp
                    .json::<ApiErrorBody>()
                    .await
                    .map(|b| b.message)
                    .unwrap_or_default();
                MarketError::Listing(if message.is_empty() {
                    "listing unavailable".to_string()
                } else {
                    message
                })
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                MarketError::transient(anyhow::anyhow!(
                    "marketplace API error {status}: {body}"
                ))
            }
        }
    }

    async fn bearer(&self) -> String {
        format!("Bearer {}", self.token.read().await.expose_secret())
    }
}

#[async_trait]
impl Marketplace for HttpMarketplace {
    async fn fetch_listing_page(
        &self,
        query: &ListingQuery,
    ) -> Result<ListingPage, MarketError> {
        let url = self.search_url(query);
        debug!(url = %url, "Fetching listing page");

        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.bearer().await)
            .send()
            .await
            .map_err(MarketError::transient)?;

        if !resp.status().is_success() {
            return Err(Self::map_error(resp, false).await);
        }

        let page: Envelope<WireListingPage> = resp
            .json()
            .await
            .map_err(MarketError::transient)?;

        Ok(ListingPage {
            items: page.data.items.into_iter().map(Into::into).collect(),
            total: page.data.total,
        })
    }

    async fn submit_purchase(
        &self,
        listing_id: &str,
    ) -> Result<PurchaseReceipt, MarketError> {
        let url = format!(
            "{}/market/buy/{}",
            self.base_url,
            urlencoding::encode(listing_id),
        );
        debug!(listing_id, "Submitting purchase");

        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.bearer().await)
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(MarketError::transient)?;

        if !resp.status().is_success() {
            return Err(Self::map_error(resp, true).await);
        }

        let order: Envelope<WireOrder> = resp
            .json()
            .await
            .map_err(MarketError::transient)?;

        Ok(PurchaseReceipt {
            order_id: order.data.order_id,
            listing_id: order.data.listing_id,
            price: order.data.price,
            timestamp: Utc::now(),
        })
    }

    async fn refresh_credentials(&self) -> Result<AuthToken, MarketError> {
        let url = format!("{}/auth/refresh", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("X-Refresh-Token", self.refresh_token.expose_secret().clone())
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(MarketError::transient)?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, "Credential refresh rejected");
            let body = resp.text().await.unwrap_or_default();
            return Err(MarketError::transient(anyhow::anyhow!(
                "credential refresh failed ({status}): {body}"
            )));
        }

        let token: Envelope<WireTokenResponse> = resp
            .json()
            .await
            .map_err(MarketError::transient)?;

        let fresh = Secret::new(token.data.access_token);
        *self.token.write().await = fresh.clone();
        Ok(fresh)
    }

    fn name(&self) -> &str {
        MARKET_NAME
    }
}
