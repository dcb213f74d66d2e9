//! Mock marketplace for integration testing.
//!
//! Provides a deterministic `Marketplace` implementation serving
//! scripted listing pages, accepting purchases, and injecting error
//! signals on demand — all in-memory with no external dependencies.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::Secret;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use gearhound::marketplace::{AuthToken, MarketError, Marketplace};
use gearhound::types::{ListedItem, ListingPage, ListingQuery, PurchaseReceipt, Stat};

/// A mock marketplace for deterministic testing.
///
/// All state is in-memory behind a shared handle, so a test can keep a
/// clone for assertions while the engine owns another.
#[derive(Clone)]
pub struct MockMarketplace {
    name: String,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    /// Listings served per page number. Purchased items are removed.
    pages: HashMap<u32, Vec<ListedItem>>,
    /// Listing ids whose purchase fails as lost to another buyer.
    lost: HashSet<String>,
    /// Error signals consumed one per fetch, ahead of page data.
    fetch_errors: VecDeque<MarketError>,
    /// Every fetch rejects with `RateRejected` once this many succeeded.
    fail_after: Option<u32>,
    receipts: Vec<PurchaseReceipt>,
    /// Page number of every fetch, in order.
    page_log: Vec<u32>,
    fetch_count: u32,
    refresh_count: u32,
}

impl MockMarketplace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(Inner {
                pages: HashMap::new(),
                lost: HashSet::new(),
                fetch_errors: VecDeque::new(),
                fail_after: None,
                receipts: Vec::new(),
                page_log: Vec::new(),
                fetch_count: 0,
                refresh_count: 0,
            })),
        }
    }

    pub fn with_page(self, page: u32, items: Vec<ListedItem>) -> Self {
        self.inner.lock().unwrap().pages.insert(page, items);
        self
    }

    /// Mark a listing as lost: its purchase will be rejected.
    pub fn set_lost(&self, listing_id: &str) {
        self.inner.lock().unwrap().lost.insert(listing_id.to_string());
    }

    /// Queue an error to be returned by upcoming fetches, oldest first.
    pub fn push_fetch_error(&self, err: MarketError) {
        self.inner.lock().unwrap().fetch_errors.push_back(err);
    }

    /// Reject every fetch beyond the first `count` with `RateRejected`.
    pub fn fail_after(&self, count: u32) {
        self.inner.lock().unwrap().fail_after = Some(count);
    }

    pub fn receipts(&self) -> Vec<PurchaseReceipt> {
        self.inner.lock().unwrap().receipts.clone()
    }

    /// Page numbers requested so far, in fetch order.
    pub fn pages_fetched(&self) -> Vec<u32> {
        self.inner.lock().unwrap().page_log.clone()
    }

    pub fn fetch_count(&self) -> u32 {
        self.inner.lock().unwrap().fetch_count
    }

    pub fn refresh_count(&self) -> u32 {
        self.inner.lock().unwrap().refresh_count
    }
}

/// Build a listing with the given substats, each `(name, level, primary)`.
pub fn listing(
    listing_id: &str,
    equipment_type: &str,
    price: u64,
    stats: &[(&str, u8, bool)],
) -> ListedItem {
    ListedItem {
        listing_id: listing_id.to_string(),
        equipment_id: format!("eq-{listing_id}"),
        equipment_type: equipment_type.to_string(),
        name: format!("Mock {equipment_type}"),
        rarity: None,
        price,
        stats: stats
            .iter()
            .map(|&(stat, level, primary)| Stat {
                stat: stat.to_string(),
                level,
                value: i64::from(level) * 50,
                primary,
            })
            .collect(),
    }
}

#[async_trait]
impl Marketplace for MockMarketplace {
    async fn fetch_listing_page(
        &self,
        query: &ListingQuery,
    ) -> Result<ListingPage, MarketError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_count += 1;
        // Failed fetches are logged too: retry-in-place is observable.
        inner.page_log.push(query.page);
        if let Some(err) = inner.fetch_errors.pop_front() {
            return Err(err);
        }
        if let Some(limit) = inner.fail_after {
            if inner.fetch_count > limit {
                return Err(MarketError::RateRejected);
            }
        }

        let items: Vec<ListedItem> = inner
            .pages
            .get(&query.page)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|item| {
                query
                    .equipment
                    .as_deref()
                    .map_or(true, |t| item.equipment_type == t)
            })
            .filter(|item| {
                query
                    .rarity
                    .as_deref()
                    .map_or(true, |r| item.rarity.as_deref() == Some(r))
            })
            .collect();
        let total = inner.pages.values().map(Vec::len).sum::<usize>() as u64;

        Ok(ListingPage { items, total })
    }

    async fn submit_purchase(
        &self,
        listing_id: &str,
    ) -> Result<PurchaseReceipt, MarketError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.lost.contains(listing_id) {
            return Err(MarketError::Listing("item already sold".to_string()));
        }

        let mut found = None;
        for items in inner.pages.values_mut() {
            if let Some(pos) = items.iter().position(|i| i.listing_id == listing_id) {
                found = Some(items.remove(pos));
                break;
            }
        }
        let item = found
            .ok_or_else(|| MarketError::Listing(format!("listing not found: {listing_id}")))?;

        let receipt = PurchaseReceipt {
            order_id: format!("MOCK-{}", Uuid::new_v4()),
            listing_id: item.listing_id,
            price: item.price,
            timestamp: Utc::now(),
        };
        inner.receipts.push(receipt.clone());
        Ok(receipt)
    }

    async fn refresh_credentials(&self) -> Result<AuthToken, MarketError> {
        let mut inner = self.inner.lock().unwrap();
        inner.refresh_count += 1;
        Ok(Secret::new(format!("mock-token-{}", inner.refresh_count)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: u32) -> ListingQuery {
        ListingQuery {
            equipment: None,
            rarity: None,
            page,
            page_size: 20,
            sort_stat: None,
        }
    }

    #[tokio::test]
    async fn test_mock_serves_scripted_pages() {
        let market = MockMarketplace::new("mock").with_page(
            1,
            vec![
                listing("lst-1", "weapon", 80, &[("crit-chance", 4, false)]),
                listing("lst-2", "helmet", 30, &[("hp", 2, false)]),
            ],
        );

        let page = market.fetch_listing_page(&query(1)).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 2);

        let empty = market.fetch_listing_page(&query(2)).await.unwrap();
        assert!(empty.items.is_empty());
        assert_eq!(market.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_applies_query_filters() {
        let market = MockMarketplace::new("mock").with_page(
            1,
            vec![
                listing("lst-1", "weapon", 80, &[]),
                listing("lst-2", "helmet", 30, &[]),
            ],
        );

        let mut q = query(1);
        q.equipment = Some("weapon".to_string());
        let page = market.fetch_listing_page(&q).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].listing_id, "lst-1");
    }

    #[tokio::test]
    async fn test_mock_purchase_removes_listing() {
        let market = MockMarketplace::new("mock")
            .with_page(1, vec![listing("lst-1", "weapon", 80, &[])]);

        let receipt = market.submit_purchase("lst-1").await.unwrap();
        assert_eq!(receipt.listing_id, "lst-1");
        assert_eq!(receipt.price, 80);
        assert_eq!(market.receipts().len(), 1);

        // Sold items disappear from subsequent fetches and purchases.
        let page = market.fetch_listing_page(&query(1)).await.unwrap();
        assert!(page.items.is_empty());
        assert!(market.submit_purchase("lst-1").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_lost_listing_rejected() {
        let market = MockMarketplace::new("mock")
            .with_page(1, vec![listing("lst-1", "weapon", 80, &[])]);
        market.set_lost("lst-1");

        let result = market.submit_purchase("lst-1").await;
        assert!(matches!(result, Err(MarketError::Listing(_))));
        assert!(market.receipts().is_empty());
    }

    #[tokio::test]
    async fn test_mock_injected_errors_consumed_in_order() {
        let market = MockMarketplace::new("mock")
            .with_page(1, vec![listing("lst-1", "weapon", 80, &[])]);
        market.push_fetch_error(MarketError::AuthExpired);
        market.push_fetch_error(MarketError::RateRejected);

        assert!(matches!(
            market.fetch_listing_page(&query(1)).await,
            Err(MarketError::AuthExpired)
        ));
        assert!(matches!(
            market.fetch_listing_page(&query(1)).await,
            Err(MarketError::RateRejected)
        ));
        assert!(market.fetch_listing_page(&query(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_refresh_counts() {
        let market = MockMarketplace::new("mock");
        market.refresh_credentials().await.unwrap();
        market.refresh_credentials().await.unwrap();
        assert_eq!(market.refresh_count(), 2);
    }
}
