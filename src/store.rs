//! メモリ上の出品ストア（デモ・テスト用）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ScraperError;
use crate::traits::ListingStore;
use crate::types::{AnalyticsPatch, Listing};

#[derive(Debug, Default)]
pub struct InMemoryListingStore {
    listings: RwLock<HashMap<String, Listing>>,
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listings(listings: impl IntoIterator<Item = Listing>) -> Self {
        Self {
            listings: RwLock::new(listings.into_iter().map(|l| (l.id.clone(), l)).collect()),
        }
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn find_scrapeable(&self) -> Result<Vec<Listing>, ScraperError> {
        let guard = self.listings.read().await;
        let mut listings: Vec<Listing> = guard
            .values()
            .filter(|l| l.has_configured_url())
            .cloned()
            .collect();
        listings.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listings)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Listing>, ScraperError> {
        Ok(self.listings.read().await.get(id).cloned())
    }

    async fn save_analytics(&self, id: &str, patch: &AnalyticsPatch) -> Result<(), ScraperError> {
        let mut guard = self.listings.write().await;
        let listing = guard
            .get_mut(id)
            .ok_or_else(|| ScraperError::ListingNotFound(id.to_string()))?;
        listing.analytics.apply(patch);
        debug!("Saved analytics for listing {}", id);
        Ok(())
    }
}
