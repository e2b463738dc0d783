//! 出品の一括スクレイピング

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::retry::RetryController;
use crate::traits::PageProvider;
use crate::types::{BatchEntry, BatchReport, CookieRecord, CredentialAuth, Listing, ScrapeResult, ScrapeTarget};

/// 出品を1件ずつ順番に処理する
///
/// 手動実行と定期実行は同じ実行ロックを通るため、同時に2つのバッチが走ることはない。
#[derive(Clone)]
pub struct BatchScraper {
    controller: RetryController,
    rate_limit_delay: Duration,
    run_lock: Arc<Mutex<()>>,
}

impl BatchScraper {
    pub fn new(provider: Arc<dyn PageProvider>, config: ScraperConfig) -> Self {
        let rate_limit_delay = config.rate_limit_delay;
        Self {
            controller: RetryController::new(provider, config),
            rate_limit_delay,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 単一ターゲット
    pub async fn scrape_target(&self, target: &ScrapeTarget) -> ScrapeResult {
        let _guard = self.run_lock.lock().await;
        self.controller.run(target).await
    }

    pub async fn scrape_listings(
        &self,
        listings: &[Listing],
        credentials: Option<&CredentialAuth>,
        cookies: Option<&[CookieRecord]>,
    ) -> BatchReport {
        let _guard = self.run_lock.lock().await;
        info!("Starting batch scraping of {} listings", listings.len());

        let mut report = Vec::with_capacity(listings.len());
        for (i, listing) in listings.iter().enumerate() {
            info!(
                "Scraping listing {}/{}: {}",
                i + 1,
                listings.len(),
                if listing.title.is_empty() { &listing.id } else { &listing.title }
            );
            report.push(self.scrape_entry(listing, credentials, cookies).await);

            if i + 1 < listings.len() && !self.rate_limit_delay.is_zero() {
                info!("Waiting {:?} before next listing...", self.rate_limit_delay);
                tokio::time::sleep(self.rate_limit_delay).await;
            }
        }

        info!("Batch scraping completed: {} listings processed", report.len());
        report
    }

    async fn scrape_entry(
        &self,
        listing: &Listing,
        credentials: Option<&CredentialAuth>,
        cookies: Option<&[CookieRecord]>,
    ) -> BatchEntry {
        let mut entry = BatchEntry::new(&listing.id);

        for target in listing.targets(credentials, cookies) {
            info!("  -> Scraping {}: {}", target.platform, target.url);
            let result = self.controller.run(&target).await;
            info!(
                "  -> {} result: {:?}, views: {}",
                target.platform, result.status, result.views
            );
            entry.set_result(target.platform, result);
        }

        let failures: Vec<String> = entry
            .results()
            .filter(|(_, r)| r.is_error())
            .map(|(p, r)| format!("{}: {}", p, r.error_message.as_deref().unwrap_or("unknown error")))
            .collect();
        let attempted = entry.results().count();
        if attempted > 0 && failures.len() == attempted {
            warn!("All platforms failed for listing {}", listing.id);
            entry.error = Some(failures.join("; "));
        }

        entry
    }
}
