use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::Deserialize;
use tower::Service;
use tracing::info;

use crate::batch::BatchScraper;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::session::SessionManager;
use crate::types::{BatchReport, CookieRecord, CredentialAuth, Listing};

/// スクレイピングリクエスト（HTTP層から受け取る形）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub listings: Vec<Listing>,
    #[serde(default)]
    pub credentials: Option<CredentialAuth>,
    #[serde(default)]
    pub cookies: Option<Vec<CookieRecord>>,
}

impl ScrapeRequest {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self {
            listings,
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(CredentialAuth::new(email, password));
        self
    }

    pub fn with_cookies(mut self, cookies: Vec<CookieRecord>) -> Self {
        self.cookies = Some(cookies);
        self
    }
}

/// tower::Serviceを実装したスクレイパーサービス
#[derive(Clone)]
pub struct ScraperService {
    batch: BatchScraper,
}

impl ScraperService {
    pub fn new(batch: BatchScraper) -> Self {
        Self { batch }
    }

    /// 共有ブラウザを使うサービスを作る
    pub fn with_browser(config: ScraperConfig) -> (Self, SessionManager) {
        let session = SessionManager::new(config.clone());
        let batch = BatchScraper::new(Arc::new(session.clone()), config);
        (Self::new(batch), session)
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = BatchReport;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!(
            "スクレイピングリクエスト受信: listings={}, credentials={}, cookies={}",
            req.listings.len(),
            req.credentials.is_some(),
            req.cookies.as_ref().map_or(0, Vec::len)
        );

        let batch = self.batch.clone();
        Box::pin(async move {
            let report = batch
                .scrape_listings(&req.listings, req.credentials.as_ref(), req.cookies.as_deref())
                .await;

            info!(
                "スクレイピング完了: {} listings, {} with errors",
                report.len(),
                report.iter().filter(|e| e.error.is_some()).count()
            );
            Ok(report)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeProvider, FakeSite};
    use std::time::Duration;

    #[test]
    fn test_scrape_request_builder() {
        let req = ScrapeRequest::new(vec![Listing::new("1", "Desk")])
            .with_credentials("user@example.com", "pass")
            .with_cookies(vec![CookieRecord::new("c_user", "1")]);

        assert_eq!(req.listings.len(), 1);
        assert_eq!(req.credentials.unwrap().email, "user@example.com");
        assert_eq!(req.cookies.unwrap().len(), 1);
    }

    #[test]
    fn test_scrape_request_from_json() {
        let json = r#"{
            "listings": [{"id": "abc", "title": "Oak desk", "postedKijiji": true,
                          "analytics": {"kijiji": {"listingUrl": "https://www.kijiji.ca/v-desk/1"}}}],
            "cookies": [{"name": "xs", "value": "1", "sameSite": "lax"}]
        }"#;
        let req: ScrapeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.listings[0].scrape_url(crate::types::Platform::Kijiji), Some("https://www.kijiji.ca/v-desk/1"));
        assert!(req.credentials.is_none());
        assert_eq!(req.cookies.unwrap()[0].same_site.as_deref(), Some("lax"));
    }

    #[tokio::test]
    async fn test_service_call_returns_report() {
        let site = FakeSite::new();
        site.add_page("https://www.kijiji.ca/v-desk/1", r#"<span class="view-count">5</span>"#);
        let config = ScraperConfig::default()
            .with_settle_delay(Duration::ZERO)
            .with_rate_limit_delay(Duration::ZERO);
        let mut service = ScraperService::new(BatchScraper::new(Arc::new(FakeProvider::new(site)), config));

        let listing = Listing::new("1", "Desk").with_kijiji_url("https://www.kijiji.ca/v-desk/1");
        let report = service.call(ScrapeRequest::new(vec![listing])).await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].kijiji.as_ref().unwrap().views, 5);
    }
}
