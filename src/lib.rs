//! マーケットプレイス出品の分析値スクレイパー
//!
//! - Facebook Marketplace の出品管理画面・出品ページからクリック数/保存数などを取得
//! - Kijiji の My Ads（最大5ページ）・広告ページから閲覧数などを取得
//! - クッキー注入またはフォームログインで認証
//! - 出品単位のバッチ実行と定期実行
//!
//! # 使用例
//!
//! ```rust,ignore
//! use marketplace_scraper::{Listing, ScrapeRequest, ScraperConfig, ScraperService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (mut service, session) = ScraperService::with_browser(ScraperConfig::from_env());
//!
//!     let listing = Listing::new("42", "Solid oak desk")
//!         .with_facebook_url("https://www.facebook.com/marketplace/you/selling");
//!     let request = ScrapeRequest::new(vec![listing]).with_credentials("me@example.com", "secret");
//!
//!     let report = service.call(request).await.unwrap();
//!     println!("{:?}", report[0].facebook);
//!     session.close().await.unwrap();
//! }
//! ```
//!
//! # 定期実行
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use marketplace_scraper::{BatchScraper, InMemoryListingStore, Scheduler, ScraperConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::from_env();
//!     let session = SessionManager::new(config.clone());
//!     let batch = BatchScraper::new(Arc::new(session.clone()), config);
//!     let scheduler = Scheduler::new(batch, Arc::new(InMemoryListingStore::new()));
//!
//!     scheduler.start(60).await;
//!     tokio::signal::ctrl_c().await.unwrap();
//!     scheduler.stop().await;
//!     session.close().await.unwrap();
//! }
//! ```

pub mod auth;
pub mod batch;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod platform;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod store;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// 主要な型をリエクスポート
pub use auth::{AntiDetectionProfile, SessionState};
pub use batch::BatchScraper;
pub use config::ScraperConfig;
pub use error::{ErrorKind, ScraperError};
pub use retry::RetryPolicy;
pub use scheduler::{RunSummary, Scheduler, SchedulerStatus};
pub use service::{ScrapeRequest, ScraperService};
pub use session::SessionManager;
pub use store::InMemoryListingStore;
pub use traits::{ListingStore, LoginStrategy, PageDriver, PageProvider};
pub use types::{
    AnalyticsPatch, BatchEntry, BatchReport, CookieRecord, CredentialAuth, Listing, MetricCounts,
    Platform, ScrapeResult, ScrapeStatus, ScrapeTarget,
};
