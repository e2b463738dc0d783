use std::sync::Arc;

use marketplace_scraper::{
    BatchScraper, InMemoryListingStore, Listing, Scheduler, ScraperConfig, SessionManager,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let kijiji_url = std::env::var("KIJIJI_URL").expect("KIJIJI_URL environment variable not set");
    let title = std::env::var("LISTING_TITLE").expect("LISTING_TITLE environment variable not set");
    let minutes: u64 = std::env::var("SCRAPE_INTERVAL_MINUTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);

    let store = Arc::new(InMemoryListingStore::with_listings([
        Listing::new("demo", title).with_kijiji_url(kijiji_url),
    ]));

    let config = ScraperConfig::from_env();
    let session = SessionManager::new(config.clone());
    let batch = BatchScraper::new(Arc::new(session.clone()), config);
    let scheduler = Scheduler::new(batch, store.clone());

    println!("=== Periodic Scrape Test ({} min) ===", minutes);
    scheduler.start(minutes).await;
    println!("{:?}", scheduler.status().await);

    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    scheduler.stop().await;

    if let Ok(Some(listing)) = marketplace_scraper::ListingStore::find_by_id(store.as_ref(), "demo").await {
        println!("{}", serde_json::to_string_pretty(&listing.analytics).unwrap_or_default());
    }
    if let Err(e) = session.close().await {
        eprintln!("ブラウザ終了エラー: {}", e);
    }
}
