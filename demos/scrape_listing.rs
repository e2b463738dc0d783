use marketplace_scraper::{
    CookieRecord, Listing, ScrapeRequest, ScraperConfig, ScraperService,
};
use tower::Service;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 対象の出品を環境変数から取得
    let title = std::env::var("LISTING_TITLE").expect("LISTING_TITLE environment variable not set");
    let mut listing = Listing::new("demo", &title);
    if let Ok(url) = std::env::var("FACEBOOK_URL") {
        listing = listing.with_facebook_url(url);
    }
    if let Ok(url) = std::env::var("KIJIJI_URL") {
        listing = listing.with_kijiji_url(url);
    }

    let mut request = ScrapeRequest::new(vec![listing]);
    // クッキーがあればフォームログインより優先される
    if let Ok(path) = std::env::var("FB_COOKIES_FILE") {
        let raw = std::fs::read_to_string(&path).expect("failed to read cookie file");
        let cookies: Vec<CookieRecord> = serde_json::from_str(&raw).expect("invalid cookie JSON");
        request = request.with_cookies(cookies);
    }
    if let (Ok(email), Ok(password)) = (std::env::var("FB_EMAIL"), std::env::var("FB_PASSWORD")) {
        request = request.with_credentials(email, password);
    }

    let config = ScraperConfig::from_env();
    let (mut service, session) = ScraperService::with_browser(config);

    println!("=== Listing Scraper Test ===");

    match service.call(request).await {
        Ok(report) => {
            for entry in &report {
                println!("{}", serde_json::to_string_pretty(entry).unwrap_or_default());
            }
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
        }
    }

    if let Err(e) = session.close().await {
        eprintln!("ブラウザ終了エラー: {}", e);
    }
}
