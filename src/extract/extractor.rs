use std::time::Duration;

use tracing::{debug, info, warn};

use super::dashboard::{find_facebook_card, find_facebook_item_link, find_kijiji_row, AdRowMatch, CardMatch};
use super::detail::extract_detail;
use super::patterns::extract_labeled;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::platform::{kijiji_dashboard_base, kijiji_dashboard_page, Landing, PageView};
use crate::traits::PageDriver;
use crate::types::{MetricCounts, Platform, ScrapeTarget};

const PASSWORD_FIELD: &str = r#"input[type="password"]"#;

/// 抽出の各段階
#[derive(Debug)]
enum Stage {
    Navigate,
    ClassifyLanding,
    ClassifyView { landed: String },
    LocateItem { landed: String, view: PageView },
    ParseMetrics(Located),
    ValidateSignal(MetricCounts),
}

/// 指標の読み取り元
#[derive(Debug)]
enum Located {
    FacebookCard(CardMatch),
    KijijiRow(AdRowMatch),
    Detail { html: String, body: String },
}

/// 1ページ上で1ターゲットの指標を抽出する
pub struct Extractor<'a> {
    page: &'a dyn PageDriver,
    settle_delay: Duration,
    max_scroll_steps: u32,
    max_dashboard_pages: u32,
}

impl<'a> Extractor<'a> {
    pub fn new(page: &'a dyn PageDriver, config: &ScraperConfig) -> Self {
        Self {
            page,
            settle_delay: config.settle_delay,
            max_scroll_steps: config.max_scroll_steps,
            max_dashboard_pages: config.max_dashboard_pages.max(1),
        }
    }

    async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
    }

    pub async fn run(&self, target: &ScrapeTarget) -> Result<MetricCounts, ScraperError> {
        let mut stage = Stage::Navigate;
        loop {
            debug!("{} extractor stage: {:?}", target.platform, stage);
            stage = match stage {
                Stage::Navigate => {
                    self.page.goto(&target.url).await?;
                    self.settle().await;
                    Stage::ClassifyLanding
                }
                Stage::ClassifyLanding => {
                    let landed = self.check_landing(target.platform, &target.url).await?;
                    Stage::ClassifyView { landed }
                }
                Stage::ClassifyView { landed } => {
                    let view = target.platform.classify_view(&landed);
                    Stage::LocateItem { landed, view }
                }
                Stage::LocateItem { landed, view } => {
                    Stage::ParseMetrics(self.locate(target, &landed, view).await?)
                }
                Stage::ParseMetrics(located) => Stage::ValidateSignal(parse_metrics(target.platform, located)),
                Stage::ValidateSignal(counts) => {
                    if !counts.has_signal() {
                        return Err(ScraperError::ExtractionNotFound("No analytics data found".into()));
                    }
                    info!(
                        "{} metrics: views={} clicks={} favorites={} shares={}",
                        target.platform, counts.views, counts.clicks, counts.favorites, counts.shares
                    );
                    return Ok(counts);
                }
            };
        }
    }

    /// 遷移先URLでログイン画面・チェックポイントへの転送を検出する
    async fn check_landing(&self, platform: Platform, requested: &str) -> Result<String, ScraperError> {
        let landed = self.page.current_url().await?;
        let has_password = match platform {
            Platform::Kijiji => self.page.has_element(PASSWORD_FIELD).await,
            Platform::Facebook => false,
        };
        match platform.classify_landing(requested, &landed, has_password) {
            Landing::Ok => Ok(landed),
            Landing::LoginRequired => Err(ScraperError::Authentication(format!(
                "{} requires login (landed on {})",
                platform, landed
            ))),
            Landing::Checkpoint => Err(ScraperError::CheckpointBlocked(format!(
                "{} checkpoint at {}",
                platform, landed
            ))),
        }
    }

    async fn locate(&self, target: &ScrapeTarget, landed: &str, view: PageView) -> Result<Located, ScraperError> {
        match (target.platform, view) {
            (Platform::Facebook, PageView::DashboardList) => self.locate_facebook_card(target, landed).await,
            (Platform::Kijiji, PageView::DashboardList) => self.locate_kijiji_row(target, landed).await,
            (_, PageView::DetailPage) => self.snapshot_detail().await,
        }
    }

    async fn snapshot_detail(&self) -> Result<Located, ScraperError> {
        Ok(Located::Detail {
            html: self.page.content().await?,
            body: self.page.body_text().await?,
        })
    }

    /// 高さが伸びなくなるまでスクロールして遅延読み込みを展開する
    async fn scroll_until_stable(&self) -> Result<(), ScraperError> {
        let mut last_height = 0;
        for step in 0..self.max_scroll_steps {
            let height = self.page.scroll_step().await?;
            if height <= last_height {
                debug!("Scroll height stable at {} after {} steps", height, step);
                break;
            }
            last_height = height;
            self.settle().await;
        }
        self.page.scroll_to_top().await
    }

    async fn locate_facebook_card(&self, target: &ScrapeTarget, landed: &str) -> Result<Located, ScraperError> {
        self.scroll_until_stable().await?;
        let html = self.page.content().await?;

        let link = match find_facebook_card(&html, &target.listing_title) {
            Some(card) if extract_labeled(&card.text).has_signal() => {
                info!("Matched selling card '{}'", card.title);
                return Ok(Located::FacebookCard(card));
            }
            Some(card) => {
                debug!("Card '{}' matched without metrics", card.title);
                card.item_href.or_else(|| find_facebook_item_link(&html, &target.listing_title))
            }
            None => find_facebook_item_link(&html, &target.listing_title),
        };

        let Some(href) = link else {
            return Err(ScraperError::ExtractionNotFound(format!(
                "Listing '{}' not found on selling dashboard",
                target.listing_title
            )));
        };

        let detail_url = resolve_href(landed, &href);
        info!("Falling back to listing page {}", detail_url);
        self.page.goto(&detail_url).await?;
        self.settle().await;
        self.check_landing(Platform::Facebook, &detail_url).await?;
        self.snapshot_detail().await
    }

    async fn locate_kijiji_row(&self, target: &ScrapeTarget, landed: &str) -> Result<Located, ScraperError> {
        let base = kijiji_dashboard_base(&target.url);

        for page_no in 1..=self.max_dashboard_pages {
            let page_url = kijiji_dashboard_page(&base, page_no);
            let on_page = landed.trim_end_matches('/') == base || landed == page_url;
            if page_no > 1 || !on_page {
                self.page.goto(&page_url).await?;
                self.settle().await;
                self.check_landing(Platform::Kijiji, &page_url).await?;
            }

            let html = self.page.content().await?;
            if let Some(row) = find_kijiji_row(&html, &target.listing_title) {
                info!("Matched My Ads row '{}' on page {}", row.title, page_no);
                return Ok(Located::KijijiRow(row));
            }
            debug!("Listing not on My Ads page {}", page_no);
        }

        warn!(
            "Listing '{}' not found in {} My Ads pages",
            target.listing_title, self.max_dashboard_pages
        );
        Err(ScraperError::ExtractionNotFound(format!(
            "Listing '{}' not found in My Ads ({} pages checked)",
            target.listing_title, self.max_dashboard_pages
        )))
    }
}

fn parse_metrics(platform: Platform, located: Located) -> MetricCounts {
    match located {
        Located::FacebookCard(card) => extract_labeled(&card.text),
        Located::KijijiRow(row) => row.counts,
        Located::Detail { html, body } => extract_detail(platform, &html, &body),
    }
}

/// 相対リンクを現在のURL基準で解決する
fn resolve_href(base: &str, href: &str) -> String {
    url::Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
