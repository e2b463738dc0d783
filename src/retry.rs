//! 試行単位のリトライ制御

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::auth::{select_strategy, SessionState};
use crate::config::ScraperConfig;
use crate::diagnostics::Diagnostics;
use crate::error::ScraperError;
use crate::extract::Extractor;
use crate::traits::{PageDriver, PageProvider};
use crate::types::{MetricCounts, ScrapeResult, ScrapeTarget};

/// 指数バックオフ（n回目の失敗後に `base_delay * 2^n` 待つ）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// 1ターゲットを新しいページで試行し、失敗時はバックオフして再試行する
#[derive(Clone)]
pub struct RetryController {
    provider: Arc<dyn PageProvider>,
    config: ScraperConfig,
    diagnostics: Diagnostics,
}

impl RetryController {
    pub fn new(provider: Arc<dyn PageProvider>, config: ScraperConfig) -> Self {
        let diagnostics = Diagnostics::new(config.diagnostics_dir.clone());
        Self {
            provider,
            config,
            diagnostics,
        }
    }

    /// 失敗しても `Err` は返さず、最後のエラーを持つ結果にする
    pub async fn run(&self, target: &ScrapeTarget) -> ScrapeResult {
        let policy = self.config.retry;
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=policy.max_attempts {
            info!(
                "Scraping {} {} (attempt {}/{})",
                target.platform, target.url, attempt, policy.max_attempts
            );

            match self.attempt(target, attempt).await {
                Ok(counts) => match ScrapeResult::success(counts, &target.url) {
                    Some(result) => return result,
                    None => last_error = "No analytics data found".into(),
                },
                Err(e) => {
                    warn!(
                        "{} attempt {} failed ({:?}): {}",
                        target.platform,
                        attempt,
                        e.kind(),
                        e
                    );
                    last_error = e.to_string();
                    if !e.is_retryable() {
                        break;
                    }
                }
            }

            if attempt < policy.max_attempts {
                let delay = policy.delay_after(attempt);
                info!("Retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        error!(
            "Giving up on {} {}: {}",
            target.platform, target.url, last_error
        );
        ScrapeResult::failure(last_error, &target.url)
    }

    async fn attempt(&self, target: &ScrapeTarget, attempt: u32) -> Result<MetricCounts, ScraperError> {
        let page = self.provider.new_page().await?;

        let outcome = self.run_on_page(page.as_ref(), target).await;
        if outcome.is_err() {
            self.diagnostics
                .capture(page.as_ref(), &format!("{}_attempt{}", target.platform, attempt))
                .await;
        }

        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }
        outcome
    }

    async fn run_on_page(&self, page: &dyn PageDriver, target: &ScrapeTarget) -> Result<MetricCounts, ScraperError> {
        // ヘッドレス既定のUAのまま巡回しない
        self.config.anti_detection.apply_baseline(page).await?;

        if let Some(strategy) =
            select_strategy(target, &self.config.anti_detection, &self.diagnostics)
        {
            let state = strategy.authenticate(page).await?;
            if state == SessionState::CheckpointBlocked {
                return Err(ScraperError::CheckpointBlocked(format!(
                    "{} session held at a checkpoint",
                    target.platform
                )));
            }
            if state != SessionState::Authenticated {
                warn!(
                    "{} login via {} left session {:?}, continuing",
                    target.platform,
                    strategy.name(),
                    state
                );
            }
        }
        Extractor::new(page, &self.config).run(target).await
    }
}
