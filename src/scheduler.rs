//! 定期スクレイピング

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::batch::BatchScraper;
use crate::error::ScraperError;
use crate::traits::ListingStore;
use crate::types::BatchEntry;

const PERIODIC_JOB: &str = "periodic";

/// 間隔の上限（1週間）
const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub active_jobs: Vec<String>,
}

/// 1回のバッチの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct Job {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Runner {
    batch: BatchScraper,
    store: Arc<dyn ListingStore>,
}

impl Runner {
    /// ストアから対象を読み出してバッチを実行し、結果を保存する
    async fn scrape_all(&self) -> RunSummary {
        info!("Starting scheduled scraping of all listings...");
        let listings = match self.store.find_scrapeable().await {
            Ok(listings) => listings,
            Err(e) => {
                error!("Failed to load listings: {}", e);
                return RunSummary::default();
            }
        };
        if listings.is_empty() {
            info!("No listings found with configured analytics URLs");
            return RunSummary::default();
        }

        info!("Found {} listings to scrape", listings.len());
        let report = self.batch.scrape_listings(&listings, None, None).await;

        let mut summary = RunSummary {
            processed: report.len(),
            ..Default::default()
        };
        for entry in &report {
            if let Err(e) = self.persist(entry).await {
                error!("Error updating listing {}: {}", entry.listing_id, e);
                summary.failed += 1;
                continue;
            }
            match &entry.error {
                Some(msg) => {
                    warn!("Error scraping listing {}: {}", entry.listing_id, msg);
                    summary.failed += 1;
                }
                None => summary.succeeded += 1,
            }
        }

        info!(
            "Scheduled scraping completed: {} successful, {} errors",
            summary.succeeded, summary.failed
        );
        summary
    }

    async fn persist(&self, entry: &BatchEntry) -> Result<(), ScraperError> {
        let patch = entry.patch();
        if patch.is_empty() {
            return Ok(());
        }
        self.store.save_analytics(&entry.listing_id, &patch).await
    }
}

/// 定期実行の開始・停止と、単発の出品スクレイピング
pub struct Scheduler {
    runner: Arc<Runner>,
    job: Mutex<Option<Job>>,
}

impl Scheduler {
    pub fn new(batch: BatchScraper, store: Arc<dyn ListingStore>) -> Self {
        Self {
            runner: Arc::new(Runner { batch, store }),
            job: Mutex::new(None),
        }
    }

    /// 定期実行を開始する。すぐに1回実行し、以降は `interval_minutes` ごと。
    /// 既に実行中なら何もせず `false` を返す。
    pub async fn start(&self, interval_minutes: u64) -> bool {
        let mut job = self.job.lock().await;
        reap_finished(&mut job);
        if job.is_some() {
            info!("Periodic scraping already running");
            return false;
        }

        let minutes = interval_minutes.clamp(1, MAX_INTERVAL_MINUTES);
        let period = Duration::from_secs(minutes.saturating_mul(60));
        info!("Starting periodic scraping every {} minutes", minutes);

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let runner = Arc::clone(&self.runner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    // 実行中のバッチは停止要求があっても最後まで終える
                    _ = ticker.tick() => {
                        runner.scrape_all().await;
                    }
                }
            }
            info!("Periodic scraping task exited");
        });

        *job = Some(Job { shutdown, handle });
        true
    }

    /// 定期実行を停止する。何度呼んでもよい。
    pub async fn stop(&self) {
        let Some(job) = self.job.lock().await.take() else {
            return;
        };
        // 受信側が既に終了していても問題ない
        let _ = job.shutdown.send(true);
        drop(job.handle);
        info!("Periodic scraping stopped");
    }

    pub async fn status(&self) -> SchedulerStatus {
        let running = {
            let mut job = self.job.lock().await;
            reap_finished(&mut job);
            job.is_some()
        };
        SchedulerStatus {
            is_running: running,
            active_jobs: if running {
                vec![PERIODIC_JOB.to_string()]
            } else {
                Vec::new()
            },
        }
    }

    /// 定期実行の外で1件だけスクレイピングし、結果を保存する
    pub async fn scrape_listing_by_id(&self, id: &str) -> Result<BatchEntry, ScraperError> {
        let listing = self
            .runner
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ScraperError::ListingNotFound(id.to_string()))?;

        let entry = self
            .runner
            .batch
            .scrape_listings(std::slice::from_ref(&listing), None, None)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| ScraperError::Unexpected(format!("no result for listing {}", id)))?;

        self.runner.persist(&entry).await?;
        Ok(entry)
    }

    /// 1回分のバッチを今すぐ実行する
    pub async fn run_once(&self) -> RunSummary {
        self.runner.scrape_all().await
    }
}

/// タスクが停止要求なしに終わっていれば（パニック等）ジョブを外す
fn reap_finished(job: &mut Option<Job>) {
    if job.as_ref().is_some_and(|j| j.handle.is_finished()) {
        warn!("Periodic scraping task ended unexpectedly");
        *job = None;
    }
}
