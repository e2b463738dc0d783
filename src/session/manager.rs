use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::page::BrowserPage;
use super::profile::prepare_profile_dir;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::{PageDriver, PageProvider};

const LAUNCH_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-zygote",
    "--disable-gpu",
    "--disable-blink-features=AutomationControlled",
];

struct BrowserHandle {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// 共有ブラウザのライフサイクル管理
///
/// ブラウザは最初のページ要求時に起動し、`close()` まで使い回す。
/// ページは試行ごとに払い出し、共有しない。
#[derive(Clone)]
pub struct SessionManager {
    config: ScraperConfig,
    browser: Arc<Mutex<Option<BrowserHandle>>>,
}

impl SessionManager {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: Arc::new(Mutex::new(None)),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, ScraperError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.config.navigation_timeout);
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }

        if self.config.headless {
            builder = builder.headless_mode(HeadlessMode::New);
        } else {
            builder = builder
                .with_head()
                .window_size(1600, 1000)
                .arg("--window-size=1600,1000");
        }

        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        if let Some(dir) = &self.config.profile_dir {
            let cwd = std::env::current_dir()?;
            let profile = prepare_profile_dir(dir, &cwd)?;
            info!("Using persistent profile {:?}", profile);
            builder = builder.user_data_dir(profile);
        }

        builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))
    }

    async fn launch(&self) -> Result<BrowserHandle, ScraperError> {
        info!(
            "Launching browser (headless={}, profile={:?})",
            self.config.headless, self.config.profile_dir
        );
        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {:?}", e);
                }
            }
        });

        Ok(BrowserHandle { browser, handler })
    }

    /// ブラウザが起動していなければ起動する
    pub async fn acquire_browser(&self) -> Result<(), ScraperError> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    /// ブラウザを終了する。未起動なら何もしない。
    pub async fn close(&self) -> Result<(), ScraperError> {
        let mut guard = self.browser.lock().await;
        let Some(mut handle) = guard.take() else {
            return Ok(());
        };

        info!("ブラウザを終了中...");
        if let Err(e) = handle.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = handle.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        handle.handler.abort();
        info!("ブラウザ終了完了");
        Ok(())
    }
}

#[async_trait]
impl PageProvider for SessionManager {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, ScraperError> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let handle = guard
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("ブラウザが初期化されていません".into()))?;

        let page = handle
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;
        Ok(Box::new(BrowserPage::new(page, self.config.navigation_timeout)))
    }
}
