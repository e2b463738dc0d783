use std::path::PathBuf;
use std::time::Duration;

use crate::auth::AntiDetectionProfile;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub headless: bool,
    /// 未指定ならchromiumoxideが自動検出する
    pub chrome_executable: Option<PathBuf>,
    /// 永続プロファイル（ログイン状態を保持する場合）
    pub profile_dir: Option<PathBuf>,
    pub navigation_timeout: Duration,
    /// ナビゲーション後、動的コンテンツの描画を待つ時間
    pub settle_delay: Duration,
    /// 連続する出品の間隔
    pub rate_limit_delay: Duration,
    pub max_scroll_steps: u32,
    pub max_dashboard_pages: u32,
    pub diagnostics_dir: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub anti_detection: AntiDetectionProfile,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            profile_dir: None,
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            rate_limit_delay: Duration::from_secs(5),
            max_scroll_steps: 8,
            max_dashboard_pages: 5,
            diagnostics_dir: None,
            retry: RetryPolicy::default(),
            anti_detection: AntiDetectionProfile::default(),
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 環境変数から設定を読み込む
    ///
    /// - `SCRAPER_HEADFUL=true` でブラウザを表示
    /// - `SCRAPER_PROFILE_DIR` 永続プロファイル
    /// - `CHROME_PATH` / `CHROMIUM_PATH` 実行ファイル
    /// - `SCRAPER_DIAGNOSTICS_DIR` スクリーンショット保存先
    /// - `SCRAPER_ANTI_DETECTION=off` でフィンガープリント偽装を無効化
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("SCRAPER_HEADFUL") {
            config.headless = !v.eq_ignore_ascii_case("true");
        }
        if let Some(dir) = non_empty_env("SCRAPER_PROFILE_DIR") {
            config.profile_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = non_empty_env("CHROME_PATH").or_else(|| non_empty_env("CHROMIUM_PATH")) {
            config.chrome_executable = Some(PathBuf::from(path));
        }
        if let Some(dir) = non_empty_env("SCRAPER_DIAGNOSTICS_DIR") {
            config.diagnostics_dir = Some(PathBuf::from(dir));
        }
        if let Ok(v) = std::env::var("SCRAPER_ANTI_DETECTION") {
            if matches!(v.to_ascii_lowercase().as_str(), "off" | "false" | "0") {
                config.anti_detection = AntiDetectionProfile::disabled();
            }
        }

        config
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(dir.into());
        self
    }

    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn with_max_scroll_steps(mut self, steps: u32) -> Self {
        self.max_scroll_steps = steps;
        self
    }

    pub fn with_max_dashboard_pages(mut self, pages: u32) -> Self {
        self.max_dashboard_pages = pages;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    pub fn with_diagnostics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.diagnostics_dir = Some(dir.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_anti_detection(mut self, profile: AntiDetectionProfile) -> Self {
        self.anti_detection = profile;
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScraperConfig::default();
        assert!(config.headless);
        assert_eq!(config.rate_limit_delay, Duration::from_secs(5));
        assert_eq!(config.max_dashboard_pages, 5);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_config_builder() {
        let config = ScraperConfig::new()
            .with_headless(false)
            .with_profile_dir("profiles/seller")
            .with_rate_limit_delay(Duration::ZERO)
            .with_anti_detection(AntiDetectionProfile::disabled());

        assert!(!config.headless);
        assert_eq!(config.profile_dir, Some(PathBuf::from("profiles/seller")));
        assert_eq!(config.rate_limit_delay, Duration::ZERO);
        assert!(!config.anti_detection.enabled);
    }
}
