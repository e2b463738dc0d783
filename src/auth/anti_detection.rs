//! 自動化検出の回避設定
//!
//! フォームログイン時にだけ適用する。CIでは [`AntiDetectionProfile::disabled`] で
//! 遅延と偽装を全て無効化できる。

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::ScraperError;
use crate::traits::PageDriver;

const INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => __LANGUAGES__ });
for (const key of Object.keys(window)) {
    if (key.startsWith('cdc_')) {
        delete window[key];
    }
}
"#;

const EXTRA_HEADERS: &[(&str, &str)] = &[
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Accept-Encoding", "gzip, deflate, br"),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Upgrade-Insecure-Requests", "1"),
];

/// ミリ秒の範囲（両端を含む）
pub type DelayRange = (u64, u64);

#[derive(Debug, Clone)]
pub struct AntiDetectionProfile {
    pub enabled: bool,
    pub user_agents: Vec<String>,
    pub languages: Vec<String>,
    pub base_viewport: (u32, u32),
    /// 幅・高さそれぞれに加える最大ずれ
    pub viewport_jitter: u32,
    pub email_key_delay: DelayRange,
    pub password_key_delay: DelayRange,
    /// メール入力からパスワード入力までの間
    pub field_pause: DelayRange,
    pub submit_pause: DelayRange,
    /// ナビゲーション・送信後の待機
    pub settle_pause: DelayRange,
}

impl Default for AntiDetectionProfile {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
            ],
            languages: vec!["en-US".into(), "en".into()],
            base_viewport: (1920, 1080),
            viewport_jitter: 100,
            email_key_delay: (50, 150),
            password_key_delay: (70, 220),
            field_pause: (500, 1500),
            submit_pause: (1000, 3000),
            settle_pause: (3000, 5000),
        }
    }
}

impl AntiDetectionProfile {
    /// 偽装なし・待機なし
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            viewport_jitter: 0,
            email_key_delay: (0, 0),
            password_key_delay: (0, 0),
            field_pause: (0, 0),
            submit_pause: (0, 0),
            settle_pause: (0, 0),
            ..Self::default()
        }
    }

    pub fn init_script(&self) -> String {
        let languages = serde_json::to_string(&self.languages).unwrap_or_else(|_| "[]".into());
        INIT_SCRIPT.replace("__LANGUAGES__", &languages)
    }

    pub fn pick_user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.user_agents.len());
        Some(self.user_agents[idx].as_str())
    }

    pub fn viewport(&self) -> (u32, u32) {
        let (w, h) = self.base_viewport;
        if self.viewport_jitter == 0 {
            return (w, h);
        }
        let mut rng = rand::rng();
        (
            w + rng.random_range(0..=self.viewport_jitter),
            h + rng.random_range(0..=self.viewport_jitter),
        )
    }

    /// 範囲内のランダムな長さ
    pub fn jitter(range: DelayRange) -> Duration {
        let (lo, hi) = range;
        if hi <= lo {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }

    /// 範囲内でランダムに待つ。0なら即座に戻る。
    pub async fn pause(range: DelayRange) {
        let delay = Self::jitter(range);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// 全試行共通の最低限の指紋（UAとビューポート）
    pub async fn apply_baseline(&self, page: &dyn PageDriver) -> Result<(), ScraperError> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(ua) = self.pick_user_agent() {
            page.set_user_agent(ua).await?;
        }
        let (width, height) = self.viewport();
        page.set_viewport(width, height).await?;
        Ok(())
    }

    /// ページに偽装を適用する
    pub async fn apply(&self, page: &dyn PageDriver) -> Result<(), ScraperError> {
        if !self.enabled {
            debug!("Anti-detection disabled, skipping page setup");
            return Ok(());
        }

        page.add_init_script(&self.init_script()).await?;
        if let Some(ua) = self.pick_user_agent() {
            page.set_user_agent(ua).await?;
        }
        let (width, height) = self.viewport();
        page.set_viewport(width, height).await?;
        page.set_extra_headers(EXTRA_HEADERS).await?;

        debug!("Anti-detection applied (viewport {}x{})", width, height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePage, FakeSite};

    #[test]
    fn test_init_script_contents() {
        let script = AntiDetectionProfile::default().init_script();
        assert!(script.contains("navigator, 'webdriver'"));
        assert!(script.contains(r#"["en-US","en"]"#));
        assert!(script.contains("cdc_"));
    }

    #[test]
    fn test_viewport_within_jitter() {
        let profile = AntiDetectionProfile::default();
        for _ in 0..20 {
            let (w, h) = profile.viewport();
            assert!((1920..=2020).contains(&w));
            assert!((1080..=1180).contains(&h));
        }
        assert_eq!(AntiDetectionProfile::disabled().viewport(), (1920, 1080));
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..20 {
            let d = AntiDetectionProfile::jitter((50, 150));
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(150));
        }
        assert!(AntiDetectionProfile::jitter((0, 0)).is_zero());
    }

    #[tokio::test]
    async fn test_apply_sets_up_page() {
        let site = FakeSite::new();
        let page = FakePage::new(site.clone());

        AntiDetectionProfile::default().apply(&page).await.unwrap();
        assert_eq!(site.init_scripts().len(), 1);
        assert!(site.user_agent().unwrap().starts_with("Mozilla/5.0"));

        let site = FakeSite::new();
        let page = FakePage::new(site.clone());
        AntiDetectionProfile::disabled().apply(&page).await.unwrap();
        assert!(site.init_scripts().is_empty());
        assert!(site.user_agent().is_none());
    }

    #[tokio::test]
    async fn test_apply_baseline_sets_user_agent_only() {
        let site = FakeSite::new();
        let page = FakePage::new(site.clone());

        AntiDetectionProfile::default().apply_baseline(&page).await.unwrap();
        assert!(!site.user_agent().unwrap().contains("Headless"));
        assert!(site.init_scripts().is_empty());

        let site = FakeSite::new();
        let page = FakePage::new(site.clone());
        AntiDetectionProfile::disabled().apply_baseline(&page).await.unwrap();
        assert!(site.user_agent().is_none());
    }
}
