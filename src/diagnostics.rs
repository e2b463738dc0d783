//! 失敗時のスクリーンショット保存

use std::path::PathBuf;

use base64::Engine;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::traits::PageDriver;

/// 保存先が無ければbase64でdebugログに出す
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// ベストエフォート。失敗はログのみで呼び出し元には伝えない。
    pub async fn capture(&self, page: &dyn PageDriver, label: &str) -> Option<PathBuf> {
        let png = match page.screenshot().await {
            Ok(png) => png,
            Err(e) => {
                warn!("Failed to capture {} screenshot: {}", label, e);
                return None;
            }
        };

        let Some(dir) = &self.dir else {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
            debug!("{} screenshot: data:image/png;base64,{}", label, encoded);
            return None;
        };

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Failed to create diagnostics dir {:?}: {}", dir, e);
            return None;
        }

        let file_name = format!(
            "{}_{}.png",
            sanitize_label(label),
            Utc::now().format("%Y%m%d_%H%M%S%3f")
        );
        let path = dir.join(file_name);
        match tokio::fs::write(&path, &png).await {
            Ok(()) => {
                info!("Saved {} screenshot to {:?}", label, path);
                Some(path)
            }
            Err(e) => {
                warn!("Failed to write screenshot {:?}: {}", path, e);
                None
            }
        }
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePage, FakeSite};

    #[tokio::test]
    async fn test_capture_writes_png() {
        let tmp = tempfile::tempdir().unwrap();
        let diagnostics = Diagnostics::new(Some(tmp.path().join("shots")));
        let site = FakeSite::new();
        let page = FakePage::new(site.clone());

        let path = diagnostics.capture(&page, "facebook attempt 1").await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("facebook_attempt_1_"));
        assert!(name.ends_with(".png"));
        assert!(path.exists());
        assert_eq!(site.screenshots(), 1);
    }

    #[tokio::test]
    async fn test_capture_failure_is_swallowed() {
        let site = FakeSite::new();
        site.fail_screenshots();
        let page = FakePage::new(site.clone());

        assert!(Diagnostics::default().capture(&page, "x").await.is_none());
        assert!(Diagnostics::new(Some("/tmp".into())).capture(&page, "x").await.is_none());
    }
}
