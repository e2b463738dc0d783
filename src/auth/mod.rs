//! ページへの認証状態の付与（クッキー注入 / フォームログイン）

mod anti_detection;
mod cookies;
mod login;

pub use anti_detection::{AntiDetectionProfile, DelayRange};
pub use cookies::{map_cookie, parse_same_site, CookieLogin, CookieSkip, SameSite, SessionCookie};
pub use login::{classify_login, AuthOutcome, CredentialLogin};

use tracing::warn;

use crate::diagnostics::Diagnostics;
use crate::traits::LoginStrategy;
use crate::types::{PlatformAuth, ScrapeTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    CheckpointBlocked,
}

/// ターゲットの認証手段に応じたログイン戦略。`None` なら未認証のまま進める。
pub fn select_strategy(
    target: &ScrapeTarget,
    profile: &AntiDetectionProfile,
    diagnostics: &Diagnostics,
) -> Option<Box<dyn LoginStrategy>> {
    match &target.auth {
        Some(PlatformAuth::Cookies(cookies)) if !cookies.is_empty() => {
            Some(Box::new(CookieLogin::new(target.platform, cookies.clone())))
        }
        Some(PlatformAuth::Credentials(credentials)) if credentials.is_complete() => {
            match target.platform.login_page() {
                Some(login_page) => Some(Box::new(CredentialLogin::new(
                    target.platform,
                    login_page,
                    credentials.clone(),
                    profile.clone(),
                    diagnostics.clone(),
                ))),
                None => {
                    warn!(
                        "No login form known for {}, continuing unauthenticated",
                        target.platform
                    );
                    None
                }
            }
        }
        _ => None,
    }
}
