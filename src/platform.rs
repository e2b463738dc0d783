//! プラットフォーム固有のURL・セレクタ・判定ルール

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Platform;

static KIJIJI_LOGIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)login|signin|t-login").expect("valid login regex"));
static KIJIJI_MY_ADS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/m-(?:my|m)-ads/").expect("valid my-ads regex"));
static KIJIJI_ACTIVE_BASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?/m-(?:my|m)-ads/active)(?:/(\d+))?/?(?:\?.*)?$").expect("valid base regex")
});
static TRAILING_PAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+/?(?:\?.*)?$").expect("valid page regex"));

/// 遷移直後のページ状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Ok,
    LoginRequired,
    Checkpoint,
}

/// 出品管理画面か詳細ページか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageView {
    DashboardList,
    DetailPage,
}

/// フォームログインのセレクタ候補（先頭から順に試す）
#[derive(Debug, Clone, Copy)]
pub struct LoginPage {
    pub url: &'static str,
    pub email_selectors: &'static [&'static str],
    pub password_selectors: &'static [&'static str],
    pub submit_selectors: &'static [&'static str],
    pub error_selectors: &'static [&'static str],
    pub success_selectors: &'static [&'static str],
}

const FACEBOOK_LOGIN: LoginPage = LoginPage {
    url: "https://www.facebook.com/login",
    email_selectors: &[
        r#"input[name="email"]"#,
        r#"input[name="username"]"#,
        r#"input[type="email"]"#,
        r#"input[placeholder*="email" i]"#,
        r#"input[id*="email" i]"#,
        "#email",
        r#"input[autocomplete="username"]"#,
    ],
    password_selectors: &[
        r#"input[name="pass"]"#,
        r#"input[type="password"]"#,
        r#"input[placeholder*="password" i]"#,
        r#"input[id*="password" i]"#,
        r#"input[id*="pass" i]"#,
        "#pass",
        r#"input[autocomplete="current-password"]"#,
    ],
    submit_selectors: &[
        r#"button[name="login"]"#,
        r#"button[type="submit"]"#,
        r#"input[type="submit"]"#,
        r#"button[data-testid="royal_login_button"]"#,
        r#"button[id*="login"]"#,
    ],
    error_selectors: &[
        r#"[role="alert"]"#,
        ".error",
        ".login_error_box",
        r#"[data-testid="login_error"]"#,
    ],
    success_selectors: &[
        r#"a[href*="/logout"]"#,
        r#"[aria-label*="menu"]"#,
        r#"div[role="banner"]"#,
        r#"div[data-pagelet="Feed"]"#,
        r#"div[data-pagelet="Profile"]"#,
        ".fb-logo",
    ],
};

impl Platform {
    /// クッキー設定前に開くページ（クロスオリジンでは設定できないため）
    pub fn home_url(&self) -> &'static str {
        match self {
            Platform::Facebook => "https://www.facebook.com/",
            Platform::Kijiji => "https://www.kijiji.ca/",
        }
    }

    /// クッキーのデフォルトドメイン
    pub fn cookie_domain(&self) -> &'static str {
        match self {
            Platform::Facebook => ".facebook.com",
            Platform::Kijiji => ".kijiji.ca",
        }
    }

    /// 既知のログインフォーム。無ければクレデンシャルログインは行わない。
    pub fn login_page(&self) -> Option<&'static LoginPage> {
        match self {
            Platform::Facebook => Some(&FACEBOOK_LOGIN),
            Platform::Kijiji => None,
        }
    }

    /// 遷移後のURLから認証状態を判定する
    pub fn classify_landing(&self, requested: &str, landed: &str, has_password_field: bool) -> Landing {
        match self {
            Platform::Facebook => {
                if landed.contains("checkpoint") {
                    Landing::Checkpoint
                } else if landed.contains("/login") {
                    Landing::LoginRequired
                } else {
                    Landing::Ok
                }
            }
            Platform::Kijiji => {
                if KIJIJI_LOGIN_RE.is_match(landed) || has_password_field {
                    Landing::LoginRequired
                } else if KIJIJI_MY_ADS_RE.is_match(requested) && !KIJIJI_MY_ADS_RE.is_match(landed) {
                    // My Ads を要求したのに別ページへ飛ばされた
                    Landing::LoginRequired
                } else {
                    Landing::Ok
                }
            }
        }
    }

    pub fn classify_view(&self, landed: &str) -> PageView {
        let dashboard = match self {
            Platform::Facebook => landed.contains("/marketplace/you/selling"),
            Platform::Kijiji => KIJIJI_MY_ADS_RE.is_match(landed),
        };
        if dashboard {
            PageView::DashboardList
        } else {
            PageView::DetailPage
        }
    }
}

/// Kijiji My Ads のページ番号なしURL
pub fn kijiji_dashboard_base(url: &str) -> String {
    if let Some(caps) = KIJIJI_ACTIVE_BASE_RE.captures(url) {
        return caps[1].to_string();
    }
    TRAILING_PAGE_RE.replace(url, "").trim_end_matches('/').to_string()
}

pub fn kijiji_dashboard_page(base: &str, page: u32) -> String {
    format!("{}/{}", base, page)
}
