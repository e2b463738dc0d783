//! クッキー注入によるログイン

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::SessionState;
use crate::error::ScraperError;
use crate::traits::{LoginStrategy, PageDriver};
use crate::platform::Landing;
use crate::types::{CookieRecord, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// 拡張機能の表記ゆれ（`no_restriction`, `lax`, `unspecified` 等）を厳密な値に変換する
pub fn parse_same_site(raw: &str) -> Option<SameSite> {
    let s = raw.to_ascii_lowercase();
    if s.contains("no") {
        Some(SameSite::None)
    } else if s.contains("lax") {
        Some(SameSite::Lax)
    } else if s.contains("strict") {
        Some(SameSite::Strict)
    } else {
        None
    }
}

/// ブラウザに設定できる形に正規化したクッキー
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// UNIX秒
    pub expires: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

/// 設定をスキップした理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieSkip {
    MissingName,
    InvalidDomain(String),
}

impl fmt::Display for CookieSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookieSkip::MissingName => f.write_str("missing cookie name"),
            CookieSkip::InvalidDomain(d) => write!(f, "invalid or unsupported domain '{}'", d),
        }
    }
}

fn is_valid_domain(domain: &str, platform: Platform) -> bool {
    let host = domain.trim_start_matches('.').to_ascii_lowercase();
    if host.is_empty()
        || host.contains("..")
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return false;
    }
    let site = platform.cookie_domain().trim_start_matches('.');
    host == site || host.ends_with(&format!(".{}", site))
}

/// 1件のエクスポートされたクッキーを変換する。不正な個別フィールドは警告して落とす。
pub fn map_cookie(record: &CookieRecord, platform: Platform) -> Result<SessionCookie, CookieSkip> {
    let name = record
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(CookieSkip::MissingName)?;

    let domain = match record.domain.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => platform.cookie_domain().to_string(),
    };
    if !is_valid_domain(&domain, platform) {
        return Err(CookieSkip::InvalidDomain(domain));
    }

    let path = record
        .path
        .as_deref()
        .filter(|p| p.starts_with('/'))
        .unwrap_or("/")
        .to_string();

    let expires = match record.expiration_date {
        Some(ts) if ts.is_finite() && ts >= 0.0 => Some(ts.floor() as i64),
        Some(ts) => {
            warn!("Dropping invalid expiration for cookie {}: {}", name, ts);
            None
        }
        None => None,
    };

    let same_site = record.same_site.as_deref().and_then(|raw| {
        let parsed = parse_same_site(raw);
        if parsed.is_none() {
            debug!("Unrecognized sameSite '{}' for cookie {}, leaving unset", raw, name);
        }
        parsed
    });

    Ok(SessionCookie {
        name: name.to_string(),
        value: record.value.clone().unwrap_or_default(),
        domain,
        path,
        expires,
        http_only: record.http_only.unwrap_or(false),
        secure: record.secure != Some(false),
        same_site,
    })
}

/// エクスポート済みクッキーを注入する
pub struct CookieLogin {
    platform: Platform,
    cookies: Vec<CookieRecord>,
}

impl CookieLogin {
    pub fn new(platform: Platform, cookies: Vec<CookieRecord>) -> Self {
        Self { platform, cookies }
    }
}

#[async_trait]
impl LoginStrategy for CookieLogin {
    fn name(&self) -> &'static str {
        "cookies"
    }

    async fn authenticate(&self, page: &dyn PageDriver) -> Result<SessionState, ScraperError> {
        info!(
            "Applying {} {} cookies to the page",
            self.cookies.len(),
            self.platform
        );

        // クッキーはクロスオリジンでは設定できないので先に対象ドメインを開く
        let home = self.platform.home_url();
        match page.goto(home).await {
            Ok(()) => {
                let landed = page.current_url().await.unwrap_or_default();
                if self.platform.classify_landing(home, &landed, false) == Landing::Checkpoint {
                    warn!("{} account is held at a checkpoint: {}", self.platform, landed);
                    return Ok(SessionState::CheckpointBlocked);
                }
            }
            Err(e) => warn!("Failed to open {} before setting cookies: {}", home, e),
        }

        let mut applied = 0usize;
        for record in &self.cookies {
            let cookie = match map_cookie(record, self.platform) {
                Ok(cookie) => cookie,
                Err(skip) => {
                    warn!("Skipping cookie {:?}: {}", record.name, skip);
                    continue;
                }
            };
            match page.set_cookie(&cookie).await {
                Ok(()) => applied += 1,
                Err(e) => warn!("Failed to set cookie {}: {}", cookie.name, e),
            }
        }

        info!("Applied {}/{} cookies", applied, self.cookies.len());
        Ok(if applied > 0 {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        })
    }
}
