//! スクレイプ対象・結果の型定義

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 対象マーケットプレイス
///
/// 1出品内では常に `Facebook` → `Kijiji` の順で処理する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Kijiji,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Facebook, Platform::Kijiji];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Kijiji => "kijiji",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// メール/パスワード認証情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialAuth {
    pub email: String,
    pub password: String,
}

impl CredentialAuth {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

/// ブラウザ拡張からエクスポートされたクッキー（型がゆるい）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, alias = "expires")]
    pub expiration_date: Option<f64>,
    #[serde(default)]
    pub http_only: Option<bool>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub same_site: Option<String>,
}

impl CookieRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_same_site(mut self, same_site: impl Into<String>) -> Self {
        self.same_site = Some(same_site.into());
        self
    }

    pub fn with_expiration(mut self, expiration_date: f64) -> Self {
        self.expiration_date = Some(expiration_date);
        self
    }
}

/// ターゲットごとの認証手段（有効なのは常に1つ）
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformAuth {
    Cookies(Vec<CookieRecord>),
    Credentials(CredentialAuth),
}

impl PlatformAuth {
    /// クッキーが与えられていればクレデンシャルより優先する
    pub fn select(
        credentials: Option<&CredentialAuth>,
        cookies: Option<&[CookieRecord]>,
    ) -> Option<Self> {
        match (cookies, credentials) {
            (Some(c), _) if !c.is_empty() => Some(PlatformAuth::Cookies(c.to_vec())),
            (_, Some(cred)) if cred.is_complete() => Some(PlatformAuth::Credentials(cred.clone())),
            _ => None,
        }
    }
}

/// スクレイプ対象（出品 × プラットフォーム）
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub platform: Platform,
    pub url: String,
    pub listing_title: String,
    pub auth: Option<PlatformAuth>,
}

impl ScrapeTarget {
    pub fn new(platform: Platform, url: impl Into<String>, listing_title: impl Into<String>) -> Self {
        Self {
            platform,
            url: url.into(),
            listing_title: listing_title.into(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, auth: Option<PlatformAuth>) -> Self {
        self.auth = auth;
        self
    }
}

/// 抽出した4指標
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricCounts {
    pub views: u64,
    pub clicks: u64,
    pub favorites: u64,
    pub shares: u64,
}

impl MetricCounts {
    /// いずれかの指標が0より大きいか
    pub fn has_signal(&self) -> bool {
        self.views > 0 || self.clicks > 0 || self.favorites > 0 || self.shares > 0
    }

    /// 0の項目だけを `other` で埋める
    pub fn or(self, other: MetricCounts) -> MetricCounts {
        let pick = |a: u64, b: u64| if a > 0 { a } else { b };
        MetricCounts {
            views: pick(self.views, other.views),
            clicks: pick(self.clicks, other.clicks),
            favorites: pick(self.favorites, other.favorites),
            shares: pick(self.shares, other.shares),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Error,
    #[default]
    Pending,
}

/// スクレイピング結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub views: u64,
    pub clicks: u64,
    pub favorites: u64,
    pub shares: u64,
    #[serde(rename = "scrapeStatus")]
    pub status: ScrapeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub last_scraped: DateTime<Utc>,
    pub listing_url: String,
}

impl ScrapeResult {
    /// 指標が全て0の場合は成功にせず `None` を返す
    pub fn success(counts: MetricCounts, listing_url: impl Into<String>) -> Option<Self> {
        if !counts.has_signal() {
            return None;
        }
        Some(Self {
            views: counts.views,
            clicks: counts.clicks,
            favorites: counts.favorites,
            shares: counts.shares,
            status: ScrapeStatus::Success,
            error_message: None,
            last_scraped: Utc::now(),
            listing_url: listing_url.into(),
        })
    }

    pub fn failure(message: impl Into<String>, listing_url: impl Into<String>) -> Self {
        Self {
            views: 0,
            clicks: 0,
            favorites: 0,
            shares: 0,
            status: ScrapeStatus::Error,
            error_message: Some(message.into()),
            last_scraped: Utc::now(),
            listing_url: listing_url.into(),
        }
    }

    pub fn counts(&self) -> MetricCounts {
        MetricCounts {
            views: self.views,
            clicks: self.clicks,
            favorites: self.favorites,
            shares: self.shares,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ScrapeStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == ScrapeStatus::Error
    }
}

/// バッチ結果の1行（入力の出品1件に対応）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub listing_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<ScrapeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kijiji: Option<ScrapeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchEntry {
    pub fn new(listing_id: impl Into<String>) -> Self {
        Self {
            listing_id: listing_id.into(),
            facebook: None,
            kijiji: None,
            error: None,
        }
    }

    pub fn result(&self, platform: Platform) -> Option<&ScrapeResult> {
        match platform {
            Platform::Facebook => self.facebook.as_ref(),
            Platform::Kijiji => self.kijiji.as_ref(),
        }
    }

    pub fn set_result(&mut self, platform: Platform, result: ScrapeResult) {
        match platform {
            Platform::Facebook => self.facebook = Some(result),
            Platform::Kijiji => self.kijiji = Some(result),
        }
    }

    pub fn results(&self) -> impl Iterator<Item = (Platform, &ScrapeResult)> {
        Platform::ALL
            .into_iter()
            .filter_map(move |p| self.result(p).map(|r| (p, r)))
    }

    pub fn patch(&self) -> AnalyticsPatch {
        AnalyticsPatch {
            facebook: self.facebook.clone(),
            kijiji: self.kijiji.clone(),
        }
    }
}

pub type BatchReport = Vec<BatchEntry>;

/// プラットフォーム別に保存されている分析値
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformAnalytics {
    pub views: u64,
    pub clicks: u64,
    pub favorites: u64,
    pub shares: u64,
    pub last_scraped: Option<DateTime<Utc>>,
    pub scrape_status: ScrapeStatus,
    pub error_message: Option<String>,
    pub listing_url: Option<String>,
}

impl PlatformAnalytics {
    pub fn with_listing_url(url: impl Into<String>) -> Self {
        Self {
            listing_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// 項目単位のマージ。失敗時は既存の指標を保持する。
    pub fn merge(&mut self, result: &ScrapeResult) {
        if result.is_success() {
            self.views = result.views;
            self.clicks = result.clicks;
            self.favorites = result.favorites;
            self.shares = result.shares;
            self.error_message = None;
        } else {
            self.error_message = result.error_message.clone();
        }
        self.scrape_status = result.status;
        self.last_scraped = Some(result.last_scraped);
        self.listing_url = Some(result.listing_url.clone());
    }

    fn configured_url(&self) -> Option<&str> {
        self.listing_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingAnalytics {
    #[serde(default)]
    pub facebook: PlatformAnalytics,
    #[serde(default)]
    pub kijiji: PlatformAnalytics,
}

impl ListingAnalytics {
    pub fn get(&self, platform: Platform) -> &PlatformAnalytics {
        match platform {
            Platform::Facebook => &self.facebook,
            Platform::Kijiji => &self.kijiji,
        }
    }

    pub fn apply(&mut self, patch: &AnalyticsPatch) {
        if let Some(r) = &patch.facebook {
            self.facebook.merge(r);
        }
        if let Some(r) = &patch.kijiji {
            self.kijiji.merge(r);
        }
    }
}

/// 保存層へ渡す差分
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsPatch {
    pub facebook: Option<ScrapeResult>,
    pub kijiji: Option<ScrapeResult>,
}

impl AnalyticsPatch {
    pub fn is_empty(&self) -> bool {
        self.facebook.is_none() && self.kijiji.is_none()
    }
}

/// 出品レコード（保存層の形に合わせる）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub posted_facebook: bool,
    #[serde(default)]
    pub posted_kijiji: bool,
    #[serde(default)]
    pub analytics: ListingAnalytics,
}

impl Listing {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            posted_facebook: false,
            posted_kijiji: false,
            analytics: ListingAnalytics::default(),
        }
    }

    pub fn with_facebook_url(mut self, url: impl Into<String>) -> Self {
        self.posted_facebook = true;
        self.analytics.facebook.listing_url = Some(url.into());
        self
    }

    pub fn with_kijiji_url(mut self, url: impl Into<String>) -> Self {
        self.posted_kijiji = true;
        self.analytics.kijiji.listing_url = Some(url.into());
        self
    }

    fn is_posted(&self, platform: Platform) -> bool {
        match platform {
            Platform::Facebook => self.posted_facebook,
            Platform::Kijiji => self.posted_kijiji,
        }
    }

    /// 掲載済みかつURL設定済みのプラットフォームのURL
    pub fn scrape_url(&self, platform: Platform) -> Option<&str> {
        if !self.is_posted(platform) {
            return None;
        }
        self.analytics.get(platform).configured_url()
    }

    /// URLが設定されているか（定期実行の対象判定）
    pub fn has_configured_url(&self) -> bool {
        Platform::ALL
            .iter()
            .any(|p| self.analytics.get(*p).configured_url().is_some())
    }

    /// 出品から固定順のターゲットを作る。認証の上書きは Facebook にのみ適用する。
    pub fn targets(
        &self,
        credentials: Option<&CredentialAuth>,
        cookies: Option<&[CookieRecord]>,
    ) -> Vec<ScrapeTarget> {
        Platform::ALL
            .iter()
            .filter_map(|&platform| {
                let url = self.scrape_url(platform)?;
                let auth = match platform {
                    Platform::Facebook => PlatformAuth::select(credentials, cookies),
                    Platform::Kijiji => None,
                };
                Some(ScrapeTarget::new(platform, url, self.title.clone()).with_auth(auth))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_signal() {
        assert!(ScrapeResult::success(MetricCounts::default(), "u").is_none());

        let counts = MetricCounts {
            clicks: 3,
            ..Default::default()
        };
        let result = ScrapeResult::success(counts, "u").unwrap();
        assert!(result.is_success());
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_failure_carries_message() {
        let result = ScrapeResult::failure("boom", "https://example.com/item");
        assert!(result.is_error());
        assert_eq!(result.error_message.as_deref(), Some("boom"));
        assert_eq!(result.counts(), MetricCounts::default());
        assert_eq!(result.listing_url, "https://example.com/item");
    }

    #[test]
    fn test_scrape_result_json_shape() {
        let result = ScrapeResult::failure("nope", "u");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["scrapeStatus"], "error");
        assert_eq!(json["errorMessage"], "nope");
        assert_eq!(json["listingUrl"], "u");
        assert!(json.get("lastScraped").is_some());
    }

    #[test]
    fn test_cookies_take_precedence() {
        let cred = CredentialAuth::new("a@b.c", "pw");
        let cookies = vec![CookieRecord::new("c_user", "1")];

        let auth = PlatformAuth::select(Some(&cred), Some(&cookies));
        assert!(matches!(auth, Some(PlatformAuth::Cookies(ref c)) if c.len() == 1));

        let auth = PlatformAuth::select(Some(&cred), Some(&[]));
        assert!(matches!(auth, Some(PlatformAuth::Credentials(_))));

        let incomplete = CredentialAuth::new("a@b.c", "");
        assert!(PlatformAuth::select(Some(&incomplete), None).is_none());
    }

    #[test]
    fn test_merge_keeps_counters_on_failure() {
        let mut analytics = PlatformAnalytics::with_listing_url("u");
        let ok = ScrapeResult::success(
            MetricCounts {
                views: 10,
                clicks: 4,
                ..Default::default()
            },
            "u",
        )
        .unwrap();
        analytics.merge(&ok);
        assert_eq!(analytics.views, 10);
        assert_eq!(analytics.scrape_status, ScrapeStatus::Success);

        analytics.merge(&ScrapeResult::failure("timeout", "u"));
        assert_eq!(analytics.views, 10);
        assert_eq!(analytics.clicks, 4);
        assert_eq!(analytics.scrape_status, ScrapeStatus::Error);
        assert_eq!(analytics.error_message.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_listing_targets_order_and_auth() {
        let listing = Listing::new("1", "Oak desk")
            .with_kijiji_url("https://www.kijiji.ca/v-desk/123")
            .with_facebook_url("https://www.facebook.com/marketplace/item/9");
        let cred = CredentialAuth::new("a@b.c", "pw");

        let targets = listing.targets(Some(&cred), None);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].platform, Platform::Facebook);
        assert!(targets[0].auth.is_some());
        assert_eq!(targets[1].platform, Platform::Kijiji);
        assert!(targets[1].auth.is_none());
    }

    #[test]
    fn test_unposted_or_blank_url_is_skipped() {
        let mut listing = Listing::new("1", "Lamp").with_facebook_url("  ");
        listing.analytics.kijiji.listing_url = Some("https://www.kijiji.ca/v-lamp/1".into());
        assert!(listing.targets(None, None).is_empty());
        assert!(listing.has_configured_url());
    }

    #[test]
    fn test_cookie_record_accepts_extension_export() {
        let json = r#"{"name":"xs","value":"abc","domain":".facebook.com","path":"/",
            "expirationDate":1767225600.5,"httpOnly":true,"secure":true,"sameSite":"no_restriction"}"#;
        let record: CookieRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name.as_deref(), Some("xs"));
        assert_eq!(record.expiration_date, Some(1767225600.5));
        assert_eq!(record.http_only, Some(true));
        assert_eq!(record.same_site.as_deref(), Some("no_restriction"));
    }
}
