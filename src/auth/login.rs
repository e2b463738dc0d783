//! メール/パスワードによるフォームログイン

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{AntiDetectionProfile, DelayRange, SessionState};
use crate::diagnostics::Diagnostics;
use crate::error::ScraperError;
use crate::platform::LoginPage;
use crate::traits::{LoginStrategy, PageDriver};
use crate::types::{CredentialAuth, Platform};

/// 送信後の判定結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    LoginRejected(String),
    CheckpointBlocked,
    Unknown,
}

/// 送信後のページ状態からログイン結果を判定する
///
/// エラー表示 → URL（ログイン画面のまま / チェックポイント） → ログイン後の目印、の順で見る。
pub fn classify_login(url: &str, error_text: Option<&str>, has_success_marker: bool) -> AuthOutcome {
    if let Some(text) = error_text {
        let lower = text.to_lowercase();
        if ["error", "incorrect", "wrong"].iter().any(|k| lower.contains(k)) {
            return AuthOutcome::LoginRejected(text.trim().to_string());
        }
    }
    if url.contains("/login") || url.contains("checkpoint") {
        return AuthOutcome::CheckpointBlocked;
    }
    if has_success_marker {
        AuthOutcome::Authenticated
    } else {
        AuthOutcome::Unknown
    }
}

impl AuthOutcome {
    fn into_error(self, url: &str) -> ScraperError {
        match self {
            AuthOutcome::LoginRejected(text) => {
                ScraperError::Authentication(format!("Login rejected: {}", text))
            }
            AuthOutcome::CheckpointBlocked => ScraperError::CheckpointBlocked(format!(
                "still on login or checkpoint page: {}",
                url
            )),
            AuthOutcome::Unknown | AuthOutcome::Authenticated => ScraperError::Authentication(
                "Could not verify successful login - no success indicators found".into(),
            ),
        }
    }
}

async fn first_present(page: &dyn PageDriver, selectors: &[&'static str]) -> Option<&'static str> {
    for &sel in selectors {
        if page.has_element(sel).await {
            return Some(sel);
        }
    }
    None
}

pub struct CredentialLogin {
    platform: Platform,
    login_page: &'static LoginPage,
    credentials: CredentialAuth,
    profile: AntiDetectionProfile,
    diagnostics: Diagnostics,
}

impl CredentialLogin {
    pub fn new(
        platform: Platform,
        login_page: &'static LoginPage,
        credentials: CredentialAuth,
        profile: AntiDetectionProfile,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            platform,
            login_page,
            credentials,
            profile,
            diagnostics,
        }
    }

    /// 1文字ずつ間隔をあけて入力する
    async fn type_slowly(
        &self,
        page: &dyn PageDriver,
        selector: &str,
        text: &str,
        delay: DelayRange,
    ) -> Result<(), ScraperError> {
        page.focus(selector).await?;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            page.type_text(selector, ch.encode_utf8(&mut buf)).await?;
            AntiDetectionProfile::pause(delay).await;
        }
        Ok(())
    }

    async fn submit_form(&self, page: &dyn PageDriver) -> Result<(String, AuthOutcome), ScraperError> {
        let form = self.login_page;

        self.profile.apply(page).await?;
        page.goto(form.url).await?;
        AntiDetectionProfile::pause(self.profile.settle_pause).await;

        let email = first_present(page, form.email_selectors)
            .await
            .ok_or_else(|| ScraperError::Authentication("Could not locate email input field".into()))?;
        debug!("Email field: {}", email);
        self.type_slowly(page, email, &self.credentials.email, self.profile.email_key_delay)
            .await?;

        AntiDetectionProfile::pause(self.profile.field_pause).await;

        let password = first_present(page, form.password_selectors)
            .await
            .ok_or_else(|| ScraperError::Authentication("Could not locate password input field".into()))?;
        self.type_slowly(
            page,
            password,
            &self.credentials.password,
            self.profile.password_key_delay,
        )
        .await?;

        AntiDetectionProfile::pause(self.profile.submit_pause).await;

        let submit = first_present(page, form.submit_selectors)
            .await
            .ok_or_else(|| ScraperError::Authentication("Could not locate login button".into()))?;
        info!("Submitting {} login form", self.platform);
        page.click(submit).await?;

        AntiDetectionProfile::pause(self.profile.settle_pause).await;

        let url = page.current_url().await?;
        let mut error_text = None;
        for &sel in form.error_selectors {
            if let Some(text) = page.element_text(sel).await {
                if !text.trim().is_empty() {
                    error_text = Some(text);
                    break;
                }
            }
        }
        let has_success = first_present(page, form.success_selectors).await.is_some();

        let outcome = classify_login(&url, error_text.as_deref(), has_success);
        Ok((url, outcome))
    }
}

#[async_trait]
impl LoginStrategy for CredentialLogin {
    fn name(&self) -> &'static str {
        "credentials"
    }

    async fn authenticate(&self, page: &dyn PageDriver) -> Result<SessionState, ScraperError> {
        info!("Logging in to {} as {}", self.platform, self.credentials.email);

        let err = match self.submit_form(page).await {
            Ok((_, AuthOutcome::Authenticated)) => {
                info!("{} login successful", self.platform);
                return Ok(SessionState::Authenticated);
            }
            Ok((url, outcome)) => {
                warn!("{} login not confirmed: {:?} (url={})", self.platform, outcome, url);
                outcome.into_error(&url)
            }
            Err(e) => {
                warn!("{} login failed: {}", self.platform, e);
                e
            }
        };

        self.diagnostics
            .capture(page, &format!("{}_login_failure", self.platform))
            .await;
        Err(err)
    }
}
