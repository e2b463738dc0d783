use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, CookieSameSite, Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
    TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use tracing::debug;

use crate::auth::{SameSite, SessionCookie};
use crate::error::ScraperError;
use crate::traits::PageDriver;

const SCROLL_TO_BOTTOM_JS: &str = r#"
(() => {
    window.scrollTo(0, document.body.scrollHeight);
    return document.body.scrollHeight;
})()
"#;

/// chromiumoxide の `Page` に対する [`PageDriver`] 実装
pub struct BrowserPage {
    page: Page,
    navigation_timeout: Duration,
}

impl BrowserPage {
    pub fn new(page: Page, navigation_timeout: Duration) -> Self {
        Self {
            page,
            navigation_timeout,
        }
    }

    fn js_err(e: impl std::fmt::Display) -> ScraperError {
        ScraperError::JavaScript(e.to_string())
    }
}

#[async_trait]
impl PageDriver for BrowserPage {
    async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScraperError::Navigation(format!("{}: {}", url, e))),
            Err(_) => Err(ScraperError::NavigationTimeout(format!(
                "{} ({}s)",
                url,
                self.navigation_timeout.as_secs()
            ))),
        }
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, ScraperError> {
        self.page.content().await.map_err(Self::js_err)
    }

    async fn body_text(&self) -> Result<String, ScraperError> {
        self.page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(Self::js_err)?
            .into_value::<String>()
            .map_err(Self::js_err)
    }

    async fn has_element(&self, selector: &str) -> bool {
        self.page.find_element(selector).await.is_ok()
    }

    async fn element_text(&self, selector: &str) -> Option<String> {
        let element = self.page.find_element(selector).await.ok()?;
        element.inner_text().await.ok().flatten()
    }

    async fn focus(&self, selector: &str) -> Result<(), ScraperError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?;
        element.focus().await.map_err(Self::js_err)?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), ScraperError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?;
        element.type_str(text).await.map_err(Self::js_err)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?;
        element.click().await.map_err(Self::js_err)?;
        Ok(())
    }

    async fn scroll_step(&self) -> Result<u64, ScraperError> {
        self.page
            .evaluate(SCROLL_TO_BOTTOM_JS)
            .await
            .map_err(Self::js_err)?
            .into_value::<u64>()
            .map_err(Self::js_err)
    }

    async fn scroll_to_top(&self) -> Result<(), ScraperError> {
        self.page
            .evaluate("window.scrollTo(0, 0)")
            .await
            .map_err(Self::js_err)?;
        Ok(())
    }

    async fn set_cookie(&self, cookie: &SessionCookie) -> Result<(), ScraperError> {
        let mut builder = CookieParam::builder()
            .name(&cookie.name)
            .value(&cookie.value)
            .domain(&cookie.domain)
            .path(&cookie.path)
            .secure(cookie.secure)
            .http_only(cookie.http_only);
        if let Some(expires) = cookie.expires {
            builder = builder.expires(TimeSinceEpoch::new(expires as f64));
        }
        if let Some(same_site) = cookie.same_site {
            builder = builder.same_site(match same_site {
                SameSite::Strict => CookieSameSite::Strict,
                SameSite::Lax => CookieSameSite::Lax,
                SameSite::None => CookieSameSite::None,
            });
        }
        let param = builder.build().map_err(ScraperError::Unexpected)?;
        self.page
            .set_cookie(param)
            .await
            .map_err(|e| ScraperError::Unexpected(format!("set_cookie {}: {}", cookie.name, e)))?;
        Ok(())
    }

    async fn add_init_script(&self, source: &str) -> Result<(), ScraperError> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams {
                source: source.to_string(),
                include_command_line_api: None,
                world_name: None,
                run_immediately: None,
            })
            .await
            .map_err(Self::js_err)?;
        Ok(())
    }

    async fn set_user_agent(&self, user_agent: &str) -> Result<(), ScraperError> {
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(Self::js_err)?;
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), ScraperError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(ScraperError::Unexpected)?;
        self.page.execute(params).await.map_err(Self::js_err)?;
        Ok(())
    }

    async fn set_extra_headers(&self, headers: &[(&str, &str)]) -> Result<(), ScraperError> {
        let map: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(map),
            )))
            .await
            .map_err(Self::js_err)?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ScraperError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| ScraperError::Unexpected(format!("screenshot: {}", e)))
    }

    async fn close(self: Box<Self>) -> Result<(), ScraperError> {
        self.page
            .close()
            .await
            .map_err(|e| ScraperError::Unexpected(format!("close page: {}", e)))
    }
}
