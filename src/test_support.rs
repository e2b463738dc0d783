//! テスト用のページ・プロバイダ
//!
//! URLごとに固定HTMLを返し、操作履歴を記録する。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio::time::Instant;

use crate::auth::SessionCookie;
use crate::error::ScraperError;
use crate::traits::{PageDriver, PageProvider};

const BLANK: &str = "<html><body></body></html>";

#[derive(Default)]
struct SiteState {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    click_targets: HashMap<String, String>,
    goto_failures: HashMap<String, usize>,
    scroll_heights: VecDeque<u64>,
    last_height: u64,
    scroll_steps: usize,
    fail_screenshots: bool,

    visited: Vec<String>,
    cookies: Vec<SessionCookie>,
    typed: HashMap<String, String>,
    init_scripts: Vec<String>,
    user_agent: Option<String>,
    screenshots: usize,
    opened_at: Vec<Instant>,
    closed: usize,
}

/// 複数ページで共有される疑似サイト
#[derive(Clone, Default)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut SiteState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_page(&self, url: &str, html: &str) {
        self.with(|s| s.pages.insert(url.to_string(), html.to_string()));
    }

    pub fn redirect(&self, from: &str, to: &str) {
        self.with(|s| s.redirects.insert(from.to_string(), to.to_string()));
    }

    /// セレクタのクリックで `url` へ遷移させる
    pub fn on_click(&self, selector: &str, url: &str) {
        self.with(|s| s.click_targets.insert(selector.to_string(), url.to_string()));
    }

    /// 最初の `times` 回のナビゲーションをタイムアウトさせる
    pub fn fail_goto(&self, url: &str, times: usize) {
        self.with(|s| s.goto_failures.insert(url.to_string(), times));
    }

    pub fn set_scroll_heights(&self, heights: &[u64]) {
        self.with(|s| s.scroll_heights = heights.iter().copied().collect());
    }

    pub fn fail_screenshots(&self) {
        self.with(|s| s.fail_screenshots = true);
    }

    pub fn visited(&self) -> Vec<String> {
        self.with(|s| s.visited.clone())
    }

    pub fn cookies(&self) -> Vec<SessionCookie> {
        self.with(|s| s.cookies.clone())
    }

    pub fn typed(&self, selector: &str) -> String {
        self.with(|s| s.typed.get(selector).cloned().unwrap_or_default())
    }

    pub fn init_scripts(&self) -> Vec<String> {
        self.with(|s| s.init_scripts.clone())
    }

    pub fn user_agent(&self) -> Option<String> {
        self.with(|s| s.user_agent.clone())
    }

    pub fn scroll_steps(&self) -> usize {
        self.with(|s| s.scroll_steps)
    }

    pub fn screenshots(&self) -> usize {
        self.with(|s| s.screenshots)
    }

    pub fn page_opened_at(&self) -> Vec<Instant> {
        self.with(|s| s.opened_at.clone())
    }

    pub fn pages_closed(&self) -> usize {
        self.with(|s| s.closed)
    }

    fn html(&self, url: &str) -> String {
        self.with(|s| s.pages.get(url).cloned().unwrap_or_else(|| BLANK.to_string()))
    }
}

pub struct FakePage {
    site: FakeSite,
    url: Mutex<String>,
}

impl FakePage {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site,
            url: Mutex::new("about:blank".into()),
        }
    }

    fn current(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    fn document(&self) -> Html {
        Html::parse_document(&self.site.html(&self.current()))
    }

    fn first_text(&self, selector: &str) -> Option<String> {
        let sel = Selector::parse(selector).ok()?;
        let doc = self.document();
        let text = doc.select(&sel).next()?.text().collect::<String>();
        Some(text)
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        let failing = self.site.with(|s| {
            s.visited.push(url.to_string());
            match s.goto_failures.get_mut(url) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        });
        if failing {
            return Err(ScraperError::NavigationTimeout(url.to_string()));
        }
        let landed = self
            .site
            .with(|s| s.redirects.get(url).cloned())
            .unwrap_or_else(|| url.to_string());
        *self.url.lock().unwrap() = landed;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self.current())
    }

    async fn content(&self) -> Result<String, ScraperError> {
        Ok(self.site.html(&self.current()))
    }

    async fn body_text(&self) -> Result<String, ScraperError> {
        let doc = self.document();
        let lines: Vec<&str> = doc
            .root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        Ok(lines.join("\n"))
    }

    async fn has_element(&self, selector: &str) -> bool {
        self.first_text(selector).is_some()
    }

    async fn element_text(&self, selector: &str) -> Option<String> {
        self.first_text(selector)
    }

    async fn focus(&self, selector: &str) -> Result<(), ScraperError> {
        if self.first_text(selector).is_none() {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), ScraperError> {
        self.site.with(|s| {
            s.typed.entry(selector.to_string()).or_default().push_str(text);
        });
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        if let Some(target) = self.site.with(|s| s.click_targets.get(selector).cloned()) {
            *self.url.lock().unwrap() = target;
            return Ok(());
        }
        if self.first_text(selector).is_none() {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn scroll_step(&self) -> Result<u64, ScraperError> {
        Ok(self.site.with(|s| {
            s.scroll_steps += 1;
            if let Some(h) = s.scroll_heights.pop_front() {
                s.last_height = h;
            }
            s.last_height
        }))
    }

    async fn scroll_to_top(&self) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn set_cookie(&self, cookie: &SessionCookie) -> Result<(), ScraperError> {
        self.site.with(|s| s.cookies.push(cookie.clone()));
        Ok(())
    }

    async fn add_init_script(&self, source: &str) -> Result<(), ScraperError> {
        self.site.with(|s| s.init_scripts.push(source.to_string()));
        Ok(())
    }

    async fn set_user_agent(&self, user_agent: &str) -> Result<(), ScraperError> {
        self.site.with(|s| s.user_agent = Some(user_agent.to_string()));
        Ok(())
    }

    async fn set_viewport(&self, _width: u32, _height: u32) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn set_extra_headers(&self, _headers: &[(&str, &str)]) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ScraperError> {
        self.site.with(|s| {
            if s.fail_screenshots {
                return Err(ScraperError::Unexpected("screenshot unavailable".into()));
            }
            s.screenshots += 1;
            Ok(b"\x89PNG\r\n\x1a\n".to_vec())
        })
    }

    async fn close(self: Box<Self>) -> Result<(), ScraperError> {
        self.site.with(|s| s.closed += 1);
        Ok(())
    }
}

pub struct FakeProvider {
    site: FakeSite,
    failing: bool,
}

impl FakeProvider {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site,
            failing: false,
        }
    }

    /// ページを作れないブラウザ
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl PageProvider for FakeProvider {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, ScraperError> {
        if self.failing {
            return Err(ScraperError::BrowserInit("browser unavailable".into()));
        }
        self.site.with(|s| s.opened_at.push(Instant::now()));
        Ok(Box::new(FakePage::new(self.site.clone())))
    }
}
