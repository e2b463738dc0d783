use async_trait::async_trait;

use crate::auth::{SessionCookie, SessionState};
use crate::error::ScraperError;
use crate::types::{AnalyticsPatch, Listing};

/// ブラウザページに対する操作
///
/// DOMヒューリスティクスはHTMLスナップショットに対する純粋関数として実装し、
/// ブラウザとのやり取りはこのトレイトに限定する。
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// ナビゲーション（タイムアウトは `NavigationTimeout`）
    async fn goto(&self, url: &str) -> Result<(), ScraperError>;

    async fn current_url(&self) -> Result<String, ScraperError>;

    /// 現在のDOMのHTML
    async fn content(&self) -> Result<String, ScraperError>;

    /// `document.body.innerText`
    async fn body_text(&self) -> Result<String, ScraperError>;

    async fn has_element(&self, selector: &str) -> bool;

    async fn element_text(&self, selector: &str) -> Option<String>;

    async fn focus(&self, selector: &str) -> Result<(), ScraperError>;

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), ScraperError>;

    async fn click(&self, selector: &str) -> Result<(), ScraperError>;

    /// 1画面分スクロールして、スクロール後の `scrollHeight` を返す
    async fn scroll_step(&self) -> Result<u64, ScraperError>;

    async fn scroll_to_top(&self) -> Result<(), ScraperError>;

    async fn set_cookie(&self, cookie: &SessionCookie) -> Result<(), ScraperError>;

    /// 以降のドキュメント読み込み時に評価されるスクリプト
    async fn add_init_script(&self, source: &str) -> Result<(), ScraperError>;

    async fn set_user_agent(&self, user_agent: &str) -> Result<(), ScraperError>;

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), ScraperError>;

    async fn set_extra_headers(&self, headers: &[(&str, &str)]) -> Result<(), ScraperError>;

    /// PNGのフルページスクリーンショット
    async fn screenshot(&self) -> Result<Vec<u8>, ScraperError>;

    async fn close(self: Box<Self>) -> Result<(), ScraperError>;
}

/// 独立したページを払い出す
#[async_trait]
pub trait PageProvider: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, ScraperError>;
}

/// ログイン戦略（クッキー注入 / フォームログイン）
#[async_trait]
pub trait LoginStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn authenticate(&self, page: &dyn PageDriver) -> Result<SessionState, ScraperError>;
}

/// 出品の保存層
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// 分析URLが設定された出品
    async fn find_scrapeable(&self) -> Result<Vec<Listing>, ScraperError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Listing>, ScraperError>;

    /// 項目単位でマージして保存する
    async fn save_analytics(&self, id: &str, patch: &AnalyticsPatch) -> Result<(), ScraperError>;
}
