//! 出品詳細ページからの抽出

use scraper::{Html, Selector};
use tracing::debug;

use super::numbers::parse_number_like;
use super::patterns::extract_labeled;
use crate::types::{MetricCounts, Platform};

const KIJIJI_VIEW_SELECTORS: &[&str] = &[
    ".view-count",
    ".views",
    r#"[data-qa="view-count"]"#,
    ".listing-stats .views",
    ".engagement .views",
    ".stats .views",
];

const KIJIJI_FAVORITE_SELECTORS: &[&str] = &[
    ".favorites-count",
    ".favourites-count",
    r#"[data-qa="favorite-count"]"#,
    ".saved-count",
    ".watch-count",
];

/// 最初に見つかった要素のテキストを数値化する
fn first_selector_value(doc: &Html, selectors: &[&str]) -> u64 {
    for css in selectors {
        let Ok(sel) = Selector::parse(css) else {
            debug!("Skipping invalid selector: {}", css);
            continue;
        };
        if let Some(el) = doc.select(&sel).next() {
            let text = el.text().collect::<String>();
            let value = parse_number_like(&text);
            if value > 0 {
                return value;
            }
        }
    }
    0
}

fn selector_counts(platform: Platform, html: &str) -> MetricCounts {
    match platform {
        Platform::Kijiji => {
            let doc = Html::parse_document(html);
            MetricCounts {
                views: first_selector_value(&doc, KIJIJI_VIEW_SELECTORS),
                favorites: first_selector_value(&doc, KIJIJI_FAVORITE_SELECTORS),
                ..Default::default()
            }
        }
        Platform::Facebook => MetricCounts::default(),
    }
}

/// プラットフォーム固有のセレクタを優先し、足りない項目は本文のラベル付きパターンで補う
pub fn extract_detail(platform: Platform, html: &str, body_text: &str) -> MetricCounts {
    selector_counts(platform, html).or(extract_labeled(body_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kijiji_selectors_first() {
        let html = r#"<div class="listing-stats"><span class="views">2.4K</span></div>
                      <div class="favorites-count">7</div>"#;
        let counts = extract_detail(Platform::Kijiji, html, "99 views");
        assert_eq!(counts.views, 2400);
        assert_eq!(counts.favorites, 7);
    }

    #[test]
    fn test_falls_back_to_body_text() {
        let counts = extract_detail(
            Platform::Facebook,
            "<p>ignored</p>",
            "Listed 2 weeks ago\n31 clicks on listing\n4 saves",
        );
        assert_eq!(counts.clicks, 31);
        assert_eq!(counts.favorites, 4);
        assert_eq!(counts.views, 0);
    }

    #[test]
    fn test_nothing_found() {
        assert!(!extract_detail(Platform::Kijiji, "<p>Hi</p>", "Hi").has_signal());
    }
}
