//! ラベル付き指標のパターン抽出
//!
//! 例: `"197 clicks on listing"`, `"1.2K views"`, `"5 saves"`

use once_cell::sync::Lazy;
use regex::Regex;

use super::numbers::parse_number_like;
use crate::types::MetricCounts;

const NUM: &str = r"(\d[\d,.]*(?:\s?[KkMm]\b)?)";

static CLICKS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i){NUM}\+?\s+clicks?\s+on\s+listing")).expect("valid clicks regex")
});

static VIEWS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i){NUM}\+?\s+views?\b")).expect("valid views regex"));

static FAVORITES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i){NUM}\+?\s+(?:saves?|favou?rites?)\b"))
        .expect("valid favorites regex")
});

static SHARES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i){NUM}\+?\s+shares?\b")).expect("valid shares regex"));

/// テキストからラベル付きの指標を抽出する。
/// クリック数は全マッチの最大値、それ以外は最初のマッチ。
pub fn extract_labeled(text: &str) -> MetricCounts {
    MetricCounts {
        views: first_match(&VIEWS_RE, text),
        clicks: max_match(&CLICKS_RE, text),
        favorites: first_match(&FAVORITES_RE, text),
        shares: first_match(&SHARES_RE, text),
    }
}

/// ラベル付き指標を1つでも含むか
pub fn has_labeled_metric(text: &str) -> bool {
    extract_labeled(text).has_signal()
}

fn first_match(re: &Regex, text: &str) -> u64 {
    re.captures(text)
        .map(|caps| parse_number_like(&caps[1]))
        .unwrap_or(0)
}

fn max_match(re: &Regex, text: &str) -> u64 {
    re.captures_iter(text)
        .map(|caps| parse_number_like(&caps[1]))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_card_text() {
        let text = "Solid oak desk $120 · Listed on Marketplace 197 clicks on listing 12 saves Mark as sold";
        let counts = extract_labeled(text);
        assert_eq!(counts.clicks, 197);
        assert_eq!(counts.favorites, 12);
        assert_eq!(counts.views, 0);
    }

    #[test]
    fn test_clicks_takes_maximum_and_plus() {
        let text = "12 clicks on listing · 1,024+ clicks on listing";
        assert_eq!(extract_labeled(text).clicks, 1024);
    }

    #[test]
    fn test_suffixes_and_case() {
        let counts = extract_labeled("1.2K Views • 3 Favourites • 2 shares");
        assert_eq!(counts.views, 1200);
        assert_eq!(counts.favorites, 3);
        assert_eq!(counts.shares, 2);
    }

    #[test]
    fn test_no_labels() {
        assert!(!has_labeled_metric("Oak desk $120 Mark as sold"));
        assert!(has_labeled_metric("1 view"));
    }
}
