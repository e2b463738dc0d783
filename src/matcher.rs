//! 出品タイトルのあいまい一致
//!
//! ダッシュボード上のタイトルは切り詰められたりUI文言が付いたりするため、
//! 正規化した上で双方向の部分一致で判定する。

/// 長いものから順に除去する
const NOISE_PHRASES: &[&str] = &[
    "turn on notifications",
    "notifications",
    "notification",
    "unread",
    "marketplace",
];

const MIN_TITLE_CHARS: usize = 3;

/// 小文字化・記号除去・ノイズ文言除去・空白の正規化
pub fn normalize(text: &str) -> String {
    let mut s: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '$' || *c == '.')
        .collect();

    // 除去で新たなノイズ文言ができる場合があるので収束するまで繰り返す
    loop {
        let before = s.len();
        for phrase in NOISE_PHRASES {
            s = s.replace(phrase, "");
        }
        if s.len() == before {
            break;
        }
    }

    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 正規化後にどちらかがもう一方を含むか
pub fn matches(candidate: &str, needle: &str) -> bool {
    let candidate = normalize(candidate);
    let needle = normalize(needle);
    if candidate.is_empty() || needle.is_empty() {
        return false;
    }
    candidate.contains(&needle) || needle.contains(&candidate)
}

/// 候補テキストのうち最長のもの（3文字以上）をタイトルとみなす
pub fn pick_title<I, S>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .map(|c| c.as_ref().trim().to_string())
        .filter(|c| c.chars().count() >= MIN_TITLE_CHARS)
        .fold(None, |best: Option<String>, c| match best {
            Some(b) if b.chars().count() >= c.chars().count() => Some(b),
            _ => Some(c),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_and_strips() {
        assert_eq!(normalize("197 Clicks on Listing!!"), "197 clicks on listing");
        assert_eq!(normalize("  Oak   Desk\n(like new) "), "oak desk like new");
        assert_eq!(normalize("$45.00 - Bike"), "$45.00 bike");
    }

    #[test]
    fn test_normalize_removes_noise() {
        assert_eq!(normalize("Turn on notifications Oak Desk"), "oak desk");
        assert_eq!(normalize("Marketplace · Unread · Lamp"), "lamp");
        assert_eq!(normalize("notinotificationsfications lamp"), "lamp");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in [
            "197 Clicks on Listing!!",
            "Mark as sold - IKEA Desk, 2 drawers",
            "notinotificationsfications  x",
            "Ünïcode Chair   $1,200",
            "",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_clicks_label_matches_after_normalize() {
        assert!(matches("197 Clicks on Listing!!", "clicks"));
        assert!(matches("clicks", "197 Clicks on Listing!!"));
    }

    #[test]
    fn test_matches_is_bidirectional() {
        // ダッシュボード側が切り詰められているケース
        assert!(matches("Solid oak desk with two dr", "Solid Oak Desk with two drawers"));
        assert!(matches("Solid Oak Desk with two drawers · Mark as sold", "solid oak desk"));
        assert!(!matches("Bike", "Oak desk"));
        assert!(!matches("", "Oak desk"));
        assert!(!matches("!!!", "Oak desk"));
    }

    #[test]
    fn test_pick_title_longest() {
        let title = pick_title(["Share", "Solid oak desk", "  $40 ", "ok"]);
        assert_eq!(title.as_deref(), Some("Solid oak desk"));
        assert_eq!(pick_title(["ok", "  ", "ab"]), None);
        assert_eq!(pick_title(Vec::<String>::new()), None);
    }
}
