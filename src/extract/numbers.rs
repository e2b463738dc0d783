//! 数値トークンの解析
//!
//! 文法: `digits (',' digits)* ('.' digits)? (' '? ('K'|'M'))?`
//! 接尾辞はそれぞれ 1,000 / 1,000,000 倍。小数点以下は切り捨てる。

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:,\d+)*)(?:\.(\d+))?(?:\s?([KkMm])\b)?").expect("valid number regex")
});

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$\s?)?\b(\d[\d,.]*)").expect("valid token regex"));

static MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan(uary)?|feb(ruary)?|mar(ch)?|apr(il)?|may|june?|july?|aug(ust)?|sep(t(ember)?)?|oct(ober)?|nov(ember)?|dec(ember)?)\b",
    )
    .expect("valid month regex")
});

/// トークン前後でこの文字数以内に月名があれば日付とみなす
const DATE_WINDOW: usize = 12;

/// テキスト中の最初の数値を解析する。解析できなければ0。
///
/// `"1.2K"` → 1200, `"3M"` → 3,000,000, `"1,234"` → 1234
pub fn parse_number_like(text: &str) -> u64 {
    let Some(caps) = NUMBER_RE.captures(text) else {
        return 0;
    };

    let integer: String = caps[1].chars().filter(|c| *c != ',').collect();
    let Ok(integer) = integer.parse::<u64>() else {
        return 0;
    };
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let multiplier: u64 = match caps.get(3).map(|m| m.as_str()) {
        Some("k") | Some("K") => 1_000,
        Some("m") | Some("M") => 1_000_000,
        _ => 1,
    };

    integer
        .saturating_mul(multiplier)
        .saturating_add(scaled_fraction(fraction, multiplier))
}

/// 小数部 × 倍率 を整数演算で切り捨て
fn scaled_fraction(fraction: &str, multiplier: u64) -> u64 {
    if multiplier == 1 || fraction.is_empty() {
        return 0;
    }
    // 倍率の桁数より細かい桁は結果に影響しない
    let digits: String = fraction.chars().take(7).collect();
    let Ok(value) = digits.parse::<u64>() else {
        return 0;
    };
    value * multiplier / 10u64.pow(digits.len() as u32)
}

/// ラベルのない数値トークン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericToken {
    pub value: u64,
    /// 横方向の位置（スナップショットでは文書順で近似）
    pub position: usize,
    pub currency: bool,
    pub date_adjacent: bool,
}

impl NumericToken {
    pub fn is_candidate(&self) -> bool {
        !self.currency && !self.date_adjacent
    }
}

/// テキスト断片（文書順）から数値トークンを集める。0は除外する。
pub fn numeric_tokens<'a, I>(segments: I) -> Vec<NumericToken>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tokens = Vec::new();
    for segment in segments {
        for caps in TOKEN_RE.captures_iter(segment) {
            let value = parse_number_like(&caps[2]);
            if value == 0 {
                continue;
            }
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let currency = caps.get(1).is_some() || preceded_by_dollar(segment, whole.start());
            let date_adjacent = near_month(segment, whole.start(), whole.end());
            tokens.push(NumericToken {
                value,
                position: tokens.len(),
                currency,
                date_adjacent,
            });
        }
    }
    tokens
}

/// 右から2番目の数値を閲覧数とみなす（一番右はメッセージ数であることが多い）。
/// 候補が1つならそれを返す。
///
/// レイアウト依存の近似であり、ラベル付きパターンで取れない場合のフォールバック。
pub fn second_rightmost(tokens: &[NumericToken]) -> Option<u64> {
    let mut candidates: Vec<&NumericToken> = tokens.iter().filter(|t| t.is_candidate()).collect();
    candidates.sort_by_key(|t| t.position);
    match candidates.len() {
        0 => None,
        1 => Some(candidates[0].value),
        n => Some(candidates[n - 2].value),
    }
}

fn preceded_by_dollar(segment: &str, start: usize) -> bool {
    segment[..start].trim_end().ends_with('$')
}

fn near_month(segment: &str, start: usize, end: usize) -> bool {
    let from = floor_char_boundary(segment, start.saturating_sub(DATE_WINDOW));
    let to = ceil_char_boundary(segment, (end + DATE_WINDOW).min(segment.len()));
    MONTH_RE.is_match(&segment[from..to])
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes_and_separators() {
        assert_eq!(parse_number_like("1.2K"), 1200);
        assert_eq!(parse_number_like("3M"), 3_000_000);
        assert_eq!(parse_number_like("1,234"), 1234);
        assert_eq!(parse_number_like("2.35k views"), 2350);
        assert_eq!(parse_number_like("12.9"), 12);
        assert_eq!(parse_number_like("4 M"), 4_000_000);
    }

    #[test]
    fn test_parse_huge_suffixed_value_saturates() {
        assert_eq!(parse_number_like("99999999999999999.9K views"), u64::MAX);
        assert_eq!(parse_number_like("18446744073709551.5M"), u64::MAX);
    }

    #[test]
    fn test_parse_malformed_is_zero() {
        assert_eq!(parse_number_like(""), 0);
        assert_eq!(parse_number_like("views"), 0);
        assert_eq!(parse_number_like("K"), 0);
    }

    #[test]
    fn test_suffix_must_not_run_into_word() {
        // "5 messages" の "m" は接尾辞ではない
        assert_eq!(parse_number_like("5 messages"), 5);
        assert_eq!(parse_number_like("7 kilometers"), 7);
    }

    #[test]
    fn test_tokens_flag_currency_and_dates() {
        let tokens = numeric_tokens(["$450", "Posted Mar 14", "37", "2"]);
        assert_eq!(tokens.len(), 4);
        assert!(tokens[0].currency);
        assert!(tokens[1].date_adjacent);
        assert!(tokens[2].is_candidate());
        assert!(tokens[3].is_candidate());
    }

    // 近似ヒューリスティック: 文書順で右から2番目を閲覧数とする
    #[test]
    fn test_second_rightmost_is_views() {
        let tokens = numeric_tokens(["$ 1,200", "Jan 3", "128", "4"]);
        assert_eq!(second_rightmost(&tokens), Some(128));
    }

    #[test]
    fn test_second_rightmost_single_and_empty() {
        assert_eq!(second_rightmost(&numeric_tokens(["42 "])), Some(42));
        assert_eq!(second_rightmost(&numeric_tokens(["$30", "Dec 2"])), None);
    }

    #[test]
    fn test_mark_is_not_a_month() {
        let tokens = numeric_tokens(["Mark as sold 12"]);
        assert!(tokens[0].is_candidate());
    }
}
