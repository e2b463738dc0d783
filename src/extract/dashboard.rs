//! 出品管理画面（一覧）のHTMLスナップショットから対象カードを特定する

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::numbers::{numeric_tokens, parse_number_like, second_rightmost};
use super::patterns::{extract_labeled, has_labeled_metric};
use crate::matcher::{matches, normalize, pick_title};
use crate::types::MetricCounts;

/// カードを探すときに遡る祖先要素の上限
const MAX_CARD_DEPTH: usize = 6;
/// ブロック全文をタイトル代わりにする場合の文字数
const FALLBACK_TITLE_CHARS: usize = 120;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid css selector")
}

static FB_ITEM_ANCHOR: Lazy<Selector> = Lazy::new(|| selector(r#"a[href*="/marketplace/item"]"#));
static BUTTONS: Lazy<Selector> = Lazy::new(|| selector(r#"button, [role="button"]"#));
static FB_TITLE_SINGLE: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        selector(r#"a[role="link"]"#),
        selector(r#"a[href*="/marketplace/item"]"#),
        selector("span"),
        selector("h2, h3"),
    ]
});
static EMPHASIS: Lazy<Selector> = Lazy::new(|| selector("strong, b"));
static BLOCKS: Lazy<Selector> = Lazy::new(|| selector("div, article, li"));

static KIJIJI_CONTAINERS: Lazy<Selector> = Lazy::new(|| {
    selector(r#"[data-qa*="my"], [data-qa*="ads"], tr, li, article, div"#)
});
static KIJIJI_TITLE_SINGLE: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        selector("a[title]"),
        selector(r#"a[href*="/v-"]"#),
        selector("h2, h3"),
        selector(r#"[data-qa*="title"]"#),
        selector("a"),
    ]
});
static TABLE_HEADER: Lazy<Selector> = Lazy::new(|| selector("thead th"));
static TABLE_CELL: Lazy<Selector> = Lazy::new(|| selector("td"));

static CARD_ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)mark\s+as\s+(sold|available)").expect("valid action regex"));
static MANAGED_AD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)edit\s*ad|delete|promote|views").expect("valid managed ad regex"));

/// 一覧から特定したカード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardMatch {
    pub title: String,
    pub text: String,
    pub item_href: Option<String>,
}

/// 要素内のテキストを空白区切りで連結
fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(el: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel).next().map(|e| element_text(&e))
}

fn ancestors<'a>(el: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.ancestors().filter_map(ElementRef::wrap).take(MAX_CARD_DEPTH)
}

fn has_card_role(el: &ElementRef<'_>) -> bool {
    matches!(el.value().attr("role"), Some("article") | Some("listitem"))
}

fn is_action_button(el: &ElementRef<'_>) -> bool {
    CARD_ACTION_RE.is_match(&element_text(el))
}

/// 起点要素から祖先を遡り、起点を1つだけ含む最大の祖先をカードとする。
/// `article` / `listitem` ロールがあればそこで止める。
fn group_cards<'a, F>(seeds: Vec<ElementRef<'a>>, seed_key: F) -> Vec<ElementRef<'a>>
where
    F: Fn(&ElementRef<'a>, &ElementRef<'a>) -> HashSet<String>,
{
    let mut seen = HashSet::new();
    let mut cards = Vec::new();

    for seed in seeds {
        let mut card = None;
        for ancestor in ancestors(&seed) {
            if has_card_role(&ancestor) {
                card = Some(ancestor);
                break;
            }
            if seed_key(&seed, &ancestor).len() > 1 {
                break;
            }
            card = Some(ancestor);
        }
        if let Some(card) = card {
            if seen.insert(card.id()) {
                cards.push(card);
            }
        }
    }
    cards
}

fn facebook_cards(doc: &Html) -> Vec<ElementRef<'_>> {
    let anchors: Vec<_> = doc.select(&FB_ITEM_ANCHOR).collect();
    let cards = group_cards(anchors, |_, ancestor| {
        ancestor
            .select(&FB_ITEM_ANCHOR)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| href.split('?').next().unwrap_or(href).to_string())
            .collect()
    });
    if !cards.is_empty() {
        return cards;
    }

    // 出品リンクが無いレイアウトでは「売却済みにする」等のボタンから辿る
    let buttons: Vec<_> = doc.select(&BUTTONS).filter(is_action_button).collect();
    group_cards(buttons, |_, ancestor| {
        ancestor
            .select(&BUTTONS)
            .filter(is_action_button)
            .map(|b| format!("{:?}", b.id()))
            .collect()
    })
}

fn facebook_card_title(card: &ElementRef<'_>) -> Option<String> {
    let mut candidates: Vec<String> = FB_TITLE_SINGLE
        .iter()
        .filter_map(|sel| first_text(card, sel))
        .collect();
    candidates.extend(card.select(&EMPHASIS).map(|e| element_text(&e)));
    pick_title(candidates)
}

fn first_item_href(el: &ElementRef<'_>) -> Option<String> {
    el.select(&FB_ITEM_ANCHOR)
        .find_map(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Facebook の出品管理画面からタイトルが一致するカードを探す
pub fn find_facebook_card(html: &str, listing_title: &str) -> Option<CardMatch> {
    let doc = Html::parse_document(html);

    for card in facebook_cards(&doc) {
        let Some(title) = facebook_card_title(&card) else {
            continue;
        };
        if matches(&title, listing_title) {
            return Some(CardMatch {
                title,
                text: element_text(&card),
                item_href: first_item_href(&card),
            });
        }
    }

    // タイトルを含み、かつ指標ラベルを含む最小のブロック
    let needle = normalize(listing_title);
    if needle.is_empty() {
        return None;
    }
    doc.select(&BLOCKS)
        .map(|block| (element_text(&block), block))
        .filter(|(text, _)| normalize(text).contains(&needle) && has_labeled_metric(text))
        .min_by_key(|(text, _)| text.len())
        .map(|(text, block)| CardMatch {
            title: text.chars().take(FALLBACK_TITLE_CHARS).collect(),
            item_href: first_item_href(&block),
            text,
        })
}

/// タイトル付近にある出品詳細へのリンク（ダッシュボードで特定できなかった場合の退避先）
pub fn find_facebook_item_link(html: &str, listing_title: &str) -> Option<String> {
    let needle = normalize(listing_title);
    if needle.is_empty() {
        return None;
    }
    let doc = Html::parse_document(html);
    doc.select(&FB_ITEM_ANCHOR).find_map(|anchor| {
        let href = anchor.value().attr("href")?;
        ancestors(&anchor)
            .any(|el| normalize(&element_text(&el)).contains(&needle))
            .then(|| href.to_string())
    })
}

/// Kijiji の My Ads で特定した行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdRowMatch {
    pub title: String,
    pub counts: MetricCounts,
}

fn kijiji_row_title(row: &ElementRef<'_>) -> Option<String> {
    pick_title(
        KIJIJI_TITLE_SINGLE
            .iter()
            .filter_map(|sel| first_text(row, sel)),
    )
}

/// Kijiji の My Ads ページから対象の広告行を探し、指標を抽出する
pub fn find_kijiji_row(html: &str, listing_title: &str) -> Option<AdRowMatch> {
    let doc = Html::parse_document(html);

    let (row, title) = doc
        .select(&KIJIJI_CONTAINERS)
        .filter_map(|row| {
            let title = kijiji_row_title(&row)?;
            if !matches(&title, listing_title) {
                return None;
            }
            MANAGED_AD_RE
                .is_match(&element_text(&row))
                .then_some((row, title))
        })
        .min_by_key(|(row, _)| element_text(row).len())?;

    let labeled = extract_labeled(&element_text(&row));
    let views = if labeled.views > 0 {
        labeled.views
    } else {
        table_views(&row).unwrap_or_else(|| positional_views(&row, &title).unwrap_or(0))
    };

    Some(AdRowMatch {
        title,
        counts: MetricCounts { views, ..labeled },
    })
}

/// テーブルレイアウトなら "Views" 列の値
fn table_views(row: &ElementRef<'_>) -> Option<u64> {
    let tr = std::iter::once(*row)
        .chain(row.ancestors().filter_map(ElementRef::wrap))
        .find(|e| e.value().name() == "tr")?;
    let table = tr
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")?;

    let index = table
        .select(&TABLE_HEADER)
        .position(|th| normalize(&element_text(&th)).contains("views"))?;
    let cell = tr.select(&TABLE_CELL).nth(index)?;
    let views = parse_number_like(&element_text(&cell));
    (views > 0).then_some(views)
}

/// ラベルの無い数値の並びから右から2番目を閲覧数とする
fn positional_views(row: &ElementRef<'_>, title: &str) -> Option<u64> {
    let segments: Vec<&str> = row
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        // タイトル中の数字（"2 drawers" 等）は除外
        .filter(|t| t.chars().count() < 3 || !title.contains(t))
        .collect();
    second_rightmost(&numeric_tokens(segments))
}
