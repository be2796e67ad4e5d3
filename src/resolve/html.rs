// src/resolve/html.rs
// Title waterfall over raw page markup. Everything here is best-effort:
// a miss moves the waterfall along, it never fails the item.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ExtractionMiss;

static RE_OG_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s+property=["']og:title["']\s+content=["']([^"']+)["']"#).unwrap()
});
static RE_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap());
static RE_TITLE_EL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title>(.*?)</title>").unwrap());
static RE_INNER_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Chrome-only strings that must never win the title waterfall.
const GENERIC_TITLES: [&str; 12] = [
    "news",
    "articles",
    "home",
    "menu",
    "skip to content",
    "press releases",
    "briefings & statements",
    "fact sheets",
    "newsroom",
    "executive orders",
    "proclamations",
    "the white house",
];

fn clean_fragment(s: &str) -> String {
    let no_tags = RE_INNER_TAGS.replace_all(s, " ");
    let decoded = html_escape::decode_html_entities(&no_tags).to_string();
    RE_WS.replace_all(&decoded, " ").trim().to_string()
}

fn is_generic(title: &str) -> bool {
    let t = title.trim().to_lowercase();
    t.is_empty() || GENERIC_TITLES.contains(&t.as_str())
}

/// Strip a trailing " | Site Name" / " – Site Name" / " — Site Name" suffix
/// from a document title element.
fn strip_site_suffix(title: &str) -> String {
    for sep in [" | ", " – ", " — ", " :: "] {
        if let Some(pos) = title.rfind(sep) {
            let head = title[..pos].trim();
            if !head.is_empty() {
                return head.to_string();
            }
        }
    }
    title.trim().to_string()
}

/// Last-resort title: humanize the URL slug ("my-new-order" → "My New Order").
pub fn humanize_slug(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let slug = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let stem = slug.rsplit_once('.').map(|(s, _)| s).unwrap_or(slug);
    stem.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First non-empty, non-generic value wins: og:title → h1 → listing anchor
/// text → <title> (site suffix stripped) → humanized slug.
pub fn title_waterfall(
    html: &str,
    title_hint: Option<&str>,
    url: &str,
) -> (String, Option<ExtractionMiss>) {
    let candidates = [
        RE_OG_TITLE
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| clean_fragment(m.as_str())),
        RE_H1
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| clean_fragment(m.as_str())),
        title_hint.map(clean_fragment),
        RE_TITLE_EL
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| strip_site_suffix(&clean_fragment(m.as_str()))),
    ];
    for cand in candidates.into_iter().flatten() {
        if !is_generic(&cand) {
            return (cand, None);
        }
    }
    let slug = humanize_slug(url);
    if is_generic(&slug) {
        (slug, Some(ExtractionMiss::Title))
    } else if slug.is_empty() {
        (String::new(), Some(ExtractionMiss::Title))
    } else {
        (slug, None)
    }
}

pub fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.is_empty() || ct.contains("text/html") || ct.contains("application/xhtml")
}
