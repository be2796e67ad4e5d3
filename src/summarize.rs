// src/summarize.rs
// Deterministic extractive summarizer. No I/O, no clocks, no randomness:
// identical input text must always produce identical output.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Input is pre-truncated to this many chars before segmentation so the
/// similarity matrix stays bounded.
const MAX_INPUT_CHARS: usize = 20_000;

/// Sentence fragments shorter than this are discarded.
const MIN_SENTENCE_CHARS: usize = 25;

/// At or above this many surviving sentences the graph ranker takes over
/// from positional scoring.
const GRAPH_MIN_SENTENCES: usize = 8;

const DAMPING: f64 = 0.85;
const POWER_ITERATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizeOptions {
    pub max_sentences: usize,
    pub max_chars: usize,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            max_sentences: 3,
            max_chars: 700,
        }
    }
}

// ----------------------------
// Markup → clean text
// ----------------------------

static RE_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<article[^>]*>(.*?)</article>").unwrap());
static RE_MAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<main[^>]*>(.*?)</main>").unwrap());
static RE_DROP_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|nav|header|footer|aside)[\s\S]*?</(script|style|noscript|nav|header|footer|aside)>")
        .unwrap()
});
static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<br\s*/?>").unwrap());
static RE_BLOCK_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</(p|div|h\d)>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").unwrap());
static RE_SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip markup, keeping paragraph breaks. Prefers the article/main
/// container when present; plain text passes through unchanged apart from
/// whitespace normalization.
pub fn strip_markup(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let scoped = RE_ARTICLE
        .captures(input)
        .or_else(|| RE_MAIN.captures(input))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(input);

    let mut s = RE_DROP_BLOCKS.replace_all(scoped, " ").to_string();
    s = RE_BR.replace_all(&s, "\n").to_string();
    s = RE_BLOCK_END.replace_all(&s, "\n").to_string();
    s = RE_TAG.replace_all(&s, " ").to_string();
    s = html_escape::decode_html_entities(&s).to_string();
    s = RE_SPACE_RUNS.replace_all(&s, " ").to_string();
    let lines: Vec<&str> = s.lines().map(str::trim).collect();
    s = lines.join("\n");
    s = RE_BLANK_RUNS.replace_all(&s, "\n\n").to_string();
    s.trim().to_string()
}

// ----------------------------
// Boilerplate filters
// ----------------------------

static RE_BREADCRUMB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^(briefings\s*&\s*statements|fact\s*sheets|news|articles|press\s*releases|home|menu|skip to content)\b.*$",
    )
    .unwrap()
});

fn remove_breadcrumb_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|ln| !ln.is_empty() && !RE_BREADCRUMB.is_match(ln))
        .collect::<Vec<_>>()
        .join("\n")
}

// Classic enacting clause: "By the authority vested in me ... it is hereby ordered:"
static RE_ENACTING_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*by the authority vested in me.*?it is hereby ordered:?").unwrap()
});

fn trim_enacting_preamble(text: &str) -> String {
    RE_ENACTING_PREAMBLE.replace(text, "").trim().to_string()
}

// ----------------------------
// Sentence segmentation
// ----------------------------

static RE_SENT_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]['\x22\u{201d}]?\s+").unwrap());
static RE_LINE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

/// Punctuation-based split with a line-based fallback when punctuation
/// density is too low to segment anything.
fn split_sentences(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut last = 0usize;
    for m in RE_SENT_BOUNDARY.find_iter(trimmed) {
        // Only break where the next run starts like a sentence.
        let rest = &trimmed[m.end()..];
        let starts_upper = rest
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .unwrap_or(false);
        if !starts_upper {
            continue;
        }
        let end = m.start() + sentence_punct_len(&trimmed[m.start()..m.end()]);
        parts.push(trimmed[last..end].to_string());
        last = m.end();
    }
    parts.push(trimmed[last..].to_string());

    if parts.len() <= 1 {
        parts = RE_LINE_SPLIT.split(trimmed).map(str::to_string).collect();
    }

    parts
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| s.chars().count() >= MIN_SENTENCE_CHARS)
        .collect()
}

fn sentence_punct_len(boundary: &str) -> usize {
    boundary.trim_end().len()
}

// ----------------------------
// Sentence filters
// ----------------------------

static RE_ATTRIBUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(said|according to|stated|noted|added)\b").unwrap());

fn looks_like_quote(s: &str) -> bool {
    let t = s.trim();
    if t.starts_with('"') || t.starts_with('\u{201c}') || t.starts_with('\'') {
        return true;
    }
    let has_open_quote = t.contains('\u{201c}') || t.contains('"');
    if RE_ATTRIBUTION.is_match(t) && has_open_quote {
        return true;
    }
    (t.ends_with('"') || t.ends_with('\u{201d}') || t.ends_with('\'')) && has_open_quote
}

fn is_bulletish(s: &str) -> bool {
    matches!(
        s.trim_start().chars().next(),
        Some('•' | '-' | '–' | '—' | '✅' | '✔' | '▪' | '►' | '○' | '●' | '*')
    )
}

fn is_symbol_heavy(s: &str) -> bool {
    let total = s.chars().count();
    if total == 0 {
        return false;
    }
    let decorative = s
        .chars()
        .filter(|c| {
            matches!(u32::from(*c),
                0x2600..=0x27BF | 0xE000..=0xF8FF | 0x1F300..=0x1FAFF)
        })
        .count();
    decorative > 0 && total < 220
}

static RE_PROMO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(in\s+20\d\d,\s*voters approved|has signed into law)\b").unwrap()
});

fn is_promo_boilerplate(s: &str) -> bool {
    let t = s.trim();
    let upper = t.to_uppercase();
    if upper.starts_with("ICYMI") || upper.starts_with("WHAT YOU NEED TO KNOW") {
        return true;
    }
    if RE_PROMO.is_match(t) {
        return true;
    }
    is_symbol_heavy(t)
}

fn keep_sentence(s: &str) -> bool {
    !looks_like_quote(s) && !is_bulletish(s) && !is_promo_boilerplate(s)
}

// ----------------------------
// Mode A: positional scoring
// ----------------------------

const KEY_VERBS: [&str; 8] = [
    "directs",
    "orders",
    "establishes",
    "requires",
    "designates",
    "amends",
    "revokes",
    "implements",
];

static RE_QUANTITATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\$[\d,]+|\b\d{1,3}(?:,\d{3})+(?:\.\d+)?\b|\b\d+%|\b(million|billion|thousand)\b)")
        .unwrap()
});

fn has_quantitative_content(s: &str) -> bool {
    RE_QUANTITATIVE.is_match(s)
}

/// Prefer policy verbs and concrete numbers, then earlier position, then
/// length. Deterministic: ties resolve by original index.
fn pick_by_score(sentences: &[String], max_sentences: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, (u8, u8, usize, isize))> = sentences
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            let lower = s.to_lowercase();
            let has_kw = KEY_VERBS.iter().any(|kw| lower.contains(kw)) as u8;
            let has_num = has_quantitative_content(s) as u8;
            (idx, (has_kw, has_num, s.chars().count(), -(idx as isize)))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    let mut top: Vec<usize> = scored.into_iter().take(max_sentences).map(|t| t.0).collect();
    top.sort_unstable();
    top
}

// ----------------------------
// Mode B: graph ranking (TextRank)
// ----------------------------

const STOPWORDS: [&str; 36] = [
    "the", "a", "an", "and", "or", "but", "if", "while", "of", "to", "in", "on", "for", "is",
    "are", "was", "were", "be", "been", "it", "that", "this", "with", "as", "by", "at", "from",
    "we", "our", "their", "his", "her", "they", "them", "you", "your",
];

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z0-9']+").unwrap());

// Ordered map so float summation order is fixed and rank scores are a pure
// function of the text.
fn term_vector(s: &str) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, f64> = BTreeMap::new();
    for m in RE_WORD.find_iter(s) {
        let w = m.as_str().to_lowercase();
        if STOPWORDS.contains(&w.as_str()) {
            continue;
        }
        *counts.entry(w).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .map(|(t, va)| va * b.get(t).copied().unwrap_or(0.0))
        .sum();
    let na: f64 = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let nb: f64 = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Fixed-iteration power iteration over a row-normalized cosine-similarity
/// matrix. Deterministic for a given sentence list.
fn textrank(sentences: &[String]) -> Vec<f64> {
    let n = sentences.len();
    if n == 0 {
        return Vec::new();
    }
    let vectors: Vec<_> = sentences.iter().map(|s| term_vector(s)).collect();

    let mut sim = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let c = cosine(&vectors[i], &vectors[j]);
            sim[i][j] = c;
            sim[j][i] = c;
        }
    }
    for row in sim.iter_mut() {
        let total: f64 = row.iter().sum();
        if total > 0.0 {
            for v in row.iter_mut() {
                *v /= total;
            }
        }
    }

    let mut rank = vec![1.0 / n as f64; n];
    let base = (1.0 - DAMPING) / n as f64;
    for _ in 0..POWER_ITERATIONS {
        let mut next = vec![base; n];
        for (j, rj) in rank.iter().enumerate() {
            for (i, next_i) in next.iter_mut().enumerate() {
                *next_i += DAMPING * sim[j][i] * rj;
            }
        }
        rank = next;
    }
    rank
}

fn pick_by_rank(sentences: &[String], max_sentences: usize) -> Vec<usize> {
    let ranks = textrank(sentences);
    let mut order: Vec<usize> = (0..sentences.len()).collect();
    order.sort_by(|&a, &b| {
        ranks[b]
            .partial_cmp(&ranks[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut top: Vec<usize> = order.into_iter().take(max_sentences).collect();
    top.sort_unstable();
    top
}

// ----------------------------
// Output shaping
// ----------------------------

const ACRONYM_ALLOWLIST: [&str; 12] = [
    "US", "USA", "U.S.", "U.S.A.", "DHS", "HHS", "EPA", "FBI", "CIA", "NATO", "AI", "FEMA",
];

static RE_CAPS_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z0-9][A-Z0-9 \-'/\.]{11,}").unwrap());
static RE_CAPS_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z][A-Z0-9\-'\.]+|[A-Z]").unwrap());

fn title_case_token(tok: &str) -> String {
    let mut out = String::with_capacity(tok.len());
    let mut start_of_word = true;
    for ch in tok.chars() {
        if ch.is_alphabetic() {
            if start_of_word {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            start_of_word = false;
        } else {
            out.push(ch);
            start_of_word = true;
        }
    }
    out
}

/// Soften long ALL-CAPS runs (shouting headings) into title case, keeping
/// known acronyms untouched. Short tokens inside a run are left alone since
/// they are usually unlisted acronyms.
pub fn soften_caps(text: &str) -> String {
    RE_CAPS_RUN
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let chunk = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            RE_CAPS_TOKEN
                .replace_all(chunk, |tok: &regex::Captures<'_>| {
                    let tok = tok.get(0).map(|m| m.as_str()).unwrap_or_default();
                    if ACRONYM_ALLOWLIST.contains(&tok) || tok.chars().count() < 4 {
                        tok.to_string()
                    } else {
                        title_case_token(tok)
                    }
                })
                .into_owned()
        })
        .to_string()
}

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Truncate at the last whole word, appending an ellipsis. The ellipsis
/// counts against `max_chars`.
fn truncate_at_word(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    let head = match cut.rfind(' ') {
        Some(pos) => &cut[..pos],
        None => cut.as_str(),
    };
    format!("{}…", head.trim_end_matches([' ', '.', ',', ';', ':']))
}

// ----------------------------
// Entry points
// ----------------------------

/// Summarize raw content (HTML or plain text). Deterministic and offline.
pub fn summarize(input: &str, opts: &SummarizeOptions) -> String {
    let bounded: String = input.chars().take(MAX_INPUT_CHARS).collect();
    let mut text = strip_markup(&bounded);
    text = remove_breadcrumb_lines(&text);
    text = trim_enacting_preamble(&text);

    let all = split_sentences(&text);
    if all.is_empty() {
        return String::new();
    }
    let filtered: Vec<String> = all.iter().filter(|s| keep_sentence(s)).cloned().collect();
    let sentences = if filtered.is_empty() { all } else { filtered };

    let chosen = if sentences.len() >= GRAPH_MIN_SENTENCES {
        pick_by_rank(&sentences, opts.max_sentences)
    } else {
        pick_by_score(&sentences, opts.max_sentences)
    };

    let joined = chosen
        .iter()
        .map(|&i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let collapsed = RE_WS.replace_all(&joined, " ").trim().to_string();
    soften_caps(&truncate_at_word(&collapsed, opts.max_chars))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_DOC: &str = "The order establishes a new interagency council to coordinate wildfire response. \
        The council requires every member agency to submit an annual readiness report. \
        Federal funding of $25 million will support local mitigation grants in the first year. \
        State partners may request additional equipment through the existing logistics program. \
        The program directs the council to publish quarterly progress summaries for the public. \
        Each summary must identify unmet staffing needs across participating regions. \
        Regional coordinators will review evacuation routes before the next fire season. \
        The order amends prior guidance on prescribed burns near residential areas. \
        Nothing in the order revokes existing tribal consultation requirements. \
        Agencies must report implementation costs to the budget office within ninety days.";

    #[test]
    fn empty_input_yields_empty_summary() {
        assert_eq!(summarize("", &SummarizeOptions::default()), "");
        assert_eq!(summarize("   \n  ", &SummarizeOptions::default()), "");
    }

    #[test]
    fn deterministic_across_calls() {
        let opts = SummarizeOptions::default();
        let first = summarize(LONG_DOC, &opts);
        assert!(!first.is_empty());
        // Term vectors are rebuilt every call; near-tied rank scores must
        // not flip the selection between runs.
        for _ in 0..20 {
            assert_eq!(summarize(LONG_DOC, &opts), first);
        }
    }

    #[test]
    fn respects_char_and_sentence_bounds() {
        let opts = SummarizeOptions {
            max_sentences: 2,
            max_chars: 120,
        };
        let out = summarize(LONG_DOC, &opts);
        assert!(out.chars().count() <= 120, "got {}", out.chars().count());
        // At most two sentence enders from the chosen sentences.
        let enders = out.matches('.').count();
        assert!(enders <= 2, "got {enders} sentence enders in {out:?}");
    }

    #[test]
    fn strips_enacting_preamble() {
        let doc = "By the authority vested in me as President by the Constitution \
            and the laws of the United States of America, it is hereby ordered: \
            Section 1 establishes a commission on rural broadband deployment across every state. \
            The commission requires annual reports from member agencies on coverage gaps.";
        let out = summarize(doc, &SummarizeOptions::default());
        assert!(!out.to_lowercase().contains("by the authority vested"));
        assert!(out.contains("commission"));
    }

    #[test]
    fn drops_quotes_and_bullets() {
        let doc = "The directive orders agencies to consolidate overlapping grant programs this year. \
            \u{201c}This is a historic day for our state,\u{201d} said the governor. \
            • Bullet fragment that should never appear in output text here. \
            The plan requires a public comment period of at least sixty days.";
        let out = summarize(doc, &SummarizeOptions::default());
        assert!(!out.contains("historic day"));
        assert!(!out.contains("Bullet fragment"));
    }

    #[test]
    fn html_markup_is_stripped() {
        let html = "<html><nav>News Articles Menu</nav><article><p>The agency \
            establishes a statewide registry for emergency generators and backup power. \
            Operators must file capacity reports within thirty days of installation.</p>\
            </article><footer>Contact us</footer></html>";
        let out = summarize(html, &SummarizeOptions::default());
        assert!(out.contains("registry"));
        assert!(!out.contains('<'));
        assert!(!out.contains("Contact us"));
    }

    #[test]
    fn softens_shouting_caps_but_keeps_acronyms() {
        let out = soften_caps("GOVERNOR ANNOUNCES DISASTER RELIEF for FEMA regions");
        assert!(out.contains("Governor Announces Disaster Relief"));
        assert!(out.contains("FEMA"));
    }

    #[test]
    fn truncates_at_word_boundary_with_ellipsis() {
        let out = truncate_at_word("alpha beta gamma delta", 12);
        assert_eq!(out, "alpha beta…");
    }

    #[test]
    fn truncation_of_spaceless_text_stays_within_budget() {
        let out = truncate_at_word("abcdefghijklmnop", 10);
        assert_eq!(out, "abcdefghi…");
        assert!(out.chars().count() <= 10);
    }

    #[test]
    fn short_text_uses_positional_scoring() {
        let doc = "Some opening line about the capital city and its many visitors this season. \
            The order directs the transit agency to add $4 million in service hours. \
            Another closing line with no particular action content in it at all.";
        let opts = SummarizeOptions {
            max_sentences: 1,
            max_chars: 700,
        };
        let out = summarize(doc, &opts);
        assert!(out.contains("directs"), "policy verb sentence wins: {out:?}");
    }

    #[test]
    fn line_fallback_segments_punctuationless_text() {
        let doc = "first line of a scanned document without any terminal punctuation\n\
            second line that is also long enough to count as a candidate sentence\n\
            third line carrying the actual announcement text for the record";
        let out = summarize(doc, &SummarizeOptions::default());
        assert!(!out.is_empty());
    }
}
