// src/resolve/dates.rs
// Publication-date waterfall. Ordered from most to least trustworthy; every
// candidate passes a future guard before it is accepted. A miss anywhere
// moves on to the next stage.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ExtractionMiss;

/// Dates further ahead than this are treated as unparsed, not as errors.
const MAX_FUTURE_DAYS: i64 = 2;

/// How far into the body text we look for a visible natural-language date.
const VISIBLE_DATE_WINDOW: usize = 600;

pub fn within_future_guard(candidate: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    candidate <= now + Duration::days(MAX_FUTURE_DAYS)
}

// ----------------------------
// Structured metadata
// ----------------------------

static RE_META_PUBLISHED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s+property=["']article:published_time["']\s+content=["']([^"']+)["']"#)
        .unwrap()
});
static RE_TIME_DATETIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<time[^>]+datetime=["']([^"']+)["']"#).unwrap());
static RE_JSONLD_PUBLISHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"datePublished"\s*:\s*"([^"]+)""#).unwrap());

fn parse_machine_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00")) {
        return Some(dt.with_timezone(&Utc));
    }
    // Bare dates ("2025-03-14") become midnight UTC.
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|ndt| Utc.from_utc_datetime(&ndt));
    }
    None
}

fn from_structured_metadata(html: &str) -> Option<DateTime<Utc>> {
    for re in [&RE_META_PUBLISHED, &RE_TIME_DATETIME, &RE_JSONLD_PUBLISHED] {
        if let Some(dt) = re
            .captures(html)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_machine_timestamp(m.as_str()))
        {
            return Some(dt);
        }
    }
    None
}

// ----------------------------
// URL / filename layouts
// ----------------------------

static RE_URL_PATH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/((?:19|20)\d{2})/(0[1-9]|1[0-2])(?:/(0[1-9]|[12]\d|3[01]))?/").unwrap()
});
static RE_COMPACT_FILENAME_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"((?:19|20)\d{2})[-_]?(0[1-9]|1[0-2])[-_]?(0[1-9]|[12]\d|3[01])").unwrap());
// Filing numbers like "24-01" encode a two-digit year; the rest of the date
// is unknown, so resolve to January 1st of that year.
static RE_FILING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]{2})-\d{2,4}\b").unwrap());

fn midnight(y: i32, m: u32, d: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|nd| nd.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

pub fn from_url(url: &str) -> Option<DateTime<Utc>> {
    let path = url.split(['?', '#']).next().unwrap_or(url);

    if let Some(c) = RE_URL_PATH_DATE.captures(path) {
        let y: i32 = c.get(1)?.as_str().parse().ok()?;
        let m: u32 = c.get(2)?.as_str().parse().ok()?;
        let d: u32 = c.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(1);
        return midnight(y, m, d);
    }

    let filename = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if let Some(c) = RE_COMPACT_FILENAME_DATE.captures(filename) {
        let y: i32 = c.get(1)?.as_str().parse().ok()?;
        let m: u32 = c.get(2)?.as_str().parse().ok()?;
        let d: u32 = c.get(3)?.as_str().parse().ok()?;
        return midnight(y, m, d);
    }

    let decoded = filename.replace("%20", " ");
    if let Some(c) = RE_FILING_NUMBER.captures(decoded.trim()) {
        let yy: i32 = c.get(1)?.as_str().parse().ok()?;
        return midnight(2000 + yy, 1, 1);
    }

    None
}

// ----------------------------
// Visible natural-language dates
// ----------------------------

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS.iter().position(|m| *m == lower).map(|i| i as u32 + 1)
}

static RE_VISIBLE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:(?:released|published|posted|issued)\s*:?\s*)?([A-Z][a-z]+)\s+(\d{1,2}),\s+((?:19|20)\d{2})")
        .unwrap()
});

/// A "Month D, YYYY" date printed near the top of the document.
pub fn from_visible_text(body: &str) -> Option<DateTime<Utc>> {
    let window: String = body.chars().take(VISIBLE_DATE_WINDOW).collect();
    for c in RE_VISIBLE_DATE.captures_iter(&window) {
        let month = match month_number(c.get(1)?.as_str()) {
            Some(m) => m,
            None => continue,
        };
        let day: u32 = c.get(2)?.as_str().parse().ok()?;
        let year: i32 = c.get(3)?.as_str().parse().ok()?;
        if let Some(dt) = midnight(year, month, day) {
            return Some(dt);
        }
    }
    None
}

// ----------------------------
// Signing clause ("... this 18th day of December, two thousand twenty-five")
// ----------------------------

static RE_SIGNED_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)(?:signed|sealed|witnessed|in witness whereof)\b.{0,160}?this\s+([a-z0-9\-]+)(?:st|nd|rd|th)?\s+day\s+of\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s*,?\s*(?:a\.?d\.?\s*,?\s*)?((?:19|20)\d{2}|two\s+thousand[a-z\s\-]*)",
    )
    .unwrap()
});

fn words_to_small_number(s: &str) -> Option<u32> {
    const UNITS: [(&str, u32); 20] = [
        ("zero", 0),
        ("one", 1),
        ("two", 2),
        ("three", 3),
        ("four", 4),
        ("five", 5),
        ("six", 6),
        ("seven", 7),
        ("eight", 8),
        ("nine", 9),
        ("ten", 10),
        ("eleven", 11),
        ("twelve", 12),
        ("thirteen", 13),
        ("fourteen", 14),
        ("fifteen", 15),
        ("sixteen", 16),
        ("seventeen", 17),
        ("eighteen", 18),
        ("nineteen", 19),
    ];
    const TENS: [(&str, u32); 8] = [
        ("twenty", 20),
        ("thirty", 30),
        ("forty", 40),
        ("fifty", 50),
        ("sixty", 60),
        ("seventy", 70),
        ("eighty", 80),
        ("ninety", 90),
    ];
    let normalized = s.to_lowercase().replace('-', " ");
    let tokens: Vec<&str> = normalized
        .split_whitespace()
        .filter(|t| *t != "and")
        .collect();
    // Keep only the leading number words; stop at the first unknown token.
    let mut value = 0u32;
    let mut seen = false;
    for tok in tokens {
        if let Some((_, v)) = UNITS.iter().find(|(w, _)| *w == tok) {
            value += v;
            seen = true;
        } else if let Some((_, v)) = TENS.iter().find(|(w, _)| *w == tok) {
            value += v;
            seen = true;
        } else {
            break;
        }
    }
    seen.then_some(value)
}

fn ordinal_word_to_day(s: &str) -> Option<u32> {
    const ORDINALS: [(&str, u32); 31] = [
        ("first", 1),
        ("second", 2),
        ("third", 3),
        ("fourth", 4),
        ("fifth", 5),
        ("sixth", 6),
        ("seventh", 7),
        ("eighth", 8),
        ("ninth", 9),
        ("tenth", 10),
        ("eleventh", 11),
        ("twelfth", 12),
        ("thirteenth", 13),
        ("fourteenth", 14),
        ("fifteenth", 15),
        ("sixteenth", 16),
        ("seventeenth", 17),
        ("eighteenth", 18),
        ("nineteenth", 19),
        ("twentieth", 20),
        ("twenty-first", 21),
        ("twenty-second", 22),
        ("twenty-third", 23),
        ("twenty-fourth", 24),
        ("twenty-fifth", 25),
        ("twenty-sixth", 26),
        ("twenty-seventh", 27),
        ("twenty-eighth", 28),
        ("twenty-ninth", 29),
        ("thirtieth", 30),
        ("thirty-first", 31),
    ];
    let lower = s.to_lowercase();
    ORDINALS
        .iter()
        .find(|(w, _)| *w == lower)
        .map(|(_, v)| *v)
}

fn parse_day_token(tok: &str) -> Option<u32> {
    let lower = tok.to_lowercase();
    // "18th" → "18"; spelled-out ordinals keep their suffix ("eighth").
    let numeric = lower
        .strip_suffix("st")
        .or_else(|| lower.strip_suffix("nd"))
        .or_else(|| lower.strip_suffix("rd"))
        .or_else(|| lower.strip_suffix("th"))
        .unwrap_or(&lower);
    if let Ok(n) = numeric.parse::<u32>() {
        return (1..=31).contains(&n).then_some(n);
    }
    ordinal_word_to_day(&lower)
}

fn parse_year_phrase(phrase: &str) -> Option<i32> {
    let p = phrase.trim().to_lowercase();
    if let Ok(y) = p.parse::<i32>() {
        return (1900..2100).contains(&y).then_some(y);
    }
    let tail = p.strip_prefix("two thousand")?.trim();
    if tail.is_empty() {
        return Some(2000);
    }
    words_to_small_number(tail).map(|n| 2000 + n as i32)
}

/// The dated signature block at the tail of legal/signing documents.
pub fn from_signing_clause(body: &str) -> Option<DateTime<Utc>> {
    // Signature blocks sit at the tail; only scan the last chunk.
    let tail: String = {
        let chars: Vec<char> = body.chars().collect();
        let start = chars.len().saturating_sub(1_500);
        chars[start..].iter().collect()
    };
    let c = RE_SIGNED_CLAUSE.captures(&tail)?;
    let day = parse_day_token(c.get(1)?.as_str())?;
    let month = month_number(c.get(2)?.as_str())?;
    let year = parse_year_phrase(c.get(3)?.as_str())?;
    midnight(year, month, day)
}

// ----------------------------
// Waterfall
// ----------------------------

/// All inputs the waterfall can draw on for one resolved document.
#[derive(Debug, Default)]
pub struct DateSignals<'a> {
    /// Explicit override (listing date hint).
    pub hint: Option<DateTime<Utc>>,
    pub html: Option<&'a str>,
    pub url: &'a str,
    pub body_text: &'a str,
    /// Document-format modification timestamp (from the text extractor).
    pub doc_modified: Option<DateTime<Utc>>,
    /// Transport-level Last-Modified header.
    pub http_last_modified: Option<DateTime<Utc>>,
}

/// First candidate that clears the future guard wins. The error tells the
/// caller whether every stage came up empty or only future-dated candidates
/// were seen.
pub fn published_at(
    signals: &DateSignals<'_>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ExtractionMiss> {
    let candidates = [
        signals.hint,
        signals.html.and_then(from_structured_metadata),
        from_url(signals.url),
        from_visible_text(signals.body_text),
        from_signing_clause(signals.body_text),
        signals.doc_modified,
        signals.http_last_modified,
    ];
    let mut rejected_future = false;
    for candidate in candidates.into_iter().flatten() {
        if within_future_guard(candidate, now) {
            return Ok(candidate);
        }
        rejected_future = true;
    }
    Err(if rejected_future {
        ExtractionMiss::FutureDate
    } else {
        ExtractionMiss::Date
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        midnight(y, m, d).unwrap()
    }

    #[test]
    fn meta_published_time_wins() {
        let html = r#"<meta property="article:published_time" content="2025-06-03T14:00:00Z">"#;
        let signals = DateSignals {
            html: Some(html),
            url: "https://x.gov/2024/01/older-date-in-url/",
            body_text: "",
            ..Default::default()
        };
        let got = published_at(&signals, now()).unwrap();
        assert_eq!(got.date_naive(), day(2025, 6, 3).date_naive());
    }

    #[test]
    fn hint_overrides_everything() {
        let signals = DateSignals {
            hint: Some(day(2025, 2, 2)),
            html: Some(r#"<time datetime="2024-01-01T00:00:00Z">"#),
            url: "https://x.gov/2023/05/post/",
            body_text: "",
            ..Default::default()
        };
        assert_eq!(published_at(&signals, now()), Ok(day(2025, 2, 2)));
    }

    #[test]
    fn url_path_date_with_and_without_day() {
        assert_eq!(
            from_url("https://x.gov/2025/03/14/some-post/"),
            Some(day(2025, 3, 14))
        );
        assert_eq!(
            from_url("https://x.gov/2025/03/some-post/"),
            Some(day(2025, 3, 1))
        );
    }

    #[test]
    fn compact_filename_dates() {
        assert_eq!(
            from_url("https://x.gov/files/2025-08-22_order.pdf"),
            Some(day(2025, 8, 22))
        );
        assert_eq!(
            from_url("https://x.gov/files/20250822-order.pdf"),
            Some(day(2025, 8, 22))
        );
    }

    #[test]
    fn filing_number_encodes_year() {
        assert_eq!(
            from_url("https://governor.wa.gov/files/24-01%20-%20Storm%20Damage.pdf"),
            Some(day(2024, 1, 1))
        );
    }

    #[test]
    fn visible_date_near_top() {
        let body = "Office of the Governor\nReleased: August 22, 2025\nToday the governor announced…";
        assert_eq!(from_visible_text(body), Some(day(2025, 8, 22)));
    }

    #[test]
    fn visible_date_only_scanned_near_top() {
        let mut body = "x".repeat(2_000);
        body.push_str(" January 5, 2025");
        assert_eq!(from_visible_text(&body), None);
    }

    #[test]
    fn signing_clause_numeral_ordinal() {
        let body = format!(
            "{}\nIN WITNESS WHEREOF, I have hereunto set my hand. Signed and sealed on this 18th day of December, AD, 2024, at Olympia, Washington.",
            "body ".repeat(50)
        );
        assert_eq!(from_signing_clause(&body), Some(day(2024, 12, 18)));
    }

    #[test]
    fn signing_clause_spelled_out_year() {
        let body = "Signed this twenty-fourth day of June, Two Thousand and Twenty-Five, at the Capitol.";
        assert_eq!(from_signing_clause(body), Some(day(2025, 6, 24)));
    }

    #[test]
    fn future_dates_are_treated_as_unparsed() {
        let html = r#"<meta property="article:published_time" content="2027-01-01T00:00:00Z">"#;
        let signals = DateSignals {
            html: Some(html),
            url: "https://x.gov/2025/05/post/",
            body_text: "",
            ..Default::default()
        };
        // Guard rejects the future meta date, waterfall falls through to URL.
        assert_eq!(published_at(&signals, now()), Ok(day(2025, 5, 1)));
    }

    #[test]
    fn exhausted_waterfall_reports_a_date_miss() {
        let signals = DateSignals {
            url: "https://x.gov/no-date-here/",
            body_text: "no dates in this text at all",
            ..Default::default()
        };
        assert_eq!(published_at(&signals, now()), Err(ExtractionMiss::Date));
    }

    #[test]
    fn only_future_candidates_reports_a_future_miss() {
        let signals = DateSignals {
            hint: Some(day(2030, 1, 1)),
            url: "https://x.gov/no-date-here/",
            body_text: "",
            ..Default::default()
        };
        assert_eq!(
            published_at(&signals, now()),
            Err(ExtractionMiss::FutureDate)
        );
    }

    #[test]
    fn last_modified_is_the_final_fallback() {
        let signals = DateSignals {
            url: "https://x.gov/plain/",
            body_text: "",
            http_last_modified: Some(day(2025, 1, 7)),
            ..Default::default()
        };
        assert_eq!(published_at(&signals, now()), Ok(day(2025, 1, 7)));
    }
}
