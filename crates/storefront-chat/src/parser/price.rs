//! Price extraction.
//!
//! Structured `itemprop="price"` metadata wins outright. Otherwise every
//! money string inside price-looking blocks becomes a candidate, scored by
//! the label text around it; ties go to the smallest amount so a sale figure
//! beats the crossed-out one next to it.

use super::{element_text, ExtractionChain};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Blocks whose class or id suggests a price.
const PRICE_BLOCKS: &str = "[class*=Price], .price, .ProductPrice, #price, .sale, .SalePrice, \
                            .OurPrice, .retail, .RetailPrice";

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?\d{1,3}(?:,\d{3})*\.\d{2}").expect("money regex is valid"))
}

fn sale_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)sale|now|your price|our price|special").expect("sale regex is valid")
    })
}

fn list_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)retail|msrp|compare").expect("list regex is valid"))
}

/// Default price strategies in priority order.
pub fn chain() -> ExtractionChain<String> {
    ExtractionChain::new()
        .then("itemprop", from_itemprop)
        .then("price-blocks", from_price_blocks)
}

/// Best price on the page as `$<amount>`, or empty.
pub fn extract_price(document: &Html, page_url: &str) -> String {
    chain().run(document, page_url).unwrap_or_default()
}

/// Normalize a raw amount to `$<amount>` without thousands separators.
///
/// Returns `None` when the text holds no digits.
pub fn format_price(raw: &str) -> Option<String> {
    static NUM: OnceLock<Regex> = OnceLock::new();
    let re = NUM.get_or_init(|| Regex::new(r"\d[\d.,]*").expect("number regex is valid"));
    let m = re.find(raw)?;
    let amount = m.as_str().replace(',', "");
    let amount = amount.trim_end_matches('.');
    if amount.is_empty() {
        return None;
    }
    Some(format!("${amount}"))
}

/// Numeric value of a money string like `$1,299.00`.
fn money_value(raw: &str) -> f64 {
    raw.trim_start_matches('$')
        .replace(',', "")
        .parse::<f64>()
        .unwrap_or(f64::MAX)
}

fn from_itemprop(document: &Html, _page_url: &str) -> Option<String> {
    if let Ok(sel) = Selector::parse(r#"meta[itemprop="price"]"#) {
        if let Some(content) = document
            .select(&sel)
            .find_map(|el| el.value().attr("content"))
        {
            if let Some(price) = format_price(content) {
                return Some(price);
            }
        }
    }

    let sel = Selector::parse("[itemprop=price]").ok()?;
    let el = document.select(&sel).next()?;
    let text = el
        .value()
        .attr("content")
        .map(str::to_string)
        .unwrap_or_else(|| element_text(&el));
    format_price(&text)
}

#[derive(Debug)]
struct Candidate {
    raw: String,
    score: i32,
    value: f64,
}

fn from_price_blocks(document: &Html, _page_url: &str) -> Option<String> {
    let sel = Selector::parse(PRICE_BLOCKS).ok()?;
    let mut candidates: Vec<Candidate> = Vec::new();

    for block in document.select(&sel) {
        let text = element_text(&block);
        let mut label_score = 0;
        if sale_label_re().is_match(&text) {
            label_score += 2;
        }
        if list_label_re().is_match(&text) {
            label_score -= 1;
        }
        for m in money_re().find_iter(&text) {
            candidates.push(Candidate {
                raw: m.as_str().to_string(),
                score: label_score,
                value: money_value(m.as_str()),
            });
        }
    }

    let best = candidates.into_iter().min_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.value.partial_cmp(&b.value).unwrap_or(std::cmp::Ordering::Equal))
    })?;
    format_price(&best.raw)
}
