//! Stock detection.
//!
//! Order matters: structured availability metadata first, then explicit
//! out-of-stock wording anywhere in the body, and only then an add-to-cart
//! control. Negative text has to outrank a cart button because the store's
//! templates render the button on sold-out pages too.

use super::{element_text, ExtractionChain};
use crate::types::StockStatus;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

fn out_of_stock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)out\s*of\s*stock|sold\s*out|unavailable|back[-\s]?order\s*only")
            .expect("out-of-stock regex is valid")
    })
}

fn add_to_cart_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)add\s*to\s*cart|buy\s*now|addtocart").expect("cart regex is valid")
    })
}

/// Default stock strategies in priority order.
pub fn chain() -> ExtractionChain<StockStatus> {
    ExtractionChain::new()
        .then("availability-meta", from_availability_meta)
        .then("negative-text", from_body_text)
        .then("cart-control", from_cart_control)
}

/// Tri-state stock status; `Unknown` when every strategy is inconclusive.
pub fn detect_stock(document: &Html, page_url: &str) -> StockStatus {
    chain().run(document, page_url).unwrap_or(StockStatus::Unknown)
}

/// Classify a schema.org availability token.
pub fn classify_availability(value: &str) -> Option<StockStatus> {
    let lower = value.to_lowercase();
    if lower.contains("outofstock") {
        Some(StockStatus::OutOfStock)
    } else if lower.contains("instock") || lower.contains("preorder") {
        Some(StockStatus::InStock)
    } else {
        None
    }
}

fn from_availability_meta(document: &Html, _page_url: &str) -> Option<StockStatus> {
    let sel = Selector::parse(r#"[itemprop="availability"]"#).ok()?;
    document
        .select(&sel)
        .filter_map(|el| {
            el.value()
                .attr("content")
                .or_else(|| el.value().attr("href"))
        })
        .find_map(classify_availability)
}

fn from_body_text(document: &Html, _page_url: &str) -> Option<StockStatus> {
    let sel = Selector::parse("body").ok()?;
    let body = document.select(&sel).next()?;
    let text = body.text().collect::<String>();
    out_of_stock_re()
        .is_match(&text)
        .then_some(StockStatus::OutOfStock)
}

fn from_cart_control(document: &Html, _page_url: &str) -> Option<StockStatus> {
    let sel = Selector::parse(r#"button, input[type="submit"], a"#).ok()?;
    document
        .select(&sel)
        .any(|el| {
            let text = element_text(&el);
            let label = if text.is_empty() {
                el.value().attr("value").unwrap_or_default().to_string()
            } else {
                text
            };
            add_to_cart_re().is_match(&label)
        })
        .then_some(StockStatus::InStock)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_of(html: &str) -> StockStatus {
        detect_stock(&Html::parse_document(html), "https://shop.test/x_p_1.html")
    }

    #[test]
    fn test_sold_out_text_beats_cart_button() {
        let html = r#"<html><body>
            <h1>Curved Barbell</h1>
            <p class="notice">Sold Out</p>
            <button>Add to Cart</button>
        </body></html>"#;
        assert_eq!(stock_of(html), StockStatus::OutOfStock);
    }

    #[test]
    fn test_metadata_wins_over_text() {
        let html = r#"<html><body>
            <link itemprop="availability" href="https://schema.org/InStock">
            <p>Related item: currently unavailable</p>
        </body></html>"#;
        assert_eq!(stock_of(html), StockStatus::InStock);
    }

    #[test]
    fn test_metadata_out_of_stock() {
        let html = r#"<html><body>
            <meta itemprop="availability" content="http://schema.org/OutOfStock">
            <button>Add to Cart</button>
        </body></html>"#;
        assert_eq!(stock_of(html), StockStatus::OutOfStock);
    }

    #[test]
    fn test_preorder_counts_as_in_stock() {
        let html = r#"<meta itemprop="availability" content="PreOrder">"#;
        assert_eq!(stock_of(html), StockStatus::InStock);
    }

    #[test]
    fn test_cart_input_value() {
        let html = r#"<html><body><form><input type="submit" value="Buy Now"></form></body></html>"#;
        assert_eq!(stock_of(html), StockStatus::InStock);
    }

    #[test]
    fn test_back_order_only() {
        let html = "<html><body><p>Back-order only, ships in 3 weeks</p></body></html>";
        assert_eq!(stock_of(html), StockStatus::OutOfStock);
    }

    #[test]
    fn test_inconclusive_is_unknown() {
        let html = "<html><body><h1>Nose Stud</h1><p>Titanium, 18g</p></body></html>";
        assert_eq!(stock_of(html), StockStatus::Unknown);
    }
}
