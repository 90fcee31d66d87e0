//! Listing extractor: lightweight product candidates from category and
//! search result pages, without following any links.
//!
//! Titles, prices, and images here are read from the anchor and its nearest
//! product-card container. They are a baseline; the harvester overlays
//! product-page values on top.

use crate::parser::{clean_text, element_text, price::format_price, resolve_url};
use crate::types::{Product, PLACEHOLDER_TITLE};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Maximum candidates returned per listing page.
pub const MAX_CANDIDATES: usize = 24;

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 120;

/// How far up the tree to look for a product card.
const MAX_CARD_DEPTH: usize = 4;

const CARD_TAGS: &[&str] = &["li", "article", "td", "div", "section"];

const NAME_SELECTORS: &str =
    "h2, h3, h4, [class*=name], [class*=Name], [class*=title], [class*=Title]";

const PRICE_SELECTORS: &str = "[class*=Price], [class*=price], [itemprop=price]";

fn product_href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)_p_\d+(\.html)?|/p-\d+|ProductDetails\.asp|product\.asp|/product/\d+")
            .expect("product href regex is valid")
    })
}

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\s?\d{1,3}(?:,\d{3})*(?:\.\d{2})?").expect("money regex is valid"))
}

/// A product link found on a listing page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingCandidate {
    pub title: String,
    pub url: String,
    pub price: String,
    pub image: String,
}

impl ListingCandidate {
    pub fn into_product(self) -> Product {
        let mut product = Product::new(self.url);
        if !self.title.is_empty() {
            product.title = self.title;
        }
        product.price = self.price;
        product.image = self.image;
        product
    }
}

/// Whether an href has the storefront's product-URL shape.
pub fn looks_like_product_href(href: &str) -> bool {
    product_href_re().is_match(href)
}

/// Scan a listing page for product candidates, deduplicated by absolute URL.
///
/// Repeated anchors for one product (image link plus name link) are folded
/// together: later anchors only fill fields the earlier ones left empty.
pub fn extract_listing(html: &str, page_url: &str) -> Vec<ListingCandidate> {
    let document = Html::parse_document(html);
    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut out: Vec<ListingCandidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for anchor in document.select(&anchor_sel) {
        let href = anchor.value().attr("href").unwrap_or("").trim();
        if href.is_empty() || !looks_like_product_href(href) {
            continue;
        }
        let url = canonical_url(page_url, href);
        let candidate = read_candidate(&anchor, url.clone(), page_url);

        match index.get(&url) {
            Some(&i) => fill_missing(&mut out[i], candidate),
            None => {
                if out.len() >= MAX_CANDIDATES {
                    continue;
                }
                index.insert(url, out.len());
                out.push(candidate);
            }
        }
    }

    out
}

/// Resolve and drop any fragment so `#reviews` links dedup with the plain one.
fn canonical_url(page_url: &str, href: &str) -> String {
    let resolved = resolve_url(page_url, href);
    match resolved.split_once('#') {
        Some((base, _)) => base.to_string(),
        None => resolved,
    }
}

fn fill_missing(existing: &mut ListingCandidate, other: ListingCandidate) {
    if existing.title.is_empty() {
        existing.title = other.title;
    }
    if existing.price.is_empty() {
        existing.price = other.price;
    }
    if existing.image.is_empty() {
        existing.image = other.image;
    }
}

fn read_candidate(anchor: &ElementRef<'_>, url: String, page_url: &str) -> ListingCandidate {
    let card = product_card(anchor, &url, page_url);

    let title = anchor
        .value()
        .attr("title")
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .or_else(|| card.as_ref().and_then(card_name))
        .or_else(|| Some(element_text(anchor)).filter(|t| !t.is_empty()))
        .map(|t| truncate_chars(&t, MAX_TITLE_CHARS))
        .filter(|t| t != PLACEHOLDER_TITLE)
        .unwrap_or_default();

    let price = card.as_ref().and_then(card_price).unwrap_or_default();

    let image = img_src(anchor)
        .or_else(|| card.as_ref().and_then(img_src))
        .map(|src| resolve_url(page_url, &src))
        .unwrap_or_default();

    ListingCandidate {
        title,
        url,
        price,
        image,
    }
}

/// Nearest ancestor that looks like a product card: a block element holding
/// a name, price, or image alongside the link.
///
/// A container that also links to a different product is a grid, not a
/// card; the climb stops there and the anchor stands alone.
fn product_card<'a>(anchor: &ElementRef<'a>, url: &str, page_url: &str) -> Option<ElementRef<'a>> {
    let marker_sel = Selector::parse(&format!("{NAME_SELECTORS}, {PRICE_SELECTORS}, img")).ok()?;
    let anchor_sel = Selector::parse("a[href]").ok()?;

    for el in anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(MAX_CARD_DEPTH)
        .filter(|el| CARD_TAGS.contains(&el.value().name()))
    {
        let shared = el.select(&anchor_sel).any(|a| {
            let href = a.value().attr("href").unwrap_or("").trim();
            looks_like_product_href(href) && canonical_url(page_url, href) != url
        });
        if shared {
            return None;
        }
        if el.select(&marker_sel).next().is_some() {
            return Some(el);
        }
    }
    None
}

fn card_name(card: &ElementRef<'_>) -> Option<String> {
    let sel = Selector::parse(NAME_SELECTORS).ok()?;
    card.select(&sel)
        .filter(|el| !is_price_element(el))
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty() && !money_re().is_match(t))
}

fn is_price_element(el: &ElementRef<'_>) -> bool {
    el.value()
        .attr("class")
        .map(|c| c.to_lowercase().contains("price"))
        .unwrap_or(false)
}

fn card_price(card: &ElementRef<'_>) -> Option<String> {
    let sel = Selector::parse(PRICE_SELECTORS).ok()?;
    card.select(&sel)
        .map(|el| element_text(&el))
        .chain(std::iter::once(element_text(card)))
        .find_map(|text| money_re().find(&text).map(|m| m.as_str().to_string()))
        .and_then(|raw| format_price(&raw))
}

fn img_src(el: &ElementRef<'_>) -> Option<String> {
    let sel = Selector::parse("img").ok()?;
    el.select(&sel).find_map(|img| {
        ["data-src", "data-original", "src"]
            .iter()
            .filter_map(|attr| img.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    })
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect::<String>().trim_end().to_string()
}
