//! Page parser: title, text, image, price, and stock from raw HTML.
//!
//! Image, price, and stock are each resolved by an [`ExtractionChain`], an
//! ordered list of strategies tried until one yields a value. The strategies
//! are tuned to one storefront's templates and are best-effort; an
//! exhausted chain produces an empty string or [`StockStatus::Unknown`],
//! never an error.
//!
//! All entry points are synchronous. `scraper::Html` is `!Send`, so async
//! callers parse inside one function and keep only the owned results.

pub mod image;
pub mod price;
pub mod stock;

use crate::types::{PagePreview, ParsedPage};
use scraper::{ElementRef, Html, Selector};

pub use image::extract_image;
pub use price::{extract_price, format_price};
pub use stock::detect_stock;

/// One extraction strategy over a parsed document and its URL.
pub type Strategy<T> = fn(&Html, &str) -> Option<T>;

/// Ordered strategies for one field; the first hit wins.
pub struct ExtractionChain<T> {
    steps: Vec<(&'static str, Strategy<T>)>,
}

impl<T> ExtractionChain<T> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a strategy at the lowest priority.
    pub fn then(mut self, name: &'static str, step: Strategy<T>) -> Self {
        self.steps.push((name, step));
        self
    }

    /// Insert a strategy ahead of all existing ones.
    pub fn prepend(mut self, name: &'static str, step: Strategy<T>) -> Self {
        self.steps.insert(0, (name, step));
        self
    }

    /// Strategy names in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|(name, _)| *name).collect()
    }

    /// Run the strategies in order and return the first hit.
    pub fn run(&self, document: &Html, page_url: &str) -> Option<T> {
        self.steps.iter().find_map(|(name, step)| {
            let hit = step(document, page_url);
            if hit.is_some() {
                tracing::trace!(strategy = name, "extraction hit");
            }
            hit
        })
    }
}

impl<T> Default for ExtractionChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse every field of a page.
pub fn parse_page(html: &str, page_url: &str) -> ParsedPage {
    let document = Html::parse_document(html);
    ParsedPage {
        title: extract_title(&document),
        text: extract_text(&document, "body"),
        image: extract_image(&document, page_url),
        price: extract_price(&document, page_url),
        instock: detect_stock(&document, page_url),
    }
}

/// Title and image only, for link cards.
pub fn page_preview(html: &str, page_url: &str) -> PagePreview {
    let document = Html::parse_document(html);
    PagePreview {
        title: first_text(&document, "title").unwrap_or_else(|| page_url.to_string()),
        image: extract_image(&document, page_url),
    }
}

/// First non-empty `h1`, then `<title>`; empty when neither exists.
pub fn extract_title(document: &Html) -> String {
    first_text(document, "h1")
        .or_else(|| first_text(document, "title"))
        .unwrap_or_default()
}

/// Cleaned text of the first element matching `selector`.
///
/// An unparsable selector falls back to `body`.
pub fn extract_text(document: &Html, selector: &str) -> String {
    let sel = Selector::parse(selector)
        .or_else(|_| Selector::parse("body"))
        .ok();
    sel.and_then(|s| document.select(&s).next())
        .map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

/// Collapse whitespace (including non-breaking spaces) and trim.
pub fn clean_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a possibly relative URL against the page URL.
///
/// Unresolvable input is returned unchanged.
pub fn resolve_url(base_url: &str, relative: &str) -> String {
    let relative = relative.trim();
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }
    url::Url::parse(base_url)
        .and_then(|base| base.join(relative))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| relative.to_string())
}

/// Cleaned text content of an element.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    document
        .select(&sel)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StockStatus;

    #[test]
    fn test_title_prefers_h1() {
        let html = r#"<html><head><title>Shop | Nose Stud</title></head>
            <body><h1>  Titanium   Nose Stud </h1></body></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(extract_title(&doc), "Titanium Nose Stud");
    }

    #[test]
    fn test_title_falls_back_to_document_title() {
        let html = "<html><head><title>Tragus Kit</title></head><body><h1> </h1></body></html>";
        let doc = Html::parse_document(html);
        assert_eq!(extract_title(&doc), "Tragus Kit");
    }

    #[test]
    fn test_clean_text_collapses_nbsp() {
        assert_eq!(clean_text("  a\u{a0}\u{a0}b \n\t c "), "a b c");
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://shop.test/cat/x.html", "/assets/images/a.jpg"),
            "https://shop.test/assets/images/a.jpg"
        );
        assert_eq!(
            resolve_url("https://shop.test/cat/x.html", "b_p_2.html"),
            "https://shop.test/cat/b_p_2.html"
        );
        assert_eq!(
            resolve_url("https://shop.test/", "https://cdn.test/i.png"),
            "https://cdn.test/i.png"
        );
    }

    #[test]
    fn test_extract_text_with_selector_fallback() {
        let html = "<html><body><div id='main'>Ships in 1 day</div><p>footer</p></body></html>";
        let doc = Html::parse_document(html);
        assert_eq!(extract_text(&doc, "#main"), "Ships in 1 day");
        assert_eq!(extract_text(&doc, "[[bad"), "Ships in 1 day footer");
    }

    #[test]
    fn test_parse_page_all_fields() {
        let html = r#"
        <html><head>
          <title>Store</title>
          <meta property="og:image" content="/assets/images/kit.jpg" />
        </head><body>
          <h1>Ear Piercing Kit</h1>
          <meta itemprop="price" content="1,024.50" />
          <link itemprop="availability" href="https://schema.org/InStock" />
        </body></html>"#;

        let page = parse_page(html, "https://shop.test/Ear-Kit_p_5.html");
        assert_eq!(page.title, "Ear Piercing Kit");
        assert_eq!(page.image, "https://shop.test/assets/images/kit.jpg");
        assert_eq!(page.price, "$1024.50");
        assert_eq!(page.instock, StockStatus::InStock);
    }

    #[test]
    fn test_page_preview() {
        let html = r#"<html><head><title>Master Class</title></head>
            <body><img src="/images/course.png"></body></html>"#;
        let preview = page_preview(html, "https://shop.test/c_p_363.html");
        assert_eq!(preview.title, "Master Class");
        assert_eq!(preview.image, "https://shop.test/images/course.png");
    }

    #[test]
    fn test_chain_prepend_takes_priority() {
        fn always(_: &Html, _: &str) -> Option<String> {
            Some("override".to_string())
        }
        let chain = price::chain().prepend("always", always);
        let doc = Html::parse_document("<meta itemprop='price' content='5.00'>");
        assert_eq!(chain.run(&doc, "https://shop.test/").as_deref(), Some("override"));
        assert_eq!(chain.names()[0], "always");
    }
}
