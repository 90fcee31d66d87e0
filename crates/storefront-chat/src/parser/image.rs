//! Representative image extraction.

use super::{resolve_url, ExtractionChain};
use scraper::{Html, Selector};

/// Default image strategies in priority order.
pub fn chain() -> ExtractionChain<String> {
    ExtractionChain::new()
        .then("og:image", from_open_graph)
        .then("lazy-load", from_lazy_attrs)
        .then("asset-path", from_asset_paths)
        .then("any-img", from_any_img)
}

/// Absolute URL of the page's representative image, or empty.
pub fn extract_image(document: &Html, page_url: &str) -> String {
    chain().run(document, page_url).unwrap_or_default()
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn from_open_graph(document: &Html, page_url: &str) -> Option<String> {
    first_attr(document, r#"meta[property="og:image"]"#, "content").map(|v| resolve_url(page_url, &v))
}

fn from_lazy_attrs(document: &Html, page_url: &str) -> Option<String> {
    first_attr(document, "img[data-src]", "data-src")
        .or_else(|| first_attr(document, "img[data-original]", "data-original"))
        .map(|v| resolve_url(page_url, &v))
}

fn from_asset_paths(document: &Html, page_url: &str) -> Option<String> {
    first_attr(document, r#"img[src*="/assets/images"]"#, "src")
        .or_else(|| first_attr(document, r#"img[src*="/images"]"#, "src"))
        .map(|v| resolve_url(page_url, &v))
}

fn from_any_img(document: &Html, page_url: &str) -> Option<String> {
    first_attr(document, "img[src]", "src").map(|v| resolve_url(page_url, &v))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://shop.test/Septum-Ring_p_44.html";

    fn image_of(html: &str) -> String {
        extract_image(&Html::parse_document(html), PAGE)
    }

    #[test]
    fn test_og_image_first() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://cdn.test/og.jpg">
            </head><body><img data-src="/lazy.jpg"></body></html>"#;
        assert_eq!(image_of(html), "https://cdn.test/og.jpg");
    }

    #[test]
    fn test_lazy_load_before_plain_src() {
        let html = r#"<html><body>
            <img src="/spacer.gif">
            <img data-original="/lazy/ring.jpg">
            </body></html>"#;
        assert_eq!(image_of(html), "https://shop.test/lazy/ring.jpg");
    }

    #[test]
    fn test_asset_path_before_any_img() {
        let html = r#"<html><body>
            <img src="/logo.png">
            <img src="/assets/images/ring.jpg">
            </body></html>"#;
        assert_eq!(image_of(html), "https://shop.test/assets/images/ring.jpg");
    }

    #[test]
    fn test_any_img_last_resort() {
        let html = r#"<html><body><img src="logo.png"></body></html>"#;
        assert_eq!(image_of(html), "https://shop.test/logo.png");
    }

    #[test]
    fn test_no_image_is_empty() {
        assert_eq!(image_of("<html><body><p>text</p></body></html>"), "");
    }
}
