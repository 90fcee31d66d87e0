//! Response composer: turns an intent and a ranked product list into the
//! structured chat result.
//!
//! Composition is pure. Anything that needs the network (harvests, the
//! course preview, document lookups) is gathered by the caller first.

use crate::config::SiteLinks;
use crate::docs::DocSnippet;
use crate::intent::Intent;
use crate::query::token_overlap;
use crate::types::{PagePreview, Product};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Hard cap for gallery views.
pub const GALLERY_LIMIT: usize = 10;
/// Hard cap for compact "top picks" views.
pub const PICKS_LIMIT: usize = 3;
/// Hard cap for the requested-item block.
pub const REQUESTED_LIMIT: usize = 3;
/// Shared title tokens that make a query a direct ask.
pub const DIRECT_ASK_OVERLAP: usize = 3;

/// The only course page the assistant will link to unless a valid override
/// for the same product is configured.
pub const CANONICAL_COURSE_URL: &str =
    "https://www.hottiebodyjewelry.com/Master-Body-Piercing-Class-COMING-SOON_p_363.html";

pub const SHIPPING_SUMMARY: &str = "Most orders ship within 1 business day. Returns are limited \
                                    to unopened/unused items within 7 days; sterile kits are final sale.";

pub const AFTERCARE_SUMMARY: &str = "Rinse twice daily with sterile saline. Avoid twisting the \
                                     jewelry. Sleep on clean linens and avoid pools/hot tubs for at least 2 weeks.";

pub const AFTERCARE_TIPS: &[&str] = &[
    "Rinse twice daily with sterile saline.",
    "Don't twist or rotate jewelry.",
    "Sleep on clean linens; avoid pools/hot tubs for 2 weeks.",
];

pub const NO_MATCHES: &str =
    "I couldn't find matching in-stock items right now. Try one of these categories instead.";

/// A call-to-action link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub url: String,
}

impl Link {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// The structured chat result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub intent: Intent,
    pub heading: String,
    /// Short answer or fallback text; empty when the items speak for themselves.
    pub message: String,
    /// Gallery items, at most [`GALLERY_LIMIT`].
    pub items: Vec<Product>,
    /// Compact picks, at most [`PICKS_LIMIT`].
    pub picks: Vec<Product>,
    /// Out-of-stock items the query named directly.
    pub requested: Vec<Product>,
    pub tips: Vec<String>,
    pub snippet: Option<DocSnippet>,
    pub preview: Option<PagePreview>,
    /// Follow-up question for the shopper.
    pub prompt: Option<String>,
    pub links: Vec<Link>,
}

impl ChatResponse {
    fn new(intent: Intent, heading: impl Into<String>) -> Self {
        Self {
            intent,
            heading: heading.into(),
            message: String::new(),
            items: Vec::new(),
            picks: Vec::new(),
            requested: Vec::new(),
            tips: Vec::new(),
            snippet: None,
            preview: None,
            prompt: None,
            links: Vec::new(),
        }
    }
}

/// Everything the composer needs, gathered up front.
#[derive(Debug, Clone)]
pub struct ComposeInput<'a> {
    pub query: &'a str,
    pub intent: Intent,
    /// Ranked products, best first.
    pub products: Vec<Product>,
    pub links: &'a SiteLinks,
    /// Operator FAQ answer matched for this query.
    pub faq: Option<String>,
    pub snippet: Option<DocSnippet>,
    /// Validated course URL and its preview, for course answers.
    pub course: Option<(String, PagePreview)>,
}

fn availability_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)out of stock|sold out|back.?in stock|restock|available|availability|in stock")
            .expect("availability regex is valid")
    })
}

/// Whether the query is specific enough to surface an out-of-stock title.
pub fn is_direct_ask(query: &str, title: &str) -> bool {
    availability_re().is_match(query) || token_overlap(query, title) >= DIRECT_ASK_OVERLAP
}

/// Validate a configured course URL, falling back to [`CANONICAL_COURSE_URL`].
///
/// The override survives only when it is non-empty, is not the truncated
/// `...COMING` slug, ends in `.html`, and carries the `_p_363` product id.
pub fn normalize_course_url(raw: &str) -> String {
    static TRUNCATED: OnceLock<Regex> = OnceLock::new();
    static HTML: OnceLock<Regex> = OnceLock::new();
    static PRODUCT_ID: OnceLock<Regex> = OnceLock::new();

    let v = raw.trim();
    if v.is_empty() {
        return CANONICAL_COURSE_URL.to_string();
    }
    let truncated = TRUNCATED.get_or_init(|| {
        Regex::new(r"Master-Body-Piercing-Class-COMING($|[^-S])").expect("slug regex is valid")
    });
    let html = HTML.get_or_init(|| Regex::new(r"(?i)\.html($|\?)").expect("html regex is valid"));
    let product_id =
        PRODUCT_ID.get_or_init(|| Regex::new(r"_p_363\.html($|\?)").expect("id regex is valid"));

    if truncated.is_match(v) || !html.is_match(v) || !product_id.is_match(v) {
        return CANONICAL_COURSE_URL.to_string();
    }
    v.to_string()
}

/// Build the chat result for one query.
pub fn compose(input: ComposeInput<'_>) -> ChatResponse {
    let links = input.links;
    let mut out = match input.intent {
        Intent::Shipping => {
            let mut r = ChatResponse::new(Intent::Shipping, "Shipping & Returns");
            r.message = SHIPPING_SUMMARY.to_string();
            r.links.push(Link::new("Open Shipping & Returns Page", &links.shipping));
            r
        }
        Intent::Aftercare => {
            let mut r = ChatResponse::new(Intent::Aftercare, "Aftercare Essentials");
            r.message = AFTERCARE_SUMMARY.to_string();
            r.tips = AFTERCARE_TIPS.iter().map(|t| t.to_string()).collect();
            r.links.push(Link::new("Open Full Aftercare Page", &links.aftercare));
            r
        }
        Intent::Course => {
            let mut r = ChatResponse::new(Intent::Course, "Master Body Piercing Course");
            r.message =
                "Opening the course page even if it's out of stock or unavailable.".to_string();
            let (url, preview) = input
                .course
                .clone()
                .unwrap_or_else(|| (CANONICAL_COURSE_URL.to_string(), PagePreview::default()));
            r.preview = Some(preview);
            r.links.push(Link::new("Go to Course", url));
            r.links.push(Link::new("About Us", &links.about));
            r.links.push(Link::new("Contact / Interest List", &links.contact));
            r
        }
        Intent::Contact => {
            let mut r = ChatResponse::new(Intent::Contact, "Contact Us");
            r.message =
                "Send us a message and the team will get back to you, usually within one business day."
                    .to_string();
            r.links.push(Link::new("Contact Us", &links.contact));
            r.links.push(Link::new("About Us", &links.about));
            r
        }
        Intent::Sterile => {
            let mut r = product_view(&input, "Sterilized Body Jewelry");
            r.links.push(Link::new("Open Full Sterilized Category", &links.sterilized));
            r
        }
        Intent::Kit => {
            let mut r = product_view(&input, "Piercing Kits");
            if r.items.is_empty() {
                r.message =
                    "Looking for a piercing kit? Tell me the piercing and I'll show options.".to_string();
            }
            r.prompt = Some("What kind of piercing kit are you looking for?".to_string());
            r.links.push(Link::new("Professional Piercing Kits", &links.pro_kits));
            r.links.push(Link::new("Safe & Sterile Piercing Kits", &links.safe_kits));
            r
        }
        Intent::KitType => {
            let heading = format!("{} Piercing Kits", title_case(input.query));
            let mut r = product_view(&input, heading);
            r.links.push(Link::new("Professional Piercing Kits", &links.pro_kits));
            r.links.push(Link::new("Safe & Sterile Piercing Kits", &links.safe_kits));
            r
        }
        Intent::General => product_view(&input, "Top Matches"),
    };

    if let Some(answer) = input.faq.as_ref().filter(|a| !a.trim().is_empty()) {
        out.message = answer.clone();
    }

    if matches!(
        input.intent,
        Intent::Shipping | Intent::Aftercare | Intent::Contact | Intent::General
    ) {
        out.snippet = input.snippet.clone();
    }

    let shows_products = matches!(
        input.intent,
        Intent::Sterile | Intent::Kit | Intent::KitType | Intent::General
    );
    // A snippet never stands in for products; an empty shelf always gets
    // the fallback message and categories.
    if shows_products && out.items.is_empty() && out.requested.is_empty() {
        if out.message.is_empty() {
            out.message = NO_MATCHES.to_string();
        }
        for fallback in fallback_links(links) {
            if !out.links.iter().any(|l| l.url == fallback.url) {
                out.links.push(fallback);
            }
        }
    }

    out
}

/// Gallery, picks, and requested blocks shared by the product intents.
fn product_view(input: &ComposeInput<'_>, heading: impl Into<String>) -> ChatResponse {
    let mut r = ChatResponse::new(input.intent, heading);
    let (available, out_of_stock): (Vec<&Product>, Vec<&Product>) = input
        .products
        .iter()
        .partition(|p| p.instock.is_available());

    r.items = available.iter().take(GALLERY_LIMIT).map(|p| (*p).clone()).collect();
    r.picks = r.items.iter().take(PICKS_LIMIT).cloned().collect();
    r.requested = out_of_stock
        .into_iter()
        .filter(|p| p.score > 0 && is_direct_ask(input.query, &p.title))
        .take(REQUESTED_LIMIT)
        .cloned()
        .collect();
    r
}

/// Broader categories offered when nothing matched.
pub fn fallback_links(links: &SiteLinks) -> Vec<Link> {
    vec![
        Link::new("Sterilized Body Jewelry", &links.sterilized),
        Link::new("Professional Piercing Kits", &links.pro_kits),
        Link::new("Safe & Sterile Piercing Kits", &links.safe_kits),
    ]
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
