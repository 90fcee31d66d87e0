//! End-to-end pipeline tests against an in-memory storefront.
//!
//! Covers harvest caching, the enrichment concurrency bound, stock-aware
//! surfacing, the course URL guard, and document snippets.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use storefront_chat::compose::CANONICAL_COURSE_URL;
use storefront_chat::*;

// ─────────────────────── helpers ───────────────────────

const SITE: &str = "https://shop.test";

/// Page source that serves fixed HTML, counts every call, and records the
/// peak number of overlapping fetches.
#[derive(Default)]
struct CountingSource {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
    /// URLs that answer 503 once before serving normally.
    flaky: Mutex<HashSet<String>>,
}

impl CountingSource {
    fn new() -> Self {
        Self::default()
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    fn fail_once(self, url: impl Into<String>) -> Self {
        self.flaky.lock().unwrap().insert(url.into());
        self
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for CountingSource {
    async fn get(&self, url: &str, _ttl: Duration) -> FetchResult<String> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.flaky.lock().unwrap().remove(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }

    async fn head_ok(&self, url: &str) -> bool {
        self.pages.contains_key(url)
    }
}

fn product_page(title: &str, price: &str, availability: &str) -> String {
    format!(
        r#"<html><head><title>{title} | Shop</title></head><body>
        <h1>{title}</h1>
        <div class="SalePrice">Sale Price: ${price}</div>
        <link itemprop="availability" href="https://schema.org/{availability}">
        <img src="/assets/images/{price}.jpg">
        </body></html>"#
    )
}

fn listing(paths: &[(&str, &str)]) -> String {
    let rows: String = paths
        .iter()
        .map(|(path, text)| format!(r#"<li><a href="{path}">{text}</a></li>"#))
        .collect();
    format!("<html><body><ul>{rows}</ul></body></html>")
}

fn assistant(source: Arc<CountingSource>, rules: RulesConfig, clock: Arc<ManualClock>) -> Assistant {
    Assistant::with_clock(
        source,
        SiteLinks::for_site(SITE),
        rules,
        AssistantSettings::default(),
        clock,
    )
}

// ─────────────────────── harvest caching ───────────────────────

#[tokio::test]
async fn test_category_harvest_is_cached_within_ttl() {
    let links = SiteLinks::for_site(SITE);
    let source = Arc::new(
        CountingSource::new()
            .page(
                &links.sterilized,
                listing(&[("/Sterile-Stud_p_1.html", "Stud"), ("/Sterile-Hoop_p_2.html", "Hoop")]),
            )
            .page(
                format!("{SITE}/Sterile-Stud_p_1.html"),
                product_page("Sterile Titanium Stud", "6.00", "InStock"),
            )
            .page(
                format!("{SITE}/Sterile-Hoop_p_2.html"),
                product_page("Sterile Nose Hoop", "7.00", "InStock"),
            ),
    );
    let clock = Arc::new(ManualClock::new());
    let harvester = Harvester::with_clock(
        source.clone(),
        links.clone(),
        HarvestSettings::default(),
        clock.clone(),
    );

    let first = harvester.harvest_category(&links.sterilized).await.unwrap();
    let calls_after_first = source.total_calls();
    assert_eq!(first.len(), 2);
    assert_eq!(calls_after_first, 3);

    clock.advance(Duration::from_secs(14 * 60));
    let second = harvester.harvest_category(&links.sterilized).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(source.total_calls(), calls_after_first);

    clock.advance(Duration::from_secs(2 * 60));
    harvester.harvest_category(&links.sterilized).await.unwrap();
    assert_eq!(source.calls_to(&links.sterilized), 2);
}

// ─────────────────────── concurrency ───────────────────────

#[tokio::test]
async fn test_enrichment_never_exceeds_four_fetches() {
    let urls: Vec<String> = (0..20).map(|i| format!("{SITE}/Item-{i}_p_{i}.html")).collect();
    let mut source = CountingSource::new().with_delay(Duration::from_millis(10));
    for (i, url) in urls.iter().enumerate() {
        source = source.page(url, product_page(&format!("Item {i}"), "2.00", "InStock"));
    }
    let source = Arc::new(source);
    let harvester = Harvester::new(source.clone(), SiteLinks::for_site(SITE), HarvestSettings::default());

    let products = harvester.enrich(urls.clone()).await;

    assert_eq!(products.len(), 20);
    assert_eq!(source.total_calls(), 20);
    assert!(source.peak() <= 4, "peak in-flight fetches was {}", source.peak());
    assert_eq!(products[7].url, urls[7]);
    assert_eq!(products[7].title, "Item 7");
}

#[tokio::test]
async fn test_enrichment_drops_failed_urls() {
    let good = format!("{SITE}/Good_p_1.html");
    let source = Arc::new(CountingSource::new().page(&good, product_page("Good Ring", "3.00", "InStock")));
    let harvester = Harvester::new(source, SiteLinks::for_site(SITE), HarvestSettings::default());

    let products = harvester
        .enrich(vec![format!("{SITE}/Missing_p_9.html"), good.clone()])
        .await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].url, good);
    assert_eq!(products[0].price, "$3.00");
}

// ─────────────────────── stock-aware answers ───────────────────────

fn septum_store(queries: &[&str]) -> CountingSource {
    let links = SiteLinks::for_site(SITE);
    let rows = listing(&[
        ("/Titanium-Septum-Ring_p_10.html", "16g Titanium Septum Ring"),
        ("/Septum-Clicker_p_11.html", "Septum Clicker"),
    ]);
    let mut source = CountingSource::new()
        .page(
            format!("{SITE}/Titanium-Septum-Ring_p_10.html"),
            product_page("16g Titanium Septum Ring", "14.00", "OutOfStock"),
        )
        .page(
            format!("{SITE}/Septum-Clicker_p_11.html"),
            product_page("Septum Clicker", "11.00", "InStock"),
        );
    for q in queries {
        source = source.page(links.search_url(&expand(q)), rows.clone());
    }
    source
}

#[tokio::test]
async fn test_direct_ask_surfaces_out_of_stock_item() {
    let q = "is the 16g titanium septum ring in stock";
    let source = Arc::new(septum_store(&[q]));
    let bot = assistant(source, RulesConfig::default(), Arc::new(ManualClock::new()));

    let response = bot.respond(q).await;
    assert_eq!(response.intent, Intent::General);
    assert_eq!(response.requested.len(), 1);
    assert_eq!(response.requested[0].title, "16g Titanium Septum Ring");
    assert_eq!(response.requested[0].instock, StockStatus::OutOfStock);
    assert!(response.items.iter().all(|p| p.title != "16g Titanium Septum Ring"));
}

#[tokio::test]
async fn test_vague_query_hides_out_of_stock_item() {
    let q = "show me septum jewelry";
    let source = Arc::new(septum_store(&[q]));
    let bot = assistant(source, RulesConfig::default(), Arc::new(ManualClock::new()));

    let response = bot.respond(q).await;
    assert_eq!(response.intent, Intent::General);
    assert!(response.requested.is_empty());
    assert_eq!(response.items.len(), 1);
    assert_eq!(response.items[0].title, "Septum Clicker");
    assert_eq!(response.items[0].price, "$11.00");
}

#[tokio::test]
async fn test_two_word_shorthand_never_surfaces_out_of_stock() {
    let source = Arc::new(septum_store(&[]));
    let bot = assistant(source, RulesConfig::default(), Arc::new(ManualClock::new()));

    let response = bot.respond("septum jewelry").await;
    assert_eq!(response.intent, Intent::KitType);
    assert!(response.requested.is_empty());
    assert_eq!(response.message, compose::NO_MATCHES);
}

#[tokio::test]
async fn test_chat_response_cache() {
    let q = "show me septum jewelry";
    let source = Arc::new(septum_store(&[q]));
    let clock = Arc::new(ManualClock::new());
    let bot = assistant(source.clone(), RulesConfig::default(), clock.clone());

    let first = bot.respond("  Show me   SEPTUM jewelry ").await;
    let calls = source.total_calls();
    let second = bot.respond(q).await;
    assert_eq!(first, second);
    assert_eq!(source.total_calls(), calls);

    clock.advance(Duration::from_secs(5 * 60 + 1));
    bot.respond(q).await;
    // Search results are still cached, so only the response was rebuilt.
    assert_eq!(source.total_calls(), calls);
}

#[tokio::test]
async fn test_chat_cache_holds_a_bounded_number_of_queries() {
    let source = Arc::new(CountingSource::new());
    let clock = Arc::new(ManualClock::new());
    let bot = Assistant::with_clock(
        source.clone(),
        SiteLinks::for_site(SITE),
        RulesConfig::default(),
        AssistantSettings {
            chat_max_entries: 3,
            ..AssistantSettings::default()
        },
        clock.clone(),
    );

    for n in 0..10 {
        bot.respond(&format!("how long does shipping take {n}")).await;
        clock.advance(Duration::from_secs(1));
    }
    assert_eq!(bot.cached_responses(), 3);
    assert_eq!(source.total_calls(), 0);
}

#[tokio::test]
async fn test_promote_first_moves_item_to_front() {
    let q = "titanium septum ring options";
    let links = SiteLinks::for_site(SITE);
    let source = Arc::new(
        CountingSource::new()
            .page(
                links.search_url(&expand(q)),
                listing(&[
                    ("/Titanium-Septum-Ring_p_20.html", "Titanium Septum Ring"),
                    ("/Nose-Stud_p_21.html", "Nose Stud"),
                ]),
            )
            .page(
                format!("{SITE}/Titanium-Septum-Ring_p_20.html"),
                product_page("Titanium Septum Ring", "15.00", "InStock"),
            )
            .page(
                format!("{SITE}/Nose-Stud_p_21.html"),
                product_page("Nose Stud", "5.00", "InStock"),
            ),
    );

    let plain = assistant(source.clone(), RulesConfig::default(), Arc::new(ManualClock::new()));
    let response = plain.respond(q).await;
    assert_eq!(response.items[0].title, "Titanium Septum Ring");

    let rules = RulesConfig {
        promote_first: vec![format!("{SITE}/Nose-Stud_p_21.html")],
        ..Default::default()
    };
    let promoted = assistant(source, rules, Arc::new(ManualClock::new()));
    let response = promoted.respond(q).await;
    assert_eq!(response.items[0].title, "Nose Stud");
    assert_eq!(response.items[1].title, "Titanium Septum Ring");
}

// ─────────────────────── course guard ───────────────────────

#[tokio::test]
async fn test_course_url_guard_through_assistant() {
    let cases = [
        ("", CANONICAL_COURSE_URL.to_string()),
        ("https://site/some-page", CANONICAL_COURSE_URL.to_string()),
        ("https://site/other_p_999.html", CANONICAL_COURSE_URL.to_string()),
        (
            "https://site/Master-Body-Piercing-Class-COMING",
            CANONICAL_COURSE_URL.to_string(),
        ),
    ];
    for (raw, expected) in cases {
        let rules = RulesConfig {
            course_url: raw.to_string(),
            ..Default::default()
        };
        let bot = assistant(Arc::new(CountingSource::new()), rules, Arc::new(ManualClock::new()));
        assert_eq!(bot.course_url().await, expected, "override {raw:?}");
    }
}

#[tokio::test]
async fn test_reachable_course_override_is_used() {
    let override_url = format!("{SITE}/Master-Body-Piercing-Class-COMING-SOON_p_363.html");
    let source = Arc::new(CountingSource::new().page(
        &override_url,
        r#"<html><head><title>Master Body Piercing Class</title>
           <meta property="og:image" content="/assets/images/class.jpg"></head></html>"#,
    ));
    let rules = RulesConfig {
        course_url: override_url.clone(),
        ..Default::default()
    };
    let bot = assistant(source, rules, Arc::new(ManualClock::new()));

    let response = bot.respond("tell me about the piercing course").await;
    assert_eq!(response.intent, Intent::Course);
    assert_eq!(response.links[0].url, override_url);
    let preview = response.preview.unwrap();
    assert_eq!(preview.title, "Master Body Piercing Class");
    assert_eq!(preview.image, format!("{SITE}/assets/images/class.jpg"));
}

#[tokio::test]
async fn test_unreachable_course_override_falls_back() {
    let rules = RulesConfig {
        course_url: format!("{SITE}/Master-Body-Piercing-Class-COMING-SOON_p_363.html"),
        ..Default::default()
    };
    let bot = assistant(Arc::new(CountingSource::new()), rules, Arc::new(ManualClock::new()));
    let response = bot.respond("course").await;
    assert_eq!(response.links[0].url, CANONICAL_COURSE_URL);
    assert_eq!(response.preview.unwrap().title, CANONICAL_COURSE_URL);
}

// ─────────────────────── documents & rules ───────────────────────

#[tokio::test]
async fn test_documents_feed_policy_snippets() {
    let shipping_url = format!("{SITE}/Shipping-and-Returns_ep_43-1.html");
    let body = "Orders placed before 2pm ship the same business day. ".repeat(6);
    let source = Arc::new(
        CountingSource::new()
            .page(
                &shipping_url,
                format!("<html><head><title>Shipping</title></head><body><main>{body}</main></body></html>"),
            )
            .page(format!("{SITE}/About-Us_ep_7.html"), "<html><body>Tiny</body></html>"),
    );
    let bot = assistant(source, RulesConfig::default(), Arc::new(ManualClock::new()));
    let pages: PagesConfig = serde_json::from_value(serde_json::json!({
        "pages": [
            { "url": shipping_url, "selector": "main" },
            { "url": format!("{SITE}/About-Us_ep_7.html") },
            { "url": format!("{SITE}/Gone_ep_1.html") }
        ]
    }))
    .unwrap();

    assert_eq!(bot.load_documents(&pages).await, 1);
    assert_eq!(bot.docs().len(), 1);

    let response = bot.respond("what is the shipping time").await;
    assert_eq!(response.intent, Intent::Shipping);
    let snippet = response.snippet.unwrap();
    assert_eq!(snippet.title, "Shipping");
    assert!(snippet.snippet.contains("same business day"));
}

#[tokio::test]
async fn test_aliases_and_faq() {
    let rules: RulesConfig = serde_json::from_value(serde_json::json!({
        "aliases": { "bellybutton": "navel" },
        "faqs": { "gift card": "Gift cards are sold at checkout." }
    }))
    .unwrap();
    let bot = assistant(Arc::new(CountingSource::new()), rules, Arc::new(ManualClock::new()));

    assert_eq!(bot.classify("bellybutton"), Intent::KitType);

    let response = bot.respond("do you sell a gift card").await;
    assert_eq!(response.message, "Gift cards are sold at checkout.");
}

#[tokio::test]
async fn test_no_matches_offers_fallback_links() {
    let bot = assistant(Arc::new(CountingSource::new()), RulesConfig::default(), Arc::new(ManualClock::new()));
    let response = bot.respond("unicorn horn").await;
    assert_eq!(response.message, compose::NO_MATCHES);
    assert!(response.links.iter().any(|l| l.url == bot.links().sterilized));
}

#[tokio::test]
async fn test_snippet_keeps_no_match_fallback() {
    let about_url = format!("{SITE}/About-Us_ep_7.html");
    let body = "Do you want to know who we are? We have been a family shop for twenty years. ".repeat(4);
    let source = Arc::new(CountingSource::new().page(
        &about_url,
        format!("<html><head><title>About</title></head><body>{body}</body></html>"),
    ));
    let bot = assistant(source, RulesConfig::default(), Arc::new(ManualClock::new()));
    let pages: PagesConfig =
        serde_json::from_value(serde_json::json!({ "pages": [{ "url": about_url }] })).unwrap();
    assert_eq!(bot.load_documents(&pages).await, 1);

    let response = bot.respond("do you have unicorn horns").await;
    assert!(response.items.is_empty());
    assert_eq!(response.message, compose::NO_MATCHES);
    assert!(response.links.iter().any(|l| l.url == bot.links().sterilized));
    assert_eq!(response.snippet.unwrap().title, "About");
}

// ─────────────────────── upstream failures ───────────────────────

#[tokio::test]
async fn test_failed_listing_response_is_not_cached() {
    let links = SiteLinks::for_site(SITE);
    let search = links.search_url(&expand("opal"));
    let source = Arc::new(
        CountingSource::new()
            .page(&search, listing(&[("/Opal-Stud_p_5.html", "Opal Stud")]))
            .page(
                format!("{SITE}/Opal-Stud_p_5.html"),
                product_page("Opal Stud", "9.50", "InStock"),
            )
            .fail_once(&search),
    );
    let bot = assistant(source.clone(), RulesConfig::default(), Arc::new(ManualClock::new()));

    let first = bot.respond("opal").await;
    assert!(first.items.is_empty());
    assert_eq!(first.message, compose::NO_MATCHES);

    let second = bot.respond("opal").await;
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].title, "Opal Stud");
    assert_eq!(source.calls_to(&search), 2);

    // A good answer is cached as usual.
    bot.respond("opal").await;
    assert_eq!(source.calls_to(&search), 2);
}
