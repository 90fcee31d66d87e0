//! Catalog harvester: product lists from category pages, the home page, and
//! the storefront's keyword search.
//!
//! Every harvest follows the same steps: listing extraction gives a cheap
//! baseline, a bounded number of candidates missing price or image are
//! enriched from their product pages, and if the set is still short of the
//! target more candidates are enriched until the pool runs out. A failed
//! product-page fetch only ever drops the one URL; a failed listing page is
//! returned as an error and never cached.

use crate::bounded::map_bounded;
use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::SiteLinks;
use crate::fetcher::PageSource;
use crate::listing::{extract_listing, ListingCandidate};
use crate::parser::parse_page;
use crate::query::expand;
use crate::types::{FetchError, FetchResult, ParsedPage, Product};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Home-page kit anchors below this count widen the pool to every product link.
const MIN_HOME_KIT_ANCHORS: usize = 6;

const HOME_CACHE_KEY: &str = "home-kits";

/// Harvest limits and cache lifetimes.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    /// Candidates enriched in the first round.
    pub enrich_limit: usize,
    /// Simultaneous product-page fetches.
    pub concurrency: usize,
    /// Result size the top-up rounds aim for.
    pub target: usize,
    pub page_ttl: Duration,
    pub category_ttl: Duration,
    pub search_ttl: Duration,
    pub home_ttl: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            enrich_limit: 8,
            concurrency: 4,
            target: 16,
            page_ttl: Duration::from_secs(10 * 60),
            category_ttl: Duration::from_secs(15 * 60),
            search_ttl: Duration::from_secs(10 * 60),
            home_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// Builds product lists on demand and caches them per source page.
pub struct Harvester {
    source: Arc<dyn PageSource>,
    links: SiteLinks,
    settings: HarvestSettings,
    /// Category and search results keyed by listing URL.
    listings: TtlCache<Vec<Product>>,
    home: TtlCache<Vec<Product>>,
}

impl Harvester {
    pub fn new(source: Arc<dyn PageSource>, links: SiteLinks, settings: HarvestSettings) -> Self {
        Self::with_clock(source, links, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn PageSource>,
        links: SiteLinks,
        settings: HarvestSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            listings: TtlCache::with_clock(settings.category_ttl, clock.clone()),
            home: TtlCache::with_clock(settings.home_ttl, clock),
            source,
            links,
            settings,
        }
    }

    pub fn links(&self) -> &SiteLinks {
        &self.links
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Products on a category page.
    pub async fn harvest_category(&self, category_url: &str) -> FetchResult<Vec<Product>> {
        self.harvest_listing(category_url, self.settings.category_ttl, keep_all)
            .await
    }

    /// Products from the storefront search for an expanded query.
    pub async fn search_on_demand(&self, query: &str) -> FetchResult<Vec<Product>> {
        let url = self.links.search_url(&expand(query));
        self.harvest_listing(&url, self.settings.search_ttl, keep_all)
            .await
    }

    /// Kits featured on the home page.
    pub async fn harvest_home_kits(&self) -> FetchResult<Vec<Product>> {
        if let Some(hit) = self.home.get(HOME_CACHE_KEY) {
            debug!(count = hit.len(), "home kits served from cache");
            return Ok(hit);
        }

        let home = self.links.home.clone();
        let html = self.source.get(&home, self.settings.page_ttl).await.map_err(|e| {
            debug!(error = %e, "home page fetch failed");
            e
        })?;

        let all = extract_listing(&html, &home);
        let (mut pool, rest): (Vec<_>, Vec<_>) =
            all.into_iter().partition(|c| has_kit_marker(&c.title));
        if pool.len() < MIN_HOME_KIT_ANCHORS {
            debug!(kit_anchors = pool.len(), "few kit anchors, widening to all product links");
            pool.extend(rest);
        }

        let kits = self.assemble(pool, is_kit).await;
        info!(count = kits.len(), "home kits harvested");
        self.home.insert(HOME_CACHE_KEY, kits.clone());
        Ok(kits)
    }

    /// Fetch and parse product pages for bare URLs.
    ///
    /// Output keeps input order; URLs that fail to load are dropped.
    pub async fn enrich(&self, urls: Vec<String>) -> Vec<Product> {
        let jobs: Vec<(String, String)> = urls.into_iter().map(|u| (u.clone(), u)).collect();
        self.fetch_parsed(jobs)
            .await
            .into_iter()
            .map(|(url, page)| {
                let mut product = Product::new(url);
                product.merge(&page);
                product
            })
            .collect()
    }

    async fn harvest_listing(
        &self,
        listing_url: &str,
        ttl: Duration,
        keep: fn(&Product) -> bool,
    ) -> FetchResult<Vec<Product>> {
        if let Some(hit) = self.listings.get_within(listing_url, ttl) {
            debug!(url = listing_url, count = hit.len(), "listing served from cache");
            return Ok(hit);
        }

        let html = self
            .source
            .get(listing_url, self.settings.page_ttl)
            .await
            .map_err(|e| {
                debug!(error = %e, "listing fetch failed");
                e
            })?;

        let candidates = extract_listing(&html, listing_url);
        let found = candidates.len();
        let products = self.assemble(candidates, keep).await;
        info!(url = listing_url, candidates = found, products = products.len(), "listing harvested");
        self.listings.insert(listing_url, products.clone());
        Ok(products)
    }

    /// Enrich candidates in rounds and return the survivors in discovery order.
    async fn assemble(&self, candidates: Vec<ListingCandidate>, keep: fn(&Product) -> bool) -> Vec<Product> {
        let mut products: Vec<Product> = candidates
            .into_iter()
            .map(ListingCandidate::into_product)
            .collect();
        let mut ready: Vec<bool> = products.iter().map(|p| !p.needs_enrichment()).collect();
        let mut pending: VecDeque<usize> = (0..products.len()).filter(|&i| !ready[i]).collect();

        let first = self.settings.enrich_limit.min(pending.len());
        let batch: Vec<usize> = pending.drain(..first).collect();
        self.enrich_slots(&mut products, &mut ready, batch).await;

        loop {
            let have = kept_count(&products, &ready, keep);
            if have >= self.settings.target || pending.is_empty() {
                break;
            }
            let take = (self.settings.target - have).min(pending.len());
            let batch: Vec<usize> = pending.drain(..take).collect();
            debug!(have, batch = batch.len(), "topping up harvest");
            self.enrich_slots(&mut products, &mut ready, batch).await;
        }

        products
            .into_iter()
            .zip(ready)
            .filter(|(p, ok)| *ok && keep(p))
            .map(|(p, _)| p)
            .collect()
    }

    async fn enrich_slots(&self, products: &mut [Product], ready: &mut [bool], batch: Vec<usize>) {
        let jobs: Vec<(usize, String)> = batch
            .into_iter()
            .map(|i| (i, products[i].url.clone()))
            .collect();
        for (i, page) in self.fetch_parsed(jobs).await {
            products[i].merge(&page);
            ready[i] = true;
        }
    }

    async fn fetch_parsed<K: Send + 'static>(&self, jobs: Vec<(K, String)>) -> Vec<(K, ParsedPage)> {
        let ttl = self.settings.page_ttl;
        map_bounded(jobs, self.settings.concurrency, |(key, url)| {
            let source = Arc::clone(&self.source);
            async move {
                let html = source.get(&url, ttl).await?;
                Ok::<_, FetchError>((key, parse_page(&html, &url)))
            }
        })
        .await
    }
}

fn keep_all(_: &Product) -> bool {
    true
}

fn is_kit(product: &Product) -> bool {
    has_kit_marker(&product.title)
}

fn has_kit_marker(title: &str) -> bool {
    title.to_lowercase().contains("kit")
}

fn kept_count(products: &[Product], ready: &[bool], keep: fn(&Product) -> bool) -> usize {
    products
        .iter()
        .zip(ready)
        .filter(|(p, ok)| **ok && keep(p))
        .count()
}
