//! The query-to-result pipeline.
//!
//! `respond` classifies the query, gathers whatever the intent needs
//! (harvests, a course preview, a document snippet), ranks, and composes.
//! Finished responses are cached per normalized query.

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::compose::{compose, normalize_course_url, ChatResponse, ComposeInput, CANONICAL_COURSE_URL};
use crate::config::{PagesConfig, RulesConfig, SiteLinks};
use crate::docs::DocumentIndex;
use crate::fetcher::PageSource;
use crate::harvest::{HarvestSettings, Harvester};
use crate::intent::{intent_of, normalize_query, Intent};
use crate::parser::page_preview;
use crate::query::rank;
use crate::types::{FetchResult, PagePreview, Product};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub harvest: HarvestSettings,
    /// Lifetime of a cached chat response.
    pub chat_ttl: Duration,
    /// Most chat responses held at once.
    pub chat_max_entries: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            harvest: HarvestSettings::default(),
            chat_ttl: Duration::from_secs(5 * 60),
            chat_max_entries: 500,
        }
    }
}

/// Chat assistant for one storefront.
pub struct Assistant {
    source: Arc<dyn PageSource>,
    harvester: Harvester,
    docs: DocumentIndex,
    rules: RulesConfig,
    responses: TtlCache<ChatResponse>,
}

impl Assistant {
    pub fn new(
        source: Arc<dyn PageSource>,
        links: SiteLinks,
        rules: RulesConfig,
        settings: AssistantSettings,
    ) -> Self {
        Self::with_clock(source, links, rules, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn PageSource>,
        links: SiteLinks,
        rules: RulesConfig,
        settings: AssistantSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            harvester: Harvester::with_clock(source.clone(), links, settings.harvest, clock.clone()),
            responses: TtlCache::with_clock(settings.chat_ttl, clock)
                .with_max_entries(settings.chat_max_entries),
            docs: DocumentIndex::new(),
            source,
            rules,
        }
    }

    pub fn harvester(&self) -> &Harvester {
        &self.harvester
    }

    pub fn docs(&self) -> &DocumentIndex {
        &self.docs
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub fn links(&self) -> &SiteLinks {
        self.harvester.links()
    }

    /// Ingest the informational pages into the document index.
    pub async fn load_documents(&self, pages: &PagesConfig) -> usize {
        let ttl = self.harvester.settings().page_ttl;
        self.docs.ingest(self.source.clone(), pages, ttl).await
    }

    /// Number of chat responses currently cached.
    pub fn cached_responses(&self) -> usize {
        self.responses.len()
    }

    /// Alias-rewritten, normalized form of a raw query.
    pub fn normalize(&self, raw: &str) -> String {
        normalize_query(&self.rules.apply_aliases(raw))
    }

    /// Intent of a raw query after alias rewriting.
    pub fn classify(&self, raw: &str) -> Intent {
        intent_of(&self.normalize(raw))
    }

    /// Answer one chat query.
    pub async fn respond(&self, raw: &str) -> ChatResponse {
        let query = self.normalize(raw);
        if let Some(hit) = self.responses.get(&query) {
            debug!(query = %query, "chat response served from cache");
            return hit;
        }

        let intent = intent_of(&query);
        let (products, complete) = if query.is_empty() {
            (Vec::new(), true)
        } else {
            self.gather(&query, intent).await
        };
        let mut ranked = rank(&query, products);
        self.rules.promote(&mut ranked);

        let course = match intent {
            Intent::Course => Some(self.course_card().await),
            _ => None,
        };

        let response = compose(ComposeInput {
            query: &query,
            intent,
            products: ranked,
            links: self.links(),
            faq: self.rules.faq_for(&query).map(str::to_string),
            snippet: self.docs.search(&query),
            course,
        });

        info!(
            query = %query,
            intent = %intent,
            items = response.items.len(),
            requested = response.requested.len(),
            complete,
            "chat response composed"
        );
        if complete {
            self.responses.insert(query, response.clone());
        }
        response
    }

    /// Validated course URL: the configured one if it passes the guard and
    /// answers a HEAD request, otherwise the canonical page.
    pub async fn course_url(&self) -> String {
        let url = normalize_course_url(&self.rules.course_url);
        if url != CANONICAL_COURSE_URL && !self.source.head_ok(&url).await {
            debug!(url = %url, "course override unreachable, using canonical page");
            return CANONICAL_COURSE_URL.to_string();
        }
        url
    }

    async fn course_card(&self) -> (String, PagePreview) {
        let url = self.course_url().await;
        let preview = match self.source.get(&url, self.harvester.settings().page_ttl).await {
            Ok(html) => page_preview(&html, &url),
            Err(e) => {
                debug!(error = %e, "course preview unavailable");
                PagePreview {
                    title: url.clone(),
                    image: String::new(),
                }
            }
        };
        (url, preview)
    }

    /// Products for a product intent, plus whether every listing page loaded.
    ///
    /// A listing that failed contributes nothing; the caller keeps such a
    /// response out of the chat cache so the next ask retries upstream.
    async fn gather(&self, query: &str, intent: Intent) -> (Vec<Product>, bool) {
        let h = &self.harvester;
        match intent {
            Intent::General => settle(h.search_on_demand(query).await),
            Intent::Sterile => {
                let (found, category) = futures::join!(
                    h.search_on_demand(query),
                    h.harvest_category(&h.links().sterilized)
                );
                let (found, found_ok) = settle(found);
                let (category, category_ok) = settle(category);
                (merge_unique(found, category), found_ok && category_ok)
            }
            Intent::Kit => settle(h.harvest_home_kits().await),
            Intent::KitType => {
                let kit_query = format!("{query} piercing kit");
                let (found, home) =
                    futures::join!(h.search_on_demand(&kit_query), h.harvest_home_kits());
                let (found, found_ok) = settle(found);
                let (home, home_ok) = settle(home);
                let words: Vec<&str> = query.split_whitespace().collect();
                let found: Vec<Product> = found
                    .into_iter()
                    .filter(|p| p.title.to_lowercase().contains("kit"))
                    .collect();
                let home: Vec<Product> = home
                    .into_iter()
                    .filter(|p| {
                        let title = p.title.to_lowercase();
                        words.iter().any(|w| title.contains(w))
                    })
                    .collect();
                (merge_unique(found, home), found_ok && home_ok)
            }
            Intent::Shipping | Intent::Aftercare | Intent::Course | Intent::Contact => {
                (Vec::new(), true)
            }
        }
    }
}

/// Unwrap a listing harvest, treating a failed page as empty.
fn settle(result: FetchResult<Vec<Product>>) -> (Vec<Product>, bool) {
    match result {
        Ok(products) => (products, true),
        Err(e) => {
            debug!(error = %e, "listing unavailable, response will not be cached");
            (Vec::new(), false)
        }
    }
}

/// Concatenate two lists, dropping URLs already seen.
fn merge_unique(first: Vec<Product>, second: Vec<Product>) -> Vec<Product> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|p| seen.insert(p.url.clone()))
        .collect()
}
