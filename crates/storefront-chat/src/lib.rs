//! Storefront chat: intent classification, on-demand catalog scraping, and
//! stock-aware product answers for a single e-commerce site.

pub mod assistant;
pub mod bounded;
pub mod cache;
pub mod compose;
pub mod config;
pub mod docs;
pub mod fetcher;
pub mod harvest;
pub mod intent;
pub mod listing;
pub mod parser;
pub mod query;
pub mod types;

pub use assistant::{Assistant, AssistantSettings};
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use compose::{compose, is_direct_ask, normalize_course_url, ChatResponse, ComposeInput, Link};
pub use config::{PageEntry, PagesConfig, RulesConfig, SiteLinks};
pub use docs::{DocSnippet, DocumentIndex};
pub use fetcher::{FetcherConfig, HttpFetcher, PageSource};
pub use harvest::{HarvestSettings, Harvester};
pub use intent::{intent_of, Intent};
pub use listing::{extract_listing, ListingCandidate};
pub use parser::{parse_page, ExtractionChain};
pub use query::{expand, rank, score};
pub use types::*;

/// Version reported by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
