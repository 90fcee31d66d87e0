//! Core data types: product and document records, stock status, errors.

use serde::{Deserialize, Serialize};

/// Placeholder title used when no name could be extracted.
pub const PLACEHOLDER_TITLE: &str = "Product";

/// Tri-state stock signal.
///
/// `Unknown` means every detection strategy was inconclusive. Callers treat
/// it as available for general listings but never as confirmed stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    #[default]
    Unknown,
}

impl StockStatus {
    /// True unless the item is explicitly out of stock.
    pub fn is_available(self) -> bool {
        !matches!(self, StockStatus::OutOfStock)
    }

    /// True only for an explicit in-stock signal.
    pub fn is_confirmed(self) -> bool {
        matches!(self, StockStatus::InStock)
    }
}

/// A product scraped from the storefront.
///
/// `url` is the dedup key within any harvested or searched set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub title: String,
    pub url: String,
    /// `$<amount>` or empty when undetectable.
    pub price: String,
    /// Absolute image URL or empty.
    pub image: String,
    pub instock: StockStatus,
    /// Per-query relevance; never cached as meaningful.
    #[serde(default)]
    pub score: u32,
}

impl Product {
    /// Create a bare record for a URL with the placeholder title.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
            url: url.into(),
            price: String::new(),
            image: String::new(),
            instock: StockStatus::Unknown,
            score: 0,
        }
    }

    /// Whether the listing record lacks fields a product page could fill.
    pub fn needs_enrichment(&self) -> bool {
        self.price.is_empty() || self.image.is_empty()
    }

    /// Overlay product-page fields onto this record.
    ///
    /// Only non-empty enrichment values overwrite; everything else keeps the
    /// listing baseline.
    pub fn merge(&mut self, page: &ParsedPage) {
        if !page.title.is_empty() {
            self.title = page.title.clone();
        }
        if !page.price.is_empty() {
            self.price = page.price.clone();
        }
        if !page.image.is_empty() {
            self.image = page.image.clone();
        }
        if page.instock != StockStatus::Unknown {
            self.instock = page.instock;
        }
        if self.title.is_empty() {
            self.title = PLACEHOLDER_TITLE.to_string();
        }
    }
}

/// Fields extracted from a single product or informational page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPage {
    pub title: String,
    pub text: String,
    pub image: String,
    pub price: String,
    pub instock: StockStatus,
}

/// An informational page (shipping, aftercare, about...) kept for snippet lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    /// Whitespace-normalized flat text.
    pub text: String,
    pub image: String,
}

/// Title and preview image for a single link card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PagePreview {
    pub title: String,
    pub image: String,
}

/// Errors raised while fetching upstream pages.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Errors raised while loading rules or pages files.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience result type for fetches.
pub type FetchResult<T> = Result<T, FetchError>;
