//! Rules, pages, and storefront link configuration.
//!
//! Both JSON files are optional. A missing or malformed file degrades to the
//! empty default with a warning; the assistant keeps answering generically.

use crate::types::{ConfigError, Product};
use regex::{Regex, RegexBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Storefront origin the assistant scrapes by default.
pub const DEFAULT_SITE: &str = "https://www.hottiebodyjewelry.com";

/// Operator-editable answers and overrides (`rules.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Canned answers keyed by a phrase the query must contain.
    pub faqs: BTreeMap<String, String>,
    /// Product URLs pinned to the top of ranked lists, in this order.
    pub promote_first: Vec<String>,
    /// Word or phrase rewrites applied before classification.
    pub aliases: BTreeMap<String, String>,
    /// Course page override; validated before use.
    pub course_url: String,
}

impl RulesConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    /// Load the file, or fall back to empty rules with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        load_or_warn(path, "rules")
    }

    /// FAQ answer whose key appears in the query; the longest key wins.
    pub fn faq_for(&self, query: &str) -> Option<&str> {
        let q = query.to_lowercase();
        self.faqs
            .iter()
            .filter(|(key, _)| {
                let key = key.trim().to_lowercase();
                !key.is_empty() && q.contains(&key)
            })
            .max_by_key(|(key, _)| key.trim().chars().count())
            .map(|(_, answer)| answer.as_str())
    }

    /// Rewrite aliased words and phrases, longest alias first.
    ///
    /// Matching is case-insensitive on whole words only, so an alias for
    /// "lip" leaves "clip" alone.
    pub fn apply_aliases(&self, query: &str) -> String {
        let mut aliases: Vec<(&String, &String)> = self
            .aliases
            .iter()
            .filter(|(from, _)| !from.trim().is_empty())
            .collect();
        aliases.sort_by_key(|(from, _)| std::cmp::Reverse(from.chars().count()));

        let mut out = query.to_string();
        for (from, to) in aliases {
            if let Some(re) = whole_word(from.trim()) {
                out = re.replace_all(&out, to.as_str()).into_owned();
            }
        }
        out
    }

    /// Move pinned URLs to the front, keeping everything else in order.
    pub fn promote(&self, products: &mut [Product]) {
        if self.promote_first.is_empty() {
            return;
        }
        products.sort_by_key(|p| {
            self.promote_first
                .iter()
                .position(|u| u == &p.url)
                .unwrap_or(usize::MAX)
        });
    }
}

fn whole_word(phrase: &str) -> Option<Regex> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(phrase)))
        .case_insensitive(true)
        .build()
        .ok()
}

/// One informational page to ingest at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    pub url: String,
    /// CSS selector for the content region.
    #[serde(default = "default_selector")]
    pub selector: String,
}

fn default_selector() -> String {
    "body".to_string()
}

/// Informational pages list (`pages.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    pub pages: Vec<PageEntry>,
}

impl PagesConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    pub fn load_or_default(path: &Path) -> Self {
        load_or_warn(path, "pages")
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn load_or_warn<T: DeserializeOwned + Default>(path: &Path, what: &str) -> T {
    match read_json(path) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "{what} file unusable, using defaults");
            T::default()
        }
    }
}

/// Fixed storefront destinations: categories, policy pages, contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteLinks {
    pub site: String,
    pub home: String,
    pub sterilized: String,
    pub pro_kits: String,
    pub safe_kits: String,
    pub aftercare: String,
    pub shipping: String,
    pub about: String,
    pub contact: String,
}

impl SiteLinks {
    /// Standard store paths under `site` (trailing slash ignored).
    pub fn for_site(site: &str) -> Self {
        let site = site.trim_end_matches('/').to_string();
        Self {
            home: format!("{site}/"),
            sterilized: format!("{site}/Sterilized-Body-Jewelry_c_42.html"),
            pro_kits: format!("{site}/Professional-Piercing-Kits_c_7.html"),
            safe_kits: format!("{site}/Safe-and-Sterile-Piercing-Kits_c_1.html"),
            aftercare: format!("{site}/Aftercare_ep_42-1.html"),
            shipping: format!("{site}/Shipping-and-Returns_ep_43-1.html"),
            about: format!("{site}/About-Us_ep_7.html"),
            contact: format!("{site}/crm.asp?action=contactus"),
            site,
        }
    }

    /// The storefront's keyword search URL for a query.
    pub fn search_url(&self, query: &str) -> String {
        let base = format!("{}/search.asp", self.site);
        url::Url::parse_with_params(&base, &[("keyword", query)])
            .map(|u| u.to_string())
            .unwrap_or(base)
    }
}

impl Default for SiteLinks {
    fn default() -> Self {
        Self::for_site(DEFAULT_SITE)
    }
}
