//! Informational document index: shipping, aftercare, about pages and the
//! like, ingested once at startup and searched for a short snippet.

use crate::bounded::map_bounded;
use crate::config::{PageEntry, PagesConfig};
use crate::fetcher::PageSource;
use crate::parser::{clean_text, extract_image, extract_text};
use crate::types::{Document, FetchError};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

/// Pages with this much text or less are skipped as navigation shells.
pub const MIN_DOCUMENT_CHARS: usize = 200;

/// Snippet window length in characters.
pub const SNIPPET_CHARS: usize = 800;

/// Characters of context kept before the first query term.
pub const SNIPPET_LEAD_CHARS: usize = 260;

const INGEST_CONCURRENCY: usize = 4;

/// Best matching document with a window of its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSnippet {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub image: String,
}

/// Topic boosts: (query pattern, document pattern, points).
struct TopicBoost {
    query: &'static str,
    document: &'static str,
    points: u32,
}

const TOPIC_BOOSTS: &[TopicBoost] = &[
    TopicBoost {
        query: r"ship|delivery|return|refund|exchange",
        document: r"ship|return|refund|exchange",
        points: 5,
    },
    TopicBoost {
        query: r"aftercare|after care|clean|saline|healing",
        document: r"aftercare|clean|saline|healing",
        points: 5,
    },
    TopicBoost {
        query: r"steril",
        document: r"steril",
        points: 5,
    },
    TopicBoost {
        query: r"kit",
        document: r"kit",
        points: 3,
    },
    TopicBoost {
        query: r"course|training|apprentice|class|certification",
        document: r"course|training|apprentice|class|certification",
        points: 4,
    },
];

fn compiled_boosts() -> &'static [(Regex, Regex, u32)] {
    static RE: OnceLock<Vec<(Regex, Regex, u32)>> = OnceLock::new();
    RE.get_or_init(|| {
        TOPIC_BOOSTS
            .iter()
            .map(|b| {
                (
                    Regex::new(b.query).expect("topic query regex is valid"),
                    Regex::new(b.document).expect("topic document regex is valid"),
                    b.points,
                )
            })
            .collect()
    })
}

/// In-memory document store.
#[derive(Default)]
pub struct DocumentIndex {
    docs: RwLock<Vec<Document>>,
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index directly from documents.
    pub fn from_documents(docs: Vec<Document>) -> Self {
        Self {
            docs: RwLock::new(docs),
        }
    }

    /// Fetch every configured page and replace the index contents.
    ///
    /// Unreachable pages and pages with too little text are skipped.
    /// Returns the number of documents kept.
    pub async fn ingest(
        &self,
        source: Arc<dyn PageSource>,
        pages: &PagesConfig,
        ttl: Duration,
    ) -> usize {
        let fetched = map_bounded(pages.pages.clone(), INGEST_CONCURRENCY, |entry| {
            let source = Arc::clone(&source);
            async move {
                let html = source.get(&entry.url, ttl).await?;
                Ok::<_, FetchError>(parse_document(&html, &entry))
            }
        })
        .await;

        let docs: Vec<Document> = fetched.into_iter().flatten().collect();
        let count = docs.len();
        tracing::info!(docs = count, configured = pages.pages.len(), "document index loaded");
        *self.write() = docs;
        count
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Highest-scoring document for the query, if any scores above zero.
    pub fn search(&self, query: &str) -> Option<DocSnippet> {
        let docs = self.read();
        let (best, top) = docs
            .iter()
            .map(|d| (score_document(query, d), d))
            .fold(None::<(u32, &Document)>, |acc, (s, d)| match acc {
                Some((best, _)) if best >= s => acc,
                _ => Some((s, d)),
            })?;
        if best == 0 {
            return None;
        }
        Some(DocSnippet {
            title: top.title.clone(),
            url: top.url.clone(),
            snippet: snippet_around(&top.text, query),
            image: top.image.clone(),
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Document>> {
        self.docs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Document>> {
        self.docs.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Parse an informational page; `None` when its text is too short.
pub fn parse_document(html: &str, entry: &PageEntry) -> Option<Document> {
    let document = Html::parse_document(html);
    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| entry.url.clone());
    let text = extract_text(&document, &entry.selector);
    if text.chars().count() <= MIN_DOCUMENT_CHARS {
        tracing::debug!(url = %entry.url, chars = text.len(), "page too short, skipped");
        return None;
    }
    Some(Document {
        url: entry.url.clone(),
        title,
        text,
        image: extract_image(&document, &entry.url),
    })
}

/// +2 per query term found in the text, plus topic boosts.
pub fn score_document(query: &str, doc: &Document) -> u32 {
    let q = query.to_lowercase();
    let hay = doc.text.to_lowercase();
    let mut score = 2 * q.split_whitespace().filter(|t| hay.contains(t)).count() as u32;
    for (query_re, doc_re, points) in compiled_boosts() {
        if query_re.is_match(&q) && doc_re.is_match(&hay) {
            score += points;
        }
    }
    score
}

/// Window of `text` starting a little before the first query word.
fn snippet_around(text: &str, query: &str) -> String {
    let need = query
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let lower = text.to_lowercase();
    let hit_chars = lower
        .find(&need)
        .map(|byte_idx| lower[..byte_idx].chars().count())
        .unwrap_or(0);
    let start = hit_chars.saturating_sub(SNIPPET_LEAD_CHARS);
    text.chars().skip(start).take(SNIPPET_CHARS).collect()
}
