//! Query expansion and keyword scoring against product titles.
//!
//! Scoring is plain substring overlap on lower-cased text. The weights favour
//! sterile items, then courses, then kits, which is the store's own priority.

use crate::types::Product;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// A named group of interchangeable phrases.
#[derive(Debug, Clone, Copy)]
pub struct SynonymGroup {
    pub key: &'static str,
    pub members: &'static [&'static str],
}

/// Synonym groups, in expansion order.
pub const SYNONYMS: &[SynonymGroup] = &[
    SynonymGroup { key: "tragus", members: &["tragus"] },
    SynonymGroup { key: "daith", members: &["daith"] },
    SynonymGroup { key: "septum", members: &["septum", "bull ring", "bullring"] },
    SynonymGroup { key: "nose", members: &["nose", "nostril", "stud", "hoop"] },
    SynonymGroup { key: "labret", members: &["labret", "monroe"] },
    SynonymGroup { key: "eyebrow", members: &["eyebrow", "brow"] },
    SynonymGroup { key: "tongue", members: &["tongue", "barbell"] },
    SynonymGroup {
        key: "ring",
        members: &["ring", "captive", "captive bead", "cbr", "segment"],
    },
    SynonymGroup {
        key: "barbell",
        members: &["barbell", "straight barbell", "curved barbell", "banana"],
    },
    SynonymGroup {
        key: "sterile",
        members: &["sterile", "sterilized", "pre-sterilized", "pre sterilized", "sterilization"],
    },
    SynonymGroup {
        key: "kit",
        members: &[
            "kit",
            "piercing kit",
            "ear piercing kit",
            "ear kit",
            "ear-piercing kit",
            "professional kit",
        ],
    },
    SynonymGroup {
        key: "course",
        members: &["course", "training", "class", "apprentice", "certification", "master class"],
    },
];

const WEIGHT_WORD: u32 = 1;
const WEIGHT_SYNONYM: u32 = 2;
const WEIGHT_GAUGE: u32 = 3;
const WEIGHT_KIT: u32 = 4;
const WEIGHT_COURSE: u32 = 5;
const WEIGHT_STERILE: u32 = 6;

fn gauge_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(10|12|14|16|18|20|22|8|6)\s*g\b").expect("gauge regex is valid")
    })
}

fn kit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"kit\b").expect("kit regex is valid"))
}

fn course_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"course|training|class").expect("course regex is valid"))
}

/// Gauge number mentioned in the query, e.g. `"16"` for "16g" or "16 g".
pub fn parse_gauge(query: &str) -> Option<String> {
    gauge_re()
        .captures(query)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Append matched synonym-group keys and a normalized gauge token.
///
/// The result is what gets sent to the storefront's own keyword search.
pub fn expand(query: &str) -> String {
    let lower = query.to_lowercase();
    let mut extra: Vec<String> = SYNONYMS
        .iter()
        .filter(|group| group.members.iter().any(|m| lower.contains(m)))
        .map(|group| group.key.to_string())
        .collect();
    if let Some(gauge) = parse_gauge(query) {
        extra.push(format!("{gauge}g"));
    }
    format!("{} {}", query, extra.join(" ")).trim().to_string()
}

/// Relevance of a product title to a query.
pub fn score(query: &str, product: &Product) -> u32 {
    let title = product.title.to_lowercase();
    let q = query.to_lowercase();
    let mut s = 0;

    s += WEIGHT_WORD
        * q.split_whitespace()
            .filter(|word| title.contains(word))
            .count() as u32;

    s += WEIGHT_SYNONYM
        * SYNONYMS
            .iter()
            .filter(|group| {
                group
                    .members
                    .iter()
                    .any(|m| q.contains(m) && title.contains(m))
            })
            .count() as u32;

    if let Some(gauge) = parse_gauge(query) {
        if title.contains(&format!("{gauge}g")) {
            s += WEIGHT_GAUGE;
        }
    }
    if kit_re().is_match(&q) && kit_re().is_match(&title) {
        s += WEIGHT_KIT;
    }
    if q.contains("steril") && title.contains("steril") {
        s += WEIGHT_STERILE;
    }
    if course_re().is_match(&q) && course_re().is_match(&title) {
        s += WEIGHT_COURSE;
    }
    s
}

/// Score every product and sort by score, highest first.
///
/// The sort is stable, so equal scores keep discovery order.
pub fn rank(query: &str, products: Vec<Product>) -> Vec<Product> {
    let mut scored: Vec<Product> = products
        .into_iter()
        .map(|mut p| {
            p.score = score(query, &p);
            p
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

/// Distinct words longer than two characters shared by both strings.
pub fn token_overlap(a: &str, b: &str) -> usize {
    fn tokens(s: &str) -> HashSet<String> {
        s.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| t.chars().count() > 2)
            .map(str::to_string)
            .collect()
    }
    let left = tokens(a);
    let right = tokens(b);
    left.intersection(&right).count()
}
