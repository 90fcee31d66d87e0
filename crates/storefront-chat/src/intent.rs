//! Intent classification.
//!
//! An ordered rule list evaluated top-down; the first matching rule decides.
//! Policy questions sit above product words on purpose, so "sterile kit
//! shipping time" is a shipping question.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Classified purpose of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Shipping,
    Aftercare,
    Sterile,
    Course,
    Contact,
    Kit,
    /// One- or two-word piercing shorthand, read as "kits for this piercing".
    KitType,
    General,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Shipping => "shipping",
            Intent::Aftercare => "aftercare",
            Intent::Sterile => "sterile",
            Intent::Course => "course",
            Intent::Contact => "contact",
            Intent::Kit => "kit",
            Intent::KitType => "kit_type",
            Intent::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification rule: a predicate over the normalized query.
#[derive(Clone, Copy)]
pub struct IntentRule {
    pub intent: Intent,
    pub matches: fn(&str) -> bool,
}

impl fmt::Debug for IntentRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentRule").field("intent", &self.intent).finish()
    }
}

/// Rules in precedence order. `General` is the fallthrough and has no rule.
pub const RULES: &[IntentRule] = &[
    IntentRule { intent: Intent::Shipping, matches: is_shipping },
    IntentRule { intent: Intent::Aftercare, matches: is_aftercare },
    IntentRule { intent: Intent::Sterile, matches: is_sterile },
    IntentRule { intent: Intent::Course, matches: is_course },
    IntentRule { intent: Intent::Contact, matches: is_contact },
    IntentRule { intent: Intent::Kit, matches: is_kit },
    IntentRule { intent: Intent::KitType, matches: is_kit_type },
];

/// Piercing locations and types that turn a bare word into a kit request.
pub const PIERCING_VOCABULARY: &[&str] = &[
    "ear", "ears", "lobe", "cartilage", "helix", "tragus", "daith", "rook", "conch",
    "industrial", "nose", "nostril", "septum", "bridge", "eyebrow", "brow", "lip", "labret",
    "monroe", "medusa", "smiley", "tongue", "navel", "belly", "nipple", "dermal", "surface",
    "genital", "prince", "albert", "vch", "hood", "clit", "frenum", "guiche", "ampallang",
    "apadravya",
];

/// Max length of each word in the kit-type shorthand.
const KIT_TYPE_MAX_WORD_CHARS: usize = 12;

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("intent regex is valid"))
        }
    };
}

cached_regex!(
    shipping_re,
    r"shipping|returns?|return policy|refund|exchange|delivery|how long.*ship|ship.*time"
);
cached_regex!(
    aftercare_re,
    r"aftercare|after care|care instructions|clean|saline|healing"
);
cached_regex!(
    course_re,
    r"course|training|apprentice|class|master class|certification"
);
cached_regex!(
    contact_re,
    r"contact|support|customer service|\bhelp\b|email|phone number|talk to (a |an |someone|somebody|person|human)"
);
cached_regex!(kit_re, r"\bkits?\b");

fn is_shipping(q: &str) -> bool {
    shipping_re().is_match(q)
}

fn is_aftercare(q: &str) -> bool {
    aftercare_re().is_match(q)
}

fn is_sterile(q: &str) -> bool {
    q.contains("steril")
}

fn is_course(q: &str) -> bool {
    course_re().is_match(q)
}

fn is_contact(q: &str) -> bool {
    contact_re().is_match(q)
}

fn is_kit(q: &str) -> bool {
    kit_re().is_match(q)
}

fn is_kit_type(q: &str) -> bool {
    let words: Vec<&str> = q.split_whitespace().collect();
    if words.is_empty() || words.len() > 2 {
        return false;
    }
    words
        .iter()
        .all(|w| w.chars().count() <= KIT_TYPE_MAX_WORD_CHARS)
        && words.iter().any(|w| PIERCING_VOCABULARY.contains(w))
}

/// Lower-case and collapse whitespace.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Classify a raw query.
pub fn intent_of(query: &str) -> Intent {
    let q = normalize_query(query);
    RULES
        .iter()
        .find(|rule| (rule.matches)(&q))
        .map(|rule| rule.intent)
        .unwrap_or(Intent::General)
}
