// 🏷️ Tag Classifier - key pattern buckets
// Decides how (and whether) an OSM tag key is folded into a document

use crate::config::WranglingConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// KEY CLASS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyClass {
    /// Only lowercase letters and underscores ("amenity", "building")
    Lower,
    /// Lowercase/underscore, one colon, lowercase/underscore ("addr:street")
    LowerColon,
    /// Contains a character that cannot live in a document key
    ProblemChars,
    /// Everything else ("name_1", "FIXME", "addr:street:name")
    Other,
}

impl KeyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyClass::Lower => "lower",
            KeyClass::LowerColon => "lower_colon",
            KeyClass::ProblemChars => "problemchars",
            KeyClass::Other => "other",
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct KeyClassifier {
    lower: Regex,
    lower_colon: Regex,
    problem_chars: Regex,
    ignored_keys: Vec<String>,
    ignored_prefixes: Vec<String>,
}

impl KeyClassifier {
    pub fn new(config: &WranglingConfig) -> Self {
        KeyClassifier {
            lower: Regex::new(r"^([a-z]|_)*$").expect("static pattern"),
            lower_colon: Regex::new(r"^([a-z]|_)*:([a-z]|_)*$").expect("static pattern"),
            problem_chars: Regex::new(r#"[=\+/&<>;'"\?%#$@,\. \t\r\n]"#).expect("static pattern"),
            ignored_keys: config.ignored_keys.clone(),
            ignored_prefixes: config.ignored_prefixes.clone(),
        }
    }

    /// Classify a key. Precedence: problem chars, lower_colon, lower, other.
    pub fn classify(&self, key: &str) -> KeyClass {
        if self.problem_chars.is_match(key) {
            KeyClass::ProblemChars
        } else if self.lower_colon.is_match(key) {
            KeyClass::LowerColon
        } else if self.lower.is_match(key) {
            KeyClass::Lower
        } else {
            KeyClass::Other
        }
    }

    pub fn has_problem_chars(&self, key: &str) -> bool {
        self.problem_chars.is_match(key)
    }

    /// Key on the ignore list, or starting with an ignored prefix
    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignored_keys.iter().any(|k| k == key)
            || self.ignored_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Whether the shaper may fold this key into a document at all
    pub fn accepts(&self, key: &str) -> bool {
        !self.has_problem_chars(key) && !self.is_ignored(key)
    }
}

impl Default for KeyClassifier {
    fn default() -> Self {
        Self::new(&WranglingConfig::default())
    }
}

// ============================================================================
// COUNTS
// ============================================================================

/// Running bucket totals for the key audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCounts {
    pub lower: usize,
    pub lower_colon: usize,
    pub problemchars: usize,
    pub other: usize,
}

impl KeyCounts {
    pub fn record(&mut self, class: KeyClass) {
        match class {
            KeyClass::Lower => self.lower += 1,
            KeyClass::LowerColon => self.lower_colon += 1,
            KeyClass::ProblemChars => self.problemchars += 1,
            KeyClass::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.lower + self.lower_colon + self.problemchars + self.other
    }
}

// ============================================================================
// TESTS
// ============================================================================
