// 🧹 Name Normalizer - abbreviation expansion for street names
// Plus postcode cleanup used by the record shaper

use crate::config::WranglingConfig;

// ============================================================================
// NAME NORMALIZER
// ============================================================================

/// Token-substitution cleanup of free-text address strings
///
/// Every whitespace-delimited token that exactly matches an abbreviation is
/// replaced by its expansion, unless the token before it is a suite marker:
///
/// ```text
/// "S Tryon St Ste 105" → "South Tryon Street Suite 105"
/// "Suite E"            → "Suite E"
/// ```
pub struct NameNormalizer {
    config: WranglingConfig,
}

impl NameNormalizer {
    pub fn new(config: &WranglingConfig) -> Self {
        NameNormalizer {
            config: config.clone(),
        }
    }

    pub fn normalize(&self, name: &str) -> String {
        let mut words: Vec<String> = Vec::new();

        for token in name.split_whitespace() {
            let guarded = words
                .last()
                .map(|prev| self.is_suite_marker(prev))
                .unwrap_or(false);

            let word = match self.config.expansion(token) {
                Some(expansion) if !guarded => expansion.to_string(),
                _ => token.to_string(),
            };
            words.push(word);
        }

        words.join(" ")
    }

    /// Normalize a single segment value (street-segment join)
    pub fn expand_token(&self, token: &str) -> String {
        self.config
            .expansion(token)
            .map(str::to_string)
            .unwrap_or_else(|| token.to_string())
    }

    fn is_suite_marker(&self, token: &str) -> bool {
        let lower = token.to_lowercase();
        self.config.suite_guards.iter().any(|g| *g == lower)
    }
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new(&WranglingConfig::default())
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Reduce a postcode to its first five digits
///
/// 'NC12345' and '12345-6789' both break zip aggregations. Inputs with fewer
/// than five digits return whatever digits were found, possibly none.
pub fn fix_postcode(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).take(5).collect()
}

/// Last word of a street name ("West Stanly St." → "St.")
pub fn street_type(name: &str) -> Option<&str> {
    name.split_whitespace().last()
}

// ============================================================================
// TESTS
// ============================================================================
