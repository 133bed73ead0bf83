// ⚙️ Wrangling Configuration - Rules as Data
// Abbreviation table, ignore lists and expected street types for the OSM pipeline

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Immutable configuration handed to the classifier, shaper and normalizer
/// when they are built.
///
/// Every field is optional in a config file; anything missing falls back to
/// the built-in tables from `WranglingConfig::default()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WranglingConfig {
    /// Token → expansion ("St" → "Street"). Matching is exact and case-sensitive.
    pub abbreviations: HashMap<String, String>,

    /// Previous-token values (compared lowercase) that block expansion,
    /// so "Suite E" never becomes "Suite East"
    pub suite_guards: Vec<String>,

    /// Tag keys dropped outright
    pub ignored_keys: Vec<String>,

    /// Tag key prefixes dropped outright (administrative/source metadata)
    pub ignored_prefixes: Vec<String>,

    /// Street types considered clean by the street-type audit
    pub expected_street_types: Vec<String>,
}

const DEFAULT_ABBREVIATIONS: &[(&str, &str)] = &[
    ("E", "East"),
    ("W", "West"),
    ("N", "North"),
    ("S", "South"),
    ("Rd", "Road"),
    ("Rd.", "Road"),
    ("ln", "Lane"),
    ("ln.", "Lane"),
    ("Ln", "Lane"),
    ("Ln.", "Lane"),
    ("Dr", "Drive"),
    ("Dr.", "Drive"),
    ("St", "Street"),
    ("St.", "Street"),
    ("Ste", "Suite"),
    ("Ste.", "Suite"),
    ("Cir", "Circle"),
    ("Ave", "Avenue"),
    ("Ave.", "Avenue"),
    ("Hwy", "Highway"),
    ("Hwy.", "Highway"),
    ("Pky", "Parkway"),
    ("Pky.", "Parkway"),
    ("Fwy", "Freeway"),
    ("Fwy.", "Freeway"),
    ("Blvd", "Boulevard"),
    ("Blvd.", "Boulevard"),
];

// "Cirle" is kept as spelled in the charlotte extract
const DEFAULT_EXPECTED: &[&str] = &[
    "Street", "Avenue", "Boulevard", "Drive", "Court", "Place", "Square", "Lane", "Road",
    "Trail", "Parkway", "Commons", "Cirle", "Cove", "Highway", "Park", "Way", "South",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for WranglingConfig {
    fn default() -> Self {
        WranglingConfig {
            abbreviations: DEFAULT_ABBREVIATIONS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            suite_guards: strings(&["suite", "ste", "ste."]),
            ignored_keys: strings(&["ele", "import_uuid", "source", "wikipedia"]),
            ignored_prefixes: strings(&["gnis:", "is_in", "nhd-s"]),
            expected_street_types: strings(DEFAULT_EXPECTED),
        }
    }
}

impl WranglingConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: WranglingConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Expansion for an exact token, if the table has one
    pub fn expansion(&self, token: &str) -> Option<&str> {
        self.abbreviations.get(token).map(String::as_str)
    }

    pub fn is_expected_street_type(&self, street_type: &str) -> bool {
        self.expected_street_types.iter().any(|t| t == street_type)
    }
}

// ============================================================================
// TESTS
// ============================================================================
