// 🔁 OSM Pipeline - reader → shaper → emitter, plus the map audits
//
// process_map is fail-fast: the first malformed element or bad record ends
// the run. OnError::Skip keeps going past bad records (logged and counted),
// but a reader error is always terminal since the XML stream cannot be
// resynchronised.

use crate::classifier::{KeyClassifier, KeyCounts};
use crate::config::WranglingConfig;
use crate::emitter::{output_path_for, JsonLinesEmitter, JsonStyle};
use crate::normalize::street_type;
use crate::reader::{scan_file, OsmReader};
use crate::record::Record;
use crate::shaper::{RecordShaper, ShapeStats};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

// ============================================================================
// OPTIONS & SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    #[default]
    FailFast,
    /// Log and skip records that fail to shape
    Skip,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub style: JsonStyle,
    pub on_error: OnError,
    /// Defaults to `<input>.json`
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub output: PathBuf,
    pub written: usize,
    pub skipped: usize,
    pub peak_live_elements: usize,
    pub stats: ShapeStats,
}

// ============================================================================
// PROCESS MAP
// ============================================================================

/// Shape every node/way of an OSM file into NDJSON
pub fn process_map(input: &Path, config: &WranglingConfig, options: &ProcessOptions) -> Result<ProcessSummary> {
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| output_path_for(input));

    let reader = OsmReader::from_path(input)?;
    let retention = reader.stats();
    let mut shaper = RecordShaper::new(config);
    let mut emitter = JsonLinesEmitter::create(&output, options.style)?;
    let mut skipped = 0;

    tracing::info!(input = %input.display(), output = %output.display(), "processing map");

    for element in reader {
        let element = element.with_context(|| format!("Failed to read {}", input.display()))?;

        match shaper.shape(element) {
            Ok(record) => emitter.emit(&record)?,
            Err(e) if options.on_error == OnError::Skip => {
                tracing::warn!(error = %e, "skipping record");
                skipped += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to shape record in {}", input.display()));
            }
        }
    }

    let written = emitter.finish()?;
    let summary = ProcessSummary {
        output,
        written,
        skipped,
        peak_live_elements: retention.peak(),
        stats: shaper.stats().clone(),
    };

    tracing::info!(
        written = summary.written,
        nodes = summary.stats.nodes,
        ways = summary.stats.ways,
        skipped = summary.skipped,
        "map processed"
    );

    Ok(summary)
}

/// Shape a whole file into memory. Only for small extracts and tests.
pub fn shape_all(input: &Path, config: &WranglingConfig) -> Result<Vec<Record>> {
    let mut shaper = RecordShaper::new(config);
    let mut records = Vec::new();

    for element in OsmReader::from_path(input)? {
        let element = element.with_context(|| format!("Failed to read {}", input.display()))?;
        records.push(shaper.shape(element)?);
    }

    Ok(records)
}

// ============================================================================
// AUDITS
// ============================================================================

/// How many times each element name occurs, at any depth
pub fn count_tags(path: &Path) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    scan_file(path, |name, _| {
        *counts.entry(name.to_string()).or_insert(0) += 1;
    })
    .with_context(|| format!("Failed to count tags in {}", path.display()))?;
    Ok(counts)
}

/// Bucket every `<tag k>` key (nodes, ways and relations alike)
pub fn audit_keys(path: &Path, config: &WranglingConfig) -> Result<KeyCounts> {
    let classifier = KeyClassifier::new(config);
    let mut counts = KeyCounts::default();

    scan_file(path, |name, attributes| {
        if name != "tag" {
            return;
        }
        if let Some((_, key)) = attributes.iter().find(|(k, _)| k == "k") {
            counts.record(classifier.classify(key));
        }
    })
    .with_context(|| format!("Failed to audit keys in {}", path.display()))?;

    Ok(counts)
}

/// Distinct contributor ids (`uid` on any element)
pub fn unique_users(path: &Path) -> Result<BTreeSet<String>> {
    let mut users = BTreeSet::new();
    scan_file(path, |_, attributes| {
        if let Some((_, uid)) = attributes.iter().find(|(k, _)| k == "uid") {
            users.insert(uid.clone());
        }
    })
    .with_context(|| format!("Failed to collect users in {}", path.display()))?;
    Ok(users)
}

/// Street names whose last word is not an expected street type,
/// grouped by that last word
pub fn audit_street_types(path: &Path, config: &WranglingConfig) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut street_types: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for element in OsmReader::from_path(path)? {
        let element = element.with_context(|| format!("Failed to read {}", path.display()))?;
        for tag in element.tags.iter().filter(|t| t.key == "addr:street") {
            if let Some(kind) = street_type(&tag.value) {
                if !config.is_expected_street_type(kind) {
                    street_types
                        .entry(kind.to_string())
                        .or_default()
                        .insert(tag.value.clone());
                }
            }
        }
    }

    Ok(street_types)
}

// ============================================================================
// TESTS
// ============================================================================
