// 🌐 Option Scraper - airport codes from a search form page
// Walks the parsed HTML DOM and collects <option value=".."> entries

use anyhow::{Context, Result};
use html5ever::tendril::TendrilSink;
use html5ever::parse_document;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Combined entries like "All" or "AllMajors" are not airports
const EXCLUDED: &str = "All";

/// Every `value` of every `<option>`, in document order
pub fn option_values<R: Read>(source: &mut R) -> Result<Vec<String>> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(source)
        .context("Failed to parse HTML")?;

    let mut values = Vec::new();
    collect_options(&dom.document, &mut values);
    Ok(values)
}

fn collect_options(handle: &Handle, values: &mut Vec<String>) {
    if let NodeData::Element { name, attrs, .. } = &handle.data {
        if &*name.local == "option" {
            let value = attrs
                .borrow()
                .iter()
                .find(|attr| &*attr.name.local == "value")
                .map(|attr| attr.value.to_string());
            if let Some(value) = value {
                values.push(value);
            }
        }
    }

    for child in handle.children.borrow().iter() {
        collect_options(child, values);
    }
}

/// Three-letter airport codes offered by the page
pub fn extract_airports(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let values = option_values(&mut BufReader::new(file))?;
    Ok(values
        .into_iter()
        .filter(|v| v.chars().count() == 3 && v != EXCLUDED)
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<form>
  <select name="CarrierList" id="CarrierList">
    <option value="All">All U.S. and Foreign Carriers</option>
    <option value="AllUS">All U.S. Carriers</option>
    <option value="FL">AirTran Airways</option>
  </select>
  <select name="AirportList" id="AirportList">
    <option value="All">All</option>
    <option value="AllMajors">All Major Airports</option>
    <option value="ATL">Atlanta, GA: Hartsfield-Jackson Atlanta International</option>
    <option value="ABR">Aberdeen, SD: Aberdeen Regional</option>
    <option value="BOS">Boston, MA: Logan International</option>
    <option>No value</option>
  </select>
</form>
</body></html>"#;

    #[test]
    fn test_option_values_in_order() {
        let values = option_values(&mut PAGE.as_bytes()).unwrap();
        assert_eq!(
            values,
            vec!["All", "AllUS", "FL", "All", "AllMajors", "ATL", "ABR", "BOS"]
        );
    }

    #[test]
    fn test_extract_airports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.html");
        fs::write(&path, PAGE).unwrap();

        let airports = extract_airports(&path).unwrap();

        assert_eq!(airports, vec!["ATL", "ABR", "BOS"]);
    }

    #[test]
    fn test_missing_file() {
        assert!(extract_airports(Path::new("/no/options.html")).is_err());
    }
}
