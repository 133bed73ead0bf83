// Map extract → NDJSON → document store, the way a cleaned export is used

use osm_wrangle::{
    audit_keys, process_map, DocumentStore, JsonStyle, ProcessOptions, WranglingConfig,
};
use std::fs;

const MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="CGImap 0.0.2">
  <bounds minlat="35.1" minlon="-80.9" maxlat="35.3" maxlon="-80.7"/>
  <node id="261114295" visible="true" version="7" changeset="11129782" timestamp="2012-03-28T18:31:23Z" user="bbmiller" uid="451048" lat="35.2263" lon="-80.8412">
    <tag k="addr:housenumber" v="5158"/>
    <tag k="addr:street" v="N Tryon St Ste 105"/>
    <tag k="addr:postcode" v="28213-1234"/>
    <tag k="amenity" v="pharmacy"/>
    <tag k="name" v="Walgreens"/>
    <tag k="source" v="survey"/>
  </node>
  <node id="261114296" lat="35.2264" lon="-80.8413" uid="451048">
    <tag k="highway" v="motorway_junction"/>
    <tag k="ref" v="38"/>
  </node>
  <way id="258219703" visible="true" version="1" uid="674454">
    <nd ref="2636086179"/>
    <nd ref="2636086178"/>
    <tag k="name" v="Old Statesville Road"/>
    <tag k="tiger:name_base" v="Statesville"/>
    <tag k="tiger:zip_left" v="28269"/>
    <tag k="tiger:county" v="Mecklenburg, NC"/>
  </way>
  <way id="258219704" uid="674454">
    <nd ref="1"/>
    <tag k="tiger:name_direction_prefix" v="N"/>
    <tag k="tiger:name_base" v="Lincoln"/>
    <tag k="tiger:name_type" v="Ave"/>
  </way>
</osm>"#;

#[test]
fn test_shape_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("charlotte.osm");
    fs::write(&input, MAP).unwrap();

    let summary = process_map(&input, &WranglingConfig::default(), &ProcessOptions::default()).unwrap();
    assert_eq!(summary.written, 4);
    assert_eq!(summary.stats.dropped_ignored, 1);
    assert_eq!(summary.stats.dropped_tiger, 2);

    let mut store = DocumentStore::open(dir.path().join("osm.db")).unwrap();
    let inserted = store.load_json_lines("charlotte", &summary.output).unwrap();
    assert_eq!(inserted, 4);

    let docs = store.find_all("charlotte").unwrap();

    let pharmacy = &docs[0];
    assert_eq!(pharmacy["type"], "node");
    assert_eq!(pharmacy["id"], "261114295");
    assert_eq!(pharmacy["visible"], "true");
    assert_eq!(pharmacy["amenity"], "pharmacy");
    assert_eq!(pharmacy["created"]["user"], "bbmiller");
    assert_eq!(pharmacy["pos"], serde_json::json!([35.2263, -80.8412]));
    assert_eq!(pharmacy["address"]["street"], "North Tryon Street Suite 105");
    assert_eq!(pharmacy["address"]["postcode"], "28213");
    assert!(pharmacy.get("source").is_none());

    let junction = &docs[1];
    assert_eq!(junction["exit_number"], "38");
    assert!(junction.get("ref").is_none());

    let old_road = &docs[2];
    assert_eq!(old_road["address"]["street"], "Old Statesville Road");
    assert_eq!(old_road["address"]["postcode"], "28269");
    assert_eq!(old_road["node_refs"], serde_json::json!(["2636086179", "2636086178"]));
    assert!(old_road.get("pos").is_none());

    let lincoln = &docs[3];
    assert_eq!(lincoln["address"]["street"], "North Lincoln Avenue");
}

#[test]
fn test_pretty_output_loads_as_array_of_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("charlotte.osm");
    fs::write(&input, MAP).unwrap();
    let options = ProcessOptions {
        style: JsonStyle::Pretty,
        output: Some(dir.path().join("pretty.json")),
        ..ProcessOptions::default()
    };

    let summary = process_map(&input, &WranglingConfig::default(), &options).unwrap();

    let content = fs::read_to_string(&summary.output).unwrap();
    let docs: Vec<serde_json::Value> = serde_json::Deserializer::from_str(&content)
        .into_iter::<serde_json::Value>()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(docs.len(), 4);
    assert_eq!(docs[3]["type"], "way");
}

#[test]
fn test_config_file_changes_shaping() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("charlotte.osm");
    fs::write(&input, MAP).unwrap();
    let config_path = dir.path().join("wrangling.json");
    fs::write(&config_path, r#"{"ignored_keys": ["amenity"]}"#).unwrap();

    let config = WranglingConfig::from_file(&config_path).unwrap();
    let summary = process_map(&input, &config, &ProcessOptions::default()).unwrap();

    let first = fs::read_to_string(&summary.output).unwrap();
    let pharmacy: serde_json::Value = serde_json::from_str(first.lines().next().unwrap()).unwrap();
    assert!(pharmacy.get("amenity").is_none());
    assert_eq!(pharmacy["source"], "survey");
    // Untouched tables keep their built-in values
    assert_eq!(pharmacy["address"]["street"], "North Tryon Street Suite 105");

    let counts = audit_keys(&input, &config).unwrap();
    assert_eq!(counts.total(), 15);
}
