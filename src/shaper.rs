// 🧱 Record Shaper - OSM element → nested document
// Applies exactly one rule per tag key, then resolves the street name

use crate::classifier::KeyClassifier;
use crate::config::WranglingConfig;
use crate::normalize::{fix_postcode, NameNormalizer};
use crate::reader::OsmElement;
use crate::record::{
    AddressDraft, Created, CreatedUpdate, ElementKind, Record, Segment, Street, StreetSegments, RESERVED_FIELDS,
};
use indexmap::IndexMap;
use serde::Serialize;

const ADDR_PREFIX: &str = "addr:";
const TIGER_PREFIX: &str = "tiger:";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("{kind} {id}: invalid {axis} {value:?}")]
    InvalidCoordinate {
        kind: &'static str,
        id: String,
        axis: &'static str,
        value: String,
    },

    #[error("{kind} {id}: has {present} but no {missing}")]
    MissingCoordinate {
        kind: &'static str,
        id: String,
        present: &'static str,
        missing: &'static str,
    },
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Why a tag did not make it into the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    ProblemChars,
    Ignored,
    /// `addr:street:name` and friends (second colon)
    AddressSubkey,
    /// `tiger:` keys that carry neither a zip nor a name segment
    TigerOther,
    /// Segment arriving after the street was already settled
    StreetSettled,
    /// Key would overwrite part of the document layout
    Reserved,
    /// Creation name whose value the element attribute already supplied
    CreatedAlreadySet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    Stored,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShapeStats {
    pub nodes: usize,
    pub ways: usize,
    pub tags_stored: usize,
    pub dropped_problem_chars: usize,
    pub dropped_ignored: usize,
    pub dropped_address_subkeys: usize,
    pub dropped_tiger: usize,
    pub dropped_reserved: usize,
    pub dropped_created: usize,
}

impl ShapeStats {
    fn record_tag(&mut self, outcome: TagOutcome) {
        match outcome {
            TagOutcome::Stored => self.tags_stored += 1,
            TagOutcome::Dropped(DropReason::ProblemChars) => self.dropped_problem_chars += 1,
            TagOutcome::Dropped(DropReason::Ignored) => self.dropped_ignored += 1,
            TagOutcome::Dropped(DropReason::AddressSubkey) => self.dropped_address_subkeys += 1,
            TagOutcome::Dropped(DropReason::TigerOther)
            | TagOutcome::Dropped(DropReason::StreetSettled) => self.dropped_tiger += 1,
            TagOutcome::Dropped(DropReason::Reserved) => self.dropped_reserved += 1,
            TagOutcome::Dropped(DropReason::CreatedAlreadySet) => self.dropped_created += 1,
        }
    }

    pub fn records(&self) -> usize {
        self.nodes + self.ways
    }
}

// ============================================================================
// RECORD BUILDER
// ============================================================================

/// Record in progress. Only lives for the duration of one `shape()` call.
#[derive(Debug)]
pub struct RecordBuilder {
    kind: ElementKind,
    created: Created,
    lat: Option<String>,
    lon: Option<String>,
    fields: IndexMap<String, String>,
    address: AddressDraft,
    node_refs: Vec<String>,
}

impl RecordBuilder {
    pub fn new(kind: ElementKind) -> Self {
        RecordBuilder {
            kind,
            created: Created::default(),
            lat: None,
            lon: None,
            fields: IndexMap::new(),
            address: AddressDraft::default(),
            node_refs: Vec::new(),
        }
    }

    /// Element attribute: creation metadata, coordinate, or verbatim field
    pub fn apply_attribute(&mut self, key: &str, value: &str) {
        if self.created.set(key, value) {
            return;
        }
        match key {
            "lat" => self.lat = Some(value.to_string()),
            "lon" => self.lon = Some(value.to_string()),
            _ if RESERVED_FIELDS.contains(&key) => {
                tracing::debug!(key, "dropping attribute with reserved name");
            }
            _ => {
                self.fields.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn push_node_ref(&mut self, node_ref: String) {
        self.node_refs.push(node_ref);
    }

    fn id(&self) -> String {
        self.fields.get("id").cloned().unwrap_or_default()
    }

    fn position(&self) -> Result<Option<[f64; 2]>, ShapeError> {
        let kind = self.kind.as_str();
        match (&self.lat, &self.lon) {
            (None, None) => Ok(None),
            (Some(lat), Some(lon)) => {
                let parse = |axis: &'static str, value: &str| {
                    value
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| ShapeError::InvalidCoordinate {
                            kind,
                            id: self.id(),
                            axis,
                            value: value.to_string(),
                        })
                };
                Ok(Some([parse("lat", lat)?, parse("lon", lon)?]))
            }
            (Some(_), None) => Err(ShapeError::MissingCoordinate {
                kind,
                id: self.id(),
                present: "lat",
                missing: "lon",
            }),
            (None, Some(_)) => Err(ShapeError::MissingCoordinate {
                kind,
                id: self.id(),
                present: "lon",
                missing: "lat",
            }),
        }
    }

    /// Resolve a partial street and freeze the record
    pub fn finish(self, normalizer: &NameNormalizer) -> Result<Record, ShapeError> {
        let pos = self.position()?;
        let address = if self.address.is_empty() {
            None
        } else {
            Some(self.address.finish(normalizer))
        };

        Ok(Record {
            kind: self.kind,
            created: self.created,
            pos,
            fields: self.fields,
            address,
            node_refs: self.node_refs,
        })
    }
}

// ============================================================================
// RECORD SHAPER
// ============================================================================

pub struct RecordShaper {
    classifier: KeyClassifier,
    normalizer: NameNormalizer,
    stats: ShapeStats,
}

impl RecordShaper {
    pub fn new(config: &WranglingConfig) -> Self {
        RecordShaper {
            classifier: KeyClassifier::new(config),
            normalizer: NameNormalizer::new(config),
            stats: ShapeStats::default(),
        }
    }

    pub fn stats(&self) -> &ShapeStats {
        &self.stats
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Shape one element. The element is consumed and released on return.
    pub fn shape(&mut self, element: OsmElement) -> Result<Record, ShapeError> {
        let mut builder = RecordBuilder::new(element.kind);

        for (key, value) in &element.attributes {
            builder.apply_attribute(key, value);
        }

        for tag in &element.tags {
            let outcome = self.apply_tag(&mut builder, &tag.key, &tag.value);
            if let TagOutcome::Dropped(reason) = outcome {
                tracing::trace!(key = %tag.key, ?reason, "tag dropped");
            }
            self.stats.record_tag(outcome);
        }

        let OsmElement { node_refs, .. } = element;
        for node_ref in node_refs {
            builder.push_node_ref(node_ref);
        }

        let record = builder.finish(&self.normalizer)?;
        match record.kind {
            ElementKind::Node => self.stats.nodes += 1,
            ElementKind::Way => self.stats.ways += 1,
        }
        Ok(record)
    }

    /// Apply exactly one rule for a secondary key/value pair
    pub fn apply_tag(&self, builder: &mut RecordBuilder, key: &str, value: &str) -> TagOutcome {
        if self.classifier.has_problem_chars(key) {
            return TagOutcome::Dropped(DropReason::ProblemChars);
        }
        if self.classifier.is_ignored(key) {
            return TagOutcome::Dropped(DropReason::Ignored);
        }

        // A tag never overrides creation metadata from the element itself
        match builder.created.set_if_absent(key, value) {
            CreatedUpdate::Stored => return TagOutcome::Stored,
            CreatedUpdate::AlreadySet => return TagOutcome::Dropped(DropReason::CreatedAlreadySet),
            CreatedUpdate::NotCreated => {}
        }

        if let Some(component) = key.strip_prefix(ADDR_PREFIX) {
            return self.apply_address(builder, component, value);
        }

        if let Some(suffix) = key.strip_prefix(TIGER_PREFIX) {
            return self.apply_tiger(builder, suffix, value);
        }

        let field = match key {
            "ref" if builder.kind == ElementKind::Node => "exit_number",
            "type" => "service_type",
            _ if RESERVED_FIELDS.contains(&key) => {
                return TagOutcome::Dropped(DropReason::Reserved);
            }
            _ => key,
        };
        builder.fields.insert(field.to_string(), value.to_string());
        TagOutcome::Stored
    }

    fn apply_address(&self, builder: &mut RecordBuilder, component: &str, value: &str) -> TagOutcome {
        if component.contains(':') {
            return TagOutcome::Dropped(DropReason::AddressSubkey);
        }

        let value = match component {
            "postcode" => clean_postcode(value),
            "street" => self.normalizer.normalize(value),
            _ => value.to_string(),
        };
        builder.address.set(component, value);
        TagOutcome::Stored
    }

    /// Multi-segment street assembly from TIGER import keys
    ///
    /// A plain `name` already on the record settles the street first
    /// (first-seen wins); after that only the zip fills the address.
    fn apply_tiger(&self, builder: &mut RecordBuilder, suffix: &str, value: &str) -> TagOutcome {
        if builder.address.street().is_none() {
            if let Some(name) = builder.fields.get("name") {
                builder.address.set_street(Street::Finished(name.clone()));
            }
        }

        if suffix == "zip_left" {
            if builder.address.get("postcode").is_none() {
                builder.address.set("postcode", clean_postcode(value));
            }
            return TagOutcome::Stored;
        }

        let Some(segment) = Segment::from_key(suffix) else {
            return TagOutcome::Dropped(DropReason::TigerOther);
        };

        if builder.address.street().is_none() {
            builder
                .address
                .set_street(Street::Partial(StreetSegments::default()));
        }
        match builder.address.segments_mut() {
            Some(segments) => {
                segments.set(segment, value);
                TagOutcome::Stored
            }
            None => TagOutcome::Dropped(DropReason::StreetSettled),
        }
    }
}

impl Default for RecordShaper {
    fn default() -> Self {
        Self::new(&WranglingConfig::default())
    }
}

fn clean_postcode(value: &str) -> String {
    if value.chars().count() > 5 {
        fix_postcode(value)
    } else {
        value.to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str) -> OsmElement {
        OsmElement::new(ElementKind::Node)
            .with_attribute("id", id)
            .with_attribute("lat", "41.9757030")
            .with_attribute("lon", "-87.6921867")
            .with_attribute("version", "2")
            .with_attribute("changeset", "17206049")
            .with_attribute("timestamp", "2013-08-03T16:43:42Z")
            .with_attribute("user", "linuxUser16")
            .with_attribute("uid", "1219059")
    }

    #[test]
    fn test_pharmacy_round_trip() {
        let mut shaper = RecordShaper::default();
        let element = node("2406124091")
            .with_tag("addr:housenumber", "5158")
            .with_tag("addr:street", "North Lincoln Avenue")
            .with_tag("addr:street:name", "Lincoln")
            .with_tag("addr:street:prefix", "North")
            .with_tag("addr:street:type", "Avenue")
            .with_tag("amenity", "pharmacy");

        let record = shaper.shape(element).unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "node",
                "created": {
                    "version": "2",
                    "changeset": "17206049",
                    "timestamp": "2013-08-03T16:43:42Z",
                    "user": "linuxUser16",
                    "uid": "1219059"
                },
                "pos": [41.9757030, -87.6921867],
                "id": "2406124091",
                "address": {"housenumber": "5158", "street": "North Lincoln Avenue"},
                "amenity": "pharmacy"
            })
        );
        assert_eq!(shaper.stats().dropped_address_subkeys, 3);
        assert_eq!(shaper.stats().nodes, 1);
    }

    #[test]
    fn test_way_node_refs_keep_order_and_duplicates() {
        let mut shaper = RecordShaper::default();
        let element = OsmElement::new(ElementKind::Way)
            .with_attribute("id", "258219703")
            .with_node_ref("A")
            .with_node_ref("B")
            .with_node_ref("A")
            .with_tag("highway", "service");

        let record = shaper.shape(element).unwrap();

        assert_eq!(record.node_refs, vec!["A", "B", "A"]);
        assert_eq!(record.pos, None);
        assert_eq!(record.field("highway"), Some("service"));
        assert_eq!(shaper.stats().ways, 1);
    }

    #[test]
    fn test_street_and_postcode_cleanup() {
        let mut shaper = RecordShaper::default();
        let element = node("1")
            .with_tag("addr:postcode", "28203-1234")
            .with_tag("addr:street", "S Tryon St Ste 105")
            .with_tag("addr:city", "Charlotte");

        let record = shaper.shape(element).unwrap();
        let address = record.address.unwrap();

        assert_eq!(address.postcode(), Some("28203"));
        assert_eq!(address.street(), Some("South Tryon Street Suite 105"));
        assert_eq!(address.get("city"), Some("Charlotte"));
    }

    #[test]
    fn test_short_postcode_untouched() {
        let mut shaper = RecordShaper::default();
        let record = shaper.shape(node("1").with_tag("addr:postcode", "NC 2")).unwrap();

        assert_eq!(record.address.unwrap().postcode(), Some("NC 2"));
    }

    #[test]
    fn test_renamed_keys() {
        let mut shaper = RecordShaper::default();

        let exit = shaper
            .shape(node("1").with_tag("ref", "38").with_tag("type", "fuel"))
            .unwrap();
        assert_eq!(exit.field("exit_number"), Some("38"));
        assert_eq!(exit.field("service_type"), Some("fuel"));
        assert_eq!(exit.field("ref"), None);
        assert_eq!(exit.kind, ElementKind::Node);

        // On a way, "ref" is just a route reference
        let way = shaper
            .shape(OsmElement::new(ElementKind::Way).with_tag("ref", "I 77"))
            .unwrap();
        assert_eq!(way.field("ref"), Some("I 77"));
        assert_eq!(way.field("exit_number"), None);
    }

    #[test]
    fn test_dropped_keys() {
        let mut shaper = RecordShaper::default();
        let element = node("1")
            .with_tag("source", "bing")
            .with_tag("gnis:feature_id", "1020591")
            .with_tag("name.en", "x")
            .with_tag("address", "clobber")
            .with_tag("tiger:county", "Mecklenburg, NC")
            .with_tag("shop", "bakery");

        let record = shaper.shape(element).unwrap();

        assert_eq!(record.fields.len(), 2); // id + shop
        assert_eq!(record.address, None);
        assert_eq!(shaper.stats().dropped_ignored, 2);
        assert_eq!(shaper.stats().dropped_problem_chars, 1);
        assert_eq!(shaper.stats().dropped_reserved, 1);
        assert_eq!(shaper.stats().dropped_tiger, 1);
    }

    #[test]
    fn test_tag_does_not_override_created_attribute() {
        let mut shaper = RecordShaper::default();
        let record = shaper
            .shape(node("1").with_tag("user", "impostor").with_tag("shop", "bakery"))
            .unwrap();

        assert_eq!(record.created.user.as_deref(), Some("linuxUser16"));
        assert_eq!(record.field("user"), None);
        assert_eq!(shaper.stats().dropped_created, 1);
        assert_eq!(shaper.stats().tags_stored, 1);
    }

    #[test]
    fn test_tiger_segments_joined() {
        let mut shaper = RecordShaper::default();
        let element = OsmElement::new(ElementKind::Way)
            .with_attribute("id", "7")
            .with_tag("tiger:name_base", "Lincoln")
            .with_tag("tiger:name_direction_prefix", "N")
            .with_tag("tiger:name_type", "Ave")
            .with_tag("tiger:zip_left", "28203-0001");

        let record = shaper.shape(element).unwrap();
        let address = record.address.unwrap();

        assert_eq!(address.street(), Some("North Lincoln Avenue"));
        assert_eq!(address.postcode(), Some("28203"));
    }

    #[test]
    fn test_tiger_name_first_seen_wins() {
        let mut shaper = RecordShaper::default();
        let element = OsmElement::new(ElementKind::Way)
            .with_tag("name", "Lincoln Street")
            .with_tag("tiger:name_base", "Lincoln")
            .with_tag("tiger:name_type", "St")
            .with_tag("tiger:zip_left", "28203");

        let record = shaper.shape(element).unwrap();
        let address = record.address.as_ref().unwrap();

        assert_eq!(address.street(), Some("Lincoln Street"));
        assert_eq!(address.postcode(), Some("28203"));
        assert_eq!(record.field("name"), Some("Lincoln Street"));
    }

    #[test]
    fn test_tiger_zip_does_not_override_addr_postcode() {
        let mut shaper = RecordShaper::default();
        let element = OsmElement::new(ElementKind::Way)
            .with_tag("addr:postcode", "28209")
            .with_tag("tiger:zip_left", "28203");

        let record = shaper.shape(element).unwrap();
        assert_eq!(record.address.unwrap().postcode(), Some("28209"));
    }

    #[test]
    fn test_addr_street_beats_later_segments() {
        let mut shaper = RecordShaper::default();
        let element = OsmElement::new(ElementKind::Way)
            .with_tag("addr:street", "Park Rd")
            .with_tag("tiger:name_base", "Other");

        let record = shaper.shape(element).unwrap();
        assert_eq!(record.address.unwrap().street(), Some("Park Road"));
    }

    #[test]
    fn test_invalid_coordinate() {
        let mut shaper = RecordShaper::default();
        let element = OsmElement::new(ElementKind::Node)
            .with_attribute("id", "5")
            .with_attribute("lat", "north")
            .with_attribute("lon", "-80.1");

        let err = shaper.shape(element).unwrap_err();
        assert!(matches!(err, ShapeError::InvalidCoordinate { axis: "lat", .. }));
        assert!(err.to_string().contains("node 5"));
    }

    #[test]
    fn test_non_finite_coordinates_rejected() {
        let mut shaper = RecordShaper::default();

        for (lat, lon, axis) in [("NaN", "1.0", "lat"), ("35.0", "inf", "lon"), ("-infinity", "1.0", "lat")] {
            let element = OsmElement::new(ElementKind::Node)
                .with_attribute("id", "1")
                .with_attribute("lat", lat)
                .with_attribute("lon", lon);

            let err = shaper.shape(element).unwrap_err();
            assert!(
                matches!(err, ShapeError::InvalidCoordinate { axis: a, .. } if a == axis),
                "{} {}: {}",
                lat,
                lon,
                err
            );
        }
        assert_eq!(shaper.stats().nodes, 0);
    }

    #[test]
    fn test_missing_longitude() {
        let mut shaper = RecordShaper::default();
        let element = OsmElement::new(ElementKind::Node).with_attribute("lat", "35.0");

        let err = shaper.shape(element).unwrap_err();
        assert!(matches!(err, ShapeError::MissingCoordinate { missing: "lon", .. }));
    }
}
