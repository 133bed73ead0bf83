// 🗺️ Record Model - one shaped OSM element
// The document written to NDJSON and loaded into the document store
//
// Shape:
// {
//   "type": "node",
//   "created": {"version": "2", "changeset": "17206049", ...},
//   "pos": [41.9757030, -87.6921867],
//   "id": "2406124091", "visible": "true", "amenity": "restaurant", ...
//   "address": {"housenumber": "5157", "postcode": "60625", "street": "North Lincoln Avenue"},
//   "node_refs": ["305896090", "1719825889"]
// }

use crate::normalize::NameNormalizer;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field names the document layout itself owns. A tag may never land on one.
pub const RESERVED_FIELDS: &[&str] = &["type", "created", "pos", "address", "node_refs"];

// ============================================================================
// ELEMENT KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Point entity (`<node>`)
    Node,
    /// Path entity (`<way>`)
    Way,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
        }
    }

    /// Element name → kind, for the two top-level kinds the pipeline shapes
    pub fn from_tag_name(name: &[u8]) -> Option<Self> {
        match name {
            b"node" => Some(ElementKind::Node),
            b"way" => Some(ElementKind::Way),
            _ => None,
        }
    }
}

// ============================================================================
// CREATION METADATA
// ============================================================================

/// The five creation-metadata names
pub const CREATED_FIELDS: [&str; 5] = ["version", "changeset", "timestamp", "user", "uid"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Created {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl Created {
    pub fn is_created_field(name: &str) -> bool {
        CREATED_FIELDS.contains(&name)
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "version" => Some(&mut self.version),
            "changeset" => Some(&mut self.changeset),
            "timestamp" => Some(&mut self.timestamp),
            "user" => Some(&mut self.user),
            "uid" => Some(&mut self.uid),
            _ => None,
        }
    }

    /// Store a creation value. Returns false for a name that is not one of
    /// the five creation fields.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        match self.slot(name) {
            Some(slot) => {
                *slot = Some(value.to_string());
                true
            }
            None => false,
        }
    }

    /// Store a creation value only if that field is still empty
    pub fn set_if_absent(&mut self, name: &str, value: &str) -> CreatedUpdate {
        match self.slot(name) {
            Some(slot) if slot.is_none() => {
                *slot = Some(value.to_string());
                CreatedUpdate::Stored
            }
            Some(_) => CreatedUpdate::AlreadySet,
            None => CreatedUpdate::NotCreated,
        }
    }
}

/// What `Created::set_if_absent` did with the offered value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedUpdate {
    Stored,
    /// The field was already filled; the offered value was discarded
    AlreadySet,
    /// Not one of the five creation names
    NotCreated,
}

// ============================================================================
// STREET SEGMENTS
// ============================================================================

/// Named segment of a multi-segment (TIGER) street name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    DirectionPrefix,
    Base,
    Type,
    DirectionSuffix,
    DirectionSuffix1,
}

impl Segment {
    /// `tiger:` key suffix → segment
    pub fn from_key(suffix: &str) -> Option<Self> {
        match suffix {
            "name_direction_prefix" => Some(Segment::DirectionPrefix),
            "name_base" => Some(Segment::Base),
            "name_type" => Some(Segment::Type),
            "name_direction_suffix" => Some(Segment::DirectionSuffix),
            "name_direction_suffix_1" => Some(Segment::DirectionSuffix1),
            _ => None,
        }
    }
}

/// Partially-filled street name. Absent segments are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreetSegments {
    pub direction_prefix: String,
    pub base: String,
    pub street_type: String,
    pub direction_suffix: String,
    pub direction_suffix_1: String,
}

impl StreetSegments {
    pub fn set(&mut self, segment: Segment, value: &str) {
        let slot = match segment {
            Segment::DirectionPrefix => &mut self.direction_prefix,
            Segment::Base => &mut self.base,
            Segment::Type => &mut self.street_type,
            Segment::DirectionSuffix => &mut self.direction_suffix,
            Segment::DirectionSuffix1 => &mut self.direction_suffix_1,
        };
        *slot = value.to_string();
    }

    /// Join in fixed order [prefix, base, type, suffix, suffix_1], each
    /// segment expanded through the abbreviation table, empties skipped.
    pub fn join(&self, normalizer: &NameNormalizer) -> String {
        [
            &self.direction_prefix,
            &self.base,
            &self.street_type,
            &self.direction_suffix,
            &self.direction_suffix_1,
        ]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| normalizer.expand_token(s))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Street value while a record is being shaped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Street {
    Finished(String),
    Partial(StreetSegments),
}

impl Street {
    pub fn resolve(self, normalizer: &NameNormalizer) -> String {
        match self {
            Street::Finished(name) => name,
            Street::Partial(segments) => segments.join(normalizer),
        }
    }
}

// ============================================================================
// ADDRESS
// ============================================================================

/// Address under construction; the street may still be a segment mapping
#[derive(Debug, Clone, Default)]
pub struct AddressDraft {
    components: IndexMap<String, String>,
    street: Option<Street>,
}

impl AddressDraft {
    /// Set a component by name. "street" is stored as a finished street.
    pub fn set(&mut self, component: &str, value: String) {
        if component == "street" {
            self.street = Some(Street::Finished(value));
        } else {
            self.components.insert(component.to_string(), value);
        }
    }

    pub fn get(&self, component: &str) -> Option<&str> {
        self.components.get(component).map(String::as_str)
    }

    pub fn street(&self) -> Option<&Street> {
        self.street.as_ref()
    }

    pub fn set_street(&mut self, street: Street) {
        self.street = Some(street);
    }

    /// Mutable access to the segment mapping, if the street is still partial
    pub fn segments_mut(&mut self) -> Option<&mut StreetSegments> {
        match self.street.as_mut() {
            Some(Street::Partial(segments)) => Some(segments),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.street.is_none()
    }

    /// Resolve the street and freeze the address
    pub fn finish(self, normalizer: &NameNormalizer) -> Address {
        let mut components = self.components;
        if let Some(street) = self.street {
            components.insert("street".to_string(), street.resolve(normalizer));
        }
        Address { components }
    }
}

/// Finished address sub-document: component name → string value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address {
    pub components: IndexMap<String, String>,
}

impl Address {
    pub fn get(&self, component: &str) -> Option<&str> {
        self.components.get(component).map(String::as_str)
    }

    pub fn street(&self) -> Option<&str> {
        self.get("street")
    }

    pub fn postcode(&self) -> Option<&str> {
        self.get("postcode")
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// One shaped top-level element, ready to be emitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: ElementKind,

    pub created: Created,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<[f64; 2]>,

    /// Element attributes and pass-through tags, in first-seen order
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_refs: Vec<String>,
}

impl Record {
    pub fn id(&self) -> Option<&str> {
        self.field("id")
    }

    pub fn visible(&self) -> Option<&str> {
        self.field("visible")
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

// ============================================================================
// TESTS
// ============================================================================
