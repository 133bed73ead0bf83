// OSM Wrangle - Core Library
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod reader;
pub mod classifier;
pub mod normalize;
pub mod record;
pub mod shaper;
pub mod emitter;
pub mod pipeline;
pub mod store;      // Bulk loader for the emitted documents
pub mod loads;      // Problem set: max loads per region
pub mod scrape;     // Problem set: airport codes from HTML
pub mod fieldtypes; // Problem set: CSV field type audit

// Re-export commonly used types
pub use config::WranglingConfig;
pub use reader::{
    OsmReader, OsmElement, Tag, ReadError, RetentionStats,
    scan_elements, scan_file,
};
pub use classifier::{KeyClass, KeyClassifier, KeyCounts};
pub use normalize::{NameNormalizer, fix_postcode, street_type};
pub use record::{
    Record, ElementKind, Created, CreatedUpdate, Address, AddressDraft,
    Street, StreetSegments, Segment,
};
pub use shaper::{RecordShaper, RecordBuilder, ShapeError, ShapeStats, TagOutcome, DropReason};
pub use emitter::{JsonLinesEmitter, JsonStyle, output_path_for};
pub use pipeline::{
    ProcessOptions, ProcessSummary, OnError,
    process_map, shape_all, count_tags, audit_keys, unique_users, audit_street_types,
};
pub use store::DocumentStore;
pub use loads::{MaxLoad, max_loads, save_max_loads};
pub use scrape::extract_airports;
pub use fieldtypes::{FieldType, audit_file};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
