// 📖 Stream Reader - incremental OSM XML parsing
// Yields one top-level node/way at a time, never the whole tree
//
// Multi-million element extracts stay at O(one element) memory:
// - only the element being assembled is buffered
// - each yielded element is owned by the caller and released on drop
// - a RetentionStats handle reports how many yielded elements are alive

use crate::record::ElementKind;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::cell::Cell;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML near byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("malformed attribute near byte {position}: {source}")]
    Attribute {
        position: u64,
        #[source]
        source: AttrError,
    },

    #[error("<{element}> near byte {position} has no '{attribute}' attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
        position: u64,
    },

    #[error("input ended with {open} unclosed element(s)")]
    Truncated { open: usize },
}

// ============================================================================
// RETENTION ACCOUNTING
// ============================================================================

/// Live/peak counts of elements handed out by one reader
#[derive(Debug, Default)]
pub struct RetentionStats {
    live: Cell<usize>,
    peak: Cell<usize>,
}

impl RetentionStats {
    pub fn live(&self) -> usize {
        self.live.get()
    }

    pub fn peak(&self) -> usize {
        self.peak.get()
    }
}

/// Held by every element a reader creates; decrements the live count on drop
#[derive(Debug)]
struct LiveToken(Rc<RetentionStats>);

impl LiveToken {
    fn new(stats: &Rc<RetentionStats>) -> Self {
        let live = stats.live.get() + 1;
        stats.live.set(live);
        if live > stats.peak.get() {
            stats.peak.set(live);
        }
        LiveToken(Rc::clone(stats))
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        let live = self.0.live.get();
        self.0.live.set(live.saturating_sub(1));
    }
}

// ============================================================================
// ELEMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// One top-level element, owned by whoever pulled it off the reader
#[derive(Debug)]
pub struct OsmElement {
    pub kind: ElementKind,
    /// The element's own XML attributes, in document order
    pub attributes: Vec<(String, String)>,
    /// `<tag k=".." v=".."/>` children
    pub tags: Vec<Tag>,
    /// `<nd ref=".."/>` children, order and duplicates preserved
    pub node_refs: Vec<String>,
    _token: Option<LiveToken>,
}

impl OsmElement {
    /// Detached element (not tracked by any reader)
    pub fn new(kind: ElementKind) -> Self {
        OsmElement {
            kind,
            attributes: Vec::new(),
            tags: Vec::new(),
            node_refs: Vec::new(),
            _token: None,
        }
    }

    fn tracked(kind: ElementKind, stats: &Rc<RetentionStats>) -> Self {
        OsmElement {
            _token: Some(LiveToken::new(stats)),
            ..OsmElement::new(kind)
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push(Tag {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_node_ref(mut self, node_ref: &str) -> Self {
        self.node_refs.push(node_ref.to_string());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// OSM READER
// ============================================================================

/// Lazy, finite, non-restartable sequence of top-level nodes and ways
///
/// Every other element kind (bounds, relation, meta, note, ...) is skipped
/// together with its children. A parse error is yielded once and ends the
/// sequence; there is no resynchronisation.
pub struct OsmReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    current: Option<(OsmElement, usize)>,
    stats: Rc<RetentionStats>,
    done: bool,
}

impl OsmReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(OsmReader::new(BufReader::new(file)))
    }
}

impl<R: BufRead> OsmReader<R> {
    pub fn new(source: R) -> Self {
        OsmReader {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            depth: 0,
            current: None,
            stats: Rc::new(RetentionStats::default()),
            done: false,
        }
    }

    /// Shared handle to this reader's retention counters
    pub fn stats(&self) -> Rc<RetentionStats> {
        Rc::clone(&self.stats)
    }

    /// Elements created by this reader that have not been dropped yet
    pub fn live_elements(&self) -> usize {
        self.stats.live()
    }

    /// High-water mark of `live_elements()`
    pub fn peak_live_elements(&self) -> usize {
        self.stats.peak()
    }

    fn next_element(&mut self) -> Result<Option<OsmElement>, ReadError> {
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|source| ReadError::Xml {
                    position: self.reader.buffer_position() as u64,
                    source,
                })?;

            match event {
                Event::Start(ref start) => {
                    let position = self.reader.buffer_position() as u64;
                    match self.current.as_mut() {
                        Some((element, _)) => add_child(element, start, position)?,
                        None => {
                            if let Some(kind) = ElementKind::from_tag_name(start.name().as_ref()) {
                                let mut element = OsmElement::tracked(kind, &self.stats);
                                element.attributes = read_attributes(start, position)?;
                                self.current = Some((element, self.depth));
                            }
                        }
                    }
                    self.depth += 1;
                }
                Event::Empty(ref start) => {
                    let position = self.reader.buffer_position() as u64;
                    match self.current.as_mut() {
                        Some((element, _)) => add_child(element, start, position)?,
                        None => {
                            if let Some(kind) = ElementKind::from_tag_name(start.name().as_ref()) {
                                let mut element = OsmElement::tracked(kind, &self.stats);
                                element.attributes = read_attributes(start, position)?;
                                return Ok(Some(element));
                            }
                        }
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    let closes_current = matches!(self.current, Some((_, start_depth)) if start_depth == self.depth);
                    if closes_current {
                        return Ok(self.current.take().map(|(element, _)| element));
                    }
                }
                Event::Eof => {
                    if self.depth > 0 || self.current.is_some() {
                        self.current = None;
                        return Err(ReadError::Truncated { open: self.depth });
                    }
                    return Ok(None);
                }
                // Text, comments, declarations, CDATA
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmReader<R> {
    type Item = Result<OsmElement, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                self.current = None;
                Some(Err(e))
            }
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn read_attributes(start: &BytesStart, position: u64) -> Result<Vec<(String, String)>, ReadError> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|source| ReadError::Attribute { position, source })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|source| ReadError::Xml { position, source })?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

fn required(
    attributes: &mut Vec<(String, String)>,
    element: &'static str,
    attribute: &'static str,
    position: u64,
) -> Result<String, ReadError> {
    match attributes.iter().position(|(k, _)| k == attribute) {
        Some(index) => Ok(attributes.swap_remove(index).1),
        None => Err(ReadError::MissingAttribute {
            element,
            attribute,
            position,
        }),
    }
}

/// Fold a `<tag>` or `<nd>` child into the element being assembled
fn add_child(element: &mut OsmElement, child: &BytesStart, position: u64) -> Result<(), ReadError> {
    match child.name().as_ref() {
        b"tag" => {
            let mut attributes = read_attributes(child, position)?;
            let key = required(&mut attributes, "tag", "k", position)?;
            let value = required(&mut attributes, "tag", "v", position)?;
            element.tags.push(Tag { key, value });
        }
        b"nd" => {
            let mut attributes = read_attributes(child, position)?;
            let node_ref = required(&mut attributes, "nd", "ref", position)?;
            element.node_refs.push(node_ref);
        }
        _ => {}
    }
    Ok(())
}

/// Visit every start/empty element of a document, at any depth, with its
/// name and attributes. Used by the audits that look past nodes and ways.
pub fn scan_elements<R, F>(source: R, mut visit: F) -> Result<(), ReadError>
where
    R: BufRead,
    F: FnMut(&str, &[(String, String)]),
{
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut depth: usize = 0;

    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| ReadError::Xml {
                position: reader.buffer_position() as u64,
                source,
            })?;
        let position = reader.buffer_position() as u64;

        match event {
            Event::Start(ref start) | Event::Empty(ref start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let attributes = read_attributes(start, position)?;
                visit(&name, &attributes);
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => {
                if depth > 0 {
                    return Err(ReadError::Truncated { open: depth });
                }
                return Ok(());
            }
            _ => {}
        }
    }
}

/// `scan_elements` over a file on disk
pub fn scan_file<P, F>(path: P, visit: F) -> Result<(), ReadError>
where
    P: AsRef<Path>,
    F: FnMut(&str, &[(String, String)]),
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ReadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    scan_elements(BufReader::new(file), visit)
}

// ============================================================================
// TESTS
// ============================================================================
