use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::audit::ElementCensus;
use crate::data::osm::{RawChild, RawElement};
use crate::errors::{Error, Result};

/// Element kinds turned into rows.
pub const OSM_ELEMENT_KINDS: [&str; 2] = ["node", "way"];

/// Opens an `.osm` file, decompressing it on the fly when the name ends in `.xz`.
pub fn open_osm_source(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = fs::File::open(path)?;
    let file_reader = BufReader::new(file);
    if path.extension().is_some_and(|ext| ext == "xz") {
        let xz_reader = XzDecoder::new(file_reader);
        Ok(Box::new(BufReader::new(xz_reader)))
    } else {
        Ok(Box::new(file_reader))
    }
}

fn create_osm_reader<R: BufRead>(source: R) -> Reader<R> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);
    reader
}

fn element_name(el: &BytesStart) -> Result<String> {
    Ok(str::from_utf8(el.name().as_ref())?.to_string())
}

fn read_attributes(el: &BytesStart) -> Result<BTreeMap<String, String>> {
    let mut attributes = BTreeMap::new();
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let key = str::from_utf8(attribute.key.as_ref())?.to_string();
        let value = attribute.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

fn junk(what: &str) -> Error {
    Error::Parse(format!("junk after document element: {}", what))
}

/// Tracks nesting so that only a single root element, and no stray text beside it, is accepted.
#[derive(Debug, Default)]
struct RootTracker {
    open: usize,
    seen_root: bool,
    root_closed: bool,
}

impl RootTracker {
    fn start(&mut self, name: &str) -> Result<()> {
        if self.root_closed {
            return Err(junk(&format!("<{}>", name)));
        }
        self.open += 1;
        self.seen_root = true;
        Ok(())
    }

    fn empty(&mut self, name: &str) -> Result<()> {
        if self.root_closed {
            return Err(junk(&format!("<{}/>", name)));
        }
        self.seen_root = true;
        if self.open == 0 {
            self.root_closed = true;
        }
        Ok(())
    }

    fn end(&mut self) {
        self.open = self.open.saturating_sub(1);
        if self.open == 0 {
            self.root_closed = true;
        }
    }

    fn text(&self, text: &BytesText) -> Result<()> {
        if self.open == 0 && !text.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::Parse("text outside the document element".to_string()));
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        if self.open > 0 {
            return Err(Error::Parse(format!(
                "unexpected end of document, {} element(s) left open",
                self.open
            )));
        }
        if !self.seen_root {
            return Err(Error::Parse("document has no root element".to_string()));
        }
        Ok(())
    }
}

struct Capture {
    element: RawElement,
    /// 1 while directly inside the captured element.
    depth: usize,
}

/// Pull-based reader yielding the elements whose name is one of `kinds`, in document order.
///
/// Only one element (plus its direct children) is held at a time; the read buffer is reset
/// after every event, so memory use does not grow with the document. The stream is not
/// restartable and stops for good after the first error.
pub struct ElementStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    kinds: Vec<String>,
    root: RootTracker,
    current: Option<Capture>,
    finished: bool,
}

impl<R: BufRead> ElementStream<R> {
    pub fn from_reader(source: R, kinds: &[&str]) -> ElementStream<R> {
        ElementStream {
            reader: create_osm_reader(source),
            buf: Vec::new(),
            kinds: kinds.iter().map(|kind| kind.to_string()).collect(),
            root: RootTracker::default(),
            current: None,
            finished: false,
        }
    }

    fn advance(&mut self) -> Result<Option<RawElement>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let name = element_name(&e)?;
                    self.root.start(&name)?;
                    match self.current.as_mut() {
                        Some(capture) => {
                            if capture.depth == 1 {
                                capture.element.children.push(RawChild {
                                    name,
                                    attributes: read_attributes(&e)?,
                                });
                            }
                            capture.depth += 1;
                        },
                        None => {
                            if self.kinds.iter().any(|kind| *kind == name) {
                                self.current = Some(Capture {
                                    element: RawElement {
                                        name,
                                        attributes: read_attributes(&e)?,
                                        children: Vec::new(),
                                    },
                                    depth: 1,
                                });
                            }
                        },
                    }
                },
                Event::Empty(e) => {
                    let name = element_name(&e)?;
                    self.root.empty(&name)?;
                    match self.current.as_mut() {
                        Some(capture) => {
                            if capture.depth == 1 {
                                capture.element.children.push(RawChild {
                                    name,
                                    attributes: read_attributes(&e)?,
                                });
                            }
                        },
                        None => {
                            if self.kinds.iter().any(|kind| *kind == name) {
                                return Ok(Some(RawElement {
                                    name,
                                    attributes: read_attributes(&e)?,
                                    children: Vec::new(),
                                }));
                            }
                        },
                    }
                },
                Event::End(_e) => {
                    self.root.end();
                    if let Some(capture) = self.current.as_mut() {
                        capture.depth -= 1;
                        if capture.depth == 0 {
                            return Ok(self.current.take().map(|capture| capture.element));
                        }
                    }
                },
                Event::Text(e) => self.root.text(&e)?,
                Event::Eof => {
                    self.root.finish()?;
                    return Ok(None);
                },
                // Declarations, comments and the like carry nothing we keep.
                _ => (),
            }
        }
    }
}

impl ElementStream<Box<dyn BufRead>> {
    pub fn from_path(path: &Path, kinds: &[&str]) -> Result<ElementStream<Box<dyn BufRead>>> {
        Ok(ElementStream::from_reader(open_osm_source(path)?, kinds))
    }
}

impl<R: BufRead> Iterator for ElementStream<R> {
    type Item = Result<RawElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            },
        }
    }
}

/// Counts every element name in the document, at any depth.
pub fn count_element_names<R: BufRead>(source: R) -> Result<ElementCensus> {
    let mut reader = create_osm_reader(source);
    let mut buf = Vec::new();
    let mut census = ElementCensus::default();
    let mut root = RootTracker::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = element_name(&e)?;
                root.start(&name)?;
                *census.0.entry(name).or_insert(0) += 1;
            },
            Event::Empty(e) => {
                let name = element_name(&e)?;
                root.empty(&name)?;
                *census.0.entry(name).or_insert(0) += 1;
            },
            Event::End(_e) => root.end(),
            Event::Text(e) => root.text(&e)?,
            Event::Eof => break,
            _ => (),
        }
        buf.clear();
    }

    root.finish()?;
    Ok(census)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <bounds minlat="18.4" minlon="73.7" maxlat="18.6" maxlon="73.9"/>
  <node id="1" lat="18.5204" lon="73.8567" user="a" uid="1" version="1" changeset="1" timestamp="2017-01-01T00:00:00Z">
    <tag k="name" v="Shaniwar &amp; Wada"/>
  </node>
  <node id="2" lat="18.1" lon="73.1" user="b" uid="2" version="1" changeset="1" timestamp="2017-01-01T00:00:00Z"/>
  <way id="10" user="a" uid="1" version="1" changeset="1" timestamp="2017-01-01T00:00:00Z">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
  </way>
  <relation id="100">
    <member type="way" ref="10" role="outer"/>
  </relation>
</osm>"#;

    fn stream(xml: &str) -> ElementStream<&[u8]> {
        ElementStream::from_reader(xml.as_bytes(), &OSM_ELEMENT_KINDS)
    }

    #[test]
    fn yields_wanted_elements_in_document_order() {
        let elements: Vec<RawElement> = stream(SAMPLE).collect::<Result<_>>().unwrap();
        let names: Vec<(&str, Option<&str>)> = elements.iter()
            .map(|el| (el.name.as_str(), el.attribute("id")))
            .collect();
        assert_eq!(names, vec![("node", Some("1")), ("node", Some("2")), ("way", Some("10"))]);
    }

    #[test]
    fn keeps_children_in_order_and_unescapes_values() {
        let elements: Vec<RawElement> = stream(SAMPLE).collect::<Result<_>>().unwrap();
        assert_eq!(elements[0].children.len(), 1);
        assert_eq!(elements[0].children[0].attribute("v"), Some("Shaniwar & Wada"));
        assert!(elements[1].children.is_empty());

        let way_children: Vec<&str> = elements[2].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(way_children, vec!["nd", "nd", "tag"]);
        assert_eq!(elements[2].children[1].attribute("ref"), Some("2"));
    }

    #[test]
    fn only_direct_children_are_captured() {
        let xml = r#"<osm><way id="1"><nd ref="5"><extra a="b"/></nd><tag k="x" v="y"/></way></osm>"#;
        let elements: Vec<RawElement> = stream(xml).collect::<Result<_>>().unwrap();
        assert_eq!(elements.len(), 1);
        let names: Vec<&str> = elements[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["nd", "tag"]);
    }

    #[test]
    fn honours_requested_kinds() {
        let relations: Vec<RawElement> = ElementStream::from_reader(SAMPLE.as_bytes(), &["relation"])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].children[0].attribute("role"), Some("outer"));
    }

    #[test]
    fn mismatched_end_tag_is_a_parse_error_and_ends_the_stream() {
        let mut elements = stream(r#"<osm><node id="1"></way></osm>"#);
        assert!(matches!(elements.next(), Some(Err(Error::Parse(_)))));
        assert!(elements.next().is_none());
    }

    #[test]
    fn truncated_document_is_a_parse_error() {
        let mut elements = stream(r#"<osm><node id="1"/><way id="2"><nd ref="1"/>"#);
        assert!(matches!(elements.next(), Some(Ok(_))));
        assert!(matches!(elements.next(), Some(Err(Error::Parse(_)))));
        assert!(elements.next().is_none());
    }

    #[test]
    fn second_root_element_is_a_parse_error() {
        let mut elements = stream(r#"<osm><node id="1"/></osm><osm><node id="2"/></osm>"#);
        assert_eq!(elements.next().unwrap().unwrap().attribute("id"), Some("1"));
        assert!(matches!(elements.next(), Some(Err(Error::Parse(_)))));
        assert!(elements.next().is_none());
    }

    #[test]
    fn sibling_top_level_nodes_are_a_parse_error() {
        let mut elements = stream(r#"<node id="1"/><node id="2"/>"#);
        assert!(matches!(elements.next(), Some(Ok(_))));
        assert!(matches!(elements.next(), Some(Err(Error::Parse(_)))));
        assert!(elements.next().is_none());
    }

    #[test]
    fn text_after_root_is_a_parse_error() {
        let results: Vec<Result<RawElement>> = stream(r#"<osm><node id="1"/></osm>garbage"#).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Parse(_))));
    }

    #[test]
    fn trailing_whitespace_and_comments_are_fine() {
        let xml = "<osm><node id=\"1\"/></osm>\n  <!-- done -->\n";
        let elements: Vec<RawElement> = stream(xml).collect::<Result<_>>().unwrap();
        assert_eq!(elements.len(), 1);
    }

    #[test]
    fn empty_document_is_a_parse_error() {
        let mut elements = stream("");
        assert!(matches!(elements.next(), Some(Err(Error::Parse(_)))));
    }

    #[test]
    fn census_counts_every_element_name() {
        let census = count_element_names(SAMPLE.as_bytes()).unwrap();
        assert_eq!(census.count("osm"), 1);
        assert_eq!(census.count("node"), 2);
        assert_eq!(census.count("tag"), 2);
        assert_eq!(census.count("nd"), 2);
        assert_eq!(census.count("member"), 1);
        assert_eq!(census.count("changeset"), 0);
    }

    #[test]
    fn census_rejects_truncated_document() {
        assert!(matches!(count_element_names("<osm><node>".as_bytes()), Err(Error::Parse(_))));
    }

    #[test]
    fn census_rejects_content_after_root() {
        assert!(matches!(count_element_names("<osm/><osm/>".as_bytes()), Err(Error::Parse(_))));
        assert!(matches!(count_element_names("<osm></osm>junk".as_bytes()), Err(Error::Parse(_))));
    }
}
