use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::RawElement;
use crate::errors::Result;

/// Pulls elements out of an .osm document one at a time.
///
/// An element is yielded once its closing tag has been read, so children
/// come out before their parent. Elements below the root also stay attached
/// to their parent until it closes; the root is yielded without children.
pub struct ElementReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    open: Vec<RawElement>,
    done: bool,
}

impl<R: BufRead> ElementReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        ElementReader {
            reader,
            buf: Vec::new(),
            open: Vec::new(),
            done: false,
        }
    }

    fn parse_start(el: &BytesStart) -> Result<RawElement> {
        let mut element = RawElement::new(str::from_utf8(el.name().as_ref())?);
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            let key = str::from_utf8(attribute.key.as_ref())?.to_string();
            let value = attribute.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn close(open: &mut [RawElement], element: RawElement) -> RawElement {
        // open[0] is the document root, which never keeps children.
        if open.len() >= 2 {
            if let Some(parent) = open.last_mut() {
                parent.children.push(element.clone());
            }
        }
        element
    }

    fn next_element(&mut self) -> Result<Option<RawElement>> {
        loop {
            // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let element = Self::parse_start(&e)?;
                    self.open.push(element);
                },
                Event::Empty(e) => {
                    let element = Self::parse_start(&e)?;
                    return Ok(Some(Self::close(&mut self.open, element)));
                },
                Event::End(_e) => {
                    let element = self.open.pop().ok_or("Closing tag without a matching opening tag")?;
                    return Ok(Some(Self::close(&mut self.open, element)));
                },
                Event::Eof => {
                    if !self.open.is_empty() {
                        return Err(format!("Document ended with {} unclosed element(s)", self.open.len()).into());
                    }
                    return Ok(None);
                },
                // Declarations, comments and whitespace carry nothing we keep.
                _ => (),
            }
        }
    }
}

impl<R: BufRead> Iterator for ElementReader<R> {
    type Item = Result<RawElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

/// Opens an .osm file, decompressing on the fly when it ends in `.xz`.
pub fn open_osm_file(path: &Path) -> Result<ElementReader<Box<dyn BufRead>>> {
    let file = fs::File::open(path)
        .map_err(|err| format!("Could not open {}: {}", path.display(), err))?;
    let file_reader = BufReader::new(file);
    let input: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "xz") {
        Box::new(BufReader::new(XzDecoder::new(file_reader)))
    } else {
        Box::new(file_reader)
    };
    Ok(ElementReader::new(input))
}
