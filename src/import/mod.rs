//! Streaming XML import
//!
//! Sources are read event by event with quick-xml; the whole document is
//! never materialized. Outside a record nothing is kept. Inside one, an
//! explicit stack of open elements is maintained: each closed element is
//! attached to its parent, so nested children (cast roles, trailers) are
//! complete before the parent sees them and same-named siblings never
//! overwrite each other. When the record's own closing tag arrives, the
//! finished element tree is handed to the record's [`XmlRecord`]
//! implementation.
//!
//! Records whose `id` attribute is missing or negative are skipped and
//! counted, as is a record left unfinished when the stream ends.
//!
//! Input is decoded with the encoding named by a byte order mark or the
//! XML declaration, falling back to UTF-8.

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::errors::{IllFormedError, SyntaxError};
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::Path;

use crate::error::{LoadError, LoadResult};

pub mod client;
pub mod film;
pub mod person;

/// An XML element reconstructed inside a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Direct text content, concatenated
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Create an element with a name only
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn open(start: &BytesStart<'_>, decoder: Decoder) -> LoadResult<Self> {
        let mut element = Self::new(decoder.decode(start.name().as_ref())?);
        for attribute in start.attributes() {
            let attribute = attribute?;
            element.attributes.push((
                decoder.decode(attribute.key.as_ref())?.into_owned(),
                attribute.decode_and_unescape_value(decoder)?.into_owned(),
            ));
        }
        Ok(element)
    }

    /// Value of an attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed text, `None` when empty
    pub fn text(&self) -> Option<String> {
        let text = self.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// All descendants with the given name, in document order
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect(name, found);
        }
    }

    /// First descendant with the given name, at any depth
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|child| {
            if child.name == name {
                Some(child)
            } else {
                child.find(name)
            }
        })
    }

    /// Text of the first descendant with the given name
    pub fn field(&self, name: &str) -> Option<String> {
        self.find(name).and_then(Element::text)
    }

    /// Non-empty texts of every descendant with the given name
    pub fn fields(&self, name: &str) -> Vec<String> {
        self.find_all(name)
            .into_iter()
            .filter_map(Element::text)
            .collect()
    }
}

/// Typed field parsing for one record, reporting failures with context
#[derive(Debug, Clone, Copy)]
pub struct FieldParser {
    pub record: &'static str,
    pub id: i64,
}

impl FieldParser {
    fn error(&self, field: &'static str, value: &str) -> LoadError {
        LoadError::Parse {
            record: self.record,
            id: self.id.to_string(),
            field,
            value: value.to_string(),
        }
    }

    /// Integer field; absent stays `None`, non-numeric text is an error
    pub fn int(&self, element: &Element, field: &'static str) -> LoadResult<Option<i64>> {
        element
            .field(field)
            .map(|text| text.parse().map_err(|_| self.error(field, &text)))
            .transpose()
    }

    /// `YYYY-MM-DD` date field
    pub fn date(&self, element: &Element, field: &'static str) -> LoadResult<Option<NaiveDate>> {
        element
            .field(field)
            .map(|text| {
                NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| self.error(field, &text))
            })
            .transpose()
    }

    /// Integer `id` attribute of a nested element
    pub fn id_attribute(&self, element: &Element) -> LoadResult<Option<i64>> {
        element
            .attribute("id")
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| raw.parse().map_err(|_| self.error("id", raw)))
            .transpose()
    }
}

/// A top-level record that can be rebuilt from its element tree
pub trait XmlRecord: Sized {
    /// Tag that opens one record
    const TAG: &'static str;

    /// Build the record from its closed element
    ///
    /// `id` is the validated, non-negative `id` attribute.
    fn from_element(id: i64, element: &Element) -> LoadResult<Self>;
}

/// Streaming reader yielding one typed record per completed record element
///
/// Iteration stops after the first error.
pub struct RecordReader<R: BufRead, T: XmlRecord> {
    reader: Reader<R>,
    buf: Vec<u8>,
    stack: Vec<Element>,
    skipped: usize,
    done: bool,
    _record: PhantomData<T>,
}

impl<T: XmlRecord> RecordReader<BufReader<File>, T> {
    /// Open a source file
    pub fn open(path: &Path) -> LoadResult<Self> {
        let file = File::open(path)
            .map_err(|e| LoadError::Io(format!("Failed to open {}: {}", path.display(), e)))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead, T: XmlRecord> RecordReader<R, T> {
    /// Read records from any buffered source
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            stack: Vec::new(),
            skipped: 0,
            done: false,
            _record: PhantomData,
        }
    }

    /// Records skipped so far (no id, negative id, or cut off by end of stream)
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Validate the id of a closed record element and build the record
    fn finish(&mut self, element: Element) -> LoadResult<Option<T>> {
        let Some(raw) = element.attribute("id").map(str::trim) else {
            tracing::warn!("Skipping <{}> without an id attribute", T::TAG);
            self.skipped += 1;
            return Ok(None);
        };

        let id: i64 = raw.parse().map_err(|_| LoadError::Parse {
            record: T::TAG,
            id: raw.to_string(),
            field: "id",
            value: raw.to_string(),
        })?;

        if id < 0 {
            tracing::warn!("Skipping <{}> with negative id {}", T::TAG, id);
            self.skipped += 1;
            return Ok(None);
        }

        T::from_element(id, &element).map(Some)
    }

    /// Close the innermost open element
    fn close(&mut self) -> LoadResult<Option<T>> {
        let Some(element) = self.stack.pop() else {
            return Ok(None);
        };
        match self.stack.last_mut() {
            Some(parent) => {
                parent.children.push(element);
                Ok(None)
            }
            None => self.finish(element),
        }
    }

    /// Account for a record left open when the stream ended
    fn truncate(&mut self) {
        if !self.stack.is_empty() {
            tracing::warn!(
                "Stream ended inside <{}>; unfinished record skipped",
                T::TAG
            );
            self.skipped += 1;
            self.stack.clear();
        }
    }

    fn next_record(&mut self) -> LoadResult<Option<T>> {
        loop {
            self.buf.clear();
            let result = self
                .reader
                .read_event_into(&mut self.buf)
                .map(Event::into_owned);
            let event = match result {
                Ok(event) => event,
                Err(quick_xml::Error::Syntax(e)) if !matches!(e, SyntaxError::InvalidBangMarkup) => {
                    // The input stopped in the middle of markup
                    tracing::debug!("Truncated source: {}", e);
                    self.truncate();
                    return Ok(None);
                }
                Err(quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(tag))) => {
                    tracing::debug!("Truncated source: <{}> never closed", tag);
                    self.truncate();
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            match event {
                Event::Start(start) => {
                    if !self.stack.is_empty() || start.name().as_ref() == T::TAG.as_bytes() {
                        let element = Element::open(&start, self.reader.decoder())?;
                        self.stack.push(element);
                    }
                }
                Event::Empty(start) => {
                    if !self.stack.is_empty() || start.name().as_ref() == T::TAG.as_bytes() {
                        let element = Element::open(&start, self.reader.decoder())?;
                        self.stack.push(element);
                        if let Some(record) = self.close()? {
                            return Ok(Some(record));
                        }
                    }
                }
                Event::Text(text) => {
                    if let Some(top) = self.stack.last_mut() {
                        top.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = self.stack.last_mut() {
                        top.text.push_str(&self.reader.decoder().decode(&data)?);
                    }
                }
                Event::End(_) => {
                    if let Some(record) = self.close()? {
                        return Ok(Some(record));
                    }
                }
                Event::Eof => {
                    self.truncate();
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead, T: XmlRecord> Iterator for RecordReader<R, T> {
    type Item = LoadResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
