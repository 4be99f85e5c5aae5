//! Time-sheet schema validation
//!
//! The accepted document shape is fixed:
//!
//! ```xml
//! <people>
//!   <person full_name="h.simpson">
//!     <start>01-01-2020 10:00:00</start>
//!     <end>01-01-2020 19:00:00</end>
//!   </person>
//! </people>
//! ```
//!
//! [`SchemaValidator`] checks this shape incrementally, one parser event at a
//! time, so a document is validated in a single linear pass while it is being
//! read. It keeps only the `<person>` element currently open; every completed
//! person is handed back as a [`RawRecord`] and forgotten.
//!
//! Violations of the shape are [`TimesheetError::Schema`]. Documents that are
//! not well-formed (no root, several roots, unclosed elements, stray text
//! outside the root) are [`TimesheetError::MalformedXml`].

use crate::error::{Result, TimesheetError};
use crate::models::RawRecord;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const ROOT_TAG: &[u8] = b"people";
pub const PERSON_TAG: &[u8] = b"person";
pub const START_TAG: &[u8] = b"start";
pub const END_TAG: &[u8] = b"end";
pub const NAME_ATTR: &[u8] = b"full_name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Start,
    End,
}

impl Field {
    fn tag(self) -> &'static str {
        match self {
            Field::Start => "start",
            Field::End => "end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the root element.
    Prolog,
    /// Inside `<people>`, between persons.
    InRoot,
    /// Inside `<person>`, between fields.
    InPerson,
    /// Inside `<start>` or `<end>`.
    InField(Field),
    /// Root element closed.
    Done,
}

#[derive(Debug, Default)]
struct PersonDraft {
    full_name: String,
    start: Option<String>,
    end: Option<String>,
    text: String,
}

#[derive(Debug)]
pub struct SchemaValidator {
    state: State,
    draft: Option<PersonDraft>,
    persons_seen: u64,
    fragment: bool,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    /// Validator for a complete `<people>` document.
    pub fn new() -> Self {
        Self {
            state: State::Prolog,
            draft: None,
            persons_seen: 0,
            fragment: false,
        }
    }

    /// Validator for bare `<person>` elements without the enclosing root.
    pub fn for_fragment() -> Self {
        Self {
            state: State::InRoot,
            fragment: true,
            ..Self::new()
        }
    }

    /// True once the root element has been opened (or the document was an
    /// empty `<people/>`).
    pub fn root_seen(&self) -> bool {
        self.state != State::Prolog
    }

    pub fn persons_seen(&self) -> u64 {
        self.persons_seen
    }

    /// Consume one parser event. Returns the record when a `</person>` closes.
    pub fn feed(&mut self, event: &Event<'_>, position: u64) -> Result<Option<RawRecord>> {
        match event {
            Event::Start(e) => self.open(e, false, position).map(|_| None),
            Event::Empty(e) => self.open(e, true, position).map(|_| None),
            Event::End(e) => self.close(e.name().as_ref(), position),
            Event::Text(t) => {
                if t.iter().all(u8::is_ascii_whitespace) {
                    return Ok(None);
                }
                match self.state {
                    State::InField(_) => {
                        let text = t
                            .unescape()
                            .map_err(|e| TimesheetError::malformed(position, e.to_string()))?;
                        self.push_text(&text);
                        Ok(None)
                    }
                    _ => self.stray_text(position),
                }
            }
            Event::CData(c) => match self.state {
                State::InField(_) => {
                    let text = std::str::from_utf8(c)
                        .map_err(|e| TimesheetError::malformed(position, e.to_string()))?;
                    self.push_text(text);
                    Ok(None)
                }
                _ => self.stray_text(position),
            },
            Event::Eof => self.finish(position).map(|_| None),
            // declarations, comments, processing instructions, doctype
            _ => Ok(None),
        }
    }

    /// End-of-document check.
    pub fn finish(&self, position: u64) -> Result<()> {
        match self.state {
            State::Done => Ok(()),
            State::InRoot if self.fragment => Ok(()),
            State::Prolog => Err(TimesheetError::malformed(
                position,
                "document has no root element",
            )),
            State::InRoot => Err(TimesheetError::malformed(
                position,
                "unexpected end of document: <people> is not closed",
            )),
            State::InPerson | State::InField(_) => Err(TimesheetError::malformed(
                position,
                format!(
                    "unexpected end of document inside person #{}",
                    self.persons_seen + 1
                ),
            )),
        }
    }

    fn open(&mut self, element: &BytesStart<'_>, empty: bool, position: u64) -> Result<()> {
        let name = element.name();
        let tag = name.as_ref();
        match self.state {
            State::Prolog => {
                if tag != ROOT_TAG {
                    return Err(TimesheetError::schema(
                        position,
                        format!("root element must be <people>, found <{}>", display_tag(tag)),
                    ));
                }
                root_attributes(element, position)?;
                self.state = if empty { State::Done } else { State::InRoot };
                Ok(())
            }
            State::InRoot => {
                if tag != PERSON_TAG {
                    return Err(TimesheetError::schema(
                        position,
                        format!("unexpected element <{}> in <people>", display_tag(tag)),
                    ));
                }
                let full_name = person_name(element, position)?;
                if empty {
                    return Err(TimesheetError::schema(
                        position,
                        format!(
                            "person #{} ({}) has no <start> element",
                            self.persons_seen + 1,
                            full_name
                        ),
                    ));
                }
                self.draft = Some(PersonDraft {
                    full_name,
                    ..PersonDraft::default()
                });
                self.state = State::InPerson;
                Ok(())
            }
            State::InPerson => {
                let field = match tag {
                    START_TAG => Field::Start,
                    END_TAG => Field::End,
                    other => {
                        return Err(self.person_error(
                            position,
                            format!("unexpected element <{}>", display_tag(other)),
                        ))
                    }
                };
                if element.attributes().next().is_some() {
                    return Err(self.person_error(
                        position,
                        format!("<{}> does not take attributes", field.tag()),
                    ));
                }
                self.check_field_order(field, position)?;
                if empty {
                    return Err(
                        self.person_error(position, format!("<{}> is empty", field.tag()))
                    );
                }
                self.state = State::InField(field);
                Ok(())
            }
            State::InField(field) => Err(self.person_error(
                position,
                format!(
                    "<{}> must contain text only, found <{}>",
                    field.tag(),
                    display_tag(tag)
                ),
            )),
            State::Done => Err(TimesheetError::malformed(
                position,
                format!(
                    "content after the root element: <{}>",
                    display_tag(tag)
                ),
            )),
        }
    }

    fn close(&mut self, tag: &[u8], position: u64) -> Result<Option<RawRecord>> {
        match self.state {
            State::InField(field) => {
                let draft = self.draft.get_or_insert_with(PersonDraft::default);
                let value = draft.text.trim().to_string();
                draft.text.clear();
                if value.is_empty() {
                    return Err(
                        self.person_error(position, format!("<{}> is empty", field.tag()))
                    );
                }
                match field {
                    Field::Start => draft.start = Some(value),
                    Field::End => draft.end = Some(value),
                }
                self.state = State::InPerson;
                Ok(None)
            }
            State::InPerson => {
                let draft = self.draft.take().unwrap_or_default();
                self.persons_seen += 1;
                let ordinal = self.persons_seen;
                let start = draft.start.ok_or_else(|| {
                    TimesheetError::schema(
                        position,
                        format!("person #{} ({}) has no <start> element", ordinal, draft.full_name),
                    )
                })?;
                let end = draft.end.ok_or_else(|| {
                    TimesheetError::schema(
                        position,
                        format!("person #{} ({}) has no <end> element", ordinal, draft.full_name),
                    )
                })?;
                self.state = State::InRoot;
                Ok(Some(RawRecord {
                    full_name: draft.full_name,
                    start,
                    end,
                }))
            }
            State::InRoot if !self.fragment => {
                self.state = State::Done;
                Ok(None)
            }
            _ => Err(TimesheetError::malformed(
                position,
                format!("unexpected closing tag </{}>", display_tag(tag)),
            )),
        }
    }

    fn check_field_order(&self, field: Field, position: u64) -> Result<()> {
        let (has_start, has_end) = self
            .draft
            .as_ref()
            .map(|d| (d.start.is_some(), d.end.is_some()))
            .unwrap_or((false, false));
        match (field, has_start, has_end) {
            (Field::Start, false, false) | (Field::End, true, false) => Ok(()),
            (Field::Start, true, _) | (Field::End, _, true) => Err(self.person_error(
                position,
                format!("duplicate <{}> element", field.tag()),
            )),
            (Field::Start, false, true) => Err(self.person_error(
                position,
                "<start> must come before <end>",
            )),
            (Field::End, false, _) => Err(self.person_error(
                position,
                "<end> found before <start>",
            )),
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(draft) = self.draft.as_mut() {
            draft.text.push_str(text);
        }
    }

    fn stray_text(&self, position: u64) -> Result<Option<RawRecord>> {
        match self.state {
            State::Prolog | State::Done => Err(TimesheetError::malformed(
                position,
                "text outside the root element",
            )),
            State::InRoot => Err(TimesheetError::schema(
                position,
                "unexpected text directly inside <people>",
            )),
            _ => Err(self.person_error(position, "unexpected text directly inside <person>")),
        }
    }

    fn person_error(&self, position: u64, detail: impl AsRef<str>) -> TimesheetError {
        let name = self
            .draft
            .as_ref()
            .map(|d| d.full_name.as_str())
            .unwrap_or("?");
        TimesheetError::schema(
            position,
            format!(
                "person #{} ({}): {}",
                self.persons_seen + 1,
                name,
                detail.as_ref()
            ),
        )
    }
}

/// `<people>` takes no attributes, namespace declarations included.
fn root_attributes(element: &BytesStart<'_>, position: u64) -> Result<()> {
    if let Some(attr) = element.attributes().next() {
        let attr = attr.map_err(|e| TimesheetError::malformed(position, e.to_string()))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            return Err(TimesheetError::schema(
                position,
                "namespaces are not supported",
            ));
        }
        return Err(TimesheetError::schema(
            position,
            format!("unexpected attribute {} on <people>", display_tag(key)),
        ));
    }
    Ok(())
}

/// Extract the single `full_name` attribute; any other attribute is a schema error.
fn person_name(element: &BytesStart<'_>, position: u64) -> Result<String> {
    let mut full_name = None;
    for attr in element.attributes() {
        let attr = attr.map_err(|e| TimesheetError::malformed(position, e.to_string()))?;
        let key = attr.key.as_ref();
        if key == NAME_ATTR {
            let value = attr
                .unescape_value()
                .map_err(|e| TimesheetError::malformed(position, e.to_string()))?;
            full_name = Some(value.into_owned());
        } else if key == b"xmlns" || key.starts_with(b"xmlns:") {
            return Err(TimesheetError::schema(
                position,
                "namespaces are not supported",
            ));
        } else {
            return Err(TimesheetError::schema(
                position,
                format!("unexpected attribute {} on <person>", display_tag(key)),
            ));
        }
    }
    full_name.ok_or_else(|| {
        TimesheetError::schema(position, "<person> is missing the full_name attribute")
    })
}

fn display_tag(tag: &[u8]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}

/// Result of a standalone validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationSummary {
    pub records: u64,
    pub bytes: u64,
}

/// Validate a whole file in one pass without retaining any records.
pub fn validate_file(path: &Path) -> Result<ValidationSummary> {
    let file = File::open(path).map_err(|source| TimesheetError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;
    validate_reader(BufReader::new(file), path)
}

/// Validate a document from any buffered source.
pub fn validate_reader<R: BufRead>(source: R, origin: &Path) -> Result<ValidationSummary> {
    let mut reader = Reader::from_reader(source);
    let mut validator = SchemaValidator::new();
    let mut buf = Vec::new();
    let mut records = 0u64;
    loop {
        buf.clear();
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(err) => {
                return Err(TimesheetError::from_xml(
                    err,
                    reader.buffer_position() as u64,
                    origin,
                ))
            }
        };
        let position = reader.buffer_position() as u64;
        let at_end = matches!(event, Event::Eof);
        if validator.feed(&event, position)?.is_some() {
            records += 1;
        }
        if at_end {
            return Ok(ValidationSummary {
                records,
                bytes: position,
            });
        }
    }
}

/// Validate a single `<person>` element and return its record.
pub fn validate_fragment(xml: &str) -> Result<RawRecord> {
    let mut reader = Reader::from_str(xml);
    let mut validator = SchemaValidator::for_fragment();
    let mut record = None;
    loop {
        let event = reader
            .read_event()
            .map_err(|e| TimesheetError::malformed(reader.buffer_position() as u64, e.to_string()))?;
        let position = reader.buffer_position() as u64;
        let at_end = matches!(event, Event::Eof);
        if let Some(found) = validator.feed(&event, position)? {
            if record.is_some() {
                return Err(TimesheetError::schema(
                    position,
                    "fragment contains more than one <person>",
                ));
            }
            record = Some(found);
        }
        if at_end {
            break;
        }
    }
    record.ok_or_else(|| TimesheetError::schema(0, "fragment contains no <person> element"))
}
