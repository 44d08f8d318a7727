use std::borrow::Cow;

use quick_xml::events::{BytesText, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Errors that can occur while parsing a syndication document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The bytes are not well-formed XML
    #[error("Malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },
    /// The document ended while elements were still open
    #[error("Document ended with {0} unclosed element(s)")]
    Truncated(usize),
    /// Well-formed XML, but no RSS `<channel>` element
    #[error("No <channel> element found")]
    MissingChannel,
}

/// Feed-level metadata plus entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub entries: Vec<ParsedEntry>,
}

/// One `<item>`. Absent fields are empty strings; `pub_date` is the raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

/// Which text field the reader is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

impl Field {
    fn from_item_child(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }

    fn from_channel_child(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            _ => None,
        }
    }
}

/// Parse an RSS document.
///
/// Element names are matched exactly, so namespaced children such as
/// `atom:link` are ignored. Items may sit inside `<channel>` (RSS 2.0) or next
/// to it (RSS 1.0).
///
/// # Errors
///
/// - [`ParseError::Malformed`] for syntax errors, mismatched tags, or text
///   that is not valid UTF-8 (the `encoding` attribute of the XML
///   declaration is not honored)
/// - [`ParseError::Truncated`] when elements are left open at end of input
/// - [`ParseError::MissingChannel`] when there is no `<channel>`
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    // quick-xml 0.37 only resolves the five XML built-in entities and never
    // expands DOCTYPE declarations; anything else is handled by `text_content`.
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut feed = ParsedFeed::default();
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut channel_seen = false;
    let mut current: Option<ParsedEntry> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| ParseError::Malformed {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"channel" => channel_seen = true,
                    b"item" => current = Some(ParsedEntry::default()),
                    _ => {}
                }
                stack.push(name);
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some(b"item".as_slice()) {
                    if let Some(entry) = current.take() {
                        feed.entries.push(entry);
                    }
                }
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"channel" => channel_seen = true,
                b"item" => feed.entries.push(ParsedEntry::default()),
                _ => {}
            },
            Event::Text(e) => {
                let text = text_content(&e, &reader)?;
                append_field(&stack, &mut feed, current.as_mut(), &text);
            }
            Event::CData(e) => {
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|err| ParseError::Malformed {
                        position: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?
                    .into_owned();
                append_field(&stack, &mut feed, current.as_mut(), &text);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ParseError::Truncated(stack.len()));
    }
    if !channel_seen {
        return Err(ParseError::MissingChannel);
    }

    feed.title = normalize(&feed.title);
    feed.link = normalize(&feed.link);
    feed.description = normalize(&feed.description);
    for entry in &mut feed.entries {
        entry.title = normalize(&entry.title);
        entry.link = normalize(&entry.link);
        entry.description = normalize(&entry.description);
        entry.pub_date = normalize(&entry.pub_date);
    }

    Ok(feed)
}

/// XML-unescape a text node. Entities XML does not know (`&nbsp;`, `&eacute;`)
/// make `unescape` fail, in which case the raw text is kept for the HTML pass
/// in `normalize`.
fn text_content(e: &BytesText<'_>, reader: &Reader<&[u8]>) -> Result<String, ParseError> {
    match e.unescape() {
        Ok(text) => Ok(text.into_owned()),
        Err(_) => reader
            .decoder()
            .decode(e)
            .map(Cow::into_owned)
            .map_err(|err| ParseError::Malformed {
                position: reader.buffer_position() as u64,
                message: err.to_string(),
            }),
    }
}

fn append_field(
    stack: &[Vec<u8>],
    feed: &mut ParsedFeed,
    current: Option<&mut ParsedEntry>,
    text: &str,
) {
    let (Some(field_name), Some(parent)) = (
        stack.last(),
        stack.len().checked_sub(2).and_then(|i| stack.get(i)),
    ) else {
        return;
    };

    match (parent.as_slice(), current) {
        (b"item", Some(entry)) => {
            let target = match Field::from_item_child(field_name) {
                Some(Field::Title) => &mut entry.title,
                Some(Field::Link) => &mut entry.link,
                Some(Field::Description) => &mut entry.description,
                Some(Field::PubDate) => &mut entry.pub_date,
                None => return,
            };
            target.push_str(text);
        }
        (b"channel", _) => {
            let target = match Field::from_channel_child(field_name) {
                Some(Field::Title) => &mut feed.title,
                Some(Field::Link) => &mut feed.link,
                Some(Field::Description) => &mut feed.description,
                _ => return,
            };
            target.push_str(text);
        }
        _ => {}
    }
}

/// Decode HTML entities left after XML unescaping and trim surrounding whitespace.
fn normalize(s: &str) -> String {
    html_escape::decode_html_entities(s).trim().to_string()
}
