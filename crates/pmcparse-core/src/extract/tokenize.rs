//! Markup tokenizer feeding the streaming extractor.
//!
//! Wraps a lenient `quick-xml` reader over HTML: end-tag names are not
//! checked, stray end tags are allowed, void elements become OPEN+CLOSE,
//! `script`/`style` bodies are skipped and HTML5 entities are resolved.
//! A `<` that cannot start a tag is text, as in HTML. Malformed fragments are
//! skipped rather than aborting the stream.

use std::collections::VecDeque;

use quick_xml::Reader;
use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};

use super::MarkupEvent;

/// Elements that never have content or an end tag in HTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose bodies are not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Longest entity name looked at after an `&`.
const MAX_ENTITY_LEN: usize = 32;

/// Tokenize `markup` into a lazy event stream.
pub fn events(markup: &str) -> MarkupEvents<'_> {
    MarkupEvents {
        input: markup,
        base: 0,
        reader: lenient_reader(markup),
        pending: VecDeque::new(),
        done: false,
    }
}

fn lenient_reader(markup: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.expand_empty_elements = false;
    reader
}

/// Iterator over the [`MarkupEvent`]s of one document.
pub struct MarkupEvents<'a> {
    input: &'a str,
    /// Offset of `reader`'s input within `input`.
    base: usize,
    reader: Reader<&'a [u8]>,
    pending: VecDeque<MarkupEvent>,
    done: bool,
}

impl Iterator for MarkupEvents<'_> {
    type Item = MarkupEvent;

    fn next(&mut self) -> Option<MarkupEvent> {
        while self.pending.is_empty() && !self.done {
            self.read_more();
        }
        self.pending.pop_front()
    }
}

impl MarkupEvents<'_> {
    /// Byte offset of the reader within the whole document.
    fn offset(&self) -> usize {
        self.base + self.reader.buffer_position() as usize
    }

    /// Continue reading at byte `at` of the document.
    fn restart(&mut self, at: usize) {
        let input = self.input;
        self.base = at;
        self.reader = lenient_reader(&input[at..]);
    }

    fn read_more(&mut self) {
        let before = self.offset();
        if self.input[before..].starts_with('<') && !starts_tag(&self.input[before + 1..]) {
            self.pending.push_back(MarkupEvent::Text("<".to_string()));
            self.restart(before + 1);
            return;
        }
        match self.reader.read_event() {
            Ok(Event::Start(e)) => {
                let (tag, attributes) = open_parts(&e);
                let void = VOID_ELEMENTS.contains(&tag.as_str());
                let raw_text = RAW_TEXT_ELEMENTS.contains(&tag.as_str());
                self.pending.push_back(MarkupEvent::Open {
                    tag: tag.clone(),
                    attributes,
                });
                if void {
                    self.pending.push_back(MarkupEvent::Close(tag));
                } else if raw_text {
                    self.skip_raw_text(&tag);
                }
            }
            Ok(Event::Empty(e)) => {
                let (tag, attributes) = open_parts(&e);
                self.pending.push_back(MarkupEvent::Open {
                    tag: tag.clone(),
                    attributes,
                });
                self.pending.push_back(MarkupEvent::Close(tag));
            }
            Ok(Event::End(e)) => {
                let tag = lowercase_name(e.name().as_ref());
                if !VOID_ELEMENTS.contains(&tag.as_str()) {
                    self.pending.push_back(MarkupEvent::Close(tag));
                }
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(&e);
                let text = decode_entities(&raw);
                if !text.is_empty() {
                    self.pending.push_back(MarkupEvent::Text(text));
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                self.pending.push_back(MarkupEvent::Text(text));
            }
            Ok(Event::Eof) => self.done = true,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(offset = self.offset(), error = %err, "skipping malformed markup");
                // An error that does not advance the reader would repeat forever.
                if self.offset() == before {
                    self.done = true;
                }
            }
        }
    }

    /// Jump to the end tag of a raw text element without tokenizing its body.
    /// The end tag itself is read normally afterwards.
    fn skip_raw_text(&mut self, tag: &str) {
        let pos = self.offset();
        let needle = format!("</{tag}");
        match self.input[pos..].to_ascii_lowercase().find(&needle) {
            Some(found) => self.restart(pos + found),
            None => {
                tracing::debug!(tag, "unterminated raw text element");
                self.pending.push_back(MarkupEvent::Close(tag.to_string()));
                self.done = true;
            }
        }
    }
}

fn lowercase_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_lowercase()
}

fn open_parts(e: &BytesStart<'_>) -> (String, Vec<(String, String)>) {
    let tag = lowercase_name(e.name().as_ref());
    let attributes = e
        .html_attributes()
        .flatten()
        .map(|attr| {
            let key = lowercase_name(attr.key.as_ref());
            let raw = String::from_utf8_lossy(&attr.value);
            (key, decode_entities(&raw))
        })
        .collect();
    (tag, attributes)
}

/// Whether text right after a `<` opens a tag, end tag, comment or
/// processing instruction.
fn starts_tag(rest: &str) -> bool {
    rest.bytes()
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
}

/// Resolve character and HTML5 named references one by one. An `&` that
/// does not start a known reference is kept as written.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match reference_at(after) {
            Some((decoded, used)) => {
                out.push_str(&decoded);
                rest = &after[used..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode `name;` or `#num;` at the start of `text`, with the bytes it spans.
fn reference_at(text: &str) -> Option<(String, usize)> {
    let end = text
        .bytes()
        .take(MAX_ENTITY_LEN + 1)
        .position(|b| b == b';')?;
    let name = &text[..end];
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'#') {
        return None;
    }
    let decoded = match name.strip_prefix('#') {
        Some(number) => {
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            char::from_u32(code)?.to_string()
        }
        None => resolve_html5_entity(name)?.to_string(),
    };
    Some((decoded, end + 1))
}
