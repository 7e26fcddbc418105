use crate::types::RawFeedItem;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use std::collections::HashMap;
use tracing::debug;

/// Lazily parse the items of an RSS 2.0 or Atom document.
///
/// `<item>` blocks are read first; only when that pass produces nothing is the
/// document read again for Atom `<entry>` blocks. A block that hits an XML
/// error is dropped and scanning resumes at the next block start, so one bad
/// item never hides the ones after it.
pub fn parse_items(xml: &str) -> FeedItems<'_> {
    FeedItems {
        xml,
        reader: new_reader(xml),
        base: 0,
        kind: BlockKind::Rss,
        yielded: 0,
        reopened: false,
        done: false,
    }
}

/// Channel (RSS) or feed (Atom) level title, ignoring titles of items.
pub fn feed_title(xml: &str) -> Option<String> {
    let mut reader = new_reader(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut capture: Option<FieldText> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = lower_name(e.name());
                if capture.is_none()
                    && name == "title"
                    && !stack.iter().any(|n| n == "item" || n == "entry")
                {
                    capture = Some(FieldText::default());
                }
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                if let Some(field) = capture.take() {
                    return field.value(true).filter(|t| !t.is_empty());
                }
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                if let Some(field) = capture.as_mut() {
                    field.push_text(&t);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(field) = capture.as_mut() {
                    field.push_cdata(&t);
                }
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                debug!("Feed title scan stopped: {}", e);
                return None;
            }
            _ => {}
        }
    }
}

/// Parse a feed timestamp. RFC 2822 and RFC 3339 first, then a few layouts
/// seen in the wild; naive layouts are read as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, layout) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Rss,
    Atom,
}

impl BlockKind {
    fn tag(self) -> &'static str {
        match self {
            BlockKind::Rss => "item",
            BlockKind::Atom => "entry",
        }
    }
}

pub struct FeedItems<'a> {
    xml: &'a str,
    reader: Reader<&'a [u8]>,
    /// byte offset of the reader's input within `xml`
    base: usize,
    kind: BlockKind,
    yielded: usize,
    /// the start tag of the next block was consumed while closing the last one
    reopened: bool,
    done: bool,
}

impl Iterator for FeedItems<'_> {
    type Item = RawFeedItem;

    fn next(&mut self) -> Option<RawFeedItem> {
        while !self.done {
            match self.next_block() {
                Some(block) => {
                    if let Some(item) = block.into_item(self.kind) {
                        self.yielded += 1;
                        return Some(item);
                    }
                }
                None if self.kind == BlockKind::Rss && self.yielded == 0 => {
                    self.kind = BlockKind::Atom;
                    self.done = !self.restart(0);
                }
                None => self.done = true,
            }
        }
        None
    }
}

impl FeedItems<'_> {
    /// Read up to and including the next complete block of the current kind.
    fn next_block(&mut self) -> Option<Block> {
        let tag = self.kind.tag();
        let mut block = std::mem::take(&mut self.reopened).then(Block::default);
        // element names below the block element
        let mut stack: Vec<String> = Vec::new();

        loop {
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    let at = usize::try_from(self.reader.buffer_position())
                        .map_or(usize::MAX, |pos| self.base.saturating_add(pos));
                    debug!("XML error at byte {}: {}, skipping to the next <{}>", at, e, tag);
                    block = None;
                    stack.clear();
                    let resumed = find_block_start(self.xml, at.max(self.base + 1), tag)
                        .is_some_and(|start| self.restart(start));
                    if !resumed {
                        return None;
                    }
                    continue;
                }
            };

            match event {
                Event::Start(e) => {
                    let name = lower_name(e.name());
                    if name == tag {
                        if block.is_some() {
                            // unclosed block, the new start ends it
                            self.reopened = true;
                            return block;
                        }
                        block = Some(Block::default());
                    } else if let Some(b) = block.as_mut() {
                        b.collect_link(&e);
                        stack.push(name);
                    }
                }
                Event::Empty(e) => {
                    if let Some(b) = block.as_mut() {
                        b.collect_link(&e);
                    }
                }
                Event::End(e) if block.is_some() => {
                    let name = lower_name(e.name());
                    if name == tag {
                        return block;
                    }
                    // unbalanced children close back to their nearest match
                    if let Some(depth) = stack.iter().rposition(|open| *open == name) {
                        stack.truncate(depth);
                    }
                }
                Event::Text(t) => {
                    if let (Some(b), Some(key)) = (block.as_mut(), field_key(&stack)) {
                        b.fields.entry(key).or_default().push_text(&t);
                    }
                }
                Event::CData(t) => {
                    if let (Some(b), Some(key)) = (block.as_mut(), field_key(&stack)) {
                        b.fields.entry(key).or_default().push_cdata(&t);
                    }
                }
                Event::Eof => return None,
                _ => {}
            }
        }
    }

    /// Continue reading from byte `start` of the document.
    fn restart(&mut self, start: usize) -> bool {
        let xml = self.xml;
        self.reopened = false;
        match xml.get(start..) {
            Some(rest) => {
                self.reader = new_reader(rest);
                self.base = start;
                true
            }
            None => false,
        }
    }
}

/// Byte offset of the next `<tag` start at or after `from`, ignoring case.
fn find_block_start(xml: &str, from: usize, tag: &str) -> Option<usize> {
    let bytes = xml.as_bytes();
    let tag = tag.as_bytes();
    (from..bytes.len()).find(|&i| {
        bytes[i] == b'<'
            && bytes
                .get(i + 1..i + 1 + tag.len())
                .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            && matches!(
                bytes.get(i + 1 + tag.len()),
                Some(b'>' | b'/' | b' ' | b'\t' | b'\r' | b'\n')
            )
    })
}

/// Text collected for one child element of a block.
#[derive(Debug, Default)]
struct FieldText {
    text: String,
    cdata: String,
}

impl FieldText {
    fn push_text(&mut self, raw: &[u8]) {
        let raw = String::from_utf8_lossy(raw);
        self.text.push_str(&html_escape::decode_html_entities(&raw));
    }

    fn push_cdata(&mut self, raw: &[u8]) {
        self.cdata.push_str(&String::from_utf8_lossy(raw));
    }

    /// CDATA wins over plain text. Plain text is already entity-decoded;
    /// `decode_cdata` decodes CDATA too so both spellings read the same.
    fn value(&self, decode_cdata: bool) -> Option<String> {
        let cdata = self.cdata.trim();
        if !cdata.is_empty() {
            return Some(if decode_cdata {
                html_escape::decode_html_entities(cdata).into_owned()
            } else {
                cdata.to_string()
            });
        }
        let text = self.text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[derive(Debug, Default)]
struct Block {
    fields: HashMap<String, FieldText>,
    /// (rel, href) pairs in document order
    links: Vec<(Option<String>, String)>,
}

impl Block {
    fn collect_link(&mut self, e: &BytesStart<'_>) {
        let mut rel = None;
        let mut href = None;
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value);
            match attr.key.as_ref() {
                b"rel" => rel = Some(value.trim().to_ascii_lowercase()),
                b"href" => href = Some(html_escape::decode_html_entities(value.trim()).into_owned()),
                _ => {}
            }
        }
        if let Some(href) = href.filter(|h| !h.is_empty()) {
            self.links.push((rel, href));
        }
    }

    fn first(&self, keys: &[&str], decode_cdata: bool) -> Option<String> {
        keys.iter()
            .find_map(|key| self.fields.get(*key).and_then(|f| f.value(decode_cdata)))
    }

    fn atom_link(&self) -> Option<String> {
        self.links
            .iter()
            .find(|(rel, _)| rel.as_deref() == Some("alternate"))
            .or_else(|| self.links.first())
            .map(|(_, href)| href.clone())
    }

    fn into_item(self, kind: BlockKind) -> Option<RawFeedItem> {
        let (title, link, description, date, author) = match kind {
            BlockKind::Rss => (
                self.first(&["title"], true),
                self.first(&["link", "guid"], false),
                self.first(&["description", "content:encoded"], false),
                self.first(&["pubdate", "dc:date"], false),
                self.first(&["author", "dc:creator"], true),
            ),
            BlockKind::Atom => (
                self.first(&["title"], true),
                self.atom_link(),
                self.first(&["summary", "content"], false),
                self.first(&["published", "updated"], false),
                self.first(&["author/name", "author", "dc:creator"], true),
            ),
        };

        if title.is_none() && link.is_none() {
            debug!("Skipping {} without title and link", kind.tag());
            return None;
        }

        let published_at = match date.as_deref().and_then(parse_date) {
            Some(dt) => dt,
            None => {
                debug!("Unparseable publish date {:?}, using now", date);
                Utc::now()
            }
        };

        Some(RawFeedItem {
            id: None,
            title: title.unwrap_or_default(),
            link: link.unwrap_or_default(),
            description: description.unwrap_or_default(),
            published_at,
            authors: author.into_iter().collect(),
            source_name: None,
            feed_url: None,
        })
    }
}

fn new_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(true);
    // end tags are matched case-insensitively by the scanner, not by quick-xml
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

fn lower_name(name: QName<'_>) -> String {
    String::from_utf8_lossy(name.as_ref()).to_ascii_lowercase()
}

/// Field a text node belongs to, given the element path below the block.
/// Atom author children keep their own key (`author/name`).
fn field_key(stack: &[String]) -> Option<String> {
    match stack {
        [] => None,
        [first, second, ..] if first == "author" => Some(format!("author/{}", second)),
        [first, ..] => Some(first.clone()),
    }
}
