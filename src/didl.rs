//! DIDL-Lite decoding of Browse results
//!
//! The `Result` argument of a ContentDirectory Browse response is a DIDL-Lite
//! document whose top-level `item` and `container` elements become
//! [`ListingEntry`] values. Each entry's child elements are kept as flat
//! [`Tag`]s; nesting below that level is folded into the child's text.

use crate::types::{ListingEntry, Tag};
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::reader::Reader;
use tracing::warn;

/// Turns a raw Browse `Result` payload into typed entries
pub trait ResponseDecoder: Send + Sync {
    /// Decode `raw` into entries; returns an empty vector when nothing matched
    fn decode(&self, udn: &str, raw: &str) -> Vec<ListingEntry>;
}

/// Default decoder for DIDL-Lite documents
#[derive(Clone, Copy, Debug, Default)]
pub struct DidlDecoder;

impl ResponseDecoder for DidlDecoder {
    fn decode(&self, udn: &str, raw: &str) -> Vec<ListingEntry> {
        if raw.trim().is_empty() {
            return Vec::new();
        }
        let mut entries = Vec::new();
        if let Err(reason) = parse_direct_children(udn, raw, &mut entries) {
            warn!(
                udn,
                decoded = entries.len(),
                error = %reason,
                "malformed DIDL-Lite document, keeping entries decoded so far"
            );
        }
        entries
    }
}

/// Entry being assembled while its element is open
struct PendingEntry {
    root: Tag,
    is_container: bool,
    tags: Vec<Tag>,
    child: Option<Tag>,
}

impl PendingEntry {
    fn finish(self, udn: &str) -> Option<ListingEntry> {
        let Some(object_id) = self.root.attribute("id").map(str::to_string) else {
            warn!(udn, element = %self.root.name, "skipping DIDL-Lite entry without id");
            return None;
        };
        let parent_id = self.root.attribute("parentID").unwrap_or_default().to_string();
        let first = |name: &str| {
            self.tags
                .iter()
                .find(|t| t.name == name)
                .map(|t| t.value.clone())
        };
        Some(ListingEntry {
            udn: udn.to_string(),
            object_id,
            parent_id,
            is_container: self.is_container,
            title: first("dc:title"),
            upnp_class: first("upnp:class"),
            root: self.root,
            tags: self.tags,
        })
    }
}

fn parse_direct_children(
    udn: &str,
    raw: &str,
    entries: &mut Vec<ListingEntry>,
) -> Result<(), String> {
    let mut reader = Reader::from_str(raw);
    reader.trim_text(true);

    let mut pending: Option<PendingEntry> = None;
    // Element depth: 1 = document root, 2 = item/container, 3 = entry child
    let mut depth = 0usize;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            XmlEvent::Start(e) => {
                depth += 1;
                match depth {
                    2 => pending = start_entry(&e)?,
                    3 => {
                        if let Some(p) = pending.as_mut() {
                            p.child = Some(to_tag(&e)?);
                        }
                    }
                    _ => {}
                }
            }
            XmlEvent::Empty(e) => match depth + 1 {
                2 => {
                    if let Some(p) = start_entry(&e)? {
                        entries.extend(p.finish(udn));
                    }
                }
                3 => {
                    if let Some(p) = pending.as_mut() {
                        p.tags.push(to_tag(&e)?);
                    }
                }
                _ => {}
            },
            XmlEvent::Text(t) => {
                if let Some(child) = pending.as_mut().and_then(|p| p.child.as_mut()) {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    child.value.push_str(&text);
                }
            }
            XmlEvent::CData(c) => {
                if let Some(child) = pending.as_mut().and_then(|p| p.child.as_mut()) {
                    child.value.push_str(&String::from_utf8_lossy(&c));
                }
            }
            XmlEvent::End(_) => {
                match depth {
                    2 => {
                        if let Some(p) = pending.take() {
                            entries.extend(p.finish(udn));
                        }
                    }
                    3 => {
                        if let Some(p) = pending.as_mut() {
                            if let Some(child) = p.child.take() {
                                p.tags.push(child);
                            }
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            XmlEvent::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err("unexpected end of document".to_string());
    }
    Ok(())
}

fn start_entry(e: &BytesStart<'_>) -> Result<Option<PendingEntry>, String> {
    let is_container = match e.local_name().as_ref() {
        b"container" => true,
        b"item" => false,
        _ => return Ok(None),
    };
    Ok(Some(PendingEntry {
        root: to_tag(e)?,
        is_container,
        tags: Vec::new(),
        child: None,
    }))
}

fn to_tag(e: &BytesStart<'_>) -> Result<Tag, String> {
    let mut tag = Tag {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        ..Tag::default()
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        tag.attributes.insert(key, value.into_owned());
    }
    Ok(tag)
}
