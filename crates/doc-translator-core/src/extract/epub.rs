use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};
use zip::ZipArchive;

use super::{Extractor, is_blank_page};
use crate::error::{Error, Result};

const CONTAINER_PATH: &str = "META-INF/container.xml";
const HTML_EXTENSIONS: [&str; 3] = [".html", ".xhtml", ".htm"];

/// Elements whose boundaries start a new line of text
const BLOCK_TAGS: [&[u8]; 20] = [
    b"p", b"div", b"br", b"h1", b"h2", b"h3", b"h4", b"h5", b"h6", b"li", b"tr", b"td", b"th",
    b"section", b"article", b"blockquote", b"pre", b"dt", b"dd", b"hr",
];
/// Elements whose text is never content
const SKIPPED_TAGS: [&[u8]; 4] = [b"head", b"script", b"style", b"title"];

/// Spine-ordered text of an EPUB package.
pub struct EpubExtractor {
    /// Entry names in archive order
    names: Vec<String>,
    entries: HashMap<String, Vec<u8>>,
}

struct ManifestItem {
    href: String,
    media_type: String,
}

impl EpubExtractor {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes.into()))
            .map_err(|e| Error::EpubRead(format!("not a zip archive: {e}")))?;

        let mut names = Vec::with_capacity(zip.len());
        let mut entries = HashMap::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| Error::EpubRead(format!("zip entry {i}: {e}")))?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            let name = file.name().to_string();
            names.push(name.clone());
            entries.insert(name, data);
        }
        Ok(Self { names, entries })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::EpubRead(format!("Failed to read file {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    /// Content documents in reading order: the OPF spine when it can be
    /// resolved, otherwise every HTML entry in archive order.
    fn content_documents(&self) -> Vec<&str> {
        match self.spine_documents() {
            Ok(docs) if !docs.is_empty() => docs,
            Ok(_) => {
                warn!("EPUB spine is empty, falling back to archive order");
                self.html_entries()
            }
            Err(e) => {
                warn!("EPUB package unreadable ({}), falling back to archive order", e);
                self.html_entries()
            }
        }
    }

    fn html_entries(&self) -> Vec<&str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|n| is_html_name(n))
            .collect()
    }

    fn spine_documents(&self) -> Result<Vec<&str>> {
        let container = self
            .entries
            .get(CONTAINER_PATH)
            .ok_or_else(|| Error::EpubRead(format!("missing {CONTAINER_PATH}")))?;
        let opf_path = rootfile_path(container)?;
        let opf = self
            .entries
            .get(&opf_path)
            .ok_or_else(|| Error::EpubRead(format!("missing package document {opf_path}")))?;

        let base = opf_path.rsplit_once('/').map_or("", |(dir, _)| dir);
        let (manifest, spine) = parse_package(opf)?;

        let mut docs = Vec::with_capacity(spine.len());
        for idref in &spine {
            let Some(item) = manifest.get(idref) else {
                debug!("Spine item {} has no manifest entry", idref);
                continue;
            };
            if !is_html_item(item) {
                continue;
            }
            let path = resolve_href(base, &item.href);
            if let Some((name, _)) = self.entries.get_key_value(&path) {
                docs.push(name.as_str());
            } else {
                debug!("Spine item {} not found in archive", path);
            }
        }
        Ok(docs)
    }
}

impl Extractor for EpubExtractor {
    fn extract(&self) -> Result<Vec<String>> {
        let docs = self.content_documents();
        let mut segments = Vec::with_capacity(docs.len());

        for name in &docs {
            let Some(bytes) = self.entries.get(*name) else {
                continue;
            };
            let text = html_to_text(bytes);
            if is_blank_page(&text) {
                debug!("Skipping blank item {}", name);
                continue;
            }
            segments.push(text);
        }

        debug!("Extracted {}/{} EPUB items", segments.len(), docs.len());
        Ok(segments)
    }
}

fn is_html_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    HTML_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_html_item(item: &ManifestItem) -> bool {
    matches!(item.media_type.as_str(), "application/xhtml+xml" | "text/html") || is_html_name(&item.href)
}

/// Join a manifest href onto the package directory, resolving `.` and `..`.
fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let href = urlencoding::decode(href).map_or_else(|_| href.to_string(), |h| h.into_owned());

    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
    for part in href.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

fn attr(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn rootfile_path(container: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(container);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attr(&e, "full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::EpubRead(format!("container.xml: {e}"))),
        }
        buf.clear();
    }
    Err(Error::EpubRead("container.xml has no rootfile".to_string()))
}

/// Manifest (id -> item) and spine (idrefs in reading order) of an OPF document.
fn parse_package(opf: &[u8]) -> Result<(HashMap<String, ManifestItem>, Vec<String>)> {
    let mut reader = Reader::from_reader(opf);
    let mut buf = Vec::new();
    let mut manifest = HashMap::new();
    let mut spine = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => {
                    if let (Some(id), Some(href)) = (attr(&e, "id"), attr(&e, "href")) {
                        let media_type = attr(&e, "media-type").unwrap_or_default();
                        manifest.insert(id, ManifestItem { href, media_type });
                    }
                }
                b"itemref" => {
                    if let Some(idref) = attr(&e, "idref") {
                        spine.push(idref);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::EpubRead(format!("package document: {e}"))),
        }
        buf.clear();
    }
    Ok((manifest, spine))
}

fn html_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "nbsp" => "\u{a0}",
        "mdash" => "—",
        "ndash" => "–",
        "hellip" => "…",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        "copy" => "©",
        "middot" => "·",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => return None,
    })
}

/// Visible text of an (X)HTML document, one line per block element.
///
/// Malformed markup ends extraction at the error; text read so far is kept.
fn html_to_text(html: &[u8]) -> String {
    let mut reader = Reader::from_reader(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;

    let mut buf = Vec::new();
    let mut out = String::new();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();
                if SKIPPED_TAGS.contains(&name.as_slice()) {
                    skip_depth += 1;
                } else if BLOCK_TAGS.contains(&name.as_slice()) {
                    out.push('\n');
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();
                if SKIPPED_TAGS.contains(&name.as_slice()) {
                    skip_depth = skip_depth.saturating_sub(1);
                } else if BLOCK_TAGS.contains(&name.as_slice()) {
                    out.push('\n');
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();
                if skip_depth == 0 && BLOCK_TAGS.contains(&name.as_slice()) {
                    out.push('\n');
                }
            }
            Ok(Event::Text(t)) if skip_depth == 0 => match t.unescape_with(html_entity) {
                Ok(text) => out.push_str(&text),
                Err(_) => out.push_str(&String::from_utf8_lossy(&t)),
            },
            Ok(Event::CData(t)) if skip_depth == 0 => out.push_str(&String::from_utf8_lossy(&t)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("HTML parse error at byte {}: {}", reader.buffer_position(), e);
                break;
            }
        }
        buf.clear();
    }

    out.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
