//! Rendering one spine item into a materializable block.
//!
//! The chapter document is reduced to its body, stripped of the publisher's
//! styling, and its images are pulled out of the archive and swapped for
//! local handles.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use super::blob::BlobStore;
use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::package::xml::{local_name, unescape};
use crate::package::{Package, is_external, parent_dir, resolve_path, split_fragment};
use crate::util::{decode_text, extract_xml_encoding, image_mime_type};

/// Elements dropped together with their content.
const DROPPED_ELEMENTS: &[&[u8]] = &[b"style", b"link", b"script", b"meta", b"head", b"title"];

/// Presentational attributes removed so the reader's typography applies.
const STRIPPED_ATTRS: &[&[u8]] = &[
    b"style",
    b"class",
    b"width",
    b"height",
    b"align",
    b"valign",
    b"bgcolor",
    b"background",
    b"color",
    b"face",
    b"size",
    b"border",
    b"cellpadding",
    b"cellspacing",
    b"hspace",
    b"vspace",
];

/// An element id and where it sits in the chapter's text flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub id: String,
    /// Characters of text preceding the element.
    pub text_offset: usize,
    /// Images preceding the element.
    pub images_before: usize,
}

/// A rendered chapter, ready to be appended or prepended to a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterBlock {
    /// Spine index.
    pub index: usize,
    /// Archive path of the chapter document.
    pub path: String,
    /// Sanitized body markup.
    pub html: String,
    /// Length of the text content, whitespace collapsed.
    pub text_len: usize,
    pub images: usize,
    pub anchors: Vec<Anchor>,
}

/// Where the engine gets chapter blocks from.
pub trait ChapterSource {
    fn chapter_count(&self) -> usize;

    /// Render spine item `index`. `None` means nothing can be materialized;
    /// the reason has already been logged.
    fn render(&mut self, index: usize) -> Option<ChapterBlock>;

    /// Called when the surface is cleared, so resources tied to the old
    /// blocks can be released.
    fn release_all(&mut self) {}
}

/// Renders chapters straight from the archive.
pub struct ChapterRenderer<'a> {
    archive: &'a Archive,
    package: &'a Package,
    blobs: &'a mut BlobStore,
}

impl<'a> ChapterRenderer<'a> {
    pub fn new(archive: &'a Archive, package: &'a Package, blobs: &'a mut BlobStore) -> Self {
        Self {
            archive,
            package,
            blobs,
        }
    }

    fn render_path(&mut self, index: usize, path: &str) -> Result<ChapterBlock> {
        let bytes = self.archive.read(path)?;
        let text = decode_text(&bytes, extract_xml_encoding(&bytes));
        let chapter = sanitize(&text);

        let base_dir = parent_dir(path);
        let targets: Vec<Option<String>> = chapter
            .images
            .iter()
            .map(|href| image_target(base_dir, href))
            .collect();
        let loaded = extract_images(self.archive, &targets);

        let mut replacements: Vec<Option<String>> = Vec::with_capacity(loaded.len());
        for (target, data) in targets.iter().zip(loaded) {
            replacements.push(match (target, data) {
                (Some(target), Some(data)) => {
                    let mime = image_mime_type(target, &data);
                    Some(self.blobs.register(mime, data))
                }
                (Some(target), None) => {
                    tracing::warn!(chapter = %path, image = %target, "image unavailable");
                    None
                }
                (None, _) => None,
            });
        }

        Ok(ChapterBlock {
            index,
            path: path.to_string(),
            html: chapter.assemble(&replacements),
            text_len: chapter.text_len,
            images: chapter.images.len(),
            anchors: chapter.anchors,
        })
    }
}

impl ChapterSource for ChapterRenderer<'_> {
    fn chapter_count(&self) -> usize {
        self.package.spine.len()
    }

    fn render(&mut self, index: usize) -> Option<ChapterBlock> {
        let path = self.package.spine.get(index)?.resolved_path.clone();
        match self.render_path(index, &path) {
            Ok(block) => {
                tracing::debug!(index, path = %path, images = block.images, "chapter rendered");
                Some(block)
            }
            Err(Error::MissingResource(_)) => {
                tracing::warn!(index, path = %path, "chapter document missing");
                None
            }
            Err(e) => {
                tracing::warn!(index, path = %path, error = %e, "chapter render failed");
                None
            }
        }
    }

    fn release_all(&mut self) {
        self.blobs.revoke_all();
    }
}

/// Archive path of an image reference, or `None` when it does not point
/// into the archive.
fn image_target(base_dir: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || is_external(href) {
        return None;
    }
    Some(resolve_path(base_dir, split_fragment(href).0))
}

/// Read every image concurrently. The result is aligned with `targets`.
fn extract_images(archive: &Archive, targets: &[Option<String>]) -> Vec<Option<Vec<u8>>> {
    if targets.iter().filter(|t| t.is_some()).count() <= 1 {
        return targets
            .iter()
            .map(|t| t.as_deref().and_then(|path| archive.read(path).ok()))
            .collect();
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                target
                    .as_deref()
                    .map(|path| scope.spawn(move || archive.read(path).ok()))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.and_then(|h| h.join().ok().flatten()))
            .collect()
    })
}

enum Segment {
    Markup(String),
    /// Value of the `n`th image reference attribute.
    ImageRef(usize),
}

/// A chapter body with image references left as holes.
struct SanitizedChapter {
    segments: Vec<Segment>,
    /// Unescaped image hrefs, in document order.
    images: Vec<String>,
    /// Raw (still escaped) image attribute values, for unresolvable images.
    raw_images: Vec<String>,
    anchors: Vec<Anchor>,
    text_len: usize,
}

impl SanitizedChapter {
    fn assemble(&self, replacements: &[Option<String>]) -> String {
        let mut html = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Markup(s) => html.push_str(s),
                Segment::ImageRef(n) => match replacements.get(*n).and_then(Option::as_deref) {
                    Some(handle) => html.push_str(&escape(handle)),
                    None => html.push_str(&self.raw_images[*n]),
                },
            }
        }
        html
    }
}

struct Sanitizer {
    segments: Vec<Segment>,
    out: String,
    images: Vec<String>,
    raw_images: Vec<String>,
    anchors: Vec<Anchor>,
    text_len: usize,
    last_was_space: bool,
}

impl Sanitizer {
    fn new() -> Self {
        Self {
            segments: Vec::new(),
            out: String::new(),
            images: Vec::new(),
            raw_images: Vec::new(),
            anchors: Vec::new(),
            text_len: 0,
            last_was_space: true,
        }
    }

    fn count_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.last_was_space {
                    self.text_len += 1;
                    self.last_was_space = true;
                }
            } else {
                self.text_len += 1;
                self.last_was_space = false;
            }
        }
    }

    fn start_tag(&mut self, e: &BytesStart<'_>, self_closing: bool) {
        let name = e.name();
        let local = local_name(name.as_ref());
        let is_img = local.eq_ignore_ascii_case(b"img");
        let is_svg_image = local == b"image";

        self.out.push('<');
        self.out.push_str(&String::from_utf8_lossy(name.as_ref()));

        for attr in e.attributes().with_checks(false).flatten() {
            let key = attr.key.as_ref();
            let key_local = local_name(key).to_ascii_lowercase();
            if STRIPPED_ATTRS.contains(&key_local.as_slice()) || key_local.starts_with(b"on") {
                continue;
            }
            let raw = String::from_utf8_lossy(&attr.value).replace('"', "&quot;");

            if key_local == b"id" && !raw.is_empty() {
                self.anchors.push(Anchor {
                    id: unescape(&raw),
                    text_offset: self.text_len,
                    images_before: self.images.len(),
                });
            }

            self.out.push(' ');
            self.out.push_str(&String::from_utf8_lossy(key));
            self.out.push_str("=\"");
            if (is_img && key_local == b"src") || (is_svg_image && key_local == b"href") {
                self.segments
                    .push(Segment::Markup(std::mem::take(&mut self.out)));
                self.segments.push(Segment::ImageRef(self.images.len()));
                self.images.push(unescape(&raw));
                self.raw_images.push(raw);
            } else {
                self.out.push_str(&raw);
            }
            self.out.push('"');
        }

        self.out.push_str(if self_closing { "/>" } else { ">" });
    }

    fn finish(mut self) -> SanitizedChapter {
        if !self.out.is_empty() {
            self.segments.push(Segment::Markup(self.out));
        }
        SanitizedChapter {
            segments: self.segments,
            images: self.images,
            raw_images: self.raw_images,
            anchors: self.anchors,
            text_len: self.text_len,
        }
    }
}

fn is_dropped(local: &[u8]) -> bool {
    DROPPED_ELEMENTS
        .iter()
        .any(|name| local.eq_ignore_ascii_case(name))
}

/// Reduce a chapter document to sanitized body markup.
///
/// Parsing is lenient: on malformed markup the content read so far is kept.
fn sanitize(content: &str) -> SanitizedChapter {
    let bytes = content.as_bytes();
    let has_body = memchr::memmem::find(bytes, b"<body").is_some()
        || memchr::memmem::find(bytes, b":body").is_some();

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut s = Sanitizer::new();
    let mut in_body = !has_body;
    let mut skip_depth = 0usize;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    position = reader.buffer_position(),
                    error = %e,
                    "malformed chapter markup, keeping partial content"
                );
                break;
            }
        };

        match event {
            Event::Start(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local.eq_ignore_ascii_case(b"body") {
                    in_body = true;
                } else if skip_depth > 0 || is_dropped(local) {
                    skip_depth += 1;
                } else if in_body {
                    s.start_tag(&e, false);
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if in_body && skip_depth == 0 && !is_dropped(local) {
                    s.start_tag(&e, true);
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local.eq_ignore_ascii_case(b"body") {
                    in_body = false;
                } else if skip_depth > 0 {
                    skip_depth -= 1;
                } else if in_body {
                    s.out.push_str("</");
                    s.out.push_str(&String::from_utf8_lossy(name.as_ref()));
                    s.out.push('>');
                }
            }
            Event::Text(e) if in_body && skip_depth == 0 => {
                let raw = String::from_utf8_lossy(e.as_ref());
                s.count_text(&raw);
                s.out.push_str(&raw);
            }
            Event::CData(e) if in_body && skip_depth == 0 => {
                let raw = String::from_utf8_lossy(e.as_ref());
                s.count_text(&raw);
                s.out.push_str(&escape(raw.as_ref()));
            }
            Event::GeneralRef(e) if in_body && skip_depth == 0 => {
                let name: Cow<'_, str> = String::from_utf8_lossy(e.as_ref());
                let resolved = crate::package::xml::resolve_entity(&name);
                s.count_text(resolved.as_deref().unwrap_or("?"));
                s.out.push('&');
                s.out.push_str(&name);
                s.out.push(';');
            }
            Event::Eof => break,
            _ => {}
        }
    }

    s.finish()
}
