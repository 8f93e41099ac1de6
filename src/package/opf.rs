//! Container pointer and package document (OPF) parsing.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::xml::{attr, local_name, resolve_entity};
use crate::error::{Error, Result};

/// Book metadata (Dublin Core subset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub language: Option<String>,
    pub identifier: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub subjects: Vec<String>,
    pub date: Option<String>,
    pub rights: Option<String>,
}

/// A manifest `<item>` as declared, before path resolution.
#[derive(Debug, Clone)]
pub(crate) struct RawItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// A spine `<itemref>` as declared.
#[derive(Debug, Clone)]
pub(crate) struct RawItemRef {
    pub idref: String,
    pub linear: bool,
}

/// Parsed package document, in declaration order.
#[derive(Debug, Default)]
pub(crate) struct OpfData {
    pub metadata: Metadata,
    pub items: Vec<RawItem>,
    pub itemrefs: Vec<RawItemRef>,
    /// `toc` attribute of `<spine>` (EPUB 2 NCX reference).
    pub toc_id: Option<String>,
    /// `<meta name="cover" content="...">` (EPUB 2 cover reference).
    pub cover_id: Option<String>,
}

/// Find the root package document path in `META-INF/container.xml`.
pub(crate) fn parse_container(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attr(&e, b"full-path").filter(|p| !p.trim().is_empty()) {
                    return Ok(path.trim().to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::MalformedPackage(format!(
                    "container.xml is not well-formed: {e}"
                )));
            }
            _ => {}
        }
    }

    Err(Error::MalformedPackage(
        "no rootfile found in container.xml".into(),
    ))
}

/// Parse an OPF package document.
pub(crate) fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut opf = OpfData::default();
    let mut in_metadata = false;
    let mut current_element: Option<Vec<u8>> = None;
    let mut buf_text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::MalformedPackage(format!("package document: {e}")))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"metadata" => in_metadata = is_start,
                    b"title" | b"creator" | b"language" | b"identifier" | b"publisher"
                    | b"description" | b"subject" | b"date" | b"rights"
                        if in_metadata && is_start =>
                    {
                        current_element = Some(local.to_vec());
                        buf_text.clear();
                    }
                    b"item" => {
                        if let Some(id) = attr(&e, b"id").filter(|id| !id.is_empty()) {
                            opf.items.push(RawItem {
                                id,
                                href: attr(&e, b"href").unwrap_or_default(),
                                media_type: attr(&e, b"media-type").unwrap_or_default(),
                                properties: attr(&e, b"properties"),
                            });
                        }
                    }
                    b"itemref" => {
                        if let Some(idref) = attr(&e, b"idref") {
                            let linear = attr(&e, b"linear").is_none_or(|v| v != "no");
                            opf.itemrefs.push(RawItemRef { idref, linear });
                        }
                    }
                    b"spine" => opf.toc_id = attr(&e, b"toc"),
                    b"meta" => {
                        if attr(&e, b"name").as_deref() == Some("cover")
                            && let Some(content) = attr(&e, b"content").filter(|c| !c.is_empty())
                        {
                            opf.cover_id = Some(content);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current_element.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    buf_text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"metadata" {
                    in_metadata = false;
                }

                if current_element.as_deref() == Some(local) {
                    let text = buf_text.trim().to_string();
                    if !text.is_empty() {
                        store_metadata(&mut opf.metadata, local, text);
                    }
                    current_element = None;
                    buf_text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(opf)
}

fn store_metadata(metadata: &mut Metadata, element: &[u8], text: String) {
    match element {
        b"title" if metadata.title.is_none() => metadata.title = Some(text),
        b"creator" => metadata.authors.push(text),
        b"language" if metadata.language.is_none() => metadata.language = Some(text),
        b"identifier" if metadata.identifier.is_none() => metadata.identifier = Some(text),
        b"publisher" => metadata.publisher = Some(text),
        b"description" => metadata.description = Some(text),
        b"subject" => metadata.subjects.push(text),
        b"date" => metadata.date = Some(text),
        b"rights" => metadata.rights = Some(text),
        _ => {}
    }
}
