//! Markup-to-text stripping for search.
//!
//! A byte scanner, not an XML parser, so malformed chapters still yield
//! text. Tags are skipped and `script`/`style` content is dropped. Entities
//! are decoded; whitespace runs collapse to one space.

use memchr::{memchr, memchr2};

use crate::package::xml::resolve_entity;

/// Plain text of an (X)HTML document.
pub fn strip_markup(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len() / 2);
    let mut pos = 0;

    // Start at <body> when there is one, so the <title> does not leak in.
    if let Some(body) = find_ascii_ci(bytes, b"<body") {
        pos = body;
    }

    while pos < bytes.len() {
        let Some(rel) = memchr2(b'<', b'&', &bytes[pos..]) else {
            push_text(&mut out, &html[pos..]);
            break;
        };
        let at = pos + rel;
        push_text(&mut out, &html[pos..at]);

        if bytes[at] == b'&' {
            pos = push_entity(&mut out, html, at);
            continue;
        }

        if bytes[at..].starts_with(b"<!--") {
            pos = memchr::memmem::find(&bytes[at..], b"-->").map_or(bytes.len(), |end| at + end + 3);
            continue;
        }

        let Some(close) = memchr(b'>', &bytes[at..]) else {
            break;
        };
        let tag_end = at + close + 1;
        let name = tag_name(&bytes[at + 1..tag_end - 1]);

        pos = match name.as_slice() {
            b"script" | b"style" if !bytes[at + 1..].starts_with(b"/") => {
                skip_raw_text(bytes, tag_end, &name)
            }
            _ => tag_end,
        };
        if is_block(&name) {
            push_space(&mut out);
        }
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out
}

fn push_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            push_space(out);
        } else {
            out.push(ch);
        }
    }
}

fn push_space(out: &mut String) {
    if !out.is_empty() && !out.ends_with(' ') {
        out.push(' ');
    }
}

/// Decode the entity at `at` (which holds `&`) and return the next position.
fn push_entity(out: &mut String, html: &str, at: usize) -> usize {
    let rest = &html.as_bytes()[at + 1..];
    if let Some(semi) = memchr(b';', &rest[..rest.len().min(12)])
        && let Some(resolved) = resolve_entity(&html[at + 1..at + 1 + semi])
    {
        push_text(out, &resolved);
        return at + semi + 2;
    }
    out.push('&');
    at + 1
}

/// Lowercased element name of a tag body (without `<` and `>`).
fn tag_name(tag: &[u8]) -> Vec<u8> {
    let tag = tag.strip_prefix(b"/").unwrap_or(tag);
    let name: Vec<u8> = tag
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b':' || **b == b'-')
        .map(u8::to_ascii_lowercase)
        .collect();
    match name.iter().rposition(|&b| b == b':') {
        Some(i) => name[i + 1..].to_vec(),
        None => name,
    }
}

/// Position just past the closing tag of a raw-text element.
fn skip_raw_text(bytes: &[u8], from: usize, name: &[u8]) -> usize {
    let mut closing = b"</".to_vec();
    closing.extend_from_slice(name);
    match find_ascii_ci(&bytes[from..], &closing) {
        Some(rel) => {
            let end = from + rel;
            memchr(b'>', &bytes[end..]).map_or(bytes.len(), |gt| end + gt + 1)
        }
        None => bytes.len(),
    }
}

fn find_ascii_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

fn is_block(name: &[u8]) -> bool {
    matches!(
        name,
        b"p" | b"div"
            | b"br"
            | b"li"
            | b"h1"
            | b"h2"
            | b"h3"
            | b"h4"
            | b"h5"
            | b"h6"
            | b"tr"
            | b"td"
            | b"blockquote"
            | b"section"
            | b"pre"
    )
}
