//! EPUB 3 XHTML navigation documents.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::RawNavPoint;
use super::ncx::collapse_whitespace;
use crate::error::Result;
use crate::package::xml::{attr, local_name, resolve_entity};

struct NavBlock {
    is_toc: bool,
    points: Vec<RawNavPoint>,
}

/// Parse the table of contents of an XHTML navigation document.
///
/// Uses the `<nav epub:type="toc">` element, or the first `<nav>` when none
/// is typed. Every `<a href>` inside it becomes a point; depth follows list
/// nesting.
pub(crate) fn parse_nav_xhtml(content: &str) -> Result<Vec<RawNavPoint>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut blocks: Vec<NavBlock> = Vec::new();
    let mut nav_depth = 0usize;
    let mut list_depth = 0usize;
    let mut anchor: Option<RawNavPoint> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"nav" => {
                    if nav_depth == 0 {
                        let is_toc = attr(&e, b"type")
                            .is_some_and(|t| t.split_ascii_whitespace().any(|t| t == "toc"));
                        blocks.push(NavBlock {
                            is_toc,
                            points: Vec::new(),
                        });
                        list_depth = 0;
                    }
                    nav_depth += 1;
                }
                b"ol" | b"ul" if nav_depth > 0 => list_depth += 1,
                b"a" if nav_depth > 0 => {
                    anchor = attr(&e, b"href").map(|href| RawNavPoint {
                        label: String::new(),
                        href: href.trim().to_string(),
                        depth: list_depth.saturating_sub(1),
                    });
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(point) = anchor.as_mut() {
                    point.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(point) = anchor.as_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    point.label.push_str(&resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"nav" if nav_depth > 0 => nav_depth -= 1,
                b"ol" | b"ul" if nav_depth > 0 => list_depth = list_depth.saturating_sub(1),
                b"a" => {
                    if let Some(mut point) = anchor.take() {
                        point.label = collapse_whitespace(&point.label);
                        if !point.label.is_empty()
                            && !point.href.is_empty()
                            && let Some(block) = blocks.last_mut()
                        {
                            block.points.push(point);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let chosen = match blocks.iter().position(|b| b.is_toc) {
        Some(i) => blocks.swap_remove(i),
        None if !blocks.is_empty() => blocks.swap_remove(0),
        None => return Ok(Vec::new()),
    };
    Ok(chosen.points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nav_prefers_toc_nav() {
        let nav = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="landmarks"><ol><li><a href="cover.xhtml">Cover</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="text/ch1.xhtml">Chapter <em>One</em></a>
        <ol><li><a href="text/ch1.xhtml#s1">Section&#160;1</a></li></ol>
      </li>
      <li><a href="text/ch2.xhtml">Chapter Two</a></li>
    </ol>
  </nav>
</body>
</html>"#;

        let points = parse_nav_xhtml(nav).unwrap();
        let summary: Vec<_> = points
            .iter()
            .map(|p| (p.label.as_str(), p.href.as_str(), p.depth))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Chapter One", "text/ch1.xhtml", 0),
                ("Section 1", "text/ch1.xhtml#s1", 1),
                ("Chapter Two", "text/ch2.xhtml", 0),
            ]
        );
    }

    #[test]
    fn test_parse_nav_falls_back_to_first_nav() {
        let nav = r#"<html><body><nav><ul><li><a href="a.xhtml">A</a></li></ul></nav></body></html>"#;
        let points = parse_nav_xhtml(nav).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].href, "a.xhtml");
    }

    #[test]
    fn test_parse_nav_without_nav_element() {
        let points = parse_nav_xhtml("<html><body><p>nothing</p></body></html>").unwrap();
        assert!(points.is_empty());
    }
}
