//! EPUB 2 NCX navigation maps.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::RawNavPoint;
use crate::error::Result;
use crate::package::xml::{attr, local_name, resolve_entity};

/// Parse every `navPoint` of an NCX document in document order.
///
/// Nested points are flattened, parents first, with their nesting depth.
/// Points missing a label or a `content/@src` are left out.
pub(crate) fn parse_ncx(content: &str) -> Result<Vec<RawNavPoint>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut points: Vec<RawNavPoint> = Vec::new();
    // Indices into `points` of the currently open navPoints.
    let mut open: Vec<usize> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => {
                    open.push(points.len());
                    points.push(RawNavPoint {
                        label: String::new(),
                        href: String::new(),
                        depth: open.len() - 1,
                    });
                }
                b"text" => in_text = !open.is_empty(),
                b"content" => set_src(&mut points, &open, &e),
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content" {
                    set_src(&mut points, &open, &e);
                }
            }
            Event::Text(e) => {
                if in_text && let Some(&current) = open.last() {
                    points[current]
                        .label
                        .push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_text
                    && let Some(&current) = open.last()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    points[current].label.push_str(&resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" => in_text = false,
                b"navPoint" => {
                    open.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(points
        .into_iter()
        .filter_map(|mut point| {
            point.label = collapse_whitespace(&point.label);
            (!point.label.is_empty() && !point.href.is_empty()).then_some(point)
        })
        .collect())
}

fn set_src(points: &mut [RawNavPoint], open: &[usize], e: &quick_xml::events::BytesStart<'_>) {
    if let Some(&current) = open.last()
        && points[current].href.is_empty()
        && let Some(src) = attr(e, b"src")
    {
        points[current].href = src.trim().to_string();
    }
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
