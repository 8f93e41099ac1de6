//! Archive path resolution.
//!
//! Every component that turns a relative `href` into an archive entry name
//! goes through [`resolve_path`], so that a link, a navigation target and a
//! spine item pointing at the same file always agree on its name.

/// Resolve `href` against the directory `base_dir`.
///
/// Segments are resolved with a stack: `.` and empty segments are ignored,
/// `..` pops one segment (never above the archive root) and anything else is
/// pushed. An `href` starting with `/` is resolved from the archive root.
/// A fragment, if present, must be split off by the caller first.
///
/// ```
/// use scrollbook::package::resolve_path;
///
/// assert_eq!(resolve_path("OEBPS/text", "../images/a.png"), "OEBPS/images/a.png");
/// assert_eq!(resolve_path("", "./ch1.xhtml"), "ch1.xhtml");
/// ```
pub fn resolve_path(base_dir: &str, href: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();

    let (base, relative) = match href.strip_prefix('/') {
        Some(rest) => ("", rest),
        None => (base_dir, href),
    };

    for segment in base.split('/').chain(relative.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            name => stack.push(name),
        }
    }

    stack.join("/")
}

/// Directory part of an archive path (`"OEBPS/text/ch1.xhtml"` → `"OEBPS/text"`).
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Split an href into its path and optional fragment.
///
/// An empty fragment (`"ch1.xhtml#"`) is treated as absent.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) if !fragment.is_empty() => (path, Some(fragment)),
        Some((path, _)) => (path, None),
        None => (href, None),
    }
}

/// Whether `href` points outside the book (a URL with a scheme).
pub fn is_external(href: &str) -> bool {
    let href = href.trim();
    if href.contains("://") {
        return true;
    }
    ["mailto:", "tel:", "data:", "javascript:"]
        .iter()
        .any(|scheme| {
            href.get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_sibling() {
        assert_eq!(resolve_path("OEBPS", "ch1.xhtml"), "OEBPS/ch1.xhtml");
        assert_eq!(resolve_path("", "ch1.xhtml"), "ch1.xhtml");
    }

    #[test]
    fn test_resolve_parent_directory() {
        assert_eq!(
            resolve_path("OEBPS/text", "../styles/main.css"),
            "OEBPS/styles/main.css"
        );
        assert_eq!(resolve_path("a/b/c", "../../x.png"), "a/x.png");
    }

    #[test]
    fn test_resolve_dot_segments_ignored() {
        assert_eq!(resolve_path("OEBPS/./text", "./a/./b.xhtml"), "OEBPS/text/a/b.xhtml");
    }

    #[test]
    fn test_resolve_never_climbs_above_root() {
        assert_eq!(resolve_path("OEBPS", "../../../cover.jpg"), "cover.jpg");
    }

    #[test]
    fn test_resolve_rooted_href_ignores_base() {
        assert_eq!(resolve_path("OEBPS/text", "/images/a.png"), "images/a.png");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("OEBPS/text/ch1.xhtml"), "OEBPS/text");
        assert_eq!(parent_dir("content.opf"), "");
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("ch2.xhtml#sec3"), ("ch2.xhtml", Some("sec3")));
        assert_eq!(split_fragment("#note"), ("", Some("note")));
        assert_eq!(split_fragment("ch2.xhtml"), ("ch2.xhtml", None));
        assert_eq!(split_fragment("ch2.xhtml#"), ("ch2.xhtml", None));
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("https://example.com"));
        assert!(is_external("MAILTO:me@example.com"));
        assert!(is_external("ftp://host/file"));
        assert!(!is_external("ch2.xhtml#sec"));
        assert!(!is_external("#note"));
    }
}
