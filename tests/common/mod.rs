//! Builds small EPUBs in memory for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// 1x1 transparent PNG.
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

pub struct Chapter {
    pub file: String,
    pub title: String,
    pub body: String,
}

/// Chapter `ch{n}.xhtml` with `chars` characters of filler text and an
/// `id="sec3"` anchor halfway through.
pub fn chapter(n: usize, chars: usize) -> Chapter {
    let filler = "lorem ipsum dolor sit amet ".repeat(chars / 27 + 1);
    let (first, second) = filler[..chars].split_at(chars / 2);
    Chapter {
        file: format!("ch{n}.xhtml"),
        title: format!("Chapter {n}"),
        body: format!(r#"<h1>Chapter {n}</h1><p>{first}</p><p id="sec3">{second}</p>"#),
    }
}

/// A complete EPUB 3 package under `OEBPS/` with an XHTML nav document.
pub struct EpubBuilder {
    title: Option<String>,
    author: Option<String>,
    chapters: Vec<Chapter>,
    images: Vec<(String, Vec<u8>)>,
    nav: bool,
}

impl EpubBuilder {
    pub fn new() -> Self {
        Self {
            title: Some("Test Book".into()),
            author: Some("A. Writer".into()),
            chapters: Vec::new(),
            images: Vec::new(),
            nav: true,
        }
    }

    pub fn untitled(mut self) -> Self {
        self.title = None;
        self.author = None;
        self
    }

    pub fn without_nav(mut self) -> Self {
        self.nav = false;
        self
    }

    pub fn chapter(mut self, chapter: Chapter) -> Self {
        self.chapters.push(chapter);
        self
    }

    /// Chapters `ch1.xhtml..=ch{count}.xhtml`, each `chars` long.
    pub fn chapters(mut self, count: usize, chars: usize) -> Self {
        for n in 1..=count {
            self.chapters.push(chapter(n, chars));
        }
        self
    }

    /// An image at `OEBPS/<path>`.
    pub fn image(mut self, path: &str, data: &[u8]) -> Self {
        self.images.push((path.to_string(), data.to_vec()));
        self
    }

    fn opf(&self) -> String {
        let mut metadata = String::new();
        if let Some(title) = &self.title {
            metadata.push_str(&format!("<dc:title>{title}</dc:title>"));
        }
        if let Some(author) = &self.author {
            metadata.push_str(&format!("<dc:creator>{author}</dc:creator>"));
        }

        let mut manifest = String::new();
        let mut spine = String::new();
        if self.nav {
            manifest.push_str(
                r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
            );
        }
        for (i, chapter) in self.chapters.iter().enumerate() {
            manifest.push_str(&format!(
                r#"<item id="c{i}" href="{}" media-type="application/xhtml+xml"/>"#,
                chapter.file
            ));
            spine.push_str(&format!(r#"<itemref idref="c{i}"/>"#));
        }
        for (i, (path, _)) in self.images.iter().enumerate() {
            manifest.push_str(&format!(
                r#"<item id="img{i}" href="{path}" media-type="image/png"/>"#
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
<metadata>{metadata}</metadata>
<manifest>{manifest}</manifest>
<spine>{spine}</spine>
</package>"#
        )
    }

    fn nav_document(&self) -> String {
        let items: String = self
            .chapters
            .iter()
            .map(|c| format!(r#"<li><a href="{}">{}</a></li>"#, c.file, c.title))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body><nav epub:type="toc"><ol>{items}</ol></nav></body></html>"#
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let options = SimpleFileOptions::default();

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();

        zip.start_file("META-INF/container.xml", options).unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
<rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#,
        )
        .unwrap();

        zip.start_file("OEBPS/content.opf", options).unwrap();
        zip.write_all(self.opf().as_bytes()).unwrap();

        if self.nav {
            zip.start_file("OEBPS/nav.xhtml", options).unwrap();
            zip.write_all(self.nav_document().as_bytes()).unwrap();
        }

        for chapter in &self.chapters {
            zip.start_file(format!("OEBPS/{}", chapter.file), options)
                .unwrap();
            let doc = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>{}</title>
<style>p {{ color: red }}</style></head>
<body>{}</body></html>"#,
                chapter.title, chapter.body
            );
            zip.write_all(doc.as_bytes()).unwrap();
        }

        for (path, data) in &self.images {
            zip.start_file(format!("OEBPS/{path}"), options).unwrap();
            zip.write_all(data).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }
}
