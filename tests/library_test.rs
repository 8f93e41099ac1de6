//! Package loading and on-disk persistence through the public API.

mod common;

use common::{EpubBuilder, PNG};
use scrollbook::stream::HeadlessSurface;
use scrollbook::{
    Book, BookFormat, BookRecord, BookStore, Command, Error, JsonDirStore, LocationStore,
    ReaderConfig, ReaderSession,
};
use tempfile::TempDir;

// ============================================================================
// Book loading
// ============================================================================

#[test]
fn test_book_metadata_and_toc() {
    let book = Book::from_bytes(EpubBuilder::new().chapters(4, 200).build()).unwrap();

    assert_eq!(book.title(), "Test Book");
    assert_eq!(book.author(), "A. Writer");
    assert_eq!(book.chapter_count(), 4);
    assert_eq!(book.package.spine[3].resolved_path, "OEBPS/ch4.xhtml");

    let labels: Vec<&str> = book.toc.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, ["Chapter 1", "Chapter 2", "Chapter 3", "Chapter 4"]);
    let targets: Vec<usize> = book.toc.iter().map(|e| e.spine_index).collect();
    assert_eq!(targets, [0, 1, 2, 3]);
}

#[test]
fn test_missing_metadata_and_nav_do_not_fail_the_load() {
    let book = Book::from_bytes(
        EpubBuilder::new()
            .untitled()
            .without_nav()
            .chapters(2, 100)
            .build(),
    )
    .unwrap();

    assert_eq!(book.title(), "Unknown Title");
    assert_eq!(book.author(), "Unknown Author");
    assert!(book.toc.is_empty());
    assert_eq!(book.chapter_count(), 2);
    assert!(book.cover_image().is_none());
}

#[test]
fn test_not_an_epub() {
    assert!(Book::from_bytes(b"PK\x03\x04 definitely not".to_vec()).is_err());

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.epub");
    assert!(matches!(Book::open(&path), Err(Error::Io(_))));
}

#[test]
fn test_open_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.epub");
    std::fs::write(
        &path,
        EpubBuilder::new()
            .chapters(2, 100)
            .image("cover.png", PNG)
            .build(),
    )
    .unwrap();

    let book = Book::open(&path).unwrap();
    assert_eq!(book.chapter_count(), 2);
    assert!(book.archive.contains("OEBPS/cover.png"));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_json_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        let mut record = BookRecord::new("shelf/one", BookFormat::Epub, vec![1, 2, 3]);
        record.metadata.title = "One".into();
        store.put_record(record).unwrap();
        store.put_record(BookRecord::new("two", BookFormat::Pdf, Vec::new())).unwrap();
        store.set_location("shelf/one", "3,120").unwrap();
    }

    let mut store = JsonDirStore::open(dir.path()).unwrap();
    let one = store.get_record("shelf/one").unwrap().unwrap();
    assert_eq!(one.data, vec![1, 2, 3]);
    assert_eq!(one.metadata.title, "One");
    assert_eq!(
        store.get_location("shelf/one").unwrap().as_deref(),
        Some("3,120")
    );

    let ids: Vec<String> = store
        .list_records()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, ["shelf/one", "two"]);

    store.delete_record("shelf/one").unwrap();
    assert!(store.get_record("shelf/one").unwrap().is_none());
    assert!(store.get_location("shelf/one").unwrap().is_none());
}

#[test]
fn test_reading_resumes_where_it_stopped() {
    let dir = TempDir::new().unwrap();
    let data = EpubBuilder::new().chapters(4, 6_000).build();
    let config = ReaderConfig::default();

    {
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        store
            .put_record(BookRecord::new("novel", BookFormat::Epub, data))
            .unwrap();
        let surface = HeadlessSurface::new(config.metrics);
        let mut session = ReaderSession::new(Box::new(store), surface, config.clone());
        session.load("novel", 0).unwrap();
        session.dispatch(Command::Jump(2), 1_000);
        session.dispatch(Command::Scrolled { top: 640.0, left: 0.0 }, 2_000);
        session.dispatch(Command::Suspend, 30_000);
    }

    let store = JsonDirStore::open(dir.path()).unwrap();
    let record = store.get_record("novel").unwrap().unwrap();
    assert_eq!(record.stats.progress, 0.5);
    assert_eq!(record.stats.total_time_ms, 30_000);
    assert_eq!(record.stats.last_read, Some(30_000));

    let surface = HeadlessSurface::new(config.metrics);
    let mut session = ReaderSession::new(Box::new(store), surface, config);
    session.load("novel", 40_000).unwrap();
    assert_eq!(session.window().lo(), Some(2));
    assert_eq!(session.current_position().unwrap().to_string(), "2,640");
}

#[test]
fn test_unwritable_library_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, b"x").unwrap();
    assert!(matches!(
        JsonDirStore::open(&file),
        Err(Error::StoreUnavailable(_))
    ));
}
