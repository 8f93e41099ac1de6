//! scrollbook - continuous-scroll EPUB reader

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scrollbook::stream::{HeadlessSurface, Surface};
use scrollbook::{
    Book, BookFormat, BookRecord, BookStore, Command, JsonDirStore, ReaderConfig, ReaderEvent,
    ReaderSession, time_now_ms,
};

#[derive(Parser)]
#[command(name = "scrollbook")]
#[command(version, about = "Continuous-scroll EPUB reader", long_about = None)]
#[command(after_help = "EXAMPLES:
    scrollbook info book.epub               Show book metadata
    scrollbook toc book.epub                Print the table of contents
    scrollbook search book.epub whale       Search the full text
    scrollbook read book.epub --pages 5     Scroll through five viewports")]
struct Cli {
    /// Reader configuration file (JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show book metadata
    Info { input: PathBuf },
    /// Print the table of contents
    Toc { input: PathBuf },
    /// Search the book text
    Search {
        input: PathBuf,
        query: String,
        /// Maximum number of hits
        #[arg(short = 'n', long)]
        max: Option<usize>,
    },
    /// Read the book in a headless session, resuming from the saved position
    Read {
        input: PathBuf,
        /// Library directory for records and locations
        #[arg(long, default_value = ".scrollbook")]
        store: PathBuf,
        /// Viewports to scroll through
        #[arg(long, default_value_t = 3)]
        pages: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => match ReaderConfig::from_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ReaderConfig::default(),
    };

    let result = match cli.command {
        Cmd::Info { input } => show_info(&input),
        Cmd::Toc { input } => show_toc(&input),
        Cmd::Search { input, query, max } => run_search(&input, &query, max, &config),
        Cmd::Read {
            input,
            store,
            pages,
        } => read(&input, &store, pages, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn show_info(path: &Path) -> scrollbook::Result<()> {
    let book = Book::open(path)?;
    let meta = &book.package.metadata;

    println!("File: {}", path.display());
    println!("Title: {}", book.title());
    if !book.author().is_empty() {
        println!("Author: {}", book.author());
    }
    if let Some(language) = &meta.language {
        println!("Language: {language}");
    }
    if let Some(cover) = &book.package.cover_path {
        println!("Cover: {cover}");
    }
    match book.package.auxiliary_count() {
        0 => println!("Chapters: {}", book.chapter_count()),
        aux => println!("Chapters: {} ({aux} non-linear)", book.chapter_count()),
    }
    println!("TOC entries: {}", book.toc.len());
    Ok(())
}

fn show_toc(path: &Path) -> scrollbook::Result<()> {
    let book = Book::open(path)?;
    for entry in &book.toc {
        let indent = "  ".repeat(entry.depth);
        match &entry.fragment {
            Some(fragment) => println!(
                "{indent}{} [{}#{fragment}]",
                entry.label, entry.spine_index
            ),
            None => println!("{indent}{} [{}]", entry.label, entry.spine_index),
        }
    }
    Ok(())
}

fn run_search(
    path: &Path,
    query: &str,
    max: Option<usize>,
    config: &ReaderConfig,
) -> scrollbook::Result<()> {
    let book = Book::open(path)?;
    let hits = scrollbook::search(
        &book.archive,
        &book.package,
        query,
        max.unwrap_or(config.search_max_results),
        config.search_snippet_radius,
    );
    if hits.is_empty() {
        println!("No matches.");
    }
    for hit in hits {
        println!("[{}] {}", hit.spine_index, hit.snippet);
    }
    Ok(())
}

fn read(path: &Path, store_dir: &Path, pages: usize, config: ReaderConfig) -> scrollbook::Result<()> {
    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string());

    let mut store = JsonDirStore::open(store_dir)?;
    if store.get_record(&id)?.is_none() {
        let data = std::fs::read(path)?;
        let book = Book::from_bytes(data.clone())?;
        let mut record = BookRecord::new(&id, BookFormat::Epub, data);
        record.metadata.title = book.title().to_string();
        record.metadata.author = book.author().to_string();
        store.put_record(record)?;
    }

    let viewport = config.metrics.viewport_height;
    let surface = HeadlessSurface::new(config.metrics);
    let mut session = ReaderSession::new(Box::new(store), surface, config);
    session.load(&id, time_now_ms())?;
    print_events(&mut session);

    for _ in 0..pages {
        let top = session.surface().scroll_top() + viewport;
        session.dispatch(Command::Scrolled { top, left: 0.0 }, time_now_ms());
        print_events(&mut session);
    }

    if let Some(location) = session.current_position() {
        println!("Position: {location}");
    }
    session.dispatch(Command::Suspend, time_now_ms());
    Ok(())
}

fn print_events(session: &mut ReaderSession<HeadlessSurface>) {
    for event in session.drain_events() {
        match event {
            ReaderEvent::ChapterChanged { index, label } => {
                println!("Chapter {index}: {}", label.as_deref().unwrap_or("(untitled)"));
            }
            ReaderEvent::TocHighlight(_) => {}
            ReaderEvent::OpenExternal(url) => println!("Open: {url}"),
            ReaderEvent::LoadFailed(reason) => println!("Load failed: {reason}"),
        }
    }
}
