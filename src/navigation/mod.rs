//! In-book hyperlinks and the navigation history.

mod controller;
mod link;

pub use controller::{HistoryEntry, LinkOutcome, NavigationController};
pub use link::Link;
