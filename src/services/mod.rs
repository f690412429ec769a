//! Core services for searching, scanning and resolving files.

pub mod elements;
pub mod grep;
pub mod plumb;
pub mod resolve;
pub mod scan;

pub use elements::{LinePattern, Plan};
pub use grep::{FileFilter, GrepConfig, GrepOutcome, GrepService};
pub use plumb::{CommandOpener, NoopOpener, Opener};
pub use resolve::{resolve, EntryKind};
pub use scan::first_match;
