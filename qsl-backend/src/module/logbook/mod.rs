///! In-memory logbook
///!
///! Holds the parsed QSO collection, answers queries over it and keeps
///! it in sync with the ADIF file on disk.

pub mod types;
pub mod query;
pub mod reloader;

pub use query::normalize_callsign;
pub use reloader::LogReloader;
pub use types::{LogSnapshot, QsoLog};
