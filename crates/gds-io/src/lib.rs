//! GDSII stream reading: the record codec (C1) and the stream parser (C3).
//!
//! This crate turns bytes into a [`gds_core::Library`] forest. It performs
//! no validation beyond what the grammar itself requires (malformed/protocol
//! errors abort the parse); cross-reference resolution counting and loop
//! detection are `gds-validate`'s job.

pub mod error;
pub mod parser;
pub mod records;

pub use error::GdsError;
pub use parser::{compute_library_statistics, parse_libraries, CellStatistics, ParseOptions};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use gds_core::Library;

/// Convenience wrapper around [`parser::parse_libraries`] for the common
/// case of reading a GDSII stream straight off disk.
pub fn read_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Vec<Library>, GdsError> {
    let file = File::open(path)?;
    parse_libraries(BufReader::new(file), options)
}
