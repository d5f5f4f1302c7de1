use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors surfaced to the command line. Malformed trace lines are
/// not errors; the parser skips them.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not open trace file '{path}': {source}")]
    TraceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
