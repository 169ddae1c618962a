pub mod cat;
pub mod listing;
pub mod ls;
pub mod readlink;

pub use cat::run as cat;
pub use listing::run as listing;
pub use ls::run as ls;
pub use readlink::run as readlink;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nar_format::{CanonPath, NarIndex};

use crate::error::{Error, Result};

pub(crate) fn canon_path(path: &str) -> Result<CanonPath> {
    CanonPath::new(path).map_err(|source| Error::InvalidPath {
        path: path.to_string(),
        source,
    })
}

/// Indexes a NAR file in one streaming pass, without keeping its contents.
pub(crate) fn index_file(path: &Path) -> Result<NarIndex> {
    let file = File::open(path).map_err(|source| Error::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;

    NarIndex::from_reader(BufReader::new(file)).map_err(|source| Error::IndexArchive {
        path: path.to_path_buf(),
        source,
    })
}
