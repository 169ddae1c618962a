use std::path::PathBuf;

use nar_format::path::IntoCanonPathError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot handle path `{path}`")]
    InvalidPath {
        path: String,
        #[source]
        source: IntoCanonPathError,
    },

    #[error("Cannot open NAR `{}`", .path.display())]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: nar_format::OpenError,
    },

    #[error("Cannot index NAR `{}`", .path.display())]
    IndexArchive {
        path: PathBuf,
        #[source]
        source: nar_format::IndexError,
    },

    #[error("Cannot open file `{}`", .path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot load listing `{}`", .path.display())]
    LoadListing {
        path: PathBuf,
        #[source]
        source: nar_format::ListingError,
    },

    #[error("Cannot access `{path}`")]
    Access {
        path: String,
        #[source]
        source: nar_format::AccessError,
    },

    #[error("Cannot write output")]
    WriteOutput {
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn access(path: &nar_format::CanonPath, source: nar_format::AccessError) -> Error {
        Error::Access {
            path: path.to_string(),
            source,
        }
    }
}
