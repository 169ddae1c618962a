use crate::path::CanonPath;

/// The error a remote byte provider reports back through [`GetNarBytes`](crate::GetNarBytes).
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Malformed NAR: {0}")]
    MalformedArchive(String),

    #[error("Failed to read NAR.")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    pub(crate) fn malformed<S: Into<String>>(reason: S) -> IndexError {
        IndexError::MalformedArchive(reason.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("NAR file does not contain path '{0}'")]
    NotFound(CanonPath),

    #[error("Path '{0}' inside NAR file is not a directory")]
    NotADirectory(CanonPath),

    #[error("Path '{0}' inside NAR file is not a regular file")]
    NotARegularFile(CanonPath),

    #[error("Path '{0}' inside NAR file is not a symlink")]
    NotASymlink(CanonPath),

    #[error("Path '{0}' inside NAR file has no known content offset")]
    MissingContentOffset(CanonPath),

    #[error("Contents of '{path}' ({size} bytes at {offset}) lie outside the {len} byte NAR")]
    ContentOutOfBounds {
        path: CanonPath,
        offset: u64,
        size: u64,
        len: usize,
    },

    #[error("Path '{0}' inside NAR file is nested too deeply to list")]
    TooDeep(CanonPath),

    #[error("Fetching contents failed. Path: '{1}'")]
    Fetch(#[source] FetchError, CanonPath),
}

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("Invalid NAR listing: {0}")]
    Decode(String),

    #[error("NAR listing is not valid JSON.")]
    Json(#[from] serde_json::Error),
}

impl ListingError {
    pub(crate) fn decode<S: Into<String>>(reason: S) -> ListingError {
        ListingError::Decode(reason.into())
    }
}

#[cfg(feature = "mmap")]
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("Failed to open NAR file. Path: '{}'", .1.display())]
    Io(#[source] std::io::Error, std::path::PathBuf),

    #[error("Failed to index NAR file. Path: '{}'", .1.display())]
    Index(#[source] IndexError, std::path::PathBuf),
}
