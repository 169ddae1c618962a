//! Random-access index over Nix archives (NAR).
//!
//! A NAR is indexed once as it streams past, recording where each file's
//! contents start instead of copying them. The index answers stat, list,
//! read-link and read-file queries, and can be exported as a JSON listing
//! that a peer turns back into an accessor fetching byte ranges on demand.

mod accessor;
pub mod archive;
mod error;
mod indexer;
pub mod listing;
mod node;
pub mod path;

pub use accessor::{Contents, GetNarBytes, NarAccessor, NarIndex, SourceAccessor};
pub use archive::{parse_dump, ParseSink};
pub use error::{AccessError, FetchError, IndexError, ListingError};
#[cfg(feature = "mmap")]
pub use error::OpenError;
pub use indexer::NarIndexer;
pub use listing::{list_nar, parse_listing};
pub use node::{DirEntries, Directory, FileType, Node, RegularFile, Stat, Symlink};
pub use path::CanonPath;
