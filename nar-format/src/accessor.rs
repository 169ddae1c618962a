use std::borrow::Cow;
use std::convert::TryFrom;
use std::fmt;
use std::io::Read;

use crate::error::{AccessError, FetchError, IndexError, ListingError};
use crate::indexer::NarIndexer;
use crate::listing::{parse_listing, read_listing};
use crate::node::{DirEntries, Node, Stat};
use crate::path::CanonPath;

/// Fetches `length` bytes starting at `offset` of a NAR that is not held
/// locally. Must return exactly `length` bytes or fail.
pub type GetNarBytes = Box<dyn Fn(u64, u64) -> Result<Vec<u8>, FetchError> + Send + Sync>;

/// Read-only queries over the structure of an archive.
pub trait SourceAccessor {
    /// Resolves `path`, or returns `None` if it does not exist or passes
    /// through something that is not a directory.
    fn maybe_stat(&self, path: &CanonPath) -> Option<Stat>;

    fn read_directory(&self, path: &CanonPath) -> Result<DirEntries, AccessError>;

    fn read_link(&self, path: &CanonPath) -> Result<String, AccessError>;

    fn stat(&self, path: &CanonPath) -> Result<Stat, AccessError> {
        self.maybe_stat(path)
            .ok_or_else(|| AccessError::NotFound(path.clone()))
    }
}

/// The structure of a NAR, without its contents.
///
/// This is all that is left after indexing a stream that cannot be read
/// again, so it answers listing queries only. Use [`NarAccessor`] to read
/// file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarIndex {
    root: Node,
}

impl NarIndex {
    pub fn new(root: Node) -> NarIndex {
        NarIndex { root }
    }

    /// Indexes a NAR streamed from `source`. The bytes are read once and
    /// discarded.
    pub fn from_reader<R: Read>(source: R) -> Result<NarIndex, IndexError> {
        NarIndexer::index(source)
    }

    #[inline(always)]
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn find(&self, path: &CanonPath) -> Option<&Node> {
        let mut current = &self.root;

        for segment in path.iter() {
            current = match current {
                Node::Directory(dir) => dir.entries.get(segment)?,
                _ => {
                    tracing::trace!(%path, %segment, "lookup passes through a non-directory");
                    return None;
                }
            };
        }

        Some(current)
    }

    pub fn get(&self, path: &CanonPath) -> Result<&Node, AccessError> {
        self.find(path)
            .ok_or_else(|| AccessError::NotFound(path.clone()))
    }
}

impl SourceAccessor for NarIndex {
    fn maybe_stat(&self, path: &CanonPath) -> Option<Stat> {
        self.find(path).map(Node::stat)
    }

    fn read_directory(&self, path: &CanonPath) -> Result<DirEntries, AccessError> {
        let dir = self
            .get(path)?
            .as_directory()
            .ok_or_else(|| AccessError::NotADirectory(path.clone()))?;

        Ok(dir.entries.keys().map(|name| (name.clone(), None)).collect())
    }

    fn read_link(&self, path: &CanonPath) -> Result<String, AccessError> {
        self.get(path)?
            .as_symlink()
            .map(|link| link.target.clone())
            .ok_or_else(|| AccessError::NotASymlink(path.clone()))
    }
}

/// Where a [`NarAccessor`] gets file contents from.
pub enum Contents {
    /// The whole NAR, in memory.
    Owned(Vec<u8>),

    /// The whole NAR, mapped from a file.
    #[cfg(feature = "mmap")]
    Mapped(memmap2::Mmap),

    /// Byte ranges fetched on demand.
    Remote(GetNarBytes),
}

impl Contents {
    pub fn remote<F>(get_nar_bytes: F) -> Contents
    where
        F: Fn(u64, u64) -> Result<Vec<u8>, FetchError> + Send + Sync + 'static,
    {
        Contents::Remote(Box::new(get_nar_bytes))
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Contents::Owned(nar) => Some(nar.as_slice()),
            #[cfg(feature = "mmap")]
            Contents::Mapped(map) => Some(&map[..]),
            Contents::Remote(_) => None,
        }
    }
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Owned(nar) => f.debug_tuple("Owned").field(&nar.len()).finish(),
            #[cfg(feature = "mmap")]
            Contents::Mapped(map) => f.debug_tuple("Mapped").field(&map.len()).finish(),
            Contents::Remote(_) => f.write_str("Remote"),
        }
    }
}

/// An index of a NAR together with a way to read file contents.
#[derive(Debug)]
pub struct NarAccessor {
    index: NarIndex,
    contents: Contents,
}

impl NarAccessor {
    pub fn new(index: NarIndex, contents: Contents) -> NarAccessor {
        NarAccessor { index, contents }
    }

    /// Indexes an in-memory NAR and keeps it for reading contents.
    pub fn from_bytes(nar: Vec<u8>) -> Result<NarAccessor, IndexError> {
        let index = NarIndex::from_reader(nar.as_slice())?;
        Ok(NarAccessor::new(index, Contents::Owned(nar)))
    }

    /// Maps a NAR file into memory, indexes it and keeps the mapping for
    /// reading contents.
    #[cfg(feature = "mmap")]
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<NarAccessor, crate::OpenError> {
        use crate::OpenError;

        let path = path.as_ref();
        let file =
            std::fs::File::open(path).map_err(|e| OpenError::Io(e, path.to_path_buf()))?;
        // The mapping is only sound while nobody truncates the file underneath us.
        let map = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| OpenError::Io(e, path.to_path_buf()))?;
        let index =
            NarIndex::from_reader(&map[..]).map_err(|e| OpenError::Index(e, path.to_path_buf()))?;

        Ok(NarAccessor::new(index, Contents::Mapped(map)))
    }

    /// Rebuilds an accessor from a JSON listing. Contents are fetched
    /// through `get_nar_bytes` by offset and length.
    pub fn from_listing<F>(listing: &str, get_nar_bytes: F) -> Result<NarAccessor, ListingError>
    where
        F: Fn(u64, u64) -> Result<Vec<u8>, FetchError> + Send + Sync + 'static,
    {
        let value = read_listing(listing)?;
        NarAccessor::from_listing_value(&value, get_nar_bytes)
    }

    pub fn from_listing_value<F>(
        listing: &serde_json::Value,
        get_nar_bytes: F,
    ) -> Result<NarAccessor, ListingError>
    where
        F: Fn(u64, u64) -> Result<Vec<u8>, FetchError> + Send + Sync + 'static,
    {
        let root = parse_listing(listing)?;
        Ok(NarAccessor::new(
            NarIndex::new(root),
            Contents::remote(get_nar_bytes),
        ))
    }

    #[inline(always)]
    pub fn index(&self) -> &NarIndex {
        &self.index
    }

    /// Returns the contents of the regular file at `path`.
    ///
    /// Local NARs are borrowed from; remote ones are fetched with a single
    /// call, without caching or retrying.
    pub fn read_file(&self, path: &CanonPath) -> Result<Cow<'_, [u8]>, AccessError> {
        let file = self
            .index
            .get(path)?
            .as_regular()
            .ok_or_else(|| AccessError::NotARegularFile(path.clone()))?;

        let offset = file
            .content_offset
            .ok_or_else(|| AccessError::MissingContentOffset(path.clone()))?;

        match &self.contents {
            Contents::Remote(get_nar_bytes) => {
                let data = get_nar_bytes(offset, file.size)
                    .map_err(|e| AccessError::Fetch(e, path.clone()))?;
                if data.len() as u64 != file.size {
                    tracing::warn!(
                        %path,
                        offset,
                        expected = file.size,
                        received = data.len(),
                        "fetched contents have the wrong length"
                    );
                }
                Ok(Cow::Owned(data))
            }
            contents => {
                let nar = contents.as_bytes().unwrap_or_default();
                let out_of_bounds = || AccessError::ContentOutOfBounds {
                    path: path.clone(),
                    offset,
                    size: file.size,
                    len: nar.len(),
                };

                let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
                let end = offset
                    .checked_add(file.size)
                    .and_then(|end| usize::try_from(end).ok())
                    .ok_or_else(out_of_bounds)?;

                nar.get(start..end)
                    .map(Cow::Borrowed)
                    .ok_or_else(out_of_bounds)
            }
        }
    }
}

impl SourceAccessor for NarAccessor {
    #[inline(always)]
    fn maybe_stat(&self, path: &CanonPath) -> Option<Stat> {
        self.index.maybe_stat(path)
    }

    #[inline(always)]
    fn read_directory(&self, path: &CanonPath) -> Result<DirEntries, AccessError> {
        self.index.read_directory(path)
    }

    #[inline(always)]
    fn read_link(&self, path: &CanonPath) -> Result<String, AccessError> {
        self.index.read_link(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Directory, RegularFile, Symlink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn path(s: &str) -> CanonPath {
        CanonPath::new(s).unwrap()
    }

    fn sample_root() -> Node {
        let mut bin = Directory::default();
        bin.entries.insert(
            "hello".into(),
            Node::Regular(RegularFile {
                size: 5,
                executable: true,
                content_offset: Some(3),
            }),
        );

        let mut root = Directory::default();
        root.entries.insert("bin".into(), Node::Directory(bin));
        root.entries.insert(
            "link".into(),
            Node::Symlink(Symlink {
                target: "bin/hello".into(),
            }),
        );
        root.entries.insert(
            "orphan".into(),
            Node::Regular(RegularFile {
                size: 1,
                executable: false,
                content_offset: None,
            }),
        );
        Node::Directory(root)
    }

    #[test]
    fn lookup_through_file_is_none() {
        let index = NarIndex::new(sample_root());
        assert_eq!(index.maybe_stat(&path("/bin/hello/nope")), None);
        assert_eq!(index.maybe_stat(&path("/link/hello")), None);
        assert_eq!(index.maybe_stat(&path("/BIN")), None);
        assert!(matches!(
            index.stat(&path("/missing")),
            Err(AccessError::NotFound(_))
        ));
    }

    #[test]
    fn owned_contents() {
        let accessor = NarAccessor::new(
            NarIndex::new(sample_root()),
            Contents::Owned(b"...hello...".to_vec()),
        );
        let data = accessor.read_file(&path("/bin/hello")).unwrap();
        assert!(matches!(data, Cow::Borrowed(_)));
        assert_eq!(&*data, b"hello");
    }

    #[test]
    fn owned_contents_out_of_bounds() {
        let accessor = NarAccessor::new(
            NarIndex::new(sample_root()),
            Contents::Owned(b"...hel".to_vec()),
        );
        assert!(matches!(
            accessor.read_file(&path("/bin/hello")),
            Err(AccessError::ContentOutOfBounds { offset: 3, size: 5, len: 6, .. })
        ));
    }

    #[test]
    fn remote_contents_called_once_per_read() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let accessor = NarAccessor::new(
            NarIndex::new(sample_root()),
            Contents::remote(move |offset, length| {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!((offset, length), (3, 5));
                Ok(b"HELLO".to_vec())
            }),
        );

        assert_eq!(&*accessor.read_file(&path("/bin/hello")).unwrap(), b"HELLO");
        assert_eq!(&*accessor.read_file(&path("/bin/hello")).unwrap(), b"HELLO");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remote_failure_is_propagated() {
        let accessor = NarAccessor::new(
            NarIndex::new(sample_root()),
            Contents::remote(|_, _| Err("connection reset".into())),
        );
        match accessor.read_file(&path("/bin/hello")) {
            Err(AccessError::Fetch(source, at)) => {
                assert_eq!(source.to_string(), "connection reset");
                assert_eq!(at, path("/bin/hello"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_offset() {
        let accessor = NarAccessor::new(
            NarIndex::new(sample_root()),
            Contents::remote(|_, _| panic!("must not fetch without an offset")),
        );
        assert!(matches!(
            accessor.read_file(&path("/orphan")),
            Err(AccessError::MissingContentOffset(_))
        ));
    }

    #[test]
    fn type_mismatches() {
        let accessor = NarAccessor::new(
            NarIndex::new(sample_root()),
            Contents::Owned(vec![]),
        );
        assert!(matches!(
            accessor.read_directory(&path("/link")),
            Err(AccessError::NotADirectory(_))
        ));
        assert!(matches!(
            accessor.read_file(&path("/bin")),
            Err(AccessError::NotARegularFile(_))
        ));
        assert!(matches!(
            accessor.read_link(&path("/bin/hello")),
            Err(AccessError::NotASymlink(_))
        ));
        assert!(matches!(
            accessor.read_file(&path("/nope")),
            Err(AccessError::NotFound(_))
        ));
    }

    #[test]
    fn accessor_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NarIndex>();
        assert_send_sync::<NarAccessor>();
    }
}
