//! Builds a [`NarIndex`] from the events of [`parse_dump`](crate::archive::parse_dump).

use std::io::Read;

use crate::accessor::NarIndex;
use crate::archive::{parse_dump, ParseSink};
use crate::error::IndexError;
use crate::node::{Directory, Node, RegularFile, Symlink};
use crate::path::is_valid_segment;

/// Indexes a NAR while it streams through.
///
/// The indexer is both the sink for structural events and the byte source
/// the parser pulls from. Every read is counted, so when a file's size is
/// declared the count is exactly the offset of its contents.
pub struct NarIndexer<R> {
    source: R,
    pos: u64,
    root: Option<Node>,
    /// Entries that are still open, from the top-level entry down. Each one
    /// is attached to its parent when it is popped.
    parents: Vec<(String, Node)>,
}

impl<R: Read> NarIndexer<R> {
    pub fn new(source: R) -> NarIndexer<R> {
        NarIndexer {
            source,
            pos: 0,
            root: None,
            parents: vec![],
        }
    }

    /// Parses the whole of `source` and returns the index.
    pub fn index(source: R) -> Result<NarIndex, IndexError> {
        let mut indexer = NarIndexer::new(source);
        parse_dump(&mut indexer)?;
        indexer.finish()
    }

    /// Number of bytes consumed from the source so far.
    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn finish(mut self) -> Result<NarIndex, IndexError> {
        while !self.parents.is_empty() {
            self.pop_member();
        }

        let root = self
            .root
            .ok_or_else(|| IndexError::malformed("NAR file contains no entries"))?;

        tracing::debug!(bytes = self.pos, "indexed NAR");
        Ok(NarIndex::new(root))
    }

    fn create_member(&mut self, path: &str, member: Node) -> Result<(), IndexError> {
        let level = path.matches('/').count();
        while self.parents.len() > level {
            self.pop_member();
        }

        let has_parent = match self.parents.last() {
            None => level == 0,
            Some((_, parent)) => self.parents.len() == level && parent.as_directory().is_some(),
        };

        if !has_parent {
            return Err(IndexError::malformed(format!(
                "NAR file missing parent directory of path '{}'",
                path
            )));
        }

        if self.parents.is_empty() && self.root.take().is_some() {
            tracing::warn!(%path, "NAR file has more than one top-level entry; replacing it");
        }

        tracing::debug!(
            pos = format_args!("{:#x}", self.pos),
            %path,
            kind = member.file_type().as_str(),
            "indexed entry"
        );

        let name = path.rsplit('/').next().unwrap_or_default();
        if level > 0 && !is_valid_segment(name) {
            return Err(IndexError::malformed(format!(
                "invalid file name in path '{}'",
                path
            )));
        }

        self.parents.push((name.to_string(), member));
        Ok(())
    }

    fn pop_member(&mut self) {
        let (name, member) = match self.parents.pop() {
            Some(v) => v,
            None => return,
        };

        match self.parents.last_mut() {
            Some((_, parent)) => {
                if let Some(dir) = parent.as_directory_mut() {
                    dir.entries.entry(name).or_insert(member);
                }
            }
            None => self.root = Some(member),
        }
    }

    fn current_file(&mut self, event: &str) -> Result<&mut RegularFile, IndexError> {
        self.parents
            .last_mut()
            .and_then(|(_, member)| member.as_regular_mut())
            .ok_or_else(|| {
                IndexError::malformed(format!("'{}' outside of a regular file", event))
            })
    }
}

impl<R: Read> ParseSink for NarIndexer<R> {
    fn enter_directory(&mut self, path: &str) -> Result<(), IndexError> {
        self.create_member(path, Node::Directory(Directory::default()))
    }

    fn enter_regular_file(&mut self, path: &str) -> Result<(), IndexError> {
        self.create_member(path, Node::Regular(RegularFile::default()))
    }

    fn mark_executable(&mut self) -> Result<(), IndexError> {
        self.current_file("executable")?.executable = true;
        Ok(())
    }

    fn declare_content_size(&mut self, size: u64) -> Result<(), IndexError> {
        let pos = self.pos;
        let file = self.current_file("contents")?;
        file.size = size;
        file.content_offset = Some(pos);
        Ok(())
    }

    fn enter_symlink(&mut self, path: &str, target: &str) -> Result<(), IndexError> {
        self.create_member(
            path,
            Node::Symlink(Symlink {
                target: target.to_string(),
            }),
        )
    }
}

impl<R: Read> Read for NarIndexer<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.source.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Stat;
    use crate::path::CanonPath;
    use crate::SourceAccessor;

    fn path(s: &str) -> CanonPath {
        CanonPath::new(s).unwrap()
    }

    fn skip<R: Read>(indexer: &mut NarIndexer<R>, n: usize) {
        let mut buf = vec![0u8; n];
        indexer.read_exact(&mut buf).unwrap();
    }

    #[test]
    fn offsets_follow_reads() {
        let mut indexer = NarIndexer::new(&b"xxxxxhiyyyy!"[..]);
        skip(&mut indexer, 5);
        indexer.enter_directory("").unwrap();
        indexer.enter_regular_file("/a").unwrap();
        indexer.declare_content_size(2).unwrap();
        skip(&mut indexer, 2);
        indexer.enter_directory("/d").unwrap();
        skip(&mut indexer, 4);
        indexer.enter_regular_file("/d/x").unwrap();
        indexer.mark_executable().unwrap();
        indexer.declare_content_size(1).unwrap();
        assert_eq!(indexer.position(), 11);
        let index = indexer.finish().unwrap();

        assert_eq!(
            index.maybe_stat(&path("/a")),
            Some(Stat::Regular {
                size: 2,
                executable: false,
                content_offset: Some(5),
            })
        );
        assert_eq!(
            index.maybe_stat(&path("/d/x")),
            Some(Stat::Regular {
                size: 1,
                executable: true,
                content_offset: Some(11),
            })
        );
        assert_eq!(index.maybe_stat(&path("/d")), Some(Stat::Directory));
    }

    #[test]
    fn child_before_parent() {
        let mut indexer = NarIndexer::new(std::io::empty());
        let result = indexer.enter_regular_file("/a/b");
        assert!(matches!(result, Err(IndexError::MalformedArchive(_))));
    }

    #[test]
    fn child_of_regular_file() {
        let mut indexer = NarIndexer::new(std::io::empty());
        indexer.enter_directory("").unwrap();
        indexer.enter_regular_file("/a").unwrap();
        indexer.declare_content_size(0).unwrap();
        let result = indexer.enter_symlink("/a/b", "target");
        assert!(matches!(result, Err(IndexError::MalformedArchive(_))));
    }

    #[test]
    fn skipped_level() {
        let mut indexer = NarIndexer::new(std::io::empty());
        indexer.enter_directory("").unwrap();
        let result = indexer.enter_directory("/a/b");
        assert!(matches!(result, Err(IndexError::MalformedArchive(_))));
    }

    #[test]
    fn invalid_names() {
        let mut indexer = NarIndexer::new(std::io::empty());
        indexer.enter_directory("").unwrap();
        for bad in &["/", "/.", "/.."] {
            assert!(matches!(
                indexer.enter_directory(bad),
                Err(IndexError::MalformedArchive(_))
            ));
        }
    }

    #[test]
    fn executable_outside_file() {
        let mut indexer = NarIndexer::new(std::io::empty());
        indexer.enter_directory("").unwrap();
        assert!(matches!(
            indexer.mark_executable(),
            Err(IndexError::MalformedArchive(_))
        ));
        assert!(matches!(
            indexer.declare_content_size(3),
            Err(IndexError::MalformedArchive(_))
        ));
    }

    #[test]
    fn top_level_file_is_root() {
        let mut indexer = NarIndexer::new(std::io::empty());
        indexer.enter_regular_file("").unwrap();
        indexer.declare_content_size(0).unwrap();
        let index = indexer.finish().unwrap();
        assert_eq!(
            index.maybe_stat(&CanonPath::root()),
            Some(Stat::Regular {
                size: 0,
                executable: false,
                content_offset: Some(0),
            })
        );
        assert_eq!(index.maybe_stat(&path("/anything")), None);
    }

    #[test]
    fn no_entries() {
        let indexer = NarIndexer::new(std::io::empty());
        assert!(matches!(
            indexer.finish(),
            Err(IndexError::MalformedArchive(_))
        ));
    }

    #[test]
    fn siblings_after_deep_entries() {
        let mut indexer = NarIndexer::new(std::io::empty());
        indexer.enter_directory("").unwrap();
        indexer.enter_directory("/a").unwrap();
        indexer.enter_directory("/a/b").unwrap();
        indexer.enter_symlink("/a/b/c", "x").unwrap();
        indexer.enter_symlink("/z", "y").unwrap();
        let index = indexer.finish().unwrap();

        let root: Vec<_> = index
            .read_directory(&CanonPath::root())
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(root, vec!["a", "z"]);
        assert_eq!(index.read_link(&path("/a/b/c")).unwrap(), "x");
        assert_eq!(index.read_link(&path("/z")).unwrap(), "y");
    }
}
