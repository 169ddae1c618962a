use std::collections::BTreeMap;

/// One entry of an indexed archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Regular(RegularFile),
    Directory(Directory),
    Symlink(Symlink),
}

impl Node {
    #[inline(always)]
    pub fn as_regular(&self) -> Option<&RegularFile> {
        match self {
            Node::Regular(file) => Some(file),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Node::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_symlink(&self) -> Option<&Symlink> {
        match self {
            Node::Symlink(link) => Some(link),
            _ => None,
        }
    }

    #[inline(always)]
    pub(crate) fn as_regular_mut(&mut self) -> Option<&mut RegularFile> {
        match self {
            Node::Regular(file) => Some(file),
            _ => None,
        }
    }

    #[inline(always)]
    pub(crate) fn as_directory_mut(&mut self) -> Option<&mut Directory> {
        match self {
            Node::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn file_type(&self) -> FileType {
        match self {
            Node::Regular(_) => FileType::Regular,
            Node::Directory(_) => FileType::Directory,
            Node::Symlink(_) => FileType::Symlink,
        }
    }

    pub fn stat(&self) -> Stat {
        match self {
            Node::Regular(file) => Stat::Regular {
                size: file.size,
                executable: file.executable,
                content_offset: file.content_offset,
            },
            Node::Directory(_) => Stat::Directory,
            Node::Symlink(_) => Stat::Symlink,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegularFile {
    /// Length of the contents in bytes.
    pub size: u64,

    pub executable: bool,

    /// Where the contents start, counted in bytes from the beginning of the
    /// NAR. `None` when the node came from a listing that did not carry one.
    pub content_offset: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    /// Children keyed by their name. A name is never empty, never `.` or `..`,
    /// and never contains a `/`.
    pub entries: BTreeMap<String, Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Symlink {
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
}

impl FileType {
    /// The name used for this type in NAR listings.
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Regular => "regular",
            FileType::Directory => "directory",
            FileType::Symlink => "symlink",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Regular {
        size: u64,
        executable: bool,
        content_offset: Option<u64>,
    },
    Directory,
    Symlink,
}

impl Stat {
    #[inline(always)]
    pub fn file_type(&self) -> FileType {
        match self {
            Stat::Regular { .. } => FileType::Regular,
            Stat::Directory => FileType::Directory,
            Stat::Symlink => FileType::Symlink,
        }
    }
}

/// Names of a directory's children. The type slot is left unpopulated; stat
/// the child to learn what it is.
pub type DirEntries = BTreeMap<String, Option<FileType>>;
