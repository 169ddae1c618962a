use std::fmt;
use std::str::FromStr;

use relative_path::{Component, RelativePath};

mod error;

pub use self::error::IntoCanonPathError;

/// The separator between segments of a `CanonPath`, and the prefix used when
/// displaying one.
pub const PATH_SEP: &str = "/";

/// A canonical path inside an archive.
///
/// The root is the empty path. Every other path is a list of segments, each
/// non-empty, never `.` or `..`, and never containing a separator. Lookups
/// walk these segments as-is, so any cleanup of caller input happens once,
/// in [`CanonPath::new`].
#[derive(Debug, Clone, Default, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CanonPath(String);

/// Returns `true` if `name` may appear as a single segment of a `CanonPath`.
pub fn is_valid_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\0')
}

impl CanonPath {
    /// Canonicalizes `path`: leading, repeated and trailing separators are
    /// dropped, `.` is skipped and `..` removes the previous segment (or
    /// stays at the root).
    pub fn new<S: AsRef<str>>(path: S) -> Result<CanonPath, IntoCanonPathError> {
        let path = path.as_ref();

        if path.contains('\0') {
            return Err(IntoCanonPathError::UnrepresentableStr);
        }

        let mut out: Vec<&str> = vec![];

        for component in RelativePath::new(path).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                Component::Normal(segment) if segment.is_empty() => {}
                Component::Normal(segment) => out.push(segment),
            }
        }

        Ok(CanonPath(out.join(PATH_SEP)))
    }

    pub fn root() -> CanonPath {
        CanonPath(String::new())
    }

    #[inline(always)]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends a single segment.
    pub fn join(&self, name: &str) -> Result<CanonPath, IntoCanonPathError> {
        if !is_valid_segment(name) {
            return Err(IntoCanonPathError::InvalidSegment);
        }

        if self.is_root() {
            return Ok(CanonPath(name.to_string()));
        }

        Ok(CanonPath(format!("{}{}{}", self.0, PATH_SEP, name)))
    }

    pub fn parent(&self) -> Option<CanonPath> {
        if self.is_root() {
            return None;
        }

        match self.0.rfind(PATH_SEP) {
            Some(idx) => Some(CanonPath(self.0[..idx].to_string())),
            None => Some(CanonPath::root()),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.iter().last()
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    pub fn starts_with(&self, other: &CanonPath) -> bool {
        let mut ours = self.iter();
        other.iter().all(|theirs| ours.next() == Some(theirs))
    }

    /// The segments of the path, from the root down. Empty for the root.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEP).filter(|segment| !segment.is_empty())
    }
}

impl FromStr for CanonPath {
    type Err = IntoCanonPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonPath::new(s)
    }
}

impl fmt::Display for CanonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(PATH_SEP)?;
        f.write_str(&self.0)
    }
}
