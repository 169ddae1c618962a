use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntoCanonPathError {
    UnrepresentableStr,
    InvalidSegment,
}

impl std::error::Error for IntoCanonPathError {}

impl fmt::Display for IntoCanonPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl IntoCanonPathError {
    pub fn as_str(&self) -> &str {
        match self {
            IntoCanonPathError::UnrepresentableStr => "unrepresentable string found in path",
            IntoCanonPathError::InvalidSegment => {
                "path segment is empty, `.`, `..` or contains a separator"
            }
        }
    }
}
