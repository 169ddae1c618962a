//! JSON listings of an indexed NAR.
//!
//! A listing carries everything an index holds (types, sizes, executable
//! bits, symlink targets and content offsets) but none of the contents, so
//! it can be stored or sent next to a NAR and turned back into an accessor
//! that fetches byte ranges on demand:
//!
//! ```json
//! {"type":"directory","entries":{"hello":{"type":"regular","size":5,"executable":true,"content_offset":96}}}
//! ```
//!
//! The encoder leaves out an offset of zero and the decoder treats a missing
//! offset as unknown, so a file stored at offset 0 comes back without one.
//! That cannot happen for files indexed from a real NAR, whose contents
//! always follow a header.
//!
//! Entries may be nested [`MAX_DEPTH`] levels deep, the same as in an
//! archive. Each level takes two levels of JSON, so text listings are read
//! without `serde_json`'s default recursion limit.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::accessor::SourceAccessor;
use crate::archive::MAX_DEPTH;
use crate::error::{AccessError, ListingError};
use crate::node::{Directory, FileType, Node, RegularFile, Stat, Symlink};
use crate::path::{is_valid_segment, CanonPath};

pub const KEY_TYPE: &str = "type";
pub const KEY_ENTRIES: &str = "entries";
pub const KEY_SIZE: &str = "size";
pub const KEY_EXECUTABLE: &str = "executable";
pub const KEY_CONTENT_OFFSET: &str = "content_offset";
pub const KEY_TARGET: &str = "target";

/// Accepted in place of `content_offset`; Nix binary caches publish their
/// `.ls` listings with this key.
pub const KEY_NAR_OFFSET: &str = "narOffset";

/// JSON nesting of an entry at [`MAX_DEPTH`], counting its `entries` object.
const MAX_JSON_DEPTH: usize = 2 * MAX_DEPTH + 2;

/// Lists the entry at `path`.
///
/// With `recurse` unset, the entries of a directory are empty objects, to be
/// expanded by listing them individually later.
pub fn list_nar<A>(accessor: &A, path: &CanonPath, recurse: bool) -> Result<Value, AccessError>
where
    A: SourceAccessor + ?Sized,
{
    if path.depth() > MAX_DEPTH {
        return Err(AccessError::TooDeep(path.clone()));
    }

    let mut obj = Map::new();

    match accessor.stat(path)? {
        Stat::Regular {
            size,
            executable,
            content_offset,
        } => {
            obj.insert(KEY_TYPE.into(), FileType::Regular.as_str().into());
            obj.insert(KEY_SIZE.into(), size.into());
            if executable {
                obj.insert(KEY_EXECUTABLE.into(), true.into());
            }
            if let Some(offset) = content_offset.filter(|offset| *offset != 0) {
                obj.insert(KEY_CONTENT_OFFSET.into(), offset.into());
            }
        }
        Stat::Directory => {
            obj.insert(KEY_TYPE.into(), FileType::Directory.as_str().into());

            let mut entries = Map::new();
            for (name, _) in accessor.read_directory(path)? {
                let value = if recurse {
                    // Names come out of the index, which only holds valid segments.
                    let child = path
                        .join(&name)
                        .map_err(|_| AccessError::NotFound(path.clone()))?;
                    list_nar(accessor, &child, true)?
                } else {
                    Value::Object(Map::new())
                };
                entries.insert(name, value);
            }
            obj.insert(KEY_ENTRIES.into(), Value::Object(entries));
        }
        Stat::Symlink => {
            obj.insert(KEY_TYPE.into(), FileType::Symlink.as_str().into());
            obj.insert(KEY_TARGET.into(), accessor.read_link(path)?.into());
        }
    }

    Ok(Value::Object(obj))
}

/// Rebuilds the tree described by a listing.
///
/// Entries of an unknown type are left out. A missing `type` or `size`, or a
/// field of the wrong JSON type, fails the whole listing.
pub fn parse_listing(listing: &Value) -> Result<Node, ListingError> {
    match parse_member(listing, "/", 0)? {
        Some(root) => Ok(root),
        None => Err(ListingError::decode("listing root has an unknown type")),
    }
}

/// Reads the JSON text of a listing into a [`Value`].
pub(crate) fn read_listing(text: &str) -> Result<Value, ListingError> {
    check_nesting(text)?;

    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(&mut de)?;
    de.end()?;

    Ok(value)
}

/// Fails if arrays and objects in `text` nest deeper than any listing can.
fn check_nesting(text: &str) -> Result<(), ListingError> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for b in text.bytes() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > MAX_JSON_DEPTH {
                    return Err(ListingError::decode(format!(
                        "listing is nested more than {} levels deep",
                        MAX_DEPTH
                    )));
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    Ok(())
}

fn parse_member(value: &Value, at: &str, depth: usize) -> Result<Option<Node>, ListingError> {
    if depth > MAX_DEPTH {
        return Err(ListingError::decode(format!(
            "entry '{}' is nested more than {} levels deep",
            at, MAX_DEPTH
        )));
    }

    let obj = value
        .as_object()
        .ok_or_else(|| ListingError::decode(format!("entry '{}' is not an object", at)))?;

    let kind = obj
        .get(KEY_TYPE)
        .and_then(Value::as_str)
        .ok_or_else(|| ListingError::decode(format!("entry '{}' has no type", at)))?;

    let node = match kind {
        "directory" => Node::Directory(parse_directory(obj, at, depth)?),
        "regular" => Node::Regular(RegularFile {
            size: obj
                .get(KEY_SIZE)
                .and_then(Value::as_u64)
                .ok_or_else(|| ListingError::decode(format!("file '{}' has no size", at)))?,
            executable: optional(obj, KEY_EXECUTABLE, at, Value::as_bool)?.unwrap_or(false),
            content_offset: match optional(obj, KEY_CONTENT_OFFSET, at, Value::as_u64)? {
                Some(offset) => Some(offset),
                None => optional(obj, KEY_NAR_OFFSET, at, Value::as_u64)?,
            },
        }),
        "symlink" => Node::Symlink(Symlink {
            target: optional(obj, KEY_TARGET, at, |v| v.as_str().map(str::to_string))?
                .unwrap_or_default(),
        }),
        other => {
            tracing::warn!(path = at, kind = other, "skipping listing entry of unknown type");
            return Ok(None);
        }
    };

    Ok(Some(node))
}

fn parse_directory(
    obj: &Map<String, Value>,
    at: &str,
    depth: usize,
) -> Result<Directory, ListingError> {
    let mut dir = Directory::default();

    let entries = match obj.get(KEY_ENTRIES) {
        None | Some(Value::Null) => return Ok(dir),
        Some(Value::Object(entries)) => entries,
        Some(_) => {
            return Err(ListingError::decode(format!(
                "entries of '{}' are not an object",
                at
            )))
        }
    };

    for (name, value) in entries {
        if !is_valid_segment(name) {
            return Err(ListingError::decode(format!(
                "invalid file name '{}' in '{}'",
                name, at
            )));
        }

        let child_at = if at == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", at, name)
        };

        if let Some(child) = parse_member(value, &child_at, depth + 1)? {
            dir.entries.insert(name.clone(), child);
        }
    }

    Ok(dir)
}

/// Reads an optional field, failing if it is present with the wrong type.
fn optional<T, F>(
    obj: &Map<String, Value>,
    key: &str,
    at: &str,
    convert: F,
) -> Result<Option<T>, ListingError>
where
    F: Fn(&Value) -> Option<T>,
{
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => convert(value).map(Some).ok_or_else(|| {
            ListingError::decode(format!("field '{}' of '{}' has the wrong type", key, at))
        }),
    }
}
