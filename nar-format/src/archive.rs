//! Push parser for the `nix-archive-1` format.
//!
//! A NAR is a sequence of strings. Each string is a little-endian `u64`
//! length, the bytes, and zero padding up to the next multiple of 8. File
//! contents are encoded the same way, so their start can be recorded and
//! read back later as a plain byte range.
//!
//! ```text
//! nar       = "nix-archive-1" node
//! node      = "(" "type" ( regular | directory | symlink ) ")"
//! regular   = "regular" [ "executable" "" ] "contents" <contents>
//! directory = "directory" { "entry" "(" "name" <name> "node" node ")" }
//! symlink   = "symlink" "target" <target>
//! ```

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::IndexError;
use crate::path::is_valid_segment;

pub const NAR_VERSION_MAGIC: &str = "nix-archive-1";

/// Deepest level an entry may sit at, counting the top-level entry as 0.
/// Listings share the limit, so every indexed archive can be listed and
/// read back.
pub const MAX_DEPTH: usize = 256;

const MAX_TAG_LEN: u64 = 64;
const MAX_NAME_LEN: u64 = 4096;
const CHUNK_LEN: usize = 64 * 1024;

/// Receives the structure of an archive as it is parsed.
///
/// Paths are `""` for the top-level entry and `/a/b` below it, so the number
/// of `/` in a path is its depth. Events arrive depth-first, a parent before
/// any of its children, siblings in archive order.
pub trait ParseSink {
    fn enter_directory(&mut self, path: &str) -> Result<(), IndexError>;

    fn enter_regular_file(&mut self, path: &str) -> Result<(), IndexError>;

    /// Marks the regular file entered last as executable.
    fn mark_executable(&mut self) -> Result<(), IndexError>;

    /// Announces the size of the regular file entered last. Its contents are
    /// the next `size` bytes read from the source.
    fn declare_content_size(&mut self, size: u64) -> Result<(), IndexError>;

    fn receive_contents(&mut self, _data: &[u8]) -> Result<(), IndexError> {
        Ok(())
    }

    fn close_regular_file(&mut self) -> Result<(), IndexError> {
        Ok(())
    }

    fn enter_symlink(&mut self, path: &str, target: &str) -> Result<(), IndexError>;
}

/// Parses a complete NAR, pulling bytes from `sink` itself and pushing the
/// structure back into it.
pub fn parse_dump<S: ParseSink + Read>(sink: &mut S) -> Result<(), IndexError> {
    let magic = read_bytes(sink, MAX_TAG_LEN)?;
    if magic != NAR_VERSION_MAGIC.as_bytes() {
        return Err(IndexError::malformed("input is not a Nix archive"));
    }

    parse_node(sink, "", 0)
}

fn parse_node<S: ParseSink + Read>(
    sink: &mut S,
    path: &str,
    depth: usize,
) -> Result<(), IndexError> {
    expect_tag(sink, "(")?;
    expect_tag(sink, "type")?;

    let kind = read_tag(sink)?;
    match kind.as_str() {
        "regular" => parse_regular(sink, path)?,
        "directory" => parse_directory(sink, path, depth)?,
        "symlink" => {
            expect_tag(sink, "target")?;
            let target = read_string(sink, MAX_NAME_LEN)?;
            sink.enter_symlink(path, &target)?;
            expect_tag(sink, ")")?;
        }
        other => {
            return Err(IndexError::malformed(format!(
                "unknown file type '{}' at '{}'",
                other, path
            )))
        }
    }

    Ok(())
}

fn parse_regular<S: ParseSink + Read>(sink: &mut S, path: &str) -> Result<(), IndexError> {
    sink.enter_regular_file(path)?;

    let mut tag = read_tag(sink)?;
    if tag == "executable" {
        if !read_bytes(sink, 0)?.is_empty() {
            return Err(IndexError::malformed("executable marker must be empty"));
        }
        sink.mark_executable()?;
        tag = read_tag(sink)?;
    }

    if tag != "contents" {
        return Err(IndexError::malformed(format!(
            "expected 'contents' at '{}', found '{}'",
            path, tag
        )));
    }

    let size = sink.read_u64::<LittleEndian>()?;
    sink.declare_content_size(size)?;

    let mut buf = vec![0u8; CHUNK_LEN];
    let mut left = size;
    while left > 0 {
        let n = std::cmp::min(left, CHUNK_LEN as u64) as usize;
        sink.read_exact(&mut buf[..n])?;
        sink.receive_contents(&buf[..n])?;
        left -= n as u64;
    }
    read_padding(sink, size)?;

    sink.close_regular_file()?;
    expect_tag(sink, ")")
}

fn parse_directory<S: ParseSink + Read>(
    sink: &mut S,
    path: &str,
    depth: usize,
) -> Result<(), IndexError> {
    sink.enter_directory(path)?;

    let mut prev_name: Option<String> = None;

    loop {
        let tag = read_tag(sink)?;
        match tag.as_str() {
            ")" => return Ok(()),
            "entry" => {}
            other => {
                return Err(IndexError::malformed(format!(
                    "expected 'entry' or ')' in directory '{}', found '{}'",
                    path, other
                )))
            }
        }

        expect_tag(sink, "(")?;
        expect_tag(sink, "name")?;
        let name = read_string(sink, MAX_NAME_LEN)?;

        if !is_valid_segment(&name) {
            return Err(IndexError::malformed(format!(
                "invalid file name '{}' in directory '{}'",
                name, path
            )));
        }

        if let Some(prev) = &prev_name {
            if name.as_str() <= prev.as_str() {
                return Err(IndexError::malformed(format!(
                    "file name '{}' in directory '{}' is not in order",
                    name, path
                )));
            }
        }

        if depth >= MAX_DEPTH {
            return Err(IndexError::malformed(format!(
                "directory '{}' is nested more than {} levels deep",
                path, MAX_DEPTH
            )));
        }

        expect_tag(sink, "node")?;
        let child = format!("{}/{}", path, name);
        parse_node(sink, &child, depth + 1)?;
        expect_tag(sink, ")")?;

        prev_name = Some(name);
    }
}

fn read_bytes<R: Read>(reader: &mut R, max_len: u64) -> Result<Vec<u8>, IndexError> {
    let len = reader.read_u64::<LittleEndian>()?;
    if len > max_len {
        return Err(IndexError::malformed(format!(
            "string of {} bytes exceeds the limit of {}",
            len, max_len
        )));
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    read_padding(reader, len)?;

    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R, max_len: u64) -> Result<String, IndexError> {
    String::from_utf8(read_bytes(reader, max_len)?)
        .map_err(|_| IndexError::malformed("string is not valid UTF-8"))
}

fn read_tag<R: Read>(reader: &mut R) -> Result<String, IndexError> {
    read_string(reader, MAX_TAG_LEN)
}

fn expect_tag<R: Read>(reader: &mut R, expected: &str) -> Result<(), IndexError> {
    let tag = read_tag(reader)?;
    if tag != expected {
        return Err(IndexError::malformed(format!(
            "expected '{}', found '{}'",
            expected, tag
        )));
    }
    Ok(())
}

fn read_padding<R: Read>(reader: &mut R, len: u64) -> Result<(), IndexError> {
    let rem = (len % 8) as usize;
    if rem == 0 {
        return Ok(());
    }

    let mut pad = [0u8; 8];
    reader.read_exact(&mut pad[..8 - rem])?;
    if pad.iter().any(|b| *b != 0) {
        return Err(IndexError::malformed("non-zero padding"));
    }
    Ok(())
}
