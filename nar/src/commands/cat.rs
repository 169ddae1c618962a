use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use nar_format::{FetchError, NarAccessor};

use super::canon_path;
use crate::error::{Error, Result};

pub fn run(nar: &Path, path: &str, listing: Option<&Path>) -> Result<()> {
    let accessor = match listing {
        Some(listing) => open_lazy(nar, listing)?,
        None => NarAccessor::open(nar).map_err(|source| Error::OpenArchive {
            path: nar.to_path_buf(),
            source,
        })?,
    };
    let path = canon_path(path)?;

    let data = accessor
        .read_file(&path)
        .map_err(|e| Error::access(&path, e))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(&data)
        .and_then(|_| out.flush())
        .map_err(|source| Error::WriteOutput { source })
}

/// Builds the accessor from a JSON listing and reads each file's byte range
/// straight out of the NAR when it is asked for.
fn open_lazy(nar: &Path, listing: &Path) -> Result<NarAccessor> {
    let mut text = String::new();
    File::open(listing)
        .and_then(|mut f| f.read_to_string(&mut text))
        .map_err(|source| Error::OpenFile {
            path: listing.to_path_buf(),
            source,
        })?;

    let nar = nar.to_path_buf();
    NarAccessor::from_listing(&text, move |offset, length| read_range(&nar, offset, length))
        .map_err(|source| Error::LoadListing {
            path: listing.to_path_buf(),
            source,
        })
}

fn read_range(nar: &Path, offset: u64, length: u64) -> std::result::Result<Vec<u8>, FetchError> {
    tracing::debug!(offset, length, "reading byte range from {}", nar.display());

    let mut file = OpenOptions::new().read(true).open(nar)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut buf = Vec::with_capacity(length as usize);
    file.take(length).read_to_end(&mut buf)?;
    if buf.len() as u64 != length {
        return Err(format!(
            "NAR ends after {} of {} bytes at offset {}",
            buf.len(),
            length,
            offset
        )
        .into());
    }

    Ok(buf)
}
