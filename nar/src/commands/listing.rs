use std::path::Path;

use nar_format::list_nar;

use super::{canon_path, index_file};
use crate::error::{Error, Result};

pub fn run(nar: &Path, path: &str, shallow: bool) -> Result<()> {
    let index = index_file(nar)?;
    let path = canon_path(path)?;

    let listing = list_nar(&index, &path, !shallow).map_err(|e| Error::access(&path, e))?;
    let text = serde_json::to_string_pretty(&listing)
        .map_err(|e| Error::WriteOutput { source: e.into() })?;
    println!("{}", text);

    Ok(())
}
