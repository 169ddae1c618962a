use std::path::Path;

use nar_format::SourceAccessor;

use super::{canon_path, index_file};
use crate::error::{Error, Result};

pub fn run(nar: &Path, path: &str) -> Result<()> {
    let index = index_file(nar)?;
    let path = canon_path(path)?;

    let target = index.read_link(&path).map_err(|e| Error::access(&path, e))?;
    println!("{}", target);

    Ok(())
}
