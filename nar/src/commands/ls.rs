use std::io::Write;
use std::path::Path;

use humansize::{file_size_opts as options, FileSize};
use nar_format::{CanonPath, NarIndex, SourceAccessor, Stat};

use super::{canon_path, index_file};
use crate::error::{Error, Result};

pub fn run(nar: &Path, path: &str, recursive: bool, long: bool) -> Result<()> {
    let index = index_file(nar)?;
    let path = canon_path(path)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let stat = index.stat(&path).map_err(|e| Error::access(&path, e))?;
    match stat {
        Stat::Directory => list_dir(&index, &path, recursive, long, &mut out)?,
        _ => print_entry(&index, &path, stat, long, &mut out)?,
    }

    Ok(())
}

fn list_dir<W: Write>(
    index: &NarIndex,
    dir: &CanonPath,
    recursive: bool,
    long: bool,
    out: &mut W,
) -> Result<()> {
    let entries = index
        .read_directory(dir)
        .map_err(|e| Error::access(dir, e))?;

    for name in entries.keys() {
        let child = dir.join(name).map_err(|source| Error::InvalidPath {
            path: name.clone(),
            source,
        })?;
        let stat = index.stat(&child).map_err(|e| Error::access(&child, e))?;

        print_entry(index, &child, stat, long, out)?;

        if recursive && stat == Stat::Directory {
            list_dir(index, &child, recursive, long, out)?;
        }
    }

    Ok(())
}

fn print_entry<W: Write>(
    index: &NarIndex,
    path: &CanonPath,
    stat: Stat,
    long: bool,
    out: &mut W,
) -> Result<()> {
    let line = if long {
        let (mode, size, suffix) = match stat {
            Stat::Regular {
                size, executable, ..
            } => (
                if executable { "-r-xr-xr-x" } else { "-r--r--r--" },
                size.file_size(options::BINARY)
                    .unwrap_or_else(|_| size.to_string()),
                String::new(),
            ),
            Stat::Directory => ("dr-xr-xr-x", "-".to_string(), "/".to_string()),
            Stat::Symlink => {
                let target = index.read_link(path).map_err(|e| Error::access(path, e))?;
                ("lrwxrwxrwx", "-".to_string(), format!(" -> {}", target))
            }
        };
        format!("{}  {:>12}  {}{}", mode, size, path, suffix)
    } else {
        path.to_string()
    };

    writeln!(out, "{}", line).map_err(|source| Error::WriteOutput { source })
}
