use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use piledb::{OpenMode, Pile};

pub fn exec(
    path: &Path,
    offset: Option<u64>,
    name: Option<&str>,
    value: Option<&str>,
    out: Option<PathBuf>,
) -> Result<()> {
    let mut pile = Pile::open(path, OpenMode::ReadOnly)?;
    let offset = match (offset, name, value) {
        (Some(ofs), _, _) => ofs,
        (None, Some(name), Some(value)) => {
            let hits = pile
                .lookup(name, value.as_bytes())?
                .ok_or_else(|| anyhow!("attribute '{}' is not indexed", name))?;
            *hits
                .first()
                .ok_or_else(|| anyhow!("no entry with {}={}", name, value))?
        }
        _ => return Err(anyhow!("give --offset, or --name with --value")),
    };

    let desc = pile.entry(offset)?;
    let content = pile.content(&desc)?;
    match out {
        Some(p) => {
            std::fs::write(&p, &content)?;
            eprintln!("wrote {} bytes to {}", content.len(), p.display());
        }
        None => std::io::stdout().write_all(&content)?,
    }
    Ok(())
}
