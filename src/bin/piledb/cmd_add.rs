use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use piledb::{OpenMode, Pile};

use crate::cli::{parse_attrs, parse_checksum, parse_compression};

pub fn exec(
    path: &Path,
    attrs: &[String],
    indexed: &[String],
    compression: &str,
    checksum: &str,
    data: Option<String>,
    data_file: Option<PathBuf>,
) -> Result<()> {
    let bytes = match (data, data_file) {
        (Some(s), None) => s.into_bytes(),
        (None, Some(f)) => std::fs::read(f)?,
        _ => return Err(anyhow!("provide the entry content via --data or --data-file")),
    };
    let attributes = parse_attrs(attrs, indexed)?;

    let mut pile = Pile::open(path, OpenMode::ReadWrite)?;
    pile.set_compression(parse_compression(compression)?);
    pile.set_checksum(parse_checksum(checksum)?);
    let offset = pile.add(&bytes, attributes)?;
    pile.flush()?;
    println!("stored {} bytes at metadata offset {}", bytes.len(), offset);
    Ok(())
}
