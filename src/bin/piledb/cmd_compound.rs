use std::path::Path;

use anyhow::Result;

use piledb::Pile;

pub fn exec(path: &Path) -> Result<()> {
    Pile::compound(path)?;
    println!("{} is now a compound file", path.display());
    Ok(())
}
