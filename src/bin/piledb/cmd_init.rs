use std::path::Path;

use anyhow::Result;

use piledb::Pile;

pub fn exec(path: &Path) -> Result<()> {
    Pile::create(path)?;
    println!("created pile at {}", path.display());
    Ok(())
}
