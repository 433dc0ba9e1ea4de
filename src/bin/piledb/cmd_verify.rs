use std::path::Path;

use anyhow::Result;

use piledb::{Checksum, OpenMode, Pile};

pub fn exec(path: &Path) -> Result<()> {
    let mut pile = Pile::open(path, OpenMode::ReadOnly)?;
    let descs: Result<Vec<_>> = pile.entries().collect();
    let descs = descs?;

    let mut checked = 0u64;
    let mut skipped = 0u64;
    for desc in &descs {
        if desc.checksum == Checksum::None {
            skipped += 1;
            continue;
        }
        let chunks = pile.verify_content(desc)?;
        println!("offset {:>8}: {} chunk(s) ok", desc.offset, chunks);
        checked += 1;
    }
    println!("verified {} entries, {} without checksums", checked, skipped);
    Ok(())
}
