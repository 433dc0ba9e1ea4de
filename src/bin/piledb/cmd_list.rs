use std::path::Path;

use anyhow::Result;
use serde_json::json;

use piledb::{OpenMode, Pile};

use crate::cmd_find::attrs_json;

pub fn exec(path: &Path, json: bool) -> Result<()> {
    let mut pile = Pile::open(path, OpenMode::ReadOnly)?;
    let descs: Result<Vec<_>> = pile.entries().collect();
    let descs = descs?;

    if json {
        let rows: Vec<_> = descs
            .iter()
            .map(|d| {
                json!({
                    "offset": d.offset,
                    "length": d.len_original,
                    "stored": d.len_compressed,
                    "chunks": d.chunk_count,
                    "attributes": attrs_json(d),
                })
            })
            .collect();
        println!("{}", json!(rows));
    } else {
        println!("{} entries", descs.len());
        for d in &descs {
            let attrs: Vec<String> = d
                .attributes
                .iter()
                .map(|a| format!("{}={}", a.name, String::from_utf8_lossy(&a.value)))
                .collect();
            println!(
                "  offset {:>8}  {:>10} bytes  {}",
                d.offset,
                d.len_original,
                attrs.join(", ")
            );
        }
    }
    Ok(())
}
