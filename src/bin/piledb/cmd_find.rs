use std::path::Path;

use anyhow::Result;
use serde_json::json;

use piledb::{OpenMode, Pile};

pub fn exec(path: &Path, name: &str, value: &str, json: bool) -> Result<()> {
    let mut pile = Pile::open(path, OpenMode::ReadOnly)?;
    let Some(offsets) = pile.lookup(name, value.as_bytes())? else {
        if json {
            println!("{}", json!({ "indexed": false, "matches": [] }));
        } else {
            println!("attribute '{}' is not indexed", name);
        }
        return Ok(());
    };

    if json {
        let mut matches = Vec::new();
        for ofs in &offsets {
            let desc = pile.entry(*ofs)?;
            matches.push(json!({
                "offset": ofs,
                "length": desc.len_original,
                "attributes": attrs_json(&desc),
            }));
        }
        println!("{}", json!({ "indexed": true, "matches": matches }));
    } else {
        println!("{} match(es)", offsets.len());
        for ofs in offsets {
            let desc = pile.entry(ofs)?;
            println!("  offset {} ({} bytes)", ofs, desc.len_original);
        }
    }
    Ok(())
}

pub fn attrs_json(desc: &piledb::MetadataRecord) -> serde_json::Value {
    json!(desc
        .attributes
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "value": String::from_utf8_lossy(&a.value),
                "indexed": a.indexed,
            })
        })
        .collect::<Vec<_>>())
}
