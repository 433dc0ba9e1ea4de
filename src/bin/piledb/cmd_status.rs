use std::path::Path;

use anyhow::Result;
use serde_json::json;

use piledb::{OpenMode, Pile};

pub fn exec(path: &Path, json: bool) -> Result<()> {
    let mut pile = Pile::open(path, OpenMode::ReadOnly)?;
    let kind = pile.file_kind().name().to_string();
    let indexes = pile.index_names();
    let used = pile.space_used();
    let available = pile.space_available();
    let entries: Result<Vec<_>> = pile.entries().collect();
    let entry_count = entries?.len();

    if json {
        println!(
            "{}",
            json!({
                "kind": kind,
                "entries": entry_count,
                "contents_bytes": used,
                "available_bytes": available,
                "indexes": indexes,
            })
        );
    } else {
        println!("kind:        {}", kind);
        println!("entries:     {}", entry_count);
        println!("contents:    {} bytes used, {} available", used, available);
        println!("indexes:     {}", if indexes.is_empty() { "(none)".to_string() } else { indexes.join(", ") });
    }
    Ok(())
}
