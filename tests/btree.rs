use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use piledb::block::{Attribute, MetadataRecord, RegionKind};
use piledb::indexes::IndexStore;
use piledb::region::Region;
use piledb::{Checksum, Compression};

fn unique_path(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("piledb-{}-{}-{}.pi", prefix, pid, t))
}

fn open_store(path: &PathBuf, readonly: bool) -> Result<IndexStore> {
    IndexStore::open(Region::open_path(path, RegionKind::Indexes, readonly)?)
}

fn entry(name: &str, value: &[u8], offset: u64) -> MetadataRecord {
    let mut desc = MetadataRecord::new(Compression::None, Checksum::None);
    desc.attributes = vec![Attribute::new(name, value.to_vec(), true)];
    desc.offset = offset;
    desc
}

#[test]
fn duplicate_keys_keep_insertion_order() -> Result<()> {
    let path = unique_path("dup");
    IndexStore::create(&path)?;
    let mut store = open_store(&path, false)?;

    store.index_entry(&entry("tag", b"b", 10))?;
    store.index_entry(&entry("tag", b"a", 20))?;
    store.index_entry(&entry("tag", b"a", 30))?;

    assert_eq!(store.find("tag", b"a")?, Some(vec![20, 30]));
    assert_eq!(store.find("tag", b"b")?, Some(vec![10]));
    assert_eq!(store.find("tag", b"c")?, Some(vec![]));
    assert_eq!(store.find("other", b"a")?, None);
    Ok(())
}

#[test]
fn unindexed_attributes_create_no_tree() -> Result<()> {
    let path = unique_path("noidx");
    IndexStore::create(&path)?;
    let mut store = open_store(&path, false)?;

    let mut desc = MetadataRecord::new(Compression::None, Checksum::None);
    desc.attributes = vec![Attribute::new("plain", b"v".to_vec(), false)];
    desc.offset = 7;
    store.index_entry(&desc)?;

    assert_eq!(store.find("plain", b"v")?, None);
    assert!(store.index_names().is_empty());
    Ok(())
}

/// 64-byte keys keep node fanout around 54, so a few thousand inserts force
/// leaf splits, internal splits and repeated root growth.
#[test]
fn order_and_duplicates_survive_splits() -> Result<()> {
    let path = unique_path("splits");
    IndexStore::create(&path)?;
    let mut store = open_store(&path, false)?;

    let mut rng = oorandom::Rand32::new(99);
    let mut expected: HashMap<Vec<u8>, Vec<u64>> = HashMap::new();
    for i in 0..3000u64 {
        let tag = (rng.rand_u32() % 250) as u8;
        let key = vec![tag; 64];
        store.index_entry(&entry("name", &key, i))?;
        expected.entry(key).or_default().push(i);
    }
    store.flush()?;

    for (key, values) in &expected {
        assert_eq!(
            store.find("name", key)?.as_ref(),
            Some(values),
            "wrong values for key {:?}",
            key[0]
        );
    }
    // absent keys inside the key range
    assert_eq!(store.find("name", &vec![1u8; 63])?, Some(vec![]));

    // reopen read-only and spot-check persistence
    drop(store);
    let mut ro = open_store(&path, true)?;
    for (key, values) in expected.iter().take(25) {
        assert_eq!(ro.find("name", key)?.as_ref(), Some(values));
    }
    Ok(())
}

#[test]
fn single_key_duplicate_flood_splits_cleanly() -> Result<()> {
    // every element carries the same key; splits must divide the run
    let path = unique_path("flood");
    IndexStore::create(&path)?;
    let mut store = open_store(&path, false)?;

    let key = vec![42u8; 64];
    let n = 500u64;
    for i in 0..n {
        store.index_entry(&entry("k", &key, i))?;
    }
    store.flush()?;

    let found = store.find("k", &key)?.unwrap();
    assert_eq!(found, (0..n).collect::<Vec<u64>>());
    Ok(())
}

#[test]
fn multiple_indexes_in_one_table() -> Result<()> {
    let path = unique_path("multi");
    IndexStore::create(&path)?;
    let mut store = open_store(&path, false)?;

    let mut desc = MetadataRecord::new(Compression::None, Checksum::None);
    desc.attributes = vec![
        Attribute::new("title", b"intro".to_vec(), true),
        Attribute::new("author", b"may".to_vec(), true),
        Attribute::new("note", b"x".to_vec(), false),
    ];
    desc.offset = 512;
    store.index_entry(&desc)?;
    store.flush()?;

    let mut names = store.index_names();
    names.sort();
    assert_eq!(names, vec!["author".to_string(), "title".to_string()]);
    assert_eq!(store.find("title", b"intro")?, Some(vec![512]));
    assert_eq!(store.find("author", b"may")?, Some(vec![512]));
    assert_eq!(store.find("note", b"x")?, None);
    Ok(())
}
