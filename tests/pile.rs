use anyhow::Result;
use std::path::PathBuf;

use piledb::{Attribute, Checksum, Compression, FileKind, OpenMode, Pile};

fn unique_base(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("piledb-{}-{}-{}", prefix, pid, t))
}

#[test]
fn smoke_create_add_lookup_iterate_reopen() -> Result<()> {
    let base = unique_base("smoke");
    Pile::create(&base)?;

    let (first, second, sticky, third);
    {
        let mut pile = Pile::open(&base, OpenMode::ReadWrite)?;
        assert_eq!(pile.file_kind(), FileKind::Contents);

        first = pile.add(
            b"the first entry",
            vec![
                Attribute::new("title", b"one".to_vec(), true),
                Attribute::new("lang", b"en".to_vec(), false),
            ],
        )?;

        pile.set_compression(Compression::Gzip);
        pile.set_checksum(Checksum::Crc32);
        second = pile.add(
            b"the second entry, this time compressed",
            vec![Attribute::new("title", b"two".to_vec(), true)],
        )?;

        // settings stay in effect until changed again
        sticky = pile.add(b"still compressed", vec![])?;
        assert_eq!(pile.entry(sticky)?.compression, Compression::Gzip);

        pile.set_compression(Compression::None);
        pile.set_checksum(Checksum::None);
        third = pile.add(b"untagged", vec![])?;
        pile.flush()?;
    }

    let mut pile = Pile::open(&base, OpenMode::ReadOnly)?;
    assert!(pile.readonly());

    assert_eq!(pile.lookup("title", b"one")?, Some(vec![first]));
    assert_eq!(pile.lookup("title", b"two")?, Some(vec![second]));
    assert_eq!(pile.lookup("title", b"zzz")?, Some(vec![]));
    assert_eq!(pile.lookup("lang", b"en")?, None, "lang was never indexed");

    let offsets: Vec<u64> = pile.entries().map(|r| r.map(|d| d.offset)).collect::<Result<_>>()?;
    assert_eq!(offsets, vec![first, second, sticky, third]);

    let desc = pile.entry(second)?;
    assert_eq!(desc.compression, Compression::Gzip);
    assert_eq!(desc.checksum, Checksum::Crc32);
    assert_eq!(desc.attribute("title").unwrap().value, b"two");
    assert_eq!(pile.content(&desc)?, b"the second entry, this time compressed");

    let desc = pile.entry(third)?;
    assert_eq!(desc.compression, Compression::None);
    assert_eq!(pile.content(&desc)?, b"untagged");
    Ok(())
}

#[test]
fn read_only_rejects_writes() -> Result<()> {
    let base = unique_base("ro");
    Pile::create(&base)?;
    {
        let mut pile = Pile::open(&base, OpenMode::ReadWrite)?;
        pile.add(b"x", vec![])?;
    }
    let mut pile = Pile::open(&base, OpenMode::ReadOnly)?;
    assert!(pile.add(b"y", vec![]).is_err());
    assert!(pile.begin(vec![], 1).is_err());
    Ok(())
}

#[test]
fn writer_lock_is_exclusive() -> Result<()> {
    let base = unique_base("lock");
    Pile::create(&base)?;
    let _writer = Pile::open(&base, OpenMode::ReadWrite)?;
    assert!(Pile::open(&base, OpenMode::ReadWrite).is_err());
    assert!(Pile::open(&base, OpenMode::ReadOnly).is_err());
    Ok(())
}

#[test]
fn usage_errors_before_state_changes() -> Result<()> {
    let base = unique_base("usage");
    Pile::create(&base)?;
    let mut pile = Pile::open(&base, OpenMode::ReadWrite)?;

    // oversized indexed attribute
    assert!(pile
        .add(b"x", vec![Attribute::new("k", vec![0u8; 256], true)])
        .is_err());
    // commit/transfer without begin
    assert!(pile.transfer(b"x").is_err());
    assert!(pile.commit().is_err());
    // nested begin
    pile.begin(vec![], 1)?;
    assert!(pile.begin(vec![], 1).is_err());
    pile.transfer(b"x")?;
    let offset = pile.commit()?;
    pile.flush()?;

    let desc = pile.entry(offset)?;
    assert_eq!(pile.content(&desc)?, b"x");
    Ok(())
}

#[test]
fn compound_pile_reads_like_separate_one() -> Result<()> {
    let base = unique_base("compound");
    Pile::create(&base)?;

    let data = b"compound me".repeat(5000);
    let offset;
    {
        let mut pile = Pile::open(&base, OpenMode::ReadWrite)?;
        pile.set_compression(Compression::Bzip2);
        pile.set_checksum(Checksum::Md5);
        offset = pile.add(&data, vec![Attribute::new("name", b"blob".to_vec(), true)])?;
        pile.flush()?;
    }

    Pile::compound(&base)?;

    // compound files are read-only
    assert!(Pile::open(&base, OpenMode::ReadWrite).is_err());

    let mut pile = Pile::open(&base, OpenMode::ReadOnly)?;
    assert_eq!(pile.file_kind(), FileKind::Compound);
    assert_eq!(pile.lookup("name", b"blob")?, Some(vec![offset]));
    let desc = pile.entry(offset)?;
    assert_eq!(pile.content(&desc)?, data);
    assert_eq!(pile.verify_content(&desc)?, desc.chunk_count);

    let count = pile.entries().count();
    assert_eq!(count, 1);
    Ok(())
}

#[test]
fn status_accessors() -> Result<()> {
    let base = unique_base("status");
    Pile::create(&base)?;
    let mut pile = Pile::open(&base, OpenMode::ReadWrite)?;
    let before = pile.space_available();
    pile.add(b"some bytes", vec![Attribute::new("t", b"v".to_vec(), true)])?;
    assert!(pile.space_available() < before);
    assert!(pile.space_used() > 0);
    assert_eq!(pile.index_names(), vec!["t".to_string()]);
    Ok(())
}
