use anyhow::Result;
use std::path::PathBuf;

use piledb::{Attribute, Checksum, Compression, OpenMode, Pile};

fn unique_base(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("piledb-{}-{}-{}", prefix, pid, t))
}

fn pseudo_random(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = oorandom::Rand32::new(seed);
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        out.extend_from_slice(&rng.rand_u32().to_le_bytes());
    }
    out.truncate(len);
    out
}

/// Compressible but non-trivial payload.
fn patterned(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut i = 0usize;
    while out.len() < len {
        out.extend_from_slice(format!("block {:08} of the payload; ", i).as_bytes());
        i += 1;
    }
    out.truncate(len);
    out
}

#[test]
fn roundtrip_every_compression_checksum_pair() -> Result<()> {
    let compressions = [Compression::None, Compression::Gzip, Compression::Bzip2];
    let checksums = [Checksum::None, Checksum::Crc32, Checksum::Md5, Checksum::Sha1];
    // several chunks plus a partial tail (16-KiB chunks at this size)
    let data = patterned(200_000);

    for (ci, compression) in compressions.iter().enumerate() {
        for (ki, checksum) in checksums.iter().enumerate() {
            let base = unique_base(&format!("rt-{}-{}", ci, ki));
            Pile::create(&base)?;
            let offset;
            {
                let mut pile = Pile::open(&base, OpenMode::ReadWrite)?;
                pile.set_compression(*compression);
                pile.set_checksum(*checksum);
                offset = pile.add(&data, vec![Attribute::new("case", b"x".to_vec(), false)])?;
                pile.flush()?;
            }

            let mut pile = Pile::open(&base, OpenMode::ReadOnly)?;
            let desc = pile.entry(offset)?;
            assert_eq!(desc.len_original, data.len() as u64);
            assert_eq!(desc.compression, *compression);
            assert_eq!(desc.checksum, *checksum);
            assert_eq!(pile.content(&desc)?, data);

            // random sub-ranges, including chunk-boundary straddles
            let mut rng = oorandom::Rand32::new((ci * 10 + ki) as u64 + 1);
            for _ in 0..20 {
                let start = (rng.rand_u32() as usize) % data.len();
                let len = 1 + (rng.rand_u32() as usize) % 40_000;
                let got = pile.read_content(&desc, start as u64, len as u64)?;
                let end = (start + len).min(data.len());
                assert_eq!(got, &data[start..end]);
            }

            // reads past the end clip to the entry length
            let tail = pile.read_content(&desc, data.len() as u64 - 5, 1000)?;
            assert_eq!(tail, &data[data.len() - 5..]);

            let verified = pile.verify_content(&desc)?;
            if *checksum == Checksum::None {
                assert_eq!(verified, 0);
            } else {
                assert_eq!(verified, desc.chunk_count);
            }
        }
    }
    Ok(())
}

#[test]
fn two_mib_gzip_sha1_ranged_read() -> Result<()> {
    let base = unique_base("2mib");
    let data = patterned(2 * 1024 * 1024);

    Pile::create(&base)?;
    let offset;
    {
        let mut pile = Pile::open(&base, OpenMode::ReadWrite)?;
        pile.set_compression(Compression::Gzip);
        pile.set_checksum(Checksum::Sha1);
        offset = pile.add(&data, vec![])?;
        pile.flush()?;
    }

    let mut pile = Pile::open(&base, OpenMode::ReadOnly)?;
    let desc = pile.entry(offset)?;
    assert_eq!(desc.chunk_size, 16 * 1024);
    assert_eq!(desc.chunk_count, 128);
    assert!(desc.len_compressed < desc.len_original);
    assert_ne!(desc.ofs_offset_table, 0);
    assert_ne!(desc.ofs_checksum_table, 0);

    let got = pile.read_content(&desc, 1_048_576, 100)?;
    assert_eq!(got, &data[1_048_576..1_048_576 + 100]);
    assert_eq!(pile.verify_content(&desc)?, 128);
    Ok(())
}

#[test]
fn streamed_entry_matches_one_shot() -> Result<()> {
    let base = unique_base("stream");
    let data = pseudo_random(100_000, 42);

    Pile::create(&base)?;
    let offset;
    {
        let mut pile = Pile::open(&base, OpenMode::ReadWrite)?;
        pile.set_compression(Compression::Gzip);
        pile.begin(vec![Attribute::new("k", b"v".to_vec(), true)], data.len() as u64)?;
        for piece in data.chunks(7_777) {
            pile.transfer(piece)?;
        }
        offset = pile.commit()?;
        pile.flush()?;
    }

    let mut pile = Pile::open(&base, OpenMode::ReadOnly)?;
    let desc = pile.entry(offset)?;
    assert_eq!(pile.content(&desc)?, data);
    assert_eq!(pile.lookup("k", b"v")?, Some(vec![offset]));
    Ok(())
}

#[test]
fn empty_entry_roundtrip() -> Result<()> {
    let base = unique_base("empty");
    Pile::create(&base)?;
    let offset;
    {
        let mut pile = Pile::open(&base, OpenMode::ReadWrite)?;
        offset = pile.add(b"", vec![Attribute::new("n", b"e".to_vec(), true)])?;
        pile.flush()?;
    }
    let mut pile = Pile::open(&base, OpenMode::ReadOnly)?;
    let desc = pile.entry(offset)?;
    assert_eq!(desc.len_original, 0);
    assert_eq!(desc.chunk_count, 0);
    assert_eq!(pile.content(&desc)?, Vec::<u8>::new());
    assert_eq!(pile.lookup("n", b"e")?, Some(vec![offset]));
    Ok(())
}
