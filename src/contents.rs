//! Content store: entry byte streams cut into fixed-size chunks, each chunk
//! optionally compressed and checksummed, with random range reads resolved by
//! chunk arithmetic.
//!
//! A writer streams one entry at a time: `begin` picks the chunk size and
//! resets the accumulators, `transfer` buffers and flushes full chunks,
//! `commit` flushes the tail chunk and appends the offset/checksum tables.
//! All offsets recorded in the descriptor are contents-region-relative.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::block::{Checksum, Compression, FileKind, MetadataRecord, RegionKind};
use crate::region::Region;

pub struct ContentStore {
    pub(crate) region: Region,
    buffer: Vec<u8>,
    bytes_written: u64,
    chunk_offsets: Vec<u32>,
    chunk_checksums: Vec<u8>,
}

impl ContentStore {
    pub fn create(path: &Path) -> Result<()> {
        Region::create(path, FileKind::Contents, RegionKind::Contents)
    }

    pub fn open(region: Region) -> Self {
        ContentStore {
            region,
            buffer: Vec::new(),
            bytes_written: 0,
            chunk_offsets: Vec::new(),
            chunk_checksums: Vec::new(),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.region.flush()
    }

    #[inline]
    pub fn available(&self) -> u64 {
        self.region.available()
    }

    /// Start a new entry. Picks the chunk size from the declared length and
    /// records the entry's first byte (= current region end) in `desc`.
    pub fn begin(&mut self, declared_length: u64, desc: &mut MetadataRecord) -> Result<()> {
        let available = self.region.available();
        if declared_length > available {
            return Err(anyhow!(
                "entry of {} bytes exceeds remaining pile capacity ({} bytes)",
                declared_length,
                available
            ));
        }
        desc.chunk_size = chunk_size_for(declared_length);
        desc.chunk_count = 0;
        desc.len_original = 0;
        desc.len_compressed = 0;
        desc.ofs_contents = self.region.end;
        desc.ofs_offset_table = 0;
        desc.ofs_checksum_table = 0;
        self.buffer.clear();
        self.bytes_written = 0;
        self.chunk_offsets.clear();
        self.chunk_checksums.clear();
        debug!(
            "content begin: declared={} chunk_size={} at region offset {}",
            declared_length, desc.chunk_size, desc.ofs_contents
        );
        Ok(())
    }

    /// Feed entry bytes; every completed chunk is checksummed, compressed and
    /// appended immediately.
    pub fn transfer(&mut self, data: &[u8], desc: &mut MetadataRecord) -> Result<()> {
        let chunk_size = desc.chunk_size as usize;
        if chunk_size == 0 {
            return Err(anyhow!("transfer before begin"));
        }
        let mut pos = 0;
        while pos < data.len() {
            let take = (chunk_size - self.buffer.len()).min(data.len() - pos);
            self.buffer.extend_from_slice(&data[pos..pos + take]);
            if self.buffer.len() == chunk_size {
                self.write_chunk(desc)?;
            }
            pos += take;
        }
        Ok(())
    }

    /// Flush the partial tail chunk and append the offset/checksum tables.
    pub fn commit(&mut self, desc: &mut MetadataRecord) -> Result<()> {
        self.write_chunk(desc)?;
        desc.chunk_count = self.chunk_offsets.len() as u32;

        if desc.compressed() {
            let mut table = vec![0u8; self.chunk_offsets.len() * 4];
            for (i, ofs) in self.chunk_offsets.iter().enumerate() {
                LittleEndian::write_u32(&mut table[i * 4..i * 4 + 4], *ofs);
            }
            desc.ofs_offset_table = self.region.append(&table)?;
        }
        if desc.checksum != Checksum::None {
            let table = std::mem::take(&mut self.chunk_checksums);
            desc.ofs_checksum_table = self.region.append(&table)?;
        }
        debug!(
            "content commit: {} chunks, {} -> {} bytes",
            desc.chunk_count, desc.len_original, desc.len_compressed
        );
        Ok(())
    }

    fn write_chunk(&mut self, desc: &mut MetadataRecord) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let raw_len = self.buffer.len();
        checksum_chunk(&self.buffer, desc.checksum, &mut self.chunk_checksums);
        let packed = match desc.compression {
            Compression::None => None,
            c => Some(compress(&self.buffer, c)?),
        };
        let out: &[u8] = packed.as_deref().unwrap_or(&self.buffer);

        if self.bytes_written > u32::MAX as u64 {
            return Err(anyhow!("entry too large for the chunk offset table"));
        }
        self.chunk_offsets.push(self.bytes_written as u32);
        self.region.append(out)?;
        desc.len_original += raw_len as u64;
        desc.len_compressed += out.len() as u64;
        self.bytes_written += out.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Read `length` bytes of an entry starting at `offset` (both in the
    /// uncompressed byte space). Length is clipped to the entry end.
    pub fn read(&mut self, desc: &MetadataRecord, offset: u64, length: u64) -> Result<Vec<u8>> {
        if offset > desc.len_original {
            return Err(anyhow!(
                "read offset {} beyond entry length {}",
                offset,
                desc.len_original
            ));
        }
        let length = length.min(desc.len_original - offset);
        if length == 0 {
            return Ok(Vec::new());
        }
        let (offsets, sizes) = self.chunk_layout(desc)?;
        let chunk_size = desc.chunk_size as u64;
        if chunk_size == 0 {
            return Err(anyhow!("entry descriptor has zero chunk size"));
        }

        let mut out = Vec::with_capacity(length as usize);
        let mut off = offset;
        let mut done = 0u64;
        while done < length {
            let ci = (off / chunk_size) as usize;
            if ci >= offsets.len() {
                return Err(anyhow!("chunk index {} out of range ({} chunks)", ci, offsets.len()));
            }
            let mut raw = vec![0u8; sizes[ci] as usize];
            self.region.read_exact_at(desc.ofs_contents + offsets[ci], &mut raw)?;
            let chunk = decompress(raw, desc.compression)?;
            let ahead = (off % chunk_size) as usize;
            if ahead >= chunk.len() {
                return Err(anyhow!("chunk {} shorter than expected", ci));
            }
            let take = ((chunk.len() - ahead) as u64).min(length - done) as usize;
            out.extend_from_slice(&chunk[ahead..ahead + take]);
            done += take as u64;
            off += take as u64;
        }
        Ok(out)
    }

    /// Re-read every chunk of an entry and compare against the stored
    /// checksum table. Returns the number of chunks verified (0 when the
    /// entry carries no checksums).
    pub fn verify(&mut self, desc: &MetadataRecord) -> Result<u32> {
        if desc.checksum == Checksum::None || desc.ofs_checksum_table == 0 {
            return Ok(0);
        }
        let n = desc.chunk_count as usize;
        let width = desc.checksum.width();
        let mut table = vec![0u8; n * width];
        self.region.read_exact_at(desc.ofs_checksum_table, &mut table)?;

        let (offsets, sizes) = self.chunk_layout(desc)?;
        for i in 0..n {
            let mut raw = vec![0u8; sizes[i] as usize];
            self.region.read_exact_at(desc.ofs_contents + offsets[i], &mut raw)?;
            let chunk = decompress(raw, desc.compression)?;
            let mut sum = Vec::with_capacity(width);
            checksum_chunk(&chunk, desc.checksum, &mut sum);
            if sum.as_slice() != &table[i * width..(i + 1) * width] {
                return Err(anyhow!("chunk {} checksum mismatch", i));
            }
        }
        Ok(n as u32)
    }

    /// Stored offset and size of every chunk. Compressed entries carry an
    /// explicit offset table; uncompressed ones are pure arithmetic.
    fn chunk_layout(&mut self, desc: &MetadataRecord) -> Result<(Vec<u64>, Vec<u64>)> {
        let n = desc.chunk_count as usize;
        if n == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        if desc.ofs_offset_table != 0 {
            let mut raw = vec![0u8; n * 4];
            self.region.read_exact_at(desc.ofs_offset_table, &mut raw)?;
            let offsets: Vec<u64> = raw
                .chunks_exact(4)
                .map(|c| LittleEndian::read_u32(c) as u64)
                .collect();
            let mut sizes = vec![0u64; n];
            let mut upper = desc.len_compressed;
            for i in (0..n).rev() {
                sizes[i] = upper
                    .checked_sub(offsets[i])
                    .ok_or_else(|| anyhow!("chunk offset table is not monotonic at {}", i))?;
                upper = offsets[i];
            }
            Ok((offsets, sizes))
        } else if !desc.compressed() {
            let cs = desc.chunk_size as u64;
            let offsets: Vec<u64> = (0..n as u64).map(|i| i * cs).collect();
            let mut sizes = vec![cs; n];
            sizes[n - 1] = desc
                .len_compressed
                .checked_sub(offsets[n - 1])
                .ok_or_else(|| anyhow!("stored length shorter than the chunk grid"))?;
            Ok((offsets, sizes))
        } else {
            Err(anyhow!("compressed entry without a chunk offset table"))
        }
    }
}

/// Chunk size policy: small entries use 16-KiB chunks, huge ones cap at
/// 512 KiB, and the middle band scales so an entry stays near 4096 chunks.
pub fn chunk_size_for(length: u64) -> u32 {
    const MIB: u64 = 1024 * 1024;
    if length <= 64 * MIB {
        16 * 1024
    } else if length > 1024 * MIB {
        512 * 1024
    } else {
        let blocks = (length + 4095) / 4096;
        blocks.next_power_of_two() as u32
    }
}

fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut enc =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish().context("zlib compress chunk")?)
        }
        Compression::Bzip2 => {
            let mut enc =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish().context("bzip2 compress chunk")?)
        }
    }
}

fn decompress(data: Vec<u8>, compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data),
        Compression::Gzip => {
            let mut out = Vec::new();
            flate2::read::ZlibDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .context("zlib decompress chunk")?;
            Ok(out)
        }
        Compression::Bzip2 => {
            let mut out = Vec::new();
            bzip2::read::BzDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .context("bzip2 decompress chunk")?;
            Ok(out)
        }
    }
}

fn checksum_chunk(data: &[u8], checksum: Checksum, out: &mut Vec<u8>) {
    match checksum {
        Checksum::None => {}
        Checksum::Crc32 => {
            let mut h = crc32fast::Hasher::new();
            h.update(data);
            out.extend_from_slice(&h.finalize().to_le_bytes());
        }
        Checksum::Md5 => {
            use md5::{Digest, Md5};
            out.extend_from_slice(&Md5::digest(data));
        }
        Checksum::Sha1 => {
            use sha1::{Digest, Sha1};
            out.extend_from_slice(&Sha1::digest(data));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn chunk_size_fixpoints() {
        assert_eq!(chunk_size_for(0), 16 * 1024);
        assert_eq!(chunk_size_for(1), 16 * 1024);
        assert_eq!(chunk_size_for(64 * MIB), 16 * 1024);
        assert_eq!(chunk_size_for(64 * MIB + 1), 32 * 1024);
        assert_eq!(chunk_size_for(128 * MIB), 32 * 1024);
        assert_eq!(chunk_size_for(1024 * MIB), 256 * 1024);
        assert_eq!(chunk_size_for(1024 * MIB + 1), 512 * 1024);
        assert_eq!(chunk_size_for(u64::MAX / 2), 512 * 1024);
    }

    #[test]
    fn chunk_size_monotonic_in_middle_band() {
        let mut prev = 0u32;
        for len in (64 * MIB + 1..=1024 * MIB).step_by((32 * MIB) as usize) {
            let cs = chunk_size_for(len);
            assert!(cs.is_power_of_two());
            assert!(cs >= prev, "chunk size shrank at length {}", len);
            prev = cs;
        }
    }

    #[test]
    fn checksum_widths_match_output() {
        for c in [Checksum::Crc32, Checksum::Md5, Checksum::Sha1] {
            let mut out = Vec::new();
            checksum_chunk(b"payload", c, &mut out);
            assert_eq!(out.len(), c.width());
        }
    }

    #[test]
    fn compress_roundtrip() {
        let data = b"the same bytes repeated the same bytes repeated".repeat(100);
        for c in [Compression::Gzip, Compression::Bzip2] {
            let packed = compress(&data, c).unwrap();
            assert!(packed.len() < data.len());
            assert_eq!(decompress(packed, c).unwrap(), data);
        }
    }
}
