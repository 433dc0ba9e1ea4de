//! Metadata record: one per entry, appended to the metadata region.
//!
//! Variable-length, padded to a multiple of 512 B. The 96-B head:
//! - [0..4)   signature "META" (u32 LE)
//! - [4..8)   lenBlock: padded on-disk size
//! - [8..12)  lenActual: head + attribute blob
//! - [12..14) flags
//! - [14]     compression tag
//! - [15]     checksum tag
//! - [16..24) lenOriginal: entry size before compression
//! - [24..32) lenCompressed: entry size as stored
//! - [32..36) chunkSize
//! - [36..40) chunkCount
//! - [40..48) ofsContents (contents-region-relative)
//! - [48..56) ofsOffsetTable (0 = absent)
//! - [56..64) ofsChecksumTable (0 = absent)
//! - [64..96) zero padding
//!
//! The attribute blob follows the head, one record per attribute:
//! `{0xD5, flags:u8 (bit0 = indexed), nameLen:u8, name, valueLen:u16, value}`.

use std::io::Read;

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    ATTRIBUTE_FLAG_INDEXED, ATTRIBUTE_SIGNATURE, ATTR_COUNT_MAX, ATTR_INDEXED_VALUE_MAX,
    ATTR_NAME_MAX, ATTR_VALUE_MAX, METADATA_BLOCK_SIZE, METADATA_FLAG_NONE, METADATA_HEAD_SIZE,
    METADATA_SIGNATURE,
};

use super::{padded_len, Checksum, Compression};

/// Named attribute of an entry. Indexed attributes are exact-match queryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Vec<u8>,
    pub indexed: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>, indexed: bool) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
            indexed,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > ATTR_NAME_MAX {
            return Err(anyhow!(
                "attribute name must be 1..={} bytes, got {}",
                ATTR_NAME_MAX,
                self.name.len()
            ));
        }
        if self.value.len() > ATTR_VALUE_MAX {
            return Err(anyhow!(
                "attribute '{}' value too large ({} > {} bytes)",
                self.name,
                self.value.len(),
                ATTR_VALUE_MAX
            ));
        }
        if self.indexed && self.value.len() > ATTR_INDEXED_VALUE_MAX {
            return Err(anyhow!(
                "indexed attribute '{}' value too large ({} > {} bytes)",
                self.name,
                self.value.len(),
                ATTR_INDEXED_VALUE_MAX
            ));
        }
        Ok(())
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(ATTRIBUTE_SIGNATURE);
        out.push(if self.indexed { ATTRIBUTE_FLAG_INDEXED } else { 0 });
        out.push(self.name.len() as u8);
        out.extend_from_slice(self.name.as_bytes());
        let mut len = [0u8; 2];
        LittleEndian::write_u16(&mut len, self.value.len() as u16);
        out.extend_from_slice(&len);
        out.extend_from_slice(&self.value);
    }
}

/// Decoded metadata record (the entry descriptor).
#[derive(Debug, Clone, Default)]
pub struct MetadataRecord {
    pub flags: u16,
    pub compression: Compression,
    pub checksum: Checksum,
    pub len_original: u64,
    pub len_compressed: u64,
    pub chunk_size: u32,
    pub chunk_count: u32,
    pub ofs_contents: u64,
    pub ofs_offset_table: u64,
    pub ofs_checksum_table: u64,
    pub attributes: Vec<Attribute>,
    /// Region-relative offset of this record; set by the metadata store.
    pub offset: u64,
    /// Padded on-disk size; set by pack/unpack.
    pub len_block: u32,
}

impl MetadataRecord {
    pub fn new(compression: Compression, checksum: Checksum) -> Self {
        MetadataRecord {
            flags: METADATA_FLAG_NONE,
            compression,
            checksum,
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[inline]
    pub fn compressed(&self) -> bool {
        self.compression != Compression::None
    }

    pub fn pack(&mut self) -> Vec<u8> {
        let mut blob = Vec::new();
        for attr in &self.attributes {
            attr.encode(&mut blob);
        }
        let actual = METADATA_HEAD_SIZE + blob.len();
        let total = padded_len(actual, METADATA_BLOCK_SIZE);
        self.len_block = total as u32;

        let mut buf = vec![0u8; total];
        LittleEndian::write_u32(&mut buf[0..4], METADATA_SIGNATURE);
        LittleEndian::write_u32(&mut buf[4..8], total as u32);
        LittleEndian::write_u32(&mut buf[8..12], actual as u32);
        LittleEndian::write_u16(&mut buf[12..14], self.flags);
        buf[14] = self.compression.as_u8();
        buf[15] = self.checksum.as_u8();
        LittleEndian::write_u64(&mut buf[16..24], self.len_original);
        LittleEndian::write_u64(&mut buf[24..32], self.len_compressed);
        LittleEndian::write_u32(&mut buf[32..36], self.chunk_size);
        LittleEndian::write_u32(&mut buf[36..40], self.chunk_count);
        LittleEndian::write_u64(&mut buf[40..48], self.ofs_contents);
        LittleEndian::write_u64(&mut buf[48..56], self.ofs_offset_table);
        LittleEndian::write_u64(&mut buf[56..64], self.ofs_checksum_table);
        buf[METADATA_HEAD_SIZE..actual].copy_from_slice(&blob);
        buf
    }

    pub fn unpack<R: Read>(r: &mut R) -> Result<MetadataRecord> {
        let mut buf = vec![0u8; METADATA_BLOCK_SIZE];
        r.read_exact(&mut buf).context("read metadata record")?;

        let sig = LittleEndian::read_u32(&buf[0..4]);
        if sig != METADATA_SIGNATURE {
            return Err(anyhow!("bad metadata signature 0x{:08x}", sig));
        }
        let len_block = LittleEndian::read_u32(&buf[4..8]) as usize;
        let len_actual = LittleEndian::read_u32(&buf[8..12]) as usize;
        if len_block < METADATA_BLOCK_SIZE
            || len_block % METADATA_BLOCK_SIZE != 0
            || len_actual < METADATA_HEAD_SIZE
            || len_actual > len_block
        {
            return Err(anyhow!(
                "metadata record sizes corrupt (lenBlock={}, lenActual={})",
                len_block,
                len_actual
            ));
        }
        if len_block > METADATA_BLOCK_SIZE {
            let head = buf.len();
            buf.resize(len_block, 0);
            r.read_exact(&mut buf[head..])
                .context("read metadata record tail")?;
        }

        let mut rec = MetadataRecord {
            flags: LittleEndian::read_u16(&buf[12..14]),
            compression: Compression::from_u8(buf[14])?,
            checksum: Checksum::from_u8(buf[15])?,
            len_original: LittleEndian::read_u64(&buf[16..24]),
            len_compressed: LittleEndian::read_u64(&buf[24..32]),
            chunk_size: LittleEndian::read_u32(&buf[32..36]),
            chunk_count: LittleEndian::read_u32(&buf[36..40]),
            ofs_contents: LittleEndian::read_u64(&buf[40..48]),
            ofs_offset_table: LittleEndian::read_u64(&buf[48..56]),
            ofs_checksum_table: LittleEndian::read_u64(&buf[56..64]),
            attributes: Vec::new(),
            offset: 0,
            len_block: len_block as u32,
        };
        rec.attributes = decode_attributes(&buf[METADATA_HEAD_SIZE..len_actual])?;
        Ok(rec)
    }
}

fn decode_attributes(mut blob: &[u8]) -> Result<Vec<Attribute>> {
    let mut attrs = Vec::new();
    while !blob.is_empty() {
        if blob[0] != ATTRIBUTE_SIGNATURE {
            return Err(anyhow!("bad attribute signature 0x{:02x}", blob[0]));
        }
        if blob.len() < 3 {
            return Err(anyhow!("attribute record truncated"));
        }
        let flags = blob[1];
        let name_len = blob[2] as usize;
        if blob.len() < 3 + name_len + 2 {
            return Err(anyhow!("attribute record truncated"));
        }
        let name = std::str::from_utf8(&blob[3..3 + name_len])
            .context("attribute name is not valid UTF-8")?
            .to_string();
        let value_len = LittleEndian::read_u16(&blob[3 + name_len..3 + name_len + 2]) as usize;
        let start = 3 + name_len + 2;
        if blob.len() < start + value_len {
            return Err(anyhow!("attribute value truncated"));
        }
        attrs.push(Attribute {
            name,
            value: blob[start..start + value_len].to_vec(),
            indexed: flags & ATTRIBUTE_FLAG_INDEXED != 0,
        });
        if attrs.len() > ATTR_COUNT_MAX {
            return Err(anyhow!("more than {} attributes in one record", ATTR_COUNT_MAX));
        }
        blob = &blob[start + value_len..];
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let mut rec = MetadataRecord::new(Compression::Gzip, Checksum::Sha1);
        rec.len_original = 1 << 21;
        rec.len_compressed = 123_456;
        rec.chunk_size = 16 * 1024;
        rec.chunk_count = 128;
        rec.ofs_contents = 512;
        rec.ofs_offset_table = 999_424;
        rec.ofs_checksum_table = 1_000_448;
        rec.attributes = vec![
            Attribute::new("title", b"hello".to_vec(), true),
            Attribute::new("note", vec![0u8, 1, 2, 255], false),
        ];
        let data = rec.pack();
        assert_eq!(data.len() % METADATA_BLOCK_SIZE, 0);
        assert_eq!(data.len(), rec.len_block as usize);

        let back = MetadataRecord::unpack(&mut data.as_slice()).unwrap();
        assert_eq!(back.compression, Compression::Gzip);
        assert_eq!(back.checksum, Checksum::Sha1);
        assert_eq!(back.len_original, rec.len_original);
        assert_eq!(back.chunk_count, 128);
        assert_eq!(back.attributes, rec.attributes);
        assert!(back.attribute("title").unwrap().indexed);
        assert!(back.attribute("missing").is_none());
    }

    #[test]
    fn record_grows_past_one_block() {
        let mut rec = MetadataRecord::new(Compression::None, Checksum::None);
        for i in 0..10 {
            rec.attributes
                .push(Attribute::new(format!("attr{}", i), vec![i as u8; 100], false));
        }
        let data = rec.pack();
        assert!(data.len() > METADATA_BLOCK_SIZE);
        let back = MetadataRecord::unpack(&mut data.as_slice()).unwrap();
        assert_eq!(back.attributes.len(), 10);
        assert_eq!(back.attributes, rec.attributes);
    }

    #[test]
    fn attribute_limits() {
        assert!(Attribute::new("ok", b"v".to_vec(), true).validate().is_ok());
        assert!(Attribute::new("", b"v".to_vec(), false).validate().is_err());
        assert!(Attribute::new("n", vec![0u8; ATTR_VALUE_MAX + 1], false)
            .validate()
            .is_err());
        assert!(Attribute::new("n", vec![0u8; 256], true).validate().is_err());
        assert!(Attribute::new("n", vec![0u8; 256], false).validate().is_ok());
    }
}
