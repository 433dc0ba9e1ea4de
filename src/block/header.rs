//! Header block (512 B), first block of every pile file.
//!
//! Layout:
//! - [0..4)   signature "PILE" (u32 LE)
//! - [4..6)   version (0x0100)
//! - [6..8)   flags
//! - [8]      file kind
//! - [9]      size limit tag
//! - [10..12) reserved
//! - [12..20) ofsContents (absolute; 0 = no contents region)
//! - [20..28) ofsMetadata
//! - [28..36) ofsIndexes
//! - [36..512) zero padding

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    FILESIZE_MAX_INT32, FORMAT_VERSION, HEADER_BLOCK_SIZE, HEADER_FLAG_NONE, HEADER_SIGNATURE,
};

use super::section::RegionKind;

const OFF_SIG: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_FLAGS: usize = 6;
const OFF_KIND: usize = 8;
const OFF_LIMIT: usize = 9;
const OFF_CONTENTS: usize = 12;
const OFF_METADATA: usize = 20;
const OFF_INDEXES: usize = 28;

/// What a pile file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Contents region only (the `<base>` file of the separate form).
    Contents,
    /// Metadata region only (`<base>.pm`).
    Metadata,
    /// Indexes region only (`<base>.pi`).
    Indexes,
    /// All three regions in one file; read-only.
    Compound,
    /// Metadata + indexes only; read-only.
    Lookup,
}

impl FileKind {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0x01 => Ok(FileKind::Contents),
            0x02 => Ok(FileKind::Metadata),
            0x03 => Ok(FileKind::Indexes),
            0x10 => Ok(FileKind::Compound),
            0x20 => Ok(FileKind::Lookup),
            _ => Err(anyhow!("unknown file kind 0x{:02x}", v)),
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            FileKind::Contents => 0x01,
            FileKind::Metadata => 0x02,
            FileKind::Indexes => 0x03,
            FileKind::Compound => 0x10,
            FileKind::Lookup => 0x20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FileKind::Contents => "contents",
            FileKind::Metadata => "metadata",
            FileKind::Indexes => "indexes",
            FileKind::Compound => "compound",
            FileKind::Lookup => "lookup",
        }
    }
}

/// Maximum file size tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLimit {
    Int32,
    Int64,
}

impl SizeLimit {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0x01 => Ok(SizeLimit::Int32),
            0x03 => Ok(SizeLimit::Int64),
            _ => Err(anyhow!("unknown size limit tag 0x{:02x}", v)),
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            SizeLimit::Int32 => 0x01,
            SizeLimit::Int64 => 0x03,
        }
    }

    #[inline]
    pub fn max_size(self) -> u64 {
        match self {
            SizeLimit::Int32 => FILESIZE_MAX_INT32,
            SizeLimit::Int64 => i64::MAX as u64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub version: u16,
    pub flags: u16,
    pub kind: FileKind,
    pub limit: SizeLimit,
    pub ofs_contents: u64,
    pub ofs_metadata: u64,
    pub ofs_indexes: u64,
}

impl Header {
    pub fn new(kind: FileKind) -> Self {
        Header {
            version: FORMAT_VERSION,
            flags: HEADER_FLAG_NONE,
            kind,
            limit: SizeLimit::Int32,
            ofs_contents: 0,
            ofs_metadata: 0,
            ofs_indexes: 0,
        }
    }

    /// Absolute offset of a region's section block; 0 = region absent.
    #[inline]
    pub fn region_offset(&self, kind: RegionKind) -> u64 {
        match kind {
            RegionKind::Contents => self.ofs_contents,
            RegionKind::Metadata => self.ofs_metadata,
            RegionKind::Indexes => self.ofs_indexes,
        }
    }

    #[inline]
    pub fn set_region_offset(&mut self, kind: RegionKind, ofs: u64) {
        match kind {
            RegionKind::Contents => self.ofs_contents = ofs,
            RegionKind::Metadata => self.ofs_metadata = ofs,
            RegionKind::Indexes => self.ofs_indexes = ofs,
        }
    }

    pub fn pack(&self) -> [u8; HEADER_BLOCK_SIZE] {
        let mut buf = [0u8; HEADER_BLOCK_SIZE];
        LittleEndian::write_u32(&mut buf[OFF_SIG..OFF_SIG + 4], HEADER_SIGNATURE);
        LittleEndian::write_u16(&mut buf[OFF_VERSION..OFF_VERSION + 2], self.version);
        LittleEndian::write_u16(&mut buf[OFF_FLAGS..OFF_FLAGS + 2], self.flags);
        buf[OFF_KIND] = self.kind.as_u8();
        buf[OFF_LIMIT] = self.limit.as_u8();
        LittleEndian::write_u64(&mut buf[OFF_CONTENTS..OFF_CONTENTS + 8], self.ofs_contents);
        LittleEndian::write_u64(&mut buf[OFF_METADATA..OFF_METADATA + 8], self.ofs_metadata);
        LittleEndian::write_u64(&mut buf[OFF_INDEXES..OFF_INDEXES + 8], self.ofs_indexes);
        buf
    }

    pub fn unpack(buf: &[u8]) -> Result<Header> {
        if buf.len() < HEADER_BLOCK_SIZE {
            return Err(anyhow!("header block truncated ({} bytes)", buf.len()));
        }
        let sig = LittleEndian::read_u32(&buf[OFF_SIG..OFF_SIG + 4]);
        if sig != HEADER_SIGNATURE {
            return Err(anyhow!("bad header signature 0x{:08x}, not a pile file", sig));
        }
        let version = LittleEndian::read_u16(&buf[OFF_VERSION..OFF_VERSION + 2]);
        if version != FORMAT_VERSION {
            return Err(anyhow!(
                "unsupported pile format version 0x{:04x} (expected 0x{:04x})",
                version,
                FORMAT_VERSION
            ));
        }
        Ok(Header {
            version,
            flags: LittleEndian::read_u16(&buf[OFF_FLAGS..OFF_FLAGS + 2]),
            kind: FileKind::from_u8(buf[OFF_KIND])?,
            limit: SizeLimit::from_u8(buf[OFF_LIMIT])?,
            ofs_contents: LittleEndian::read_u64(&buf[OFF_CONTENTS..OFF_CONTENTS + 8]),
            ofs_metadata: LittleEndian::read_u64(&buf[OFF_METADATA..OFF_METADATA + 8]),
            ofs_indexes: LittleEndian::read_u64(&buf[OFF_INDEXES..OFF_INDEXES + 8]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let mut h = Header::new(FileKind::Contents);
        h.ofs_contents = 512;
        h.ofs_metadata = 123_456;
        let buf = h.pack();
        assert_eq!(&buf[0..4], b"PILE");
        let back = Header::unpack(&buf).unwrap();
        assert_eq!(back.kind, FileKind::Contents);
        assert_eq!(back.limit, SizeLimit::Int32);
        assert_eq!(back.ofs_contents, 512);
        assert_eq!(back.ofs_metadata, 123_456);
        assert_eq!(back.ofs_indexes, 0);
    }

    #[test]
    fn header_rejects_garbage() {
        let buf = [0u8; HEADER_BLOCK_SIZE];
        assert!(Header::unpack(&buf).is_err());
    }
}
