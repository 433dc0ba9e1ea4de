//! Section block (512 B), the first block of every region.
//!
//! Layout:
//! - [0..4)   signature "SECT" (u32 LE)
//! - [4]      region kind
//! - [5]      reserved
//! - [8..16)  length: bytes used by the region, including this block
//! - [16..24) ofsTable: indexes region only, offset of the index table
//! - [24..32) ofsFirst: metadata region only, offset of the first record
//! - [32..512) zero padding
//!
//! All offsets stored inside a region are relative to its section block, so
//! offset 0 addresses the section itself and doubles as the null offset.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{SECTION_BLOCK_SIZE, SECTION_SIGNATURE};

const OFF_SIG: usize = 0;
const OFF_KIND: usize = 4;
const OFF_LENGTH: usize = 8;
const OFF_TABLE: usize = 16;
const OFF_FIRST: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Contents,
    Metadata,
    Indexes,
}

impl RegionKind {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0x01 => Ok(RegionKind::Contents),
            0x02 => Ok(RegionKind::Metadata),
            0x04 => Ok(RegionKind::Indexes),
            _ => Err(anyhow!("unknown region kind 0x{:02x}", v)),
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            RegionKind::Contents => 0x01,
            RegionKind::Metadata => 0x02,
            RegionKind::Indexes => 0x04,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Section {
    pub kind: RegionKind,
    pub length: u64,
    pub ofs_table: u64,
    pub ofs_first: u64,
}

impl Section {
    pub fn new(kind: RegionKind) -> Self {
        Section {
            kind,
            length: SECTION_BLOCK_SIZE as u64,
            ofs_table: 0,
            ofs_first: 0,
        }
    }

    pub fn pack(&self) -> [u8; SECTION_BLOCK_SIZE] {
        let mut buf = [0u8; SECTION_BLOCK_SIZE];
        LittleEndian::write_u32(&mut buf[OFF_SIG..OFF_SIG + 4], SECTION_SIGNATURE);
        buf[OFF_KIND] = self.kind.as_u8();
        LittleEndian::write_u64(&mut buf[OFF_LENGTH..OFF_LENGTH + 8], self.length);
        LittleEndian::write_u64(&mut buf[OFF_TABLE..OFF_TABLE + 8], self.ofs_table);
        LittleEndian::write_u64(&mut buf[OFF_FIRST..OFF_FIRST + 8], self.ofs_first);
        buf
    }

    pub fn unpack(buf: &[u8]) -> Result<Section> {
        if buf.len() < SECTION_BLOCK_SIZE {
            return Err(anyhow!("section block truncated ({} bytes)", buf.len()));
        }
        let sig = LittleEndian::read_u32(&buf[OFF_SIG..OFF_SIG + 4]);
        if sig != SECTION_SIGNATURE {
            return Err(anyhow!("bad section signature 0x{:08x}", sig));
        }
        Ok(Section {
            kind: RegionKind::from_u8(buf[OFF_KIND])?,
            length: LittleEndian::read_u64(&buf[OFF_LENGTH..OFF_LENGTH + 8]),
            ofs_table: LittleEndian::read_u64(&buf[OFF_TABLE..OFF_TABLE + 8]),
            ofs_first: LittleEndian::read_u64(&buf[OFF_FIRST..OFF_FIRST + 8]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_roundtrip() {
        let mut s = Section::new(RegionKind::Metadata);
        s.length = 4096;
        s.ofs_first = 512;
        let buf = s.pack();
        let back = Section::unpack(&buf).unwrap();
        assert_eq!(back.kind, RegionKind::Metadata);
        assert_eq!(back.length, 4096);
        assert_eq!(back.ofs_table, 0);
        assert_eq!(back.ofs_first, 512);
    }
}
