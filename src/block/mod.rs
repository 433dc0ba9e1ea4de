//! Codecs for the five on-disk block kinds.
//!
//! Header and section blocks are fixed 512 B; nodes are fixed 4096 B;
//! metadata records and the index table are variable-length, padded to a
//! multiple of 512 B (lenBlock = padded size, lenActual = used size).

pub mod header;
pub mod metadata;
pub mod node;
pub mod section;
pub mod table;

pub use header::{FileKind, Header, SizeLimit};
pub use metadata::{Attribute, MetadataRecord};
pub use node::{element_size, Element, Node};
pub use section::{RegionKind, Section};
pub use table::{IndexTable, IndexTableEntry};

use anyhow::{anyhow, Result};

/// Compression applied to content chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    /// zlib framing (RFC 1950).
    Gzip,
    Bzip2,
}

impl Compression {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Gzip),
            2 => Ok(Compression::Bzip2),
            _ => Err(anyhow!("unknown compression tag 0x{:02x}", v)),
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Gzip => 1,
            Compression::Bzip2 => 2,
        }
    }
}

/// Per-chunk checksum algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Checksum {
    #[default]
    None,
    Crc32,
    Md5,
    Sha1,
}

impl Checksum {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Checksum::None),
            1 => Ok(Checksum::Crc32),
            2 => Ok(Checksum::Md5),
            3 => Ok(Checksum::Sha1),
            _ => Err(anyhow!("unknown checksum tag 0x{:02x}", v)),
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            Checksum::None => 0,
            Checksum::Crc32 => 1,
            Checksum::Md5 => 2,
            Checksum::Sha1 => 3,
        }
    }

    /// Digest width in bytes (one slot of the checksum table).
    #[inline]
    pub fn width(self) -> usize {
        match self {
            Checksum::None => 0,
            Checksum::Crc32 => 4,
            Checksum::Md5 => 16,
            Checksum::Sha1 => 20,
        }
    }
}

/// Round a variable block length up to its granularity.
#[inline]
pub(crate) fn padded_len(actual: usize, block_size: usize) -> usize {
    (actual + block_size - 1) / block_size * block_size
}
