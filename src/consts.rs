//! On-disk format constants (header, sections, metadata, index table, nodes).
//!
//! Every multi-byte integer in the format is little-endian. 64-bit offsets
//! are stored as two consecutive u32 words (low, high), byte-identical to a
//! little-endian u64.

// -------- Block signatures --------
pub const HEADER_SIGNATURE: u32 = 0x454C_4950; // "PILE"
pub const SECTION_SIGNATURE: u32 = 0x5443_4553; // "SECT"
pub const METADATA_SIGNATURE: u32 = 0x4154_454D; // "META"
pub const INDEX_TABLE_SIGNATURE: u32 = 0x5458_4449; // "IDXT"
pub const NODE_SIGNATURE: u32 = 0x4544_4F4E; // "NODE"

/// Per-attribute record signature inside a metadata blob.
pub const ATTRIBUTE_SIGNATURE: u8 = 0xD5;
/// Per-index record signature inside the index table blob.
pub const INDEX_SIGNATURE: u8 = 0xE1;

// -------- Block sizes --------
pub const BASE_BLOCK_SIZE: usize = 512;
pub const HEADER_BLOCK_SIZE: usize = 512;
pub const SECTION_BLOCK_SIZE: usize = 512;
pub const METADATA_BLOCK_SIZE: usize = 512;
pub const INDEX_TABLE_BLOCK_SIZE: usize = 512;
pub const NODE_BLOCK_SIZE: usize = 4096;

// -------- Fixed head sizes inside variable-length blocks --------
pub const METADATA_HEAD_SIZE: usize = 96;
pub const INDEX_TABLE_HEAD_SIZE: usize = 32;
pub const NODE_HEAD_SIZE: usize = 32;

/// Element byte budget of a node (NODE_BLOCK_SIZE - NODE_HEAD_SIZE).
///
/// The largest element is 2 + 8 + 1 + 255 = 266 bytes, so the half-budget
/// split point always leaves at least one element on each side.
pub const NODE_DATA_SIZE: usize = 4064;

// -------- Header --------
pub const FORMAT_VERSION: u16 = 0x0100;
pub const HEADER_FLAG_NONE: u16 = 0x0000;
pub const METADATA_FLAG_NONE: u16 = 0x0000;

// -------- Attribute / index flags --------
pub const ATTRIBUTE_FLAG_INDEXED: u8 = 0x01;
pub const INDEX_KIND_BTREE: u8 = 0x01;

// -------- Attribute limits --------
pub const ATTR_NAME_MAX: usize = 255;
pub const ATTR_VALUE_MAX: usize = 65_535;
pub const ATTR_INDEXED_VALUE_MAX: usize = 255;
pub const ATTR_COUNT_MAX: usize = 255;

// -------- File size limit for the int32 limit tag --------
pub const FILESIZE_MAX_INT32: u64 = 2_113_929_216;

// -------- Node cache watermarks --------
pub const NODE_CACHE_MAX: usize = 1024;
pub const NODE_CACHE_LOW: usize = 768;

// -------- File naming (separate storage form) --------
pub const METADATA_FILE_SUFFIX: &str = ".pm";
pub const INDEXES_FILE_SUFFIX: &str = ".pi";
pub const LOCK_FILE_SUFFIX: &str = ".lock";
