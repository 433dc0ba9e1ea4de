//! Index table: maps indexed attribute names to B+-tree root offsets.
//!
//! Variable-length, padded to a multiple of 512 B. The 32-B head:
//! - [0..4)   signature "IDXT" (u32 LE)
//! - [4..8)   lenBlock
//! - [8..12)  lenActual
//! - [12..32) zero padding
//!
//! Followed by one record per index:
//! `{0xE1, kind:u8 (0x01 = B+-tree), nameLen:u8, name, rootOffset:u64}`.

use std::io::Read;

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    INDEX_KIND_BTREE, INDEX_SIGNATURE, INDEX_TABLE_BLOCK_SIZE, INDEX_TABLE_HEAD_SIZE,
    INDEX_TABLE_SIGNATURE,
};

use super::padded_len;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTableEntry {
    pub name: String,
    pub ofs_root: u64,
}

#[derive(Debug, Clone, Default)]
pub struct IndexTable {
    pub entries: Vec<IndexTableEntry>,
    /// Padded on-disk size; set by pack/unpack, 0 until first packed.
    pub len_block: u32,
}

impl IndexTable {
    pub fn new() -> Self {
        IndexTable::default()
    }

    pub fn root_of(&self, name: &str) -> Option<u64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.ofs_root)
    }

    pub fn push(&mut self, name: &str, ofs_root: u64) {
        self.entries.push(IndexTableEntry {
            name: name.to_string(),
            ofs_root,
        });
    }

    /// Replace an old root offset with a new one (root split). Returns false
    /// when no index currently points at `old_root`.
    pub fn reroot(&mut self, old_root: u64, new_root: u64) -> bool {
        for e in &mut self.entries {
            if e.ofs_root == old_root {
                e.ofs_root = new_root;
                return true;
            }
        }
        false
    }

    pub fn pack(&mut self) -> Vec<u8> {
        let mut blob = Vec::new();
        for e in &self.entries {
            blob.push(INDEX_SIGNATURE);
            blob.push(INDEX_KIND_BTREE);
            blob.push(e.name.len() as u8);
            blob.extend_from_slice(e.name.as_bytes());
            let mut root = [0u8; 8];
            LittleEndian::write_u64(&mut root, e.ofs_root);
            blob.extend_from_slice(&root);
        }
        let actual = INDEX_TABLE_HEAD_SIZE + blob.len();
        let total = padded_len(actual, INDEX_TABLE_BLOCK_SIZE);
        self.len_block = total as u32;

        let mut buf = vec![0u8; total];
        LittleEndian::write_u32(&mut buf[0..4], INDEX_TABLE_SIGNATURE);
        LittleEndian::write_u32(&mut buf[4..8], total as u32);
        LittleEndian::write_u32(&mut buf[8..12], actual as u32);
        buf[INDEX_TABLE_HEAD_SIZE..actual].copy_from_slice(&blob);
        buf
    }

    pub fn unpack<R: Read>(r: &mut R) -> Result<IndexTable> {
        let mut buf = vec![0u8; INDEX_TABLE_BLOCK_SIZE];
        r.read_exact(&mut buf).context("read index table")?;

        let sig = LittleEndian::read_u32(&buf[0..4]);
        if sig != INDEX_TABLE_SIGNATURE {
            return Err(anyhow!("bad index table signature 0x{:08x}", sig));
        }
        let len_block = LittleEndian::read_u32(&buf[4..8]) as usize;
        let len_actual = LittleEndian::read_u32(&buf[8..12]) as usize;
        if len_block < INDEX_TABLE_BLOCK_SIZE
            || len_block % INDEX_TABLE_BLOCK_SIZE != 0
            || len_actual < INDEX_TABLE_HEAD_SIZE
            || len_actual > len_block
        {
            return Err(anyhow!(
                "index table sizes corrupt (lenBlock={}, lenActual={})",
                len_block,
                len_actual
            ));
        }
        if len_block > INDEX_TABLE_BLOCK_SIZE {
            let head = buf.len();
            buf.resize(len_block, 0);
            r.read_exact(&mut buf[head..]).context("read index table tail")?;
        }

        let mut entries = Vec::new();
        let mut blob = &buf[INDEX_TABLE_HEAD_SIZE..len_actual];
        while !blob.is_empty() {
            if blob[0] != INDEX_SIGNATURE {
                return Err(anyhow!("bad index record signature 0x{:02x}", blob[0]));
            }
            if blob.len() < 3 {
                return Err(anyhow!("index record truncated"));
            }
            if blob[1] != INDEX_KIND_BTREE {
                return Err(anyhow!("unknown index kind 0x{:02x}", blob[1]));
            }
            let name_len = blob[2] as usize;
            if blob.len() < 3 + name_len + 8 {
                return Err(anyhow!("index record truncated"));
            }
            let name = std::str::from_utf8(&blob[3..3 + name_len])
                .context("index name is not valid UTF-8")?
                .to_string();
            let ofs_root = LittleEndian::read_u64(&blob[3 + name_len..3 + name_len + 8]);
            entries.push(IndexTableEntry { name, ofs_root });
            blob = &blob[3 + name_len + 8..];
        }
        Ok(IndexTable {
            entries,
            len_block: len_block as u32,
        })
    }
}
