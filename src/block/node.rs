//! B+-tree node block (4096 B).
//!
//! The 32-B head:
//! - [0..4)  signature "NODE" (u32 LE)
//! - [4]     isLeaf (0/1)
//! - [5]     reserved
//! - [6..8)  numElement
//! - [8..16) ofsExtra: leftmost child for internal nodes, next-leaf chain
//!           pointer for leaves (0 = none)
//! - [16..32) zero padding
//!
//! Data area (4064 B): fixed 10-B slots (keyPtr:u16, value:u64) grow forward
//! from byte 32; key bytes `{len:u8, key}` grow back-to-front from byte 4096.
//! keyPtr is the block-absolute position of the len byte. The accounted size
//! of an element is 2 + 8 + 1 + len(key); a node whose total exceeds the data
//! budget is overflowed (in-memory only, never packed).

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{NODE_BLOCK_SIZE, NODE_DATA_SIZE, NODE_HEAD_SIZE, NODE_SIGNATURE};

const OFF_LEAF: usize = 4;
const OFF_COUNT: usize = 6;
const OFF_EXTRA: usize = 8;
const SLOT_SIZE: usize = 10;

/// Accounted byte cost of one element: slot + key length byte + key bytes.
#[inline]
pub fn element_size(key: &[u8]) -> usize {
    2 + 8 + 1 + key.len()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub key: Vec<u8>,
    /// Metadata offset in leaves, child node offset in internal nodes.
    pub value: u64,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub is_leaf: bool,
    pub extra: u64,
    pub elements: Vec<Element>,
    /// Accounted element bytes; overflow past NODE_DATA_SIZE triggers a split.
    pub size: usize,
    /// Region-relative offset of this node.
    pub offset: u64,
    pub dirty: bool,
}

impl Node {
    pub fn new(is_leaf: bool, offset: u64) -> Self {
        Node {
            is_leaf,
            extra: 0,
            elements: Vec::new(),
            size: 0,
            offset,
            dirty: false,
        }
    }

    #[inline]
    pub fn is_overflowed(&self) -> bool {
        self.size > NODE_DATA_SIZE
    }

    pub fn first_key(&self) -> Option<&[u8]> {
        self.elements.first().map(|e| e.key.as_slice())
    }

    /// Append an element at the end. On an empty internal node with no
    /// leftmost child yet, the value becomes `extra` and the key is dropped.
    pub fn append_element(&mut self, key: &[u8], value: u64) {
        self.dirty = true;
        if !self.is_leaf && self.extra == 0 && self.elements.is_empty() {
            self.extra = value;
            return;
        }
        self.size += element_size(key);
        self.elements.push(Element {
            key: key.to_vec(),
            value,
        });
    }

    /// Insert right after position `after` (None = before everything).
    pub fn insert_element_after(&mut self, key: &[u8], value: u64, after: Option<usize>) {
        let idx = match after {
            Some(p) => p + 1,
            None => 0,
        };
        if idx >= self.elements.len() {
            self.append_element(key, value);
            return;
        }
        self.dirty = true;
        self.size += element_size(key);
        self.elements.insert(
            idx,
            Element {
                key: key.to_vec(),
                value,
            },
        );
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        if self.is_overflowed() {
            return Err(anyhow!(
                "node at {} is overflowed ({} bytes) and cannot be packed",
                self.offset,
                self.size
            ));
        }
        let mut buf = vec![0u8; NODE_BLOCK_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], NODE_SIGNATURE);
        buf[OFF_LEAF] = self.is_leaf as u8;
        LittleEndian::write_u16(&mut buf[OFF_COUNT..OFF_COUNT + 2], self.elements.len() as u16);
        LittleEndian::write_u64(&mut buf[OFF_EXTRA..OFF_EXTRA + 8], self.extra);

        let mut slot = NODE_HEAD_SIZE;
        let mut tail = NODE_BLOCK_SIZE;
        for e in &self.elements {
            tail -= 1 + e.key.len();
            buf[tail] = e.key.len() as u8;
            buf[tail + 1..tail + 1 + e.key.len()].copy_from_slice(&e.key);
            LittleEndian::write_u16(&mut buf[slot..slot + 2], tail as u16);
            LittleEndian::write_u64(&mut buf[slot + 2..slot + 10], e.value);
            slot += SLOT_SIZE;
        }
        Ok(buf)
    }

    pub fn unpack(buf: &[u8], offset: u64) -> Result<Node> {
        if buf.len() < NODE_BLOCK_SIZE {
            return Err(anyhow!("node block truncated ({} bytes)", buf.len()));
        }
        let sig = LittleEndian::read_u32(&buf[0..4]);
        if sig != NODE_SIGNATURE {
            return Err(anyhow!("bad node signature 0x{:08x} at {}", sig, offset));
        }
        let is_leaf = buf[OFF_LEAF] != 0;
        let count = LittleEndian::read_u16(&buf[OFF_COUNT..OFF_COUNT + 2]) as usize;
        let extra = LittleEndian::read_u64(&buf[OFF_EXTRA..OFF_EXTRA + 8]);

        let mut elements = Vec::with_capacity(count);
        let mut size = 0usize;
        for i in 0..count {
            let slot = NODE_HEAD_SIZE + i * SLOT_SIZE;
            let key_ptr = LittleEndian::read_u16(&buf[slot..slot + 2]) as usize;
            let value = LittleEndian::read_u64(&buf[slot + 2..slot + 10]);
            if key_ptr < NODE_HEAD_SIZE || key_ptr >= NODE_BLOCK_SIZE {
                return Err(anyhow!("node at {}: key pointer {} out of range", offset, key_ptr));
            }
            let key_len = buf[key_ptr] as usize;
            if key_ptr + 1 + key_len > NODE_BLOCK_SIZE {
                return Err(anyhow!("node at {}: key overruns the block", offset));
            }
            let key = buf[key_ptr + 1..key_ptr + 1 + key_len].to_vec();
            size += element_size(&key);
            elements.push(Element { key, value });
        }
        if size > NODE_DATA_SIZE {
            return Err(anyhow!("node at {}: element bytes exceed the data area", offset));
        }
        Ok(Node {
            is_leaf,
            extra,
            elements,
            size,
            offset,
            dirty: false,
        })
    }
}
