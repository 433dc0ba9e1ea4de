//! Index engine: one B+-tree per indexed attribute name.
//!
//! The index table maps names to root offsets and lives in the indexes
//! region; nodes are 4096-B blocks allocated at the region end. Decoded nodes
//! live in a bounded cache and are written back on flush or eviction. The two
//! public entry points (`find`, `index_entry`) open a protection scope so
//! every node an operation touches stays resident until the call returns.

mod cache;
mod search;
mod tree;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::debug;

use crate::block::{FileKind, IndexTable, MetadataRecord, Node, RegionKind};
use crate::consts::NODE_BLOCK_SIZE;
use crate::region::Region;

use cache::NodeCache;
use search::{search_leftmost, SearchPos};

pub struct IndexStore {
    region: Region,
    table: IndexTable,
    cache: NodeCache,
}

impl IndexStore {
    /// Create a fresh indexes file: header, section, empty index table.
    pub fn create(path: &Path) -> Result<()> {
        Region::create(path, FileKind::Indexes, RegionKind::Indexes)?;
        let mut region = Region::open_path(path, RegionKind::Indexes, false)?;
        let mut table = IndexTable::new();
        let data = table.pack();
        let ofs = region.append(&data)?;
        region.section.ofs_table = ofs;
        region.flush()
    }

    pub fn open(mut region: Region) -> Result<Self> {
        let ofs = region.section.ofs_table;
        if ofs == 0 {
            return Err(anyhow!("indexes region has no index table"));
        }
        let table = IndexTable::unpack(region.reader_at(ofs)?)?;
        Ok(IndexStore {
            region,
            table,
            cache: NodeCache::new(),
        })
    }

    pub fn index_names(&self) -> Vec<String> {
        self.table.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Write back dirty nodes, record the region length, fsync.
    pub fn flush(&mut self) -> Result<()> {
        if self.region.readonly() {
            return Ok(());
        }
        self.flush_nodes()?;
        self.region.flush()
    }

    /// Metadata offsets of every entry whose `name` attribute equals `value`,
    /// in insertion order. `Ok(None)` when no index exists for the name.
    pub fn find(&mut self, name: &str, value: &[u8]) -> Result<Option<Vec<u64>>> {
        let Some(root) = self.table.root_of(name) else {
            return Ok(None);
        };
        self.cache.begin_protection();
        let result = self.find_in_tree(root, value);
        self.cache.end_protection();
        result.map(Some)
    }

    /// Insert every indexed attribute of an already-stored entry into its
    /// tree, creating trees on first use.
    pub fn index_entry(&mut self, desc: &MetadataRecord) -> Result<()> {
        if !desc.attributes.iter().any(|a| a.indexed) {
            return Ok(());
        }
        self.cache.begin_protection();
        let result = self.index_entry_inner(desc);
        self.cache.end_protection();
        result
    }

    fn index_entry_inner(&mut self, desc: &MetadataRecord) -> Result<()> {
        for attr in desc.attributes.iter().filter(|a| a.indexed) {
            let root = match self.table.root_of(&attr.name) {
                Some(root) => root,
                None => {
                    let root = self.create_node(true, None)?;
                    debug!("new index '{}' with root at {}", attr.name, root);
                    self.table.push(&attr.name, root);
                    self.write_table()?;
                    self.flush()?;
                    root
                }
            };
            self.tree_insert(root, &attr.value, desc.offset)
                .with_context(|| format!("index '{}'", attr.name))?;
        }
        Ok(())
    }

    /// Descends left of an equal separator: a split may divide a duplicate
    /// run across two leaves, so the run can start one leaf before the one
    /// the separator points at. The leaf scan hops the chain to compensate.
    fn find_in_tree(&mut self, root: u64, key: &[u8]) -> Result<Vec<u64>> {
        let mut offset = root;
        loop {
            let node = self.node(offset)?;
            if node.is_leaf {
                break;
            }
            offset = match search_leftmost(&node.elements, key, true) {
                SearchPos::BeforeAll => node.extra,
                SearchPos::Found(0) => node.extra,
                SearchPos::Found(i) => node.elements[i - 1].value,
                SearchPos::Anchor(i) => node.elements[i].value,
                SearchPos::NotFound => {
                    return Err(anyhow!("index corrupt: descent failed at node {}", offset))
                }
            };
        }

        // first element not ordering below the key
        let mut pos = {
            let leaf = self.node(offset)?;
            match search_leftmost(&leaf.elements, key, true) {
                SearchPos::Found(i) => i,
                SearchPos::BeforeAll | SearchPos::NotFound => 0,
                SearchPos::Anchor(i) => i + 1,
            }
        };

        let mut values = Vec::new();
        loop {
            let node = self.node(offset)?;
            if pos >= node.elements.len() {
                if node.extra == 0 {
                    break;
                }
                offset = node.extra;
                pos = 0;
                continue;
            }
            match node.elements[pos].key.as_slice().cmp(key) {
                std::cmp::Ordering::Less => pos += 1,
                std::cmp::Ordering::Equal => {
                    values.push(node.elements[pos].value);
                    pos += 1;
                }
                std::cmp::Ordering::Greater => break,
            }
        }
        Ok(values)
    }

    // ---------------- node plumbing ----------------

    /// Cached node at a region offset, loading it on a miss.
    fn node(&mut self, offset: u64) -> Result<&Node> {
        self.load_node(offset)?;
        self.cache
            .get(offset)
            .ok_or_else(|| anyhow!("node at {} vanished from the cache", offset))
    }

    fn node_mut(&mut self, offset: u64) -> Result<&mut Node> {
        self.load_node(offset)?;
        self.cache
            .get_mut(offset)
            .ok_or_else(|| anyhow!("node at {} vanished from the cache", offset))
    }

    fn load_node(&mut self, offset: u64) -> Result<()> {
        if self.cache.contains(offset) {
            self.cache.touch(offset);
            return Ok(());
        }
        self.evict_if_needed()?;
        let mut buf = vec![0u8; NODE_BLOCK_SIZE];
        self.region
            .read_exact_at(offset, &mut buf)
            .with_context(|| format!("read node at {}", offset))?;
        let node = Node::unpack(&buf, offset)?;
        self.cache.insert(node);
        Ok(())
    }

    /// Allocate a node at the region end; the block itself is written at the
    /// next flush or eviction.
    fn create_node(&mut self, is_leaf: bool, parent: Option<u64>) -> Result<u64> {
        self.evict_if_needed()?;
        let offset = self.region.reserve(NODE_BLOCK_SIZE as u64);
        let mut node = Node::new(is_leaf, offset);
        node.dirty = true;
        self.cache.insert(node);
        self.cache.set_parent(offset, parent);
        Ok(offset)
    }

    fn evict_if_needed(&mut self) -> Result<()> {
        let victims = self.cache.evict_victims();
        if victims.is_empty() {
            return Ok(());
        }
        debug!("evicting {} nodes", victims.len());
        for node in victims {
            if node.dirty && !self.region.readonly() {
                let data = node.pack()?;
                self.region.write_all_at(node.offset, &data)?;
            }
        }
        Ok(())
    }

    fn flush_nodes(&mut self) -> Result<()> {
        for offset in self.cache.offsets_by_age() {
            let data = match self.cache.get(offset) {
                Some(node) if node.dirty && !node.is_overflowed() => node.pack()?,
                _ => continue,
            };
            self.region.write_all_at(offset, &data)?;
            if let Some(node) = self.cache.get_mut(offset) {
                node.dirty = false;
            }
        }
        self.cache.prune();
        Ok(())
    }

    /// Persist the index table, relocating it to the region end when it has
    /// outgrown its block.
    fn write_table(&mut self) -> Result<()> {
        let old_len = self.table.len_block;
        let data = self.table.pack();
        if old_len != 0 && self.table.len_block > old_len {
            let ofs = self.region.append(&data)?;
            debug!("index table relocated to {}", ofs);
            self.region.section.ofs_table = ofs;
            self.region.write_section()?;
        } else {
            let ofs = self.region.section.ofs_table;
            self.region.write_all_at(ofs, &data)?;
        }
        Ok(())
    }
}
