//! Bounded cache of decoded B+-tree nodes.
//!
//! Keyed by region offset, with monotonically stamped access order, a parent
//! map (kept even for evicted nodes, refreshed on every descent) and a pin
//! set. While a protection scope is open, every touched node is pinned and
//! survives both eviction and flush; scopes do not nest and are opened only
//! by the public find/index entry points.

use std::collections::{HashMap, HashSet};

use crate::block::Node;
use crate::consts::{NODE_CACHE_LOW, NODE_CACHE_MAX};

pub(crate) struct NodeCache {
    nodes: HashMap<u64, Node>,
    access: HashMap<u64, u64>,
    parents: HashMap<u64, Option<u64>>,
    pins: HashSet<u64>,
    protecting: bool,
    tick: u64,
}

impl NodeCache {
    pub fn new() -> Self {
        NodeCache {
            nodes: HashMap::new(),
            access: HashMap::new(),
            parents: HashMap::new(),
            pins: HashSet::new(),
            protecting: false,
            tick: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn contains(&self, offset: u64) -> bool {
        self.nodes.contains_key(&offset)
    }

    pub fn get(&self, offset: u64) -> Option<&Node> {
        self.nodes.get(&offset)
    }

    pub fn get_mut(&mut self, offset: u64) -> Option<&mut Node> {
        self.nodes.get_mut(&offset)
    }

    /// Mark as most recently used; pinned for the rest of an open scope.
    pub fn touch(&mut self, offset: u64) {
        self.tick += 1;
        self.access.insert(offset, self.tick);
        if self.protecting {
            self.pins.insert(offset);
        }
    }

    pub fn insert(&mut self, node: Node) {
        let offset = node.offset;
        self.nodes.insert(offset, node);
        self.touch(offset);
    }

    pub fn set_parent(&mut self, child: u64, parent: Option<u64>) {
        self.parents.insert(child, parent);
    }

    /// Outer Option: is the parent known at all.
    pub fn parent(&self, child: u64) -> Option<Option<u64>> {
        self.parents.get(&child).copied()
    }

    pub fn begin_protection(&mut self) {
        debug_assert!(!self.protecting, "protection scopes do not nest");
        self.protecting = true;
        self.pins.clear();
    }

    pub fn end_protection(&mut self) {
        debug_assert!(self.protecting);
        self.protecting = false;
        self.pins.clear();
    }

    #[inline]
    pub fn is_pinned(&self, offset: u64) -> bool {
        self.pins.contains(&offset)
    }

    /// Offsets of all cached nodes, oldest access first.
    pub fn offsets_by_age(&self) -> Vec<u64> {
        let mut order: Vec<(u64, u64)> = self
            .nodes
            .keys()
            .map(|&o| (self.access.get(&o).copied().unwrap_or(0), o))
            .collect();
        order.sort_unstable();
        order.into_iter().map(|(_, o)| o).collect()
    }

    /// When over the high-water mark, remove nodes down to the low-water
    /// mark, oldest first, and return them for write-back. Pinned and
    /// overflowed nodes are never selected.
    pub fn evict_victims(&mut self) -> Vec<Node> {
        if self.nodes.len() <= NODE_CACHE_MAX {
            return Vec::new();
        }
        let mut victims = Vec::new();
        let mut remaining = self.nodes.len();
        for offset in self.offsets_by_age() {
            if remaining <= NODE_CACHE_LOW {
                break;
            }
            if self.pins.contains(&offset) {
                continue;
            }
            let overflowed = self
                .nodes
                .get(&offset)
                .map(|n| n.is_overflowed())
                .unwrap_or(false);
            if overflowed {
                continue;
            }
            if let Some(node) = self.nodes.remove(&offset) {
                self.access.remove(&offset);
                victims.push(node);
                remaining -= 1;
            }
        }
        victims
    }

    /// Drop cached nodes after a flush: unpinned ones inside a protection
    /// scope, everything (including parent links) outside of one.
    pub fn prune(&mut self) {
        if self.protecting {
            let keep = &self.pins;
            self.nodes.retain(|o, _| keep.contains(o));
            self.access.retain(|o, _| keep.contains(o));
        } else {
            self.nodes.clear();
            self.access.clear();
            self.parents.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_at(offset: u64) -> Node {
        Node::new(true, offset)
    }

    #[test]
    fn eviction_respects_watermarks_and_age() {
        let mut cache = NodeCache::new();
        for i in 0..NODE_CACHE_MAX as u64 + 1 {
            cache.insert(node_at(i * 4096));
        }
        let victims = cache.evict_victims();
        assert_eq!(cache.len(), NODE_CACHE_LOW);
        assert_eq!(victims.len(), NODE_CACHE_MAX + 1 - NODE_CACHE_LOW);
        // oldest inserts go first
        assert_eq!(victims[0].offset, 0);
        assert!(!cache.contains(0));
        assert!(cache.contains(NODE_CACHE_MAX as u64 * 4096));
    }

    #[test]
    fn protected_operation_defers_eviction() {
        let mut cache = NodeCache::new();
        for i in 0..200u64 {
            cache.insert(node_at(i * 4096));
        }
        cache.begin_protection();
        // one operation touches more nodes than the cache may hold
        for i in 200..NODE_CACHE_MAX as u64 + 10 {
            cache.insert(node_at(i * 4096));
        }
        cache.touch(0); // revisited old node joins the pinned set
        let victims = cache.evict_victims();
        assert!(cache.contains(0), "pinned node evicted");
        // only the 199 unpinned leftovers were candidates, pressure or not
        assert_eq!(victims.len(), 199);
        assert!(victims
            .iter()
            .all(|n| n.offset >= 4096 && n.offset < 200 * 4096));
        cache.end_protection();

        // with the scope closed, the next pass drains to the low-water mark
        for i in 0..200u64 {
            cache.insert(node_at((NODE_CACHE_MAX as u64 + 10 + i) * 4096));
        }
        let victims = cache.evict_victims();
        assert_eq!(cache.len(), NODE_CACHE_LOW);
        assert!(!victims.is_empty());
    }

    #[test]
    fn overflowed_nodes_are_not_evicted() {
        let mut cache = NodeCache::new();
        let mut fat = node_at(0);
        let key = vec![1u8; 255];
        while !fat.is_overflowed() {
            fat.append_element(&key, 9);
        }
        cache.insert(fat);
        for i in 1..NODE_CACHE_MAX as u64 + 5 {
            cache.insert(node_at(i * 4096));
        }
        let victims = cache.evict_victims();
        assert!(cache.contains(0), "overflowed node must stay resident");
        assert!(victims.iter().all(|n| n.offset != 0));
    }

    #[test]
    fn prune_keeps_only_pins_inside_scope() {
        let mut cache = NodeCache::new();
        cache.insert(node_at(0));
        cache.begin_protection();
        cache.insert(node_at(4096));
        cache.prune();
        assert!(cache.contains(4096));
        assert!(!cache.contains(0));
        cache.end_protection();
        cache.prune();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.parent(4096), None);
    }
}
