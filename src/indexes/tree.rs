//! B+-tree insertion and node splitting.
//!
//! Inserts descend with the rightmost search so duplicate keys append after
//! their existing run. A split needs at least two elements and an overflowed
//! byte budget; the split point accumulates element sizes past half the
//! budget, then backs up to the start of a duplicate run so equal keys stay
//! in one leaf whenever the run does not occupy the whole left half.

use anyhow::{anyhow, Result};
use log::debug;

use crate::block::{element_size, Element, Node};
use crate::consts::NODE_DATA_SIZE;

use super::search::{search_leftmost, search_rightmost, SearchPos};
use super::IndexStore;

impl IndexStore {
    pub(crate) fn tree_insert(&mut self, root: u64, key: &[u8], value: u64) -> Result<()> {
        self.cache.set_parent(root, None);
        let mut offset = root;
        loop {
            let child = {
                let node = self.node(offset)?;
                if node.is_leaf {
                    break;
                }
                match search_rightmost(&node.elements, key, true) {
                    SearchPos::BeforeAll => node.extra,
                    SearchPos::Found(i) | SearchPos::Anchor(i) => node.elements[i].value,
                    SearchPos::NotFound => {
                        return Err(anyhow!("index corrupt: descent failed at node {}", offset))
                    }
                }
            };
            self.cache.set_parent(child, Some(offset));
            offset = child;
        }

        let after = {
            let leaf = self.node(offset)?;
            match search_rightmost(&leaf.elements, key, true) {
                SearchPos::BeforeAll => None,
                SearchPos::Found(i) | SearchPos::Anchor(i) => Some(i),
                SearchPos::NotFound => {
                    return Err(anyhow!("index corrupt: no insert anchor in leaf {}", offset))
                }
            }
        };
        let overflowed = {
            let leaf = self.node_mut(offset)?;
            leaf.insert_element_after(key, value, after);
            leaf.is_overflowed()
        };
        if overflowed {
            self.split_node(offset)?;
        }
        Ok(())
    }

    fn split_node(&mut self, offset: u64) -> Result<()> {
        let is_leaf = {
            let node = self.node(offset)?;
            if node.elements.len() < 2 {
                return Err(anyhow!("cannot split node {} with fewer than 2 elements", offset));
            }
            node.is_leaf
        };
        let parent = self.parent_for_split(offset)?;
        let sibling = self.create_node(is_leaf, Some(parent))?;
        debug!(
            "splitting {} node {} into sibling {} under parent {}",
            if is_leaf { "leaf" } else { "internal" },
            offset,
            sibling,
            parent
        );
        self.divide(offset, sibling, parent)?;

        let parent_overflowed = self.node(parent)?.is_overflowed();
        if parent_overflowed {
            self.split_node(parent)?;
        }
        Ok(())
    }

    /// The parent to receive the promoted element. Splitting the root first
    /// synthesizes a new root whose `extra` is the old one; the index table
    /// must point at the new root before anything else hits the disk.
    fn parent_for_split(&mut self, offset: u64) -> Result<u64> {
        if let Some(Some(parent)) = self.cache.parent(offset) {
            self.load_node(parent)?;
            return Ok(parent);
        }
        let new_root = self.create_node(false, None)?;
        self.cache.set_parent(offset, Some(new_root));
        {
            let root = self.node_mut(new_root)?;
            // first append on an empty internal node sets extra
            root.append_element(&[], offset);
        }
        if !self.table.reroot(offset, new_root) {
            return Err(anyhow!(
                "index corrupt: split root {} is not in the index table",
                offset
            ));
        }
        debug!("root split: {} -> new root {}", offset, new_root);
        self.write_table()?;
        self.flush()?;
        Ok(new_root)
    }

    fn divide(&mut self, offset: u64, sibling: u64, parent: u64) -> Result<()> {
        let pos_in_parent = self.position_in_parent(offset, parent)?;
        let (middle, size_left, is_leaf) = {
            let node = self.node(offset)?;
            let (m, s) = split_point(node);
            (m, s, node.is_leaf)
        };

        if is_leaf {
            let (moved, moved_size, old_extra) = {
                let node = self.node_mut(offset)?;
                let moved = node.elements.split_off(middle);
                let moved_size = node.size - size_left;
                node.size = size_left;
                let old_extra = node.extra;
                node.extra = sibling;
                node.dirty = true;
                (moved, moved_size, old_extra)
            };
            let sep_key = moved
                .first()
                .map(|e| e.key.clone())
                .ok_or_else(|| anyhow!("split of node {} produced an empty sibling", offset))?;
            {
                let s = self.node_mut(sibling)?;
                s.extra = old_extra;
                s.elements = moved;
                s.size = moved_size;
                s.dirty = true;
            }
            self.insert_into_parent(parent, &sep_key, sibling, pos_in_parent)
        } else {
            let (mid, moved, moved_size) = {
                let node = self.node_mut(offset)?;
                let mut tail = node.elements.split_off(middle);
                let mid = tail.remove(0);
                let moved_size = node.size - size_left - element_size(&mid.key);
                node.size = size_left;
                node.dirty = true;
                (mid, tail, moved_size)
            };
            // children that moved now hang under the sibling
            self.cache.set_parent(mid.value, Some(sibling));
            for e in &moved {
                self.cache.set_parent(e.value, Some(sibling));
            }
            {
                let s = self.node_mut(sibling)?;
                s.extra = mid.value;
                s.elements = moved;
                s.size = moved_size;
                s.dirty = true;
            }
            self.insert_into_parent(parent, &mid.key, sibling, pos_in_parent)
        }
    }

    fn insert_into_parent(
        &mut self,
        parent: u64,
        key: &[u8],
        value: u64,
        after: Option<usize>,
    ) -> Result<()> {
        let p = self.node_mut(parent)?;
        p.insert_element_after(key, value, after);
        Ok(())
    }

    /// The node's position among its parent's elements; None when the node is
    /// the parent's `extra` (leftmost) child. Locates the first element whose
    /// key could reference the node, then scans the duplicate run for the
    /// matching child offset.
    fn position_in_parent(&mut self, offset: u64, parent: u64) -> Result<Option<usize>> {
        let first_key = {
            let node = self.node(offset)?;
            node.first_key()
                .map(|k| k.to_vec())
                .ok_or_else(|| anyhow!("node {} is empty during split", offset))?
        };
        let p = self.node(parent)?;
        if p.extra == offset {
            return Ok(None);
        }
        let mut pos = match search_leftmost(&p.elements, &first_key, true) {
            SearchPos::Found(i) | SearchPos::Anchor(i) => i,
            SearchPos::BeforeAll => 0,
            SearchPos::NotFound => {
                return Err(anyhow!(
                    "index corrupt: no anchor for node {} in parent {}",
                    offset,
                    parent
                ))
            }
        };
        while pos < p.elements.len() {
            if p.elements[pos].value == offset {
                return Ok(Some(pos));
            }
            pos += 1;
        }
        Err(anyhow!(
            "index corrupt: node {} not referenced by its parent {}",
            offset,
            parent
        ))
    }
}

/// Split point of an overflowed node: the first element past half the byte
/// budget, pulled back to the start of its duplicate run. When the run
/// reaches element 0 the byte-budget point is kept as-is; a divided run is
/// tolerable because lookups chain across leaves.
fn split_point(node: &Node) -> (usize, usize) {
    let half = NODE_DATA_SIZE / 2;
    let mut size_left = 0usize;
    let mut middle = node.elements.len() / 2;
    for (pos, elem) in node.elements.iter().enumerate() {
        let es = element_size(&elem.key);
        if size_left + es > half {
            middle = pos;
            break;
        }
        size_left += es;
    }
    if middle == 0 || middle >= node.elements.len() {
        middle = node.elements.len() / 2;
        size_left = prefix_size(&node.elements, middle);
        return (middle, size_left);
    }
    if node.elements[middle].key != node.elements[0].key {
        let mut m = middle;
        let mut left = size_left;
        while m > 0 && node.elements[m].key == node.elements[m - 1].key {
            m -= 1;
            left -= element_size(&node.elements[m].key);
        }
        if m > 0 {
            return (m, left);
        }
    }
    (middle, size_left)
}

fn prefix_size(elements: &[Element], middle: usize) -> usize {
    elements[..middle].iter().map(|e| element_size(&e.key)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(keys: &[&[u8]]) -> Node {
        let mut n = Node::new(true, 0);
        for (i, k) in keys.iter().enumerate() {
            n.append_element(k, i as u64);
        }
        n
    }

    #[test]
    fn split_point_balances_bytes() {
        let keys: Vec<Vec<u8>> = (0..100u8).map(|i| vec![i; 30]).collect();
        let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let node = filled(&refs);
        let (middle, size_left) = split_point(&node);
        assert!(middle > 0 && middle < node.elements.len());
        assert_eq!(size_left, prefix_size(&node.elements, middle));
        assert!(size_left <= NODE_DATA_SIZE / 2);
        assert!(size_left + element_size(&node.elements[middle].key) > NODE_DATA_SIZE / 2);
    }

    #[test]
    fn split_point_backs_up_over_duplicate_run() {
        // 30 distinct keys, then a run of duplicates straddling the middle
        let mut node = Node::new(true, 0);
        for i in 0..30u8 {
            node.append_element(&[i; 40], i as u64);
        }
        for i in 0..50u8 {
            node.append_element(&[200; 40], 100 + i as u64);
        }
        let (middle, size_left) = split_point(&node);
        assert_eq!(middle, 30);
        assert_eq!(node.elements[middle].key, vec![200; 40]);
        assert_ne!(node.elements[middle - 1].key, vec![200; 40]);
        assert_eq!(size_left, prefix_size(&node.elements, middle));
    }

    #[test]
    fn split_point_tolerates_run_reaching_front() {
        // one huge duplicate run: backing up to its start would empty the
        // left node, so the byte-budget point is used instead
        let mut node = Node::new(true, 0);
        for i in 0..80u8 {
            node.append_element(&[9; 40], i as u64);
        }
        let (middle, _) = split_point(&node);
        assert!(middle > 0 && middle < node.elements.len());
    }
}
