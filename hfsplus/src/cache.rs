//! Bounded LRU cache of decoded B-tree nodes, shared across every walk on a
//! volume. Node bytes are handed out as `Arc<BTreeNode>` so a borrow can
//! outlive an eviction of its own cache slot.

use std::collections::HashMap;
use std::sync::Arc;

use crate::btree::BTreeNode;

/// Which B-tree a cached node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeId {
    Catalog,
    Extents,
    Attributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey(TreeId, u32);

/// Default node cache capacity: small, matching the "tens of nodes" scale a
/// single-threaded walk actually touches.
pub const DEFAULT_CAPACITY: usize = 64;

pub struct NodeCache {
    capacity: usize,
    map: HashMap<CacheKey, Arc<BTreeNode>>,
    // Most-recently-used at the back.
    recency: Vec<CacheKey>,
}

impl NodeCache {
    pub fn new(capacity: usize) -> Self {
        NodeCache {
            capacity: capacity.max(1),
            map: HashMap::new(),
            recency: Vec::new(),
        }
    }

    pub fn get(&mut self, tree: TreeId, node: u32) -> Option<Arc<BTreeNode>> {
        let key = CacheKey(tree, node);
        if let Some(value) = self.map.get(&key).cloned() {
            self.touch(key);
            Some(value)
        } else {
            None
        }
    }

    pub fn insert(&mut self, tree: TreeId, node: u32, value: Arc<BTreeNode>) {
        let key = CacheKey(tree, node);
        if self.map.insert(key, value).is_some() {
            self.touch(key);
            return;
        }
        self.recency.push(key);
        if self.map.len() > self.capacity {
            self.evict_one();
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.recency.clear();
    }

    fn touch(&mut self, key: CacheKey) {
        if let Some(pos) = self.recency.iter().position(|k| *k == key) {
            self.recency.remove(pos);
        }
        self.recency.push(key);
    }

    fn evict_one(&mut self) {
        if !self.recency.is_empty() {
            let lru = self.recency.remove(0);
            self.map.remove(&lru);
        }
    }
}

impl Default for NodeCache {
    fn default() -> Self {
        NodeCache::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::{BTreeNode, NodeDescriptor};

    fn dummy_node() -> Arc<BTreeNode> {
        Arc::new(BTreeNode {
            descriptor: NodeDescriptor {
                forward_link: 0,
                backward_link: 0,
                kind: 0xFF,
                height: 1,
                num_records: 0,
                reserved: 0,
            },
            data: Vec::new(),
            record_offsets: vec![0],
        })
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = NodeCache::new(2);
        cache.insert(TreeId::Catalog, 1, dummy_node());
        cache.insert(TreeId::Catalog, 2, dummy_node());
        assert!(cache.get(TreeId::Catalog, 1).is_some()); // touch 1, 2 now LRU
        cache.insert(TreeId::Catalog, 3, dummy_node()); // evicts 2
        assert!(cache.get(TreeId::Catalog, 2).is_none());
        assert!(cache.get(TreeId::Catalog, 1).is_some());
        assert!(cache.get(TreeId::Catalog, 3).is_some());
    }
}
