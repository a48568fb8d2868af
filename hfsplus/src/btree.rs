//! The generic B-tree reader shared by the catalog, extents overflow, and
//! attributes trees: header node parsing, node decoding, cached node fetch,
//! and the two traversal primitives (`search_btree`, `scan_leaves`) that the
//! three key schemas are layered on top of.

use byteorder::{BigEndian, ReadBytesExt};
use std::cmp::Ordering;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use crate::cache::{NodeCache, TreeId};
use crate::error::{HfsError, Result};
use crate::source::ByteSource;
use crate::volume_header::{ForkDescriptor, Geometry};

/// Hard ceiling on index-node hops during a descent, guarding against a
/// cyclic or pathologically deep corrupted tree.
pub const MAX_BTREE_RECURSION_DEPTH: u32 = 1024;

pub const NODE_KIND_LEAF: u8 = 0xFF;
pub const NODE_KIND_INDEX: u8 = 0x00;
pub const NODE_KIND_HEADER: u8 = 0x01;
pub const NODE_KIND_MAP: u8 = 0x02;

#[derive(Debug, Clone)]
pub struct BTreeHeaderRecord {
    pub root_node: u32,
    pub leaf_records: u32,
    pub first_leaf_node: u32,
    pub last_leaf_node: u32,
    pub node_size: u16,
    pub max_key_length: u16,
    pub total_nodes: u32,
    pub key_compare_type: u8,
    pub fork: ForkDescriptor,
    pub geometry: Geometry,
}

#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    pub forward_link: u32,
    pub backward_link: u32,
    pub kind: u8,
    pub height: u8,
    pub num_records: u16,
    pub reserved: u16,
}

#[derive(Debug)]
pub struct BTreeNode {
    pub descriptor: NodeDescriptor,
    pub data: Vec<u8>,
    pub record_offsets: Vec<u16>,
}

impl BTreeNode {
    pub fn record_data(&self, index: usize) -> Result<&[u8]> {
        if index >= self.descriptor.num_records as usize {
            return Err(HfsError::corruption(format!(
                "record index {index} >= num_records {}",
                self.descriptor.num_records
            )));
        }
        let start = self.record_offsets[index] as usize;
        let end = self.record_offsets[index + 1] as usize;
        if start > end || end > self.data.len() {
            return Err(HfsError::corruption(format!(
                "invalid record offsets: start={start}, end={end}, len={}",
                self.data.len()
            )));
        }
        Ok(&self.data[start..end])
    }
}

fn parse_node_descriptor(data: &[u8]) -> Result<NodeDescriptor> {
    if data.len() < 14 {
        return Err(HfsError::corruption("node shorter than its descriptor"));
    }
    let mut cursor = Cursor::new(data);
    Ok(NodeDescriptor {
        forward_link: cursor.read_u32::<BigEndian>()?,
        backward_link: cursor.read_u32::<BigEndian>()?,
        kind: cursor.read_u8()?,
        height: cursor.read_u8()?,
        num_records: cursor.read_u16::<BigEndian>()?,
        reserved: cursor.read_u16::<BigEndian>()?,
    })
}

/// Translate a byte offset within a fork to an absolute volume byte offset
/// by walking the fork's inline extents. The B-tree files themselves are
/// assumed to stay within their eight inline extents — true of every
/// observed real-world volume, since the extents overflow tree cannot
/// resolve its own overflow.
pub fn compute_fork_offset(fork: &ForkDescriptor, geometry: Geometry, offset_in_fork: u64) -> Result<u64> {
    let block_size = geometry.block_size as u64;
    let mut remaining = offset_in_fork;

    for extent in &fork.extents {
        if extent.block_count == 0 {
            break;
        }
        let extent_bytes = extent.block_count as u64 * block_size;
        if remaining < extent_bytes {
            let block_within_extent = remaining / block_size;
            let offset_within_block = remaining % block_size;
            let absolute_block = extent.start_block as u64 + block_within_extent;
            return Ok(geometry.block_offset(absolute_block as u32) + offset_within_block);
        }
        remaining -= extent_bytes;
    }

    Err(HfsError::OutOfRange(format!(
        "fork offset {offset_in_fork} exceeds inline extent capacity"
    )))
}

fn read_raw(source: &dyn ByteSource, fork: &ForkDescriptor, geometry: Geometry, byte_offset_in_fork: u64, len: usize) -> Result<Vec<u8>> {
    let byte_offset = compute_fork_offset(fork, geometry, byte_offset_in_fork)?;
    let mut buf = vec![0u8; len];
    source.read_exact_at(byte_offset, &mut buf)?;
    Ok(buf)
}

/// Read the B-tree header node (always node 0) from the start of a fork.
pub fn read_btree_header(source: &dyn ByteSource, fork: &ForkDescriptor, geometry: Geometry) -> Result<BTreeHeaderRecord> {
    // Every node is at least 512 bytes, so a 512-byte read always covers the
    // fixed-size header record regardless of the tree's real node_size.
    let data = read_raw(source, fork, geometry, 0, 512)?;
    let descriptor = parse_node_descriptor(&data)?;
    if descriptor.kind != NODE_KIND_HEADER {
        return Err(HfsError::InvalidFormat(format!(
            "expected header node, got kind {}",
            descriptor.kind
        )));
    }

    let mut cursor = Cursor::new(&data[14..]);
    let _tree_depth = cursor.read_u16::<BigEndian>()?;
    let root_node = cursor.read_u32::<BigEndian>()?;
    let leaf_records = cursor.read_u32::<BigEndian>()?;
    let first_leaf_node = cursor.read_u32::<BigEndian>()?;
    let last_leaf_node = cursor.read_u32::<BigEndian>()?;
    let node_size = cursor.read_u16::<BigEndian>()?;
    let max_key_length = cursor.read_u16::<BigEndian>()?;
    let total_nodes = cursor.read_u32::<BigEndian>()?;
    let _free_nodes = cursor.read_u32::<BigEndian>()?;
    let _reserved1 = cursor.read_u16::<BigEndian>()?;
    let _clump_size = cursor.read_u32::<BigEndian>()?;
    let _btree_type = cursor.read_u8()?;
    let key_compare_type = cursor.read_u8()?;

    if !(node_size.is_power_of_two() && (512..=32768).contains(&node_size)) {
        return Err(HfsError::InvalidFormat(format!(
            "B-tree node size {node_size} out of range"
        )));
    }
    if root_node != 0 && root_node >= total_nodes {
        return Err(HfsError::InvalidFormat(format!(
            "root node {root_node} out of range for {total_nodes} total nodes"
        )));
    }

    Ok(BTreeHeaderRecord {
        root_node,
        leaf_records,
        first_leaf_node,
        last_leaf_node,
        node_size,
        max_key_length,
        total_nodes,
        key_compare_type,
        fork: fork.clone(),
        geometry,
    })
}

fn read_node_uncached(source: &dyn ByteSource, header: &BTreeHeaderRecord, node_number: u32) -> Result<BTreeNode> {
    let node_size = header.node_size;
    let offset_in_fork = node_number as u64 * node_size as u64;
    let data = read_raw(source, &header.fork, header.geometry, offset_in_fork, node_size as usize)?;

    let descriptor = parse_node_descriptor(&data)?;

    let num_offsets = descriptor.num_records as usize + 1;
    let mut record_offsets = Vec::with_capacity(num_offsets);
    for i in 0..num_offsets {
        let offset_pos = node_size as usize - (i + 1) * 2;
        if offset_pos + 1 >= data.len() {
            return Err(HfsError::corruption("offset table out of bounds"));
        }
        record_offsets.push(u16::from_be_bytes([data[offset_pos], data[offset_pos + 1]]));
    }
    // Offsets must be strictly increasing in logical record order (property S8.1).
    for pair in record_offsets.windows(2) {
        if pair[0] >= pair[1] {
            tracing::warn!(node = node_number, "non-monotonic record offsets in node");
            return Err(HfsError::corruption("node record offsets are not monotonic"));
        }
    }

    Ok(BTreeNode {
        descriptor,
        data,
        record_offsets,
    })
}

/// Fetch a node, consulting (and populating) the shared cache, and checking
/// for cooperative cancellation before issuing any I/O.
pub fn fetch_node(
    source: &dyn ByteSource,
    header: &BTreeHeaderRecord,
    tree_id: TreeId,
    node_number: u32,
    cache: &Mutex<NodeCache>,
    abort: &AtomicBool,
) -> Result<Arc<BTreeNode>> {
    if abort.load(AtomicOrdering::Relaxed) {
        return Err(HfsError::Aborted);
    }
    if let Some(node) = cache.lock().expect("node cache mutex poisoned").get(tree_id, node_number) {
        return Ok(node);
    }
    let node = Arc::new(read_node_uncached(source, header, node_number)?);
    cache
        .lock()
        .expect("node cache mutex poisoned")
        .insert(tree_id, node_number, node.clone());
    Ok(node)
}

/// Extract the child node number from an index-node record: `[key_len: u16]
/// [key: key_len bytes] [child_node: u32]`, rounded up to even alignment.
pub fn extract_index_child(record_data: &[u8]) -> Result<u32> {
    if record_data.len() < 2 {
        return Err(HfsError::corruption("index record too short"));
    }
    let key_length = u16::from_be_bytes([record_data[0], record_data[1]]) as usize;
    let mut child_offset = 2 + key_length;
    if !child_offset.is_multiple_of(2) {
        child_offset += 1;
    }
    if child_offset + 4 > record_data.len() {
        return Err(HfsError::corruption(format!(
            "index record too short for child pointer: key_len={key_length}, record_len={}",
            record_data.len()
        )));
    }
    Ok(u32::from_be_bytes([
        record_data[child_offset],
        record_data[child_offset + 1],
        record_data[child_offset + 2],
        record_data[child_offset + 3],
    ]))
}

/// Descend from the root comparing each record's key against `compare_key`
/// (Less = record key < target, Greater = record key > target). Returns the
/// leaf node and record index of an exact match.
pub fn search_btree(
    source: &dyn ByteSource,
    header: &BTreeHeaderRecord,
    tree_id: TreeId,
    cache: &Mutex<NodeCache>,
    abort: &AtomicBool,
    compare_key: &dyn Fn(&[u8]) -> Ordering,
) -> Result<Option<(Arc<BTreeNode>, usize)>> {
    if header.root_node == 0 {
        return Ok(None);
    }

    let mut current_node_num = header.root_node;
    let mut depth = 0u32;

    loop {
        depth += 1;
        if depth > MAX_BTREE_RECURSION_DEPTH {
            return Err(HfsError::corruption("exceeded maximum B-tree recursion depth"));
        }

        let node = fetch_node(source, header, tree_id, current_node_num, cache, abort)?;

        match node.descriptor.kind {
            NODE_KIND_LEAF => {
                for i in 0..node.descriptor.num_records as usize {
                    let record_data = node.record_data(i)?;
                    match compare_key(record_data) {
                        Ordering::Equal => return Ok(Some((node, i))),
                        Ordering::Greater => return Ok(None),
                        Ordering::Less => continue,
                    }
                }
                return Ok(None);
            }
            NODE_KIND_INDEX => {
                let mut child_node = 0u32;
                let mut found = false;
                for i in 0..node.descriptor.num_records as usize {
                    let record_data = node.record_data(i)?;
                    match compare_key(record_data) {
                        Ordering::Less | Ordering::Equal => {
                            child_node = extract_index_child(record_data)?;
                            found = true;
                        }
                        Ordering::Greater => break,
                    }
                }
                if !found {
                    return Ok(None);
                }
                current_node_num = child_node;
            }
            other => {
                return Err(HfsError::corruption(format!(
                    "unexpected node kind {other} during search"
                )));
            }
        }
    }
}

/// Like `search_btree`, but returns the leaf node that should contain (or
/// immediately precede) the target key — used by directory listing to find
/// a scan starting point even when no record matches exactly.
pub fn find_leaf(
    source: &dyn ByteSource,
    header: &BTreeHeaderRecord,
    tree_id: TreeId,
    cache: &Mutex<NodeCache>,
    abort: &AtomicBool,
    compare_key: &dyn Fn(&[u8]) -> Ordering,
) -> Result<u32> {
    if header.root_node == 0 {
        return Ok(0);
    }

    let mut current_node_num = header.root_node;
    let mut depth = 0u32;

    loop {
        depth += 1;
        if depth > MAX_BTREE_RECURSION_DEPTH {
            return Err(HfsError::corruption("exceeded maximum B-tree recursion depth"));
        }

        let node = fetch_node(source, header, tree_id, current_node_num, cache, abort)?;

        match node.descriptor.kind {
            NODE_KIND_LEAF => return Ok(current_node_num),
            NODE_KIND_INDEX => {
                let mut child_node = 0u32;
                let mut found = false;
                for i in 0..node.descriptor.num_records as usize {
                    let record_data = node.record_data(i)?;
                    match compare_key(record_data) {
                        Ordering::Less | Ordering::Equal => {
                            child_node = extract_index_child(record_data)?;
                            found = true;
                        }
                        Ordering::Greater => break,
                    }
                }
                if !found {
                    if node.descriptor.num_records > 0 {
                        let record_data = node.record_data(0)?;
                        child_node = extract_index_child(record_data)?;
                    } else {
                        return Ok(0);
                    }
                }
                current_node_num = child_node;
            }
            other => {
                return Err(HfsError::corruption(format!(
                    "unexpected node kind {other} during leaf search"
                )));
            }
        }
    }
}

/// Scan forward over the leaf chain starting at `start_node`, applying
/// `match_fn` to each raw record: `Some(true)` collects it via `parse_fn`,
/// `Some(false)` skips it, `None` stops the scan early.
pub fn scan_leaves<T>(
    source: &dyn ByteSource,
    header: &BTreeHeaderRecord,
    tree_id: TreeId,
    cache: &Mutex<NodeCache>,
    abort: &AtomicBool,
    start_node: u32,
    match_fn: &dyn Fn(&[u8]) -> Option<bool>,
    parse_fn: &dyn Fn(&[u8]) -> Result<Option<T>>,
) -> Result<Vec<T>> {
    let mut results = Vec::new();
    let mut current_node_num = start_node;
    let mut visited = 0u32;
    let limit = header.total_nodes.max(1) + 1;

    while current_node_num != 0 {
        visited += 1;
        if visited > limit {
            return Err(HfsError::corruption("leaf chain did not terminate within total_nodes"));
        }

        let node = fetch_node(source, header, tree_id, current_node_num, cache, abort)?;
        if node.descriptor.kind != NODE_KIND_LEAF {
            return Err(HfsError::corruption(format!(
                "expected leaf node, got kind {}",
                node.descriptor.kind
            )));
        }

        for i in 0..node.descriptor.num_records as usize {
            let record_data = node.record_data(i)?;
            match match_fn(record_data) {
                Some(true) => {
                    if let Some(item) = parse_fn(record_data)? {
                        results.push(item);
                    }
                }
                Some(false) => continue,
                None => return Ok(results),
            }
        }

        current_node_num = node.descriptor.forward_link;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_index_child_reads_trailing_pointer() {
        let mut record = Vec::new();
        record.extend_from_slice(&4u16.to_be_bytes()); // key_len = 4
        record.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]); // key bytes
        record.extend_from_slice(&42u32.to_be_bytes()); // child node
        assert_eq!(extract_index_child(&record).unwrap(), 42);
    }

    #[test]
    fn node_descriptor_rejects_truncated_data() {
        assert!(parse_node_descriptor(&[0u8; 4]).is_err());
    }
}
