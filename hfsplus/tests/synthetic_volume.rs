//! End-to-end tests against a hand-built HFS+ volume image: a root folder
//! containing one subfolder and one file, exercised entirely through the
//! public `Volume`/`FileEntry` API rather than any internal module.

use std::io::{Read, Write};

use hfsplus::source::FileSource;
use hfsplus::{Dialect, Volume};

const BLOCK_SIZE: u32 = 512;

fn be16(v: u16) -> [u8; 2] {
    v.to_be_bytes()
}
fn be32(v: u32) -> [u8; 4] {
    v.to_be_bytes()
}
fn be64(v: u64) -> [u8; 8] {
    v.to_be_bytes()
}

fn catalog_key(parent_id: u32, name: &str) -> Vec<u8> {
    let name_u16: Vec<u16> = name.encode_utf16().collect();
    let key_length = (4 + 2 + name_u16.len() * 2) as u16;
    let mut buf = Vec::new();
    buf.extend(be16(key_length));
    buf.extend(be32(parent_id));
    buf.extend(be16(name_u16.len() as u16));
    for u in &name_u16 {
        buf.extend(be16(*u));
    }
    buf
}

fn bsd_info(mode: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend(be32(501)); // owner_id
    buf.extend(be32(20)); // group_id
    buf.push(0); // admin_flags
    buf.push(0); // owner_flags
    buf.extend(be16(mode));
    buf.extend(be32(0)); // special
    buf
}

fn folder_record(folder_id: u32, valence: u32, dates: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend(be16(0x0001)); // record type
    buf.extend(be16(0)); // flags
    buf.extend(be32(valence));
    buf.extend(be32(folder_id));
    for _ in 0..5 {
        buf.extend(be32(dates)); // create/content_mod/attr_mod/access/backup
    }
    buf.extend(bsd_info(0o040_755));
    buf.extend([0u8; 16]); // user_info
    buf.extend([0u8; 16]); // extended_info
    buf.extend(be32(0)); // text_encoding
    buf
}

fn fork_descriptor_bytes(logical_size: u64, total_blocks: u32, start_block: u32, block_count: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend(be64(logical_size));
    buf.extend(be32(0)); // clump_size
    buf.extend(be32(total_blocks));
    buf.extend(be32(start_block));
    buf.extend(be32(block_count));
    for _ in 0..7 {
        buf.extend([0u8; 8]); // remaining extents empty
    }
    buf
}

fn file_record(file_id: u32, dates: u32, data_size: u64, data_start_block: u32, data_block_count: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend(be16(0x0002)); // record type
    buf.extend(be16(0)); // flags
    buf.extend(be32(0)); // reserved
    buf.extend(be32(file_id));
    for _ in 0..5 {
        buf.extend(be32(dates));
    }
    buf.extend(bsd_info(0o100_644));
    buf.extend([0u8; 16]); // user_info
    buf.extend([0u8; 16]); // extended_info
    buf.extend(be32(0)); // text_encoding
    buf.extend(be32(0)); // reserved2
    buf.extend(fork_descriptor_bytes(data_size, data_block_count, data_start_block, data_block_count));
    buf.extend(fork_descriptor_bytes(0, 0, 0, 0)); // empty resource fork
    buf
}

fn thread_record(is_folder: bool, parent_id: u32, name: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend(be16(if is_folder { 0x0003 } else { 0x0004 }));
    buf.extend(be16(0)); // reserved
    buf.extend(be32(parent_id));
    let name_u16: Vec<u16> = name.encode_utf16().collect();
    buf.extend(be16(name_u16.len() as u16));
    for u in &name_u16 {
        buf.extend(be16(*u));
    }
    buf
}

/// Lay out one B-tree leaf node: descriptor, concatenated records, and a
/// trailing record-offset table stored backwards from the node's end.
fn build_leaf_node(node_size: usize, records: &[Vec<u8>]) -> Vec<u8> {
    let mut node = vec![0u8; node_size];
    // descriptor (14 bytes): forward_link u32, backward_link u32, kind u8,
    // height u8, num_records u16, reserved u16.
    node[8] = 0xFF; // kind = leaf
    node[9] = 1; // height
    node[10..12].copy_from_slice(&be16(records.len() as u16));

    let mut offsets = Vec::with_capacity(records.len() + 1);
    let mut cursor = 14usize;
    offsets.push(cursor as u16);
    for record in records {
        node[cursor..cursor + record.len()].copy_from_slice(record);
        cursor += record.len();
        offsets.push(cursor as u16);
    }
    assert!(cursor + offsets.len() * 2 <= node_size, "leaf node overflow");

    for (i, offset) in offsets.iter().enumerate() {
        let pos = node_size - (i + 1) * 2;
        node[pos..pos + 2].copy_from_slice(&be16(*offset));
    }
    node
}

/// Build a B-tree header node (node 0): descriptor + fixed header record.
fn build_header_node(node_size: usize, root_node: u32, leaf_records: u32, first_leaf: u32, last_leaf: u32, total_nodes: u32) -> Vec<u8> {
    let mut node = vec![0u8; node_size];
    node[8] = 0x01; // kind = header
    let mut field = Vec::new();
    field.extend(be16(1)); // tree_depth
    field.extend(be32(root_node));
    field.extend(be32(leaf_records));
    field.extend(be32(first_leaf));
    field.extend(be32(last_leaf));
    field.extend(be16(node_size as u16));
    field.extend(be16(40)); // max_key_length
    field.extend(be32(total_nodes));
    field.extend(be32(0)); // free_nodes
    field.extend(be16(0)); // reserved1
    field.extend(be32(0)); // clump_size
    field.push(0); // btree_type
    field.push(0); // key_compare_type
    node[14..14 + field.len()].copy_from_slice(&field);
    node
}

fn build_volume_header(
    total_blocks: u32,
    file_count: u32,
    folder_count: u32,
    next_catalog_id: u32,
    extents_fork: &[u8],
    catalog_fork: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend(be16(0x482B)); // 'H+'
    buf.extend(be16(4)); // version
    buf.extend(be32(0)); // attributes
    buf.extend(be32(0)); // last_mounted_version
    buf.extend(be32(0)); // journal_info_block
    buf.extend(be32(0)); // create_date
    buf.extend(be32(0)); // modify_date
    buf.extend(be32(0)); // backup_date
    buf.extend(be32(0)); // checked_date
    buf.extend(be32(file_count));
    buf.extend(be32(folder_count));
    buf.extend(be32(BLOCK_SIZE));
    buf.extend(be32(total_blocks));
    buf.extend(be32(total_blocks - 9)); // free_blocks (rough)
    buf.extend(be32(0)); // next_allocation
    buf.extend(be32(0)); // rsrc_clump_size
    buf.extend(be32(0)); // data_clump_size
    buf.extend(be32(next_catalog_id));
    buf.extend(be32(0)); // write_count
    buf.extend(be64(0)); // encoding_bitmap
    buf.extend([0u8; 32]); // finder_info
    buf.extend(fork_descriptor_bytes(0, 0, 0, 0)); // allocation_file (unused)
    buf.extend(extents_fork);
    buf.extend(catalog_fork);
    buf.extend(fork_descriptor_bytes(0, 0, 0, 0)); // attributes_file (none)
    buf.extend(fork_descriptor_bytes(0, 0, 0, 0)); // startup_file (none)
    buf.resize(512, 0);
    buf
}

/// Assemble a complete HFS+ image: root folder "TestVolume" containing the
/// subfolder "sub" (CNID 20) and the file "hello.txt" (CNID 21, data fork
/// holding `CONTENT`).
const CONTENT: &[u8] = b"hello world!\n";

fn build_image() -> Vec<u8> {
    const CATALOG_NODE_SIZE: usize = 1024;
    const EXTENTS_NODE_SIZE: usize = 512;

    let root_thread = thread_record(true, 1, "TestVolume");
    let root_folder = folder_record(2, 2, 0);
    let sub_thread = thread_record(true, 2, "sub");
    let sub_folder = folder_record(20, 0, 0);
    let file_thread = thread_record(false, 2, "hello.txt");
    let file_rec = file_record(21, 0, CONTENT.len() as u64, 8, 1);

    let records: Vec<(Vec<u8>, Vec<u8>)> = vec![
        (catalog_key(1, "TestVolume"), root_folder),
        (catalog_key(2, ""), root_thread),
        (catalog_key(2, "hello.txt"), file_rec),
        (catalog_key(2, "sub"), sub_folder),
        (catalog_key(20, ""), sub_thread),
        (catalog_key(21, ""), file_thread),
    ];
    let leaf_records: Vec<Vec<u8>> = records
        .into_iter()
        .map(|(mut key, payload)| {
            key.extend(payload);
            key
        })
        .collect();

    let catalog_header_node = build_header_node(CATALOG_NODE_SIZE, 1, leaf_records.len() as u32, 1, 1, 2);
    let catalog_leaf_node = build_leaf_node(CATALOG_NODE_SIZE, &leaf_records);
    let extents_header_node = build_header_node(EXTENTS_NODE_SIZE, 0, 0, 0, 0, 1);

    let extents_fork = fork_descriptor_bytes(EXTENTS_NODE_SIZE as u64, 1, 3, 1);
    let catalog_fork = fork_descriptor_bytes((CATALOG_NODE_SIZE * 2) as u64, 4, 4, 4);
    let header = build_volume_header(16, 1, 1, 22, &extents_fork, &catalog_fork);

    let mut image = vec![0u8; 16 * BLOCK_SIZE as usize];
    image[1024..1536].copy_from_slice(&header);
    image[1536..1536 + EXTENTS_NODE_SIZE].copy_from_slice(&extents_header_node);
    image[2048..2048 + CATALOG_NODE_SIZE].copy_from_slice(&catalog_header_node);
    image[2048 + CATALOG_NODE_SIZE..2048 + 2 * CATALOG_NODE_SIZE].copy_from_slice(&catalog_leaf_node);
    let data_offset = 8 * BLOCK_SIZE as usize;
    image[data_offset..data_offset + CONTENT.len()].copy_from_slice(CONTENT);
    image
}

fn open_test_volume() -> Volume {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&build_image()).unwrap();
    let source = FileSource::from_file(tmp.reopen().unwrap()).unwrap();
    Volume::open(source).unwrap()
}

#[test]
fn opens_and_reports_dialect() {
    let volume = open_test_volume();
    assert_eq!(volume.dialect(), Dialect::HfsPlus);
    assert_eq!(volume.volume_name().unwrap().as_deref(), Some("TestVolume"));
}

#[test]
fn root_lists_both_children_in_sorted_order() {
    let volume = open_test_volume();
    let root = volume.root().unwrap();
    assert!(root.is_directory());
    assert_eq!(root.get_identifier(), 2);

    let children = volume.list_directory(2).unwrap();
    let names: Vec<&str> = children.iter().map(|c| c.name_utf8()).collect();
    assert_eq!(names, vec!["hello.txt", "sub"]);
    assert!(!children[0].is_directory());
    assert!(children[1].is_directory());
}

#[test]
fn resolves_nested_path_and_reads_file_content() {
    let volume = open_test_volume();
    let file = volume.open_path("/hello.txt").unwrap();
    assert_eq!(file.get_identifier(), 21);
    assert_eq!(file.get_size(), CONTENT.len() as u64);

    let mut reader = file.open_data_fork().unwrap();
    let mut data = Vec::new();
    reader.read_to_end(&mut data).unwrap();
    assert_eq!(data, CONTENT);
}

#[test]
fn opens_subfolder_by_identifier_and_path_consistently() {
    let volume = open_test_volume();
    let by_id = volume.open_identifier(20).unwrap();
    let by_path = volume.open_path("/sub").unwrap();
    assert_eq!(by_id.get_identifier(), by_path.get_identifier());
    assert_eq!(by_id.name_utf8(), "sub");
    assert!(by_id.is_directory());
}

#[test]
fn unknown_path_and_identifier_return_not_found() {
    let volume = open_test_volume();
    assert!(volume.open_path("/nope").is_err());
    assert!(volume.open_identifier(9999).is_err());
}

#[test]
fn walk_discovers_every_entry_with_full_paths() {
    let volume = open_test_volume();
    let mut paths: Vec<String> = hfsplus::walk(&volume).unwrap().into_iter().map(|w| w.path).collect();
    paths.sort();
    assert_eq!(paths, vec!["/hello.txt".to_string(), "/sub".to_string()]);
}

#[test]
fn abort_causes_subsequent_lookups_to_fail() {
    let volume = open_test_volume();
    volume.abort();
    assert!(volume.open_path("/hello.txt").is_err());
}
