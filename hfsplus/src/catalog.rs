//! Catalog B-tree: key/record decoding, (parent, name) and identifier
//! lookup, directory listing, path resolution, and hard-link detection.

use byteorder::{BigEndian, ReadBytesExt};
use std::cmp::Ordering;
use std::io::{Cursor, Read};
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use crate::btree::{self, BTreeHeaderRecord};
use crate::cache::{NodeCache, TreeId};
use crate::error::{HfsError, Result};
use crate::source::ByteSource;
use crate::timestamp::{HfsTimestamp, TimeKind};
use crate::unicode::{self, NameComparator};
use crate::volume_header::{Dialect, ForkDescriptor};

pub const CNID_ROOT_PARENT: u32 = 1;
pub const CNID_ROOT_FOLDER: u32 = 2;
pub const CNID_EXTENTS_FILE: u32 = 3;
pub const CNID_CATALOG_FILE: u32 = 4;
pub const CNID_ATTRIBUTES_FILE: u32 = 8;

const RECORD_TYPE_FOLDER_HFS_PLUS: u16 = 0x0001;
const RECORD_TYPE_FILE_HFS_PLUS: u16 = 0x0002;
const RECORD_TYPE_FOLDER_THREAD_HFS_PLUS: u16 = 0x0003;
const RECORD_TYPE_FILE_THREAD_HFS_PLUS: u16 = 0x0004;

const RECORD_TYPE_FOLDER_HFS: u16 = 0x0100;
const RECORD_TYPE_FILE_HFS: u16 = 0x0200;
const RECORD_TYPE_FOLDER_THREAD_HFS: u16 = 0x0300;
const RECORD_TYPE_FILE_THREAD_HFS: u16 = 0x0400;

const FLAG_HAS_DATE_ADDED: u16 = 0x0080;
const FLAG_HARDLINK_CHAIN: u16 = 0x0020;
const HARDLINK_PRIVATE_DIR: &str = "\u{0}\u{0}\u{0}\u{0}HFS+ Private Data";

#[derive(Debug, Clone, Default)]
pub struct BsdInfo {
    pub owner_id: u32,
    pub group_id: u32,
    pub admin_flags: u8,
    pub owner_flags: u8,
    pub file_mode: u16,
    pub special: u32,
}

#[derive(Debug, Clone)]
pub struct CatalogDates {
    pub create_date: HfsTimestamp,
    pub content_mod_date: HfsTimestamp,
    pub attribute_mod_date: Option<HfsTimestamp>,
    pub access_date: Option<HfsTimestamp>,
    pub backup_date: Option<HfsTimestamp>,
    pub added_date: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CatalogFile {
    pub file_id: u32,
    pub flags: u16,
    pub dates: CatalogDates,
    pub permissions: Option<BsdInfo>,
    pub data_fork: ForkDescriptor,
    pub resource_fork: ForkDescriptor,
    pub finder_type_creator: Option<[u8; 8]>,
}

impl CatalogFile {
    /// `Some(inode)` if this file record is a hard link chain member.
    pub fn hard_link_target(&self) -> Option<u32> {
        let type_creator = self.finder_type_creator?;
        if self.flags & FLAG_HARDLINK_CHAIN != 0 && &type_creator == b"hlnkhfs+" {
            self.permissions.as_ref().map(|p| p.special)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogFolder {
    pub folder_id: u32,
    pub flags: u16,
    pub valence: u32,
    pub dates: CatalogDates,
    pub permissions: Option<BsdInfo>,
}

#[derive(Debug, Clone)]
pub struct CatalogThread {
    pub parent_id: u32,
    pub node_name: String,
}

#[derive(Debug, Clone)]
pub enum CatalogRecord {
    Folder(CatalogFolder),
    File(CatalogFile),
    FolderThread(CatalogThread),
    FileThread(CatalogThread),
}

impl CatalogRecord {
    pub fn is_thread(&self) -> bool {
        matches!(self, CatalogRecord::FolderThread(_) | CatalogRecord::FileThread(_))
    }
}

#[derive(Debug, Clone)]
struct CatalogKey {
    parent_id: u32,
    node_name: Vec<u16>,
}

fn parse_catalog_key(data: &[u8], dialect: Dialect) -> Result<(CatalogKey, usize)> {
    match dialect {
        Dialect::HfsPlus | Dialect::HfsX => {
            if data.len() < 8 {
                return Err(HfsError::corruption("catalog key too short"));
            }
            let key_length = u16::from_be_bytes([data[0], data[1]]) as usize;
            let parent_id = u32::from_be_bytes([data[2], data[3], data[4], data[5]]);
            let name_length = u16::from_be_bytes([data[6], data[7]]) as usize;
            let name_start = 8;
            let name_end = name_start + name_length * 2;
            if name_end > data.len() {
                return Err(HfsError::corruption("catalog key name extends beyond record"));
            }
            let node_name = unicode::utf16be_to_u16(&data[name_start..name_end]);
            let mut record_offset = 2 + key_length;
            if !record_offset.is_multiple_of(2) {
                record_offset += 1;
            }
            Ok((CatalogKey { parent_id, node_name }, record_offset))
        }
        Dialect::Hfs => {
            if data.len() < 7 {
                return Err(HfsError::corruption("classic catalog key too short"));
            }
            let key_length = data[0] as usize;
            let parent_id = u32::from_be_bytes([data[2], data[3], data[4], data[5]]);
            let name_length = data[6] as usize;
            let name_start = 7;
            let name_end = name_start + name_length;
            if name_end > data.len() {
                return Err(HfsError::corruption("classic catalog key name extends beyond record"));
            }
            let name_str = crate::macroman::decode(&data[name_start..name_end]);
            let node_name = unicode::string_to_utf16(&name_str);
            let mut record_offset = 1 + key_length;
            if !record_offset.is_multiple_of(2) {
                record_offset += 1;
            }
            Ok((CatalogKey { parent_id, node_name }, record_offset))
        }
    }
}

fn parse_bsd_info(cursor: &mut Cursor<&[u8]>) -> Result<BsdInfo> {
    Ok(BsdInfo {
        owner_id: cursor.read_u32::<BigEndian>()?,
        group_id: cursor.read_u32::<BigEndian>()?,
        admin_flags: cursor.read_u8()?,
        owner_flags: cursor.read_u8()?,
        file_mode: cursor.read_u16::<BigEndian>()?,
        special: cursor.read_u32::<BigEndian>()?,
    })
}

fn read_extent_be(cursor: &mut Cursor<&[u8]>) -> Result<crate::volume_header::ExtentDescriptor> {
    Ok(crate::volume_header::ExtentDescriptor {
        start_block: cursor.read_u32::<BigEndian>()?,
        block_count: cursor.read_u32::<BigEndian>()?,
    })
}

fn parse_fork_data_hfs_plus(cursor: &mut Cursor<&[u8]>) -> Result<ForkDescriptor> {
    let logical_size = cursor.read_u64::<BigEndian>()?;
    let clump_size = cursor.read_u32::<BigEndian>()?;
    let total_blocks = cursor.read_u32::<BigEndian>()?;
    let mut extents = [crate::volume_header::ExtentDescriptor::default(); 8];
    for extent in &mut extents {
        *extent = read_extent_be(cursor)?;
    }
    Ok(ForkDescriptor {
        logical_size,
        clump_size,
        total_blocks,
        extents,
    })
}

fn added_date_from_extended_info(extended: &[u8; 16], flags: u16) -> Option<i32> {
    if flags & FLAG_HAS_DATE_ADDED == 0 {
        return None;
    }
    Some(crate::timestamp::decode_added_time([
        extended[4],
        extended[5],
        extended[6],
        extended[7],
    ]))
}

fn parse_catalog_record(data: &[u8], dialect: Dialect) -> Result<CatalogRecord> {
    if data.len() < 2 {
        return Err(HfsError::corruption("catalog record too short"));
    }
    let record_type = u16::from_be_bytes([data[0], data[1]]);
    let mut cursor = Cursor::new(data);
    cursor.set_position(2);

    match (dialect, record_type) {
        (Dialect::HfsPlus | Dialect::HfsX, RECORD_TYPE_FOLDER_HFS_PLUS) => {
            let flags = cursor.read_u16::<BigEndian>()?;
            let valence = cursor.read_u32::<BigEndian>()?;
            let folder_id = cursor.read_u32::<BigEndian>()?;
            let create_date = cursor.read_u32::<BigEndian>()?;
            let content_mod_date = cursor.read_u32::<BigEndian>()?;
            let attribute_mod_date = cursor.read_u32::<BigEndian>()?;
            let access_date = cursor.read_u32::<BigEndian>()?;
            let backup_date = cursor.read_u32::<BigEndian>()?;
            let permissions = parse_bsd_info(&mut cursor)?;
            let mut user_info = [0u8; 16];
            cursor.read_exact(&mut user_info)?;
            let mut extended_info = [0u8; 16];
            cursor.read_exact(&mut extended_info)?;
            let _text_encoding = cursor.read_u32::<BigEndian>()?;

            Ok(CatalogRecord::Folder(CatalogFolder {
                folder_id,
                flags,
                valence,
                dates: CatalogDates {
                    create_date: HfsTimestamp::new(create_date, TimeKind::Utc),
                    content_mod_date: HfsTimestamp::new(content_mod_date, TimeKind::Utc),
                    attribute_mod_date: Some(HfsTimestamp::new(attribute_mod_date, TimeKind::Utc)),
                    access_date: Some(HfsTimestamp::new(access_date, TimeKind::Utc)),
                    backup_date: Some(HfsTimestamp::new(backup_date, TimeKind::Utc)),
                    added_date: added_date_from_extended_info(&extended_info, flags),
                },
                permissions: Some(permissions),
            }))
        }
        (Dialect::HfsPlus | Dialect::HfsX, RECORD_TYPE_FILE_HFS_PLUS) => {
            let flags = cursor.read_u16::<BigEndian>()?;
            let _reserved = cursor.read_u32::<BigEndian>()?;
            let file_id = cursor.read_u32::<BigEndian>()?;
            let create_date = cursor.read_u32::<BigEndian>()?;
            let content_mod_date = cursor.read_u32::<BigEndian>()?;
            let attribute_mod_date = cursor.read_u32::<BigEndian>()?;
            let access_date = cursor.read_u32::<BigEndian>()?;
            let backup_date = cursor.read_u32::<BigEndian>()?;
            let permissions = parse_bsd_info(&mut cursor)?;
            let mut user_info = [0u8; 16];
            cursor.read_exact(&mut user_info)?;
            let mut extended_info = [0u8; 16];
            cursor.read_exact(&mut extended_info)?;
            let _text_encoding = cursor.read_u32::<BigEndian>()?;
            let _reserved2 = cursor.read_u32::<BigEndian>()?;
            let data_fork = parse_fork_data_hfs_plus(&mut cursor)?;
            let resource_fork = parse_fork_data_hfs_plus(&mut cursor)?;

            let mut type_creator = [0u8; 8];
            type_creator.copy_from_slice(&user_info[0..8]);

            Ok(CatalogRecord::File(CatalogFile {
                file_id,
                flags,
                dates: CatalogDates {
                    create_date: HfsTimestamp::new(create_date, TimeKind::Utc),
                    content_mod_date: HfsTimestamp::new(content_mod_date, TimeKind::Utc),
                    attribute_mod_date: Some(HfsTimestamp::new(attribute_mod_date, TimeKind::Utc)),
                    access_date: Some(HfsTimestamp::new(access_date, TimeKind::Utc)),
                    backup_date: Some(HfsTimestamp::new(backup_date, TimeKind::Utc)),
                    added_date: added_date_from_extended_info(&extended_info, flags),
                },
                permissions: Some(permissions),
                data_fork,
                resource_fork,
                finder_type_creator: Some(type_creator),
            }))
        }
        (Dialect::HfsPlus | Dialect::HfsX, RECORD_TYPE_FOLDER_THREAD_HFS_PLUS | RECORD_TYPE_FILE_THREAD_HFS_PLUS) => {
            let _reserved = cursor.read_u16::<BigEndian>()?;
            let parent_id = cursor.read_u32::<BigEndian>()?;
            let name_length = cursor.read_u16::<BigEndian>()? as usize;
            let mut name_buf = vec![0u8; name_length * 2];
            cursor.read_exact(&mut name_buf)?;
            let node_name = unicode::utf16_to_string(&unicode::utf16be_to_u16(&name_buf));
            let thread = CatalogThread { parent_id, node_name };
            if record_type == RECORD_TYPE_FOLDER_THREAD_HFS_PLUS {
                Ok(CatalogRecord::FolderThread(thread))
            } else {
                Ok(CatalogRecord::FileThread(thread))
            }
        }
        (Dialect::Hfs, RECORD_TYPE_FOLDER_HFS) => {
            let _flags = cursor.read_u16::<BigEndian>()?;
            let valence = cursor.read_u16::<BigEndian>()? as u32;
            let folder_id = cursor.read_u32::<BigEndian>()?;
            let create_date = cursor.read_u32::<BigEndian>()?;
            let modify_date = cursor.read_u32::<BigEndian>()?;
            let backup_date = cursor.read_u32::<BigEndian>()?;
            let mut _rest = [0u8; 48];
            cursor.read_exact(&mut _rest)?;

            Ok(CatalogRecord::Folder(CatalogFolder {
                folder_id,
                flags: 0,
                valence,
                dates: CatalogDates {
                    create_date: HfsTimestamp::new(create_date, TimeKind::Local),
                    content_mod_date: HfsTimestamp::new(modify_date, TimeKind::Local),
                    attribute_mod_date: None,
                    access_date: None,
                    backup_date: Some(HfsTimestamp::new(backup_date, TimeKind::Local)),
                    added_date: None,
                },
                permissions: None,
            }))
        }
        (Dialect::Hfs, RECORD_TYPE_FILE_HFS) => {
            let flags = cursor.read_u8()? as u16;
            let _file_type = cursor.read_u8()?;
            let mut user_info = [0u8; 16];
            cursor.read_exact(&mut user_info)?;
            let file_id = cursor.read_u32::<BigEndian>()?;
            let _data_start_block = cursor.read_u16::<BigEndian>()?;
            let data_logical_size = cursor.read_u32::<BigEndian>()? as u64;
            let _data_physical_size = cursor.read_u32::<BigEndian>()?;
            let _rsrc_start_block = cursor.read_u16::<BigEndian>()?;
            let rsrc_logical_size = cursor.read_u32::<BigEndian>()? as u64;
            let _rsrc_physical_size = cursor.read_u32::<BigEndian>()?;
            let create_date = cursor.read_u32::<BigEndian>()?;
            let modify_date = cursor.read_u32::<BigEndian>()?;
            let backup_date = cursor.read_u32::<BigEndian>()?;
            let mut _finder_info = [0u8; 16];
            cursor.read_exact(&mut _finder_info)?;
            let _clump_size = cursor.read_u16::<BigEndian>()?;

            let mut data_fork = ForkDescriptor {
                logical_size: data_logical_size,
                ..Default::default()
            };
            for e in data_fork.extents.iter_mut().take(3) {
                e.start_block = cursor.read_u16::<BigEndian>()? as u32;
                e.block_count = cursor.read_u16::<BigEndian>()? as u32;
            }
            let mut resource_fork = ForkDescriptor {
                logical_size: rsrc_logical_size,
                ..Default::default()
            };
            for e in resource_fork.extents.iter_mut().take(3) {
                e.start_block = cursor.read_u16::<BigEndian>()? as u32;
                e.block_count = cursor.read_u16::<BigEndian>()? as u32;
            }

            let mut type_creator = [0u8; 8];
            type_creator.copy_from_slice(&user_info[0..8]);

            Ok(CatalogRecord::File(CatalogFile {
                file_id,
                flags,
                dates: CatalogDates {
                    create_date: HfsTimestamp::new(create_date, TimeKind::Local),
                    content_mod_date: HfsTimestamp::new(modify_date, TimeKind::Local),
                    attribute_mod_date: None,
                    access_date: None,
                    backup_date: Some(HfsTimestamp::new(backup_date, TimeKind::Local)),
                    added_date: None,
                },
                permissions: None,
                data_fork,
                resource_fork,
                finder_type_creator: Some(type_creator),
            }))
        }
        (Dialect::Hfs, RECORD_TYPE_FOLDER_THREAD_HFS | RECORD_TYPE_FILE_THREAD_HFS) => {
            let _reserved = cursor.read_u32::<BigEndian>()?;
            let parent_id = cursor.read_u32::<BigEndian>()?;
            let name_length = cursor.read_u8()? as usize;
            let mut name_buf = vec![0u8; name_length];
            cursor.read_exact(&mut name_buf)?;
            let node_name = crate::macroman::decode(&name_buf);
            let thread = CatalogThread { parent_id, node_name };
            if record_type == RECORD_TYPE_FOLDER_THREAD_HFS {
                Ok(CatalogRecord::FolderThread(thread))
            } else {
                Ok(CatalogRecord::FileThread(thread))
            }
        }
        (_, other) => Err(HfsError::InvalidFormat(format!(
            "unknown catalog record type 0x{other:04X} for this dialect"
        ))),
    }
}

/// Shared handle to everything a catalog operation needs: the byte source,
/// the parsed header, the node cache, and the abort flag.
pub struct CatalogContext<'a> {
    pub source: &'a dyn ByteSource,
    pub header: &'a BTreeHeaderRecord,
    pub dialect: Dialect,
    pub comparator: NameComparator,
    pub cache: &'a Mutex<NodeCache>,
    pub abort: &'a AtomicBool,
}

fn make_comparator<'a>(ctx: &'a CatalogContext, target_parent_id: u32, target_name: &'a [u16]) -> impl Fn(&[u8]) -> Ordering + 'a {
    move |record_data: &[u8]| {
        let (key, _) = match parse_catalog_key(record_data, ctx.dialect) {
            Ok(k) => k,
            Err(_) => return Ordering::Less,
        };
        match key.parent_id.cmp(&target_parent_id) {
            Ordering::Equal => {}
            ord => return ord,
        }
        ctx.comparator.compare_utf16(&key.node_name, target_name)
    }
}

/// Look up a catalog record by (parent_id, name).
pub fn lookup_by_parent_and_name(ctx: &CatalogContext, parent_id: u32, name: &str) -> Result<Option<CatalogRecord>> {
    let name_u16 = unicode::string_to_utf16(name);
    let comparator = make_comparator(ctx, parent_id, &name_u16);

    match btree::search_btree(ctx.source, ctx.header, TreeId::Catalog, ctx.cache, ctx.abort, &comparator)? {
        Some((node, idx)) => {
            let record_data = node.record_data(idx)?;
            let (_, record_offset) = parse_catalog_key(record_data, ctx.dialect)?;
            if record_offset >= record_data.len() {
                return Err(HfsError::corruption("catalog record missing data after key"));
            }
            Ok(Some(parse_catalog_record(&record_data[record_offset..], ctx.dialect)?))
        }
        None => Ok(None),
    }
}

/// Look up a catalog entry by CNID via its thread record, then resolve the
/// (parent, name) pair the thread points to.
pub fn lookup_by_identifier(ctx: &CatalogContext, identifier: u32) -> Result<Option<(CatalogRecord, CatalogThread)>> {
    let empty: Vec<u16> = Vec::new();
    let comparator = make_comparator(ctx, identifier, &empty);
    let thread = match btree::search_btree(ctx.source, ctx.header, TreeId::Catalog, ctx.cache, ctx.abort, &comparator)? {
        Some((node, idx)) => {
            let record_data = node.record_data(idx)?;
            let (_, record_offset) = parse_catalog_key(record_data, ctx.dialect)?;
            match parse_catalog_record(&record_data[record_offset..], ctx.dialect)? {
                CatalogRecord::FolderThread(t) | CatalogRecord::FileThread(t) => t,
                _ => return Err(HfsError::corruption("expected thread record")),
            }
        }
        None => return Ok(None),
    };

    match lookup_by_parent_and_name(ctx, thread.parent_id, &thread.node_name)? {
        Some(record) => Ok(Some((record, thread))),
        None => Ok(None),
    }
}

fn find_leaf_for_parent(ctx: &CatalogContext, parent_id: u32) -> Result<u32> {
    let empty: Vec<u16> = Vec::new();
    let comparator = make_comparator(ctx, parent_id, &empty);
    btree::find_leaf(ctx.source, ctx.header, TreeId::Catalog, ctx.cache, ctx.abort, &comparator)
}

#[derive(Debug, Clone)]
pub struct ListedEntry {
    pub name: String,
    pub record: CatalogRecord,
}

/// Enumerate the direct children of `parent_id`, skipping thread records.
pub fn list_directory(ctx: &CatalogContext, parent_id: u32) -> Result<Vec<ListedEntry>> {
    let start_node = find_leaf_for_parent(ctx, parent_id)?;
    if start_node == 0 {
        return Ok(Vec::new());
    }

    let dialect = ctx.dialect;
    let match_fn = move |record_data: &[u8]| -> Option<bool> {
        match parse_catalog_key(record_data, dialect) {
            Ok((key, _)) => {
                if key.parent_id < parent_id {
                    Some(false)
                } else if key.parent_id == parent_id {
                    Some(true)
                } else {
                    None
                }
            }
            Err(_) => Some(false),
        }
    };
    let parse_fn = move |record_data: &[u8]| -> Result<Option<ListedEntry>> {
        let (key, record_offset) = parse_catalog_key(record_data, dialect)?;
        if record_offset >= record_data.len() {
            return Ok(None);
        }
        let record = parse_catalog_record(&record_data[record_offset..], dialect)?;
        if record.is_thread() {
            return Ok(None);
        }
        let name = unicode::utf16_to_string(&key.node_name);
        Ok(Some(ListedEntry { name, record }))
    };

    btree::scan_leaves(
        ctx.source,
        ctx.header,
        TreeId::Catalog,
        ctx.cache,
        ctx.abort,
        start_node,
        &match_fn,
        &parse_fn,
    )
}

/// Resolve a `/`-separated path to its catalog record, starting at the root
/// folder (CNID 2). An empty/`/` path resolves to the root folder itself.
pub fn resolve_path(ctx: &CatalogContext, path: &str) -> Result<CatalogRecord> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return match lookup_by_identifier(ctx, CNID_ROOT_FOLDER)? {
            Some((record, _)) => Ok(record),
            None => Err(HfsError::NotFound("root folder".into())),
        };
    }

    let components: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    let mut current_parent = CNID_ROOT_FOLDER;
    let mut record = None;

    for (i, component) in components.iter().enumerate() {
        match lookup_by_parent_and_name(ctx, current_parent, component)? {
            Some(r) => {
                let is_last = i == components.len() - 1;
                match &r {
                    CatalogRecord::Folder(f) => {
                        current_parent = f.folder_id;
                    }
                    CatalogRecord::File(_) if !is_last => {
                        return Err(HfsError::Argument(format!(
                            "{} is not a directory",
                            components[..=i].join("/")
                        )));
                    }
                    CatalogRecord::File(_) => {}
                    _ => return Err(HfsError::corruption("unexpected thread record in path resolution")),
                }
                record = Some(r);
            }
            None => {
                return Err(HfsError::NotFound(components[..=i].join("/")));
            }
        }
    }

    record.ok_or_else(|| HfsError::NotFound(path.to_string()))
}

/// Resolve a hard-link file record to its target inode's file record under
/// the hidden private-data directory.
pub fn resolve_hard_link(ctx: &CatalogContext, inode: u32) -> Result<CatalogFile> {
    let private_dir = match lookup_by_parent_and_name(ctx, CNID_ROOT_FOLDER, HARDLINK_PRIVATE_DIR)? {
        Some(CatalogRecord::Folder(f)) => f.folder_id,
        _ => return Err(HfsError::NotFound("HFS+ Private Data directory".into())),
    };
    let name = format!("iNode{inode}");
    match lookup_by_parent_and_name(ctx, private_dir, &name)? {
        Some(CatalogRecord::File(f)) => Ok(f),
        _ => Err(HfsError::NotFound(format!("hard link target iNode{inode}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hfs_plus_catalog_key() {
        let mut data = Vec::new();
        data.extend_from_slice(&10u16.to_be_bytes()); // key_length
        data.extend_from_slice(&2u32.to_be_bytes()); // parent_id
        data.extend_from_slice(&2u16.to_be_bytes()); // name_length (chars)
        data.extend_from_slice(&unicode::string_to_utf16("ab").iter().flat_map(|c| c.to_be_bytes()).collect::<Vec<u8>>());
        data.extend_from_slice(&[0, 1, 0, 2]); // dummy record bytes

        let (key, offset) = parse_catalog_key(&data, Dialect::HfsPlus).unwrap();
        assert_eq!(key.parent_id, 2);
        assert_eq!(unicode::utf16_to_string(&key.node_name), "ab");
        assert_eq!(&data[offset..], &[0, 1, 0, 2]);
    }

    #[test]
    fn hard_link_detected_from_finder_info() {
        let file = CatalogFile {
            file_id: 99,
            flags: FLAG_HARDLINK_CHAIN,
            dates: CatalogDates {
                create_date: HfsTimestamp::new(0, TimeKind::Utc),
                content_mod_date: HfsTimestamp::new(0, TimeKind::Utc),
                attribute_mod_date: None,
                access_date: None,
                backup_date: None,
                added_date: None,
            },
            permissions: Some(BsdInfo {
                special: 1234,
                ..Default::default()
            }),
            data_fork: ForkDescriptor::default(),
            resource_fork: ForkDescriptor::default(),
            finder_type_creator: Some(*b"hlnkhfs+"),
        };
        assert_eq!(file.hard_link_target(), Some(1234));
    }
}
