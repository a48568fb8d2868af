//! Extended attributes B-tree: key/record decoding and lookup.
//!
//! HFS+ stores extended attributes in their own B-tree, keyed by
//! (identifier, name) rather than (parent, name) like the catalog. A record
//! is one of three kinds depending on the attribute's payload size: inline
//! (<~3.6KB, carried directly in the record), fork (a whole separate fork
//! descriptor, for large attributes Apple streams through a data fork), or
//! extents (an overflow extent list continuing a fork attribute).

use byteorder::{BigEndian, ReadBytesExt};
use std::cmp::Ordering;
use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use crate::btree::{self, BTreeHeaderRecord};
use crate::cache::{NodeCache, TreeId};
use crate::error::{HfsError, Result};
use crate::source::ByteSource;
use crate::unicode;
use crate::volume_header::{ExtentDescriptor, ForkDescriptor};

const RECORD_TYPE_INLINE: u32 = 0x10;
const RECORD_TYPE_FORK: u32 = 0x20;
const RECORD_TYPE_EXTENTS: u32 = 0x30;

#[derive(Debug, Clone)]
struct AttributeKey {
    identifier: u32,
    name: Vec<u16>,
}

fn parse_attribute_key(data: &[u8]) -> Result<(AttributeKey, usize)> {
    if data.len() < 14 {
        return Err(HfsError::corruption("attribute key too short"));
    }
    let key_length = u16::from_be_bytes([data[0], data[1]]) as usize;
    let identifier = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    let name_length = u16::from_be_bytes([data[12], data[13]]) as usize;
    let name_start = 14;
    let name_end = name_start + name_length * 2;
    if name_end > data.len() {
        return Err(HfsError::corruption("attribute key name extends beyond record"));
    }
    let name = unicode::utf16be_to_u16(&data[name_start..name_end]);

    let mut record_offset = 2 + key_length;
    if !record_offset.is_multiple_of(2) {
        record_offset += 1;
    }
    Ok((AttributeKey { identifier, name }, record_offset))
}

#[derive(Debug, Clone)]
pub enum AttributeData {
    Inline(Vec<u8>),
    Fork(ForkDescriptor),
    Extents([ExtentDescriptor; 8]),
}

#[derive(Debug, Clone)]
pub struct AttributeRecord {
    pub name: String,
    pub data: AttributeData,
}

fn parse_fork_descriptor(data: &[u8]) -> Result<ForkDescriptor> {
    if data.len() < 80 {
        return Err(HfsError::corruption("attribute fork descriptor too short"));
    }
    let mut cursor = Cursor::new(data);
    let logical_size = cursor.read_u64::<BigEndian>()?;
    let clump_size = cursor.read_u32::<BigEndian>()?;
    let total_blocks = cursor.read_u32::<BigEndian>()?;
    let mut extents = [ExtentDescriptor::default(); 8];
    for extent in &mut extents {
        extent.start_block = cursor.read_u32::<BigEndian>()?;
        extent.block_count = cursor.read_u32::<BigEndian>()?;
    }
    Ok(ForkDescriptor {
        logical_size,
        clump_size,
        total_blocks,
        extents,
    })
}

fn parse_attribute_record(data: &[u8], name: String) -> Result<AttributeRecord> {
    if data.len() < 4 {
        return Err(HfsError::corruption("attribute record too short"));
    }
    let record_type = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);

    match record_type {
        RECORD_TYPE_INLINE => {
            if data.len() < 16 {
                return Err(HfsError::corruption("inline attribute record too short"));
            }
            let inline_size = u32::from_be_bytes([data[12], data[13], data[14], data[15]]) as usize;
            let payload_end = 16 + inline_size;
            if payload_end > data.len() {
                return Err(HfsError::corruption("inline attribute data extends beyond record"));
            }
            Ok(AttributeRecord {
                name,
                data: AttributeData::Inline(data[16..payload_end].to_vec()),
            })
        }
        RECORD_TYPE_FORK => {
            if data.len() < 88 {
                return Err(HfsError::corruption("fork attribute record too short"));
            }
            Ok(AttributeRecord {
                name,
                data: AttributeData::Fork(parse_fork_descriptor(&data[8..88])?),
            })
        }
        RECORD_TYPE_EXTENTS => {
            if data.len() < 72 {
                return Err(HfsError::corruption("extents attribute record too short"));
            }
            let mut extents = [ExtentDescriptor::default(); 8];
            let mut cursor = Cursor::new(&data[8..]);
            for extent in &mut extents {
                extent.start_block = cursor.read_u32::<BigEndian>()?;
                extent.block_count = cursor.read_u32::<BigEndian>()?;
            }
            Ok(AttributeRecord {
                name,
                data: AttributeData::Extents(extents),
            })
        }
        other => Err(HfsError::InvalidFormat(format!(
            "unsupported attribute record type 0x{other:08X}"
        ))),
    }
}

pub struct AttributesContext<'a> {
    pub source: &'a dyn ByteSource,
    pub header: &'a BTreeHeaderRecord,
    pub cache: &'a Mutex<NodeCache>,
    pub abort: &'a AtomicBool,
}

/// Look up a single named attribute on `identifier`.
pub fn lookup_attribute(ctx: &AttributesContext, identifier: u32, name: &str) -> Result<Option<AttributeRecord>> {
    let target_name = unicode::string_to_utf16(name);
    let comparator = move |record_data: &[u8]| -> Ordering {
        let (key, _) = match parse_attribute_key(record_data) {
            Ok(k) => k,
            Err(_) => return Ordering::Less,
        };
        match key.identifier.cmp(&identifier) {
            Ordering::Equal => {}
            ord => return ord,
        }
        unicode::compare_binary(&key.name, &target_name)
    };

    match btree::search_btree(ctx.source, ctx.header, TreeId::Attributes, ctx.cache, ctx.abort, &comparator)? {
        Some((node, idx)) => {
            let record_data = node.record_data(idx)?;
            let (key, record_offset) = parse_attribute_key(record_data)?;
            if record_offset >= record_data.len() {
                return Err(HfsError::corruption("attribute record missing data after key"));
            }
            let name = unicode::utf16_to_string(&key.name);
            Ok(Some(parse_attribute_record(&record_data[record_offset..], name)?))
        }
        None => Ok(None),
    }
}

/// Enumerate every attribute attached to `identifier`.
pub fn list_attributes(ctx: &AttributesContext, identifier: u32) -> Result<Vec<AttributeRecord>> {
    let empty: Vec<u16> = Vec::new();
    let find_comparator = move |record_data: &[u8]| -> Ordering {
        let (key, _) = match parse_attribute_key(record_data) {
            Ok(k) => k,
            Err(_) => return Ordering::Less,
        };
        match key.identifier.cmp(&identifier) {
            Ordering::Equal => {}
            ord => return ord,
        }
        unicode::compare_binary(&key.name, &empty)
    };
    let start_node = btree::find_leaf(ctx.source, ctx.header, TreeId::Attributes, ctx.cache, ctx.abort, &find_comparator)?;
    if start_node == 0 {
        return Ok(Vec::new());
    }

    let match_fn = move |record_data: &[u8]| -> Option<bool> {
        match parse_attribute_key(record_data) {
            Ok((key, _)) => {
                if key.identifier < identifier {
                    Some(false)
                } else if key.identifier == identifier {
                    Some(true)
                } else {
                    None
                }
            }
            Err(_) => Some(false),
        }
    };
    let parse_fn = move |record_data: &[u8]| -> Result<Option<AttributeRecord>> {
        let (key, record_offset) = parse_attribute_key(record_data)?;
        if record_offset >= record_data.len() {
            return Ok(None);
        }
        let name = unicode::utf16_to_string(&key.name);
        Ok(Some(parse_attribute_record(&record_data[record_offset..], name)?))
    };

    btree::scan_leaves(
        ctx.source,
        ctx.header,
        TreeId::Attributes,
        ctx.cache,
        ctx.abort,
        start_node,
        &match_fn,
        &parse_fn,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_key(identifier: u32, name: &str) -> Vec<u8> {
        let name_u16 = unicode::string_to_utf16(name);
        let mut key = Vec::new();
        let key_body_len = 2 + 4 + 4 + 2 + name_u16.len() * 2;
        key.extend_from_slice(&(key_body_len as u16).to_be_bytes());
        key.extend_from_slice(&[0, 0]); // unknown1
        key.extend_from_slice(&identifier.to_be_bytes());
        key.extend_from_slice(&[0, 0, 0, 0]); // unknown2
        key.extend_from_slice(&(name_u16.len() as u16).to_be_bytes());
        for c in name_u16 {
            key.extend_from_slice(&c.to_be_bytes());
        }
        key
    }

    #[test]
    fn parses_attribute_key_and_inline_record() {
        let mut data = build_key(42, "com.apple.test");
        if !data.len().is_multiple_of(2) {
            data.push(0);
        }
        data.extend_from_slice(&RECORD_TYPE_INLINE.to_be_bytes());
        data.extend_from_slice(&[0u8; 8]); // unknown1 + unknown2
        data.extend_from_slice(&3u32.to_be_bytes()); // inline_data_size
        data.extend_from_slice(&[1, 2, 3]);

        let (key, offset) = parse_attribute_key(&data).unwrap();
        assert_eq!(key.identifier, 42);
        assert_eq!(unicode::utf16_to_string(&key.name), "com.apple.test");

        let record = parse_attribute_record(&data[offset..], "com.apple.test".into()).unwrap();
        match record.data {
            AttributeData::Inline(bytes) => assert_eq!(bytes, vec![1, 2, 3]),
            other => panic!("expected inline record, got {other:?}"),
        }
    }
}
