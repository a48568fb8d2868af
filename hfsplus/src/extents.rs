//! Fork extent resolution: translating (fork, logical offset, length) into
//! physical byte ranges, consulting the extents overflow B-tree when a
//! fork's eight inline extents run out, and a `Read + Seek` reader over the
//! result.

use byteorder::{BigEndian, ReadBytesExt};
use std::cmp::Ordering;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use crate::btree::{self, BTreeHeaderRecord};
use crate::cache::{NodeCache, TreeId};
use crate::error::{HfsError, Result};
use crate::source::ByteSource;
use crate::volume_header::{Dialect, ExtentDescriptor, ForkDescriptor, Geometry};

pub const FORK_TYPE_DATA: u8 = 0x00;
pub const FORK_TYPE_RESOURCE: u8 = 0xFF;

struct ExtentsKey {
    fork_type: u8,
    identifier: u32,
    start_block: u32,
}

/// HFS+/HFSX layout: `data_size:u16 fork_type:u8 pad:u8 identifier:u32 start_block:u32`.
fn parse_extents_key_hfs_plus(data: &[u8]) -> Result<ExtentsKey> {
    if data.len() < 12 {
        return Err(HfsError::corruption("extents key too short"));
    }
    Ok(ExtentsKey {
        fork_type: data[2],
        identifier: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
        start_block: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
    })
}

/// Classic HFS layout: `data_size:u8 fork_type:u8 identifier:u32 start_block:u16`.
fn parse_extents_key_classic(data: &[u8]) -> Result<ExtentsKey> {
    if data.len() < 8 {
        return Err(HfsError::corruption("classic extents key too short"));
    }
    Ok(ExtentsKey {
        fork_type: data[1],
        identifier: u32::from_be_bytes([data[2], data[3], data[4], data[5]]),
        start_block: u16::from_be_bytes([data[6], data[7]]) as u32,
    })
}

fn parse_extents_key(data: &[u8], dialect: Dialect) -> Result<(ExtentsKey, usize)> {
    match dialect {
        Dialect::HfsPlus | Dialect::HfsX => Ok((parse_extents_key_hfs_plus(data)?, 12)),
        Dialect::Hfs => Ok((parse_extents_key_classic(data)?, 8)),
    }
}

fn parse_extent_record(data: &[u8], dialect: Dialect) -> Result<[ExtentDescriptor; 8]> {
    let mut extents = [ExtentDescriptor::default(); 8];
    let mut cursor = Cursor::new(data);
    match dialect {
        Dialect::HfsPlus | Dialect::HfsX => {
            for e in &mut extents {
                e.start_block = cursor.read_u32::<BigEndian>()?;
                e.block_count = cursor.read_u32::<BigEndian>()?;
            }
        }
        Dialect::Hfs => {
            for e in extents.iter_mut().take(3) {
                e.start_block = cursor.read_u16::<BigEndian>()? as u32;
                e.block_count = cursor.read_u16::<BigEndian>()? as u32;
            }
        }
    }
    Ok(extents)
}

/// Context needed to resolve overflow extents: the extents B-tree plus the
/// byte source, cache and abort flag that every B-tree walk shares.
pub struct ExtentsContext<'a> {
    pub source: &'a dyn ByteSource,
    pub header: &'a BTreeHeaderRecord,
    pub dialect: Dialect,
    pub cache: &'a Mutex<NodeCache>,
    pub abort: &'a AtomicBool,
}

/// Find the overflow extent record for `identifier`/`fork_type` whose run
/// starts at `start_block`, via the extents B-tree.
fn lookup_overflow_extents(
    ctx: &ExtentsContext,
    fork_type: u8,
    identifier: u32,
    start_block: u32,
) -> Result<Option<[ExtentDescriptor; 8]>> {
    let dialect = ctx.dialect;
    let comparator = move |record_data: &[u8]| -> Ordering {
        let (key, _) = match parse_extents_key(record_data, dialect) {
            Ok(k) => k,
            Err(_) => return Ordering::Less,
        };
        (key.identifier, key.fork_type, key.start_block).cmp(&(identifier, fork_type, start_block))
    };

    match btree::search_btree(ctx.source, ctx.header, TreeId::Extents, ctx.cache, ctx.abort, &comparator)? {
        Some((node, idx)) => {
            let record_data = node.record_data(idx)?;
            let (_, key_len) = parse_extents_key(record_data, dialect)?;
            if record_data.len() <= key_len {
                return Err(HfsError::corruption("extents record shorter than its key"));
            }
            Ok(Some(parse_extent_record(&record_data[key_len..], dialect)?))
        }
        None => Ok(None),
    }
}

/// Resolve a run of `len` bytes starting at `offset_in_fork` to absolute
/// volume byte ranges, walking the fork's inline extents and, if those run
/// out, the extents overflow tree.
pub fn resolve_ranges(
    ctx: Option<&ExtentsContext>,
    fork: &ForkDescriptor,
    geometry: Geometry,
    fork_type: u8,
    identifier: u32,
    mut offset_in_fork: u64,
    mut len: u64,
) -> Result<Vec<(u64, u64)>> {
    let block_size = geometry.block_size as u64;
    let mut ranges = Vec::new();
    let mut block_cursor: u64 = 0;
    let mut extent_run: Vec<ExtentDescriptor> = fork.extents.to_vec();
    let mut next_overflow_start = fork.inline_block_count();

    'outer: loop {
        for extent in &extent_run {
            if extent.block_count == 0 {
                break;
            }
            let extent_start_byte = block_cursor * block_size;
            let extent_len_byte = extent.block_count as u64 * block_size;
            let extent_end_byte = extent_start_byte + extent_len_byte;

            if len > 0 && offset_in_fork < extent_end_byte {
                let skip = offset_in_fork.saturating_sub(extent_start_byte);
                let avail = extent_len_byte - skip;
                let take = avail.min(len);
                let abs_block = extent.start_block as u64 + skip / block_size;
                let abs_offset = geometry.block_offset(abs_block as u32) + skip % block_size;
                ranges.push((abs_offset, take));
                offset_in_fork += take;
                len -= take;
                if len == 0 {
                    break 'outer;
                }
            }
            block_cursor += extent.block_count as u64;
        }

        if len == 0 {
            break;
        }
        let Some(ctx) = ctx else {
            return Err(HfsError::OutOfRange(format!(
                "fork offset beyond inline extents and no overflow tree available (identifier {identifier})"
            )));
        };
        match lookup_overflow_extents(ctx, fork_type, identifier, next_overflow_start)? {
            Some(next_extents) => {
                let run_blocks: u32 = next_extents.iter().take_while(|e| e.block_count != 0).map(|e| e.block_count).sum();
                if run_blocks == 0 {
                    return Err(HfsError::corruption("overflow extent record has no blocks"));
                }
                next_overflow_start += run_blocks;
                extent_run = next_extents.to_vec();
            }
            None => {
                return Err(HfsError::OutOfRange(format!(
                    "fork offset beyond available extents for identifier {identifier}"
                )));
            }
        }
    }

    Ok(ranges)
}

/// `Read + Seek` view over one fork of one catalog entry.
pub struct ForkReader<'a> {
    source: &'a dyn ByteSource,
    extents_ctx: Option<ExtentsContext<'a>>,
    fork: ForkDescriptor,
    geometry: Geometry,
    fork_type: u8,
    identifier: u32,
    position: u64,
}

impl<'a> ForkReader<'a> {
    pub fn new(
        source: &'a dyn ByteSource,
        extents_ctx: Option<ExtentsContext<'a>>,
        fork: ForkDescriptor,
        geometry: Geometry,
        fork_type: u8,
        identifier: u32,
    ) -> Self {
        ForkReader {
            source,
            extents_ctx,
            fork,
            geometry,
            fork_type,
            identifier,
            position: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.fork.logical_size
    }

    pub fn is_empty(&self) -> bool {
        self.fork.logical_size == 0
    }
}

impl Read for ForkReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.fork.logical_size {
            return Ok(0);
        }
        let remaining = self.fork.logical_size - self.position;
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }

        let ranges = resolve_ranges(
            self.extents_ctx.as_ref(),
            &self.fork,
            self.geometry,
            self.fork_type,
            self.identifier,
            self.position,
            want as u64,
        )
        .map_err(io::Error::other)?;

        let mut written = 0usize;
        for (abs_offset, run_len) in ranges {
            let run_len = run_len as usize;
            self.source
                .read_exact_at(abs_offset, &mut buf[written..written + run_len])
                .map_err(io::Error::other)?;
            written += run_len;
        }
        self.position += written as u64;
        Ok(written)
    }
}

impl Seek for ForkReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos: i64 = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(delta) => self.fork.logical_size as i64 + delta,
            SeekFrom::Current(delta) => self.position as i64 + delta,
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file"));
        }
        self.position = new_pos as u64;
        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_single_inline_extent() {
        let mut fork = ForkDescriptor {
            logical_size: 100,
            total_blocks: 1,
            ..Default::default()
        };
        fork.extents[0] = ExtentDescriptor { start_block: 10, block_count: 1 };
        let geometry = Geometry { block_size: 512, sector_base: 0 };

        let ranges = resolve_ranges(None, &fork, geometry, FORK_TYPE_DATA, 99, 0, 100).unwrap();
        assert_eq!(ranges, vec![(10 * 512, 100)]);
    }

    #[test]
    fn errors_when_extent_exhausted_without_overflow_context() {
        let mut fork = ForkDescriptor {
            logical_size: 10_000,
            total_blocks: 1,
            ..Default::default()
        };
        fork.extents[0] = ExtentDescriptor { start_block: 0, block_count: 1 };
        let geometry = Geometry { block_size: 512, sector_base: 0 };

        let err = resolve_ranges(None, &fork, geometry, FORK_TYPE_DATA, 99, 0, 10_000).unwrap_err();
        assert!(matches!(err, HfsError::OutOfRange(_)));
    }

    #[test]
    fn resolves_across_two_inline_extents() {
        let mut fork = ForkDescriptor {
            logical_size: 1024,
            total_blocks: 2,
            ..Default::default()
        };
        fork.extents[0] = ExtentDescriptor { start_block: 0, block_count: 1 };
        fork.extents[1] = ExtentDescriptor { start_block: 5, block_count: 1 };
        let geometry = Geometry { block_size: 512, sector_base: 0 };

        let ranges = resolve_ranges(None, &fork, geometry, FORK_TYPE_DATA, 1, 256, 768).unwrap();
        assert_eq!(ranges, vec![(256, 256), (5 * 512, 512)]);
    }
}
