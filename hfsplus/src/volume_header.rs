//! Volume header / master directory block parsing.
//!
//! Detects classic HFS (`BD` signature), HFS+ (`H+`), or HFSX (`HX`) at byte
//! offset 1024 and normalizes all three into one `VolumeHeader` shape.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::{HfsError, Result};
use crate::macroman;
use crate::source::ByteSource;

pub const VOLUME_HEADER_OFFSET: u64 = 1024;

const HFS_SIGNATURE: u16 = 0x4244; // 'BD'
const HFS_PLUS_SIGNATURE: u16 = 0x482B; // 'H+'
const HFSX_SIGNATURE: u16 = 0x4858; // 'HX'

const HFS_PLUS_VERSION: u16 = 4;
const HFSX_VERSION: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Hfs,
    HfsPlus,
    HfsX,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtentDescriptor {
    pub start_block: u32,
    pub block_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ForkDescriptor {
    pub logical_size: u64,
    pub clump_size: u32,
    pub total_blocks: u32,
    pub extents: [ExtentDescriptor; 8],
}

impl ForkDescriptor {
    /// Sum of block counts across the inline extent list, stopping at the
    /// first terminating (0, 0) pair.
    pub fn inline_block_count(&self) -> u32 {
        self.extents
            .iter()
            .take_while(|e| e.block_count != 0)
            .map(|e| e.block_count)
            .sum()
    }

    pub fn has_overflow(&self) -> bool {
        self.inline_block_count() < self.total_blocks
    }
}

/// Converts an allocation block number to an absolute byte offset. For
/// HFS+/HFSX `sector_base` is 0; for classic HFS it is the master directory
/// block's "first allocation block" expressed in 512-byte sectors.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub block_size: u32,
    pub sector_base: u64,
}

impl Geometry {
    pub fn block_offset(&self, block: u32) -> u64 {
        self.sector_base + block as u64 * self.block_size as u64
    }
}

#[derive(Debug, Clone)]
pub struct VolumeHeader {
    pub dialect: Dialect,
    pub geometry: Geometry,
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub file_count: u32,
    pub folder_count: u32,
    pub create_date: u32,
    pub modify_date: u32,
    pub backup_date: u32,
    pub next_catalog_id: u32,
    pub finder_info: [u32; 8],
    /// Classic-HFS volumes carry their name directly in the MDB; HFS+/HFSX
    /// volume names live in the catalog as the root folder's thread record name.
    pub volume_name: Option<String>,
    pub allocation_file: ForkDescriptor,
    pub extents_file: ForkDescriptor,
    pub catalog_file: ForkDescriptor,
    pub attributes_file: Option<ForkDescriptor>,
    pub startup_file: Option<ForkDescriptor>,
}

fn read_extent_be(cursor: &mut Cursor<&[u8]>) -> Result<ExtentDescriptor> {
    Ok(ExtentDescriptor {
        start_block: cursor.read_u32::<BigEndian>()?,
        block_count: cursor.read_u32::<BigEndian>()?,
    })
}

fn read_fork_data_hfs_plus(cursor: &mut Cursor<&[u8]>) -> Result<ForkDescriptor> {
    let logical_size = cursor.read_u64::<BigEndian>()?;
    let clump_size = cursor.read_u32::<BigEndian>()?;
    let total_blocks = cursor.read_u32::<BigEndian>()?;
    let mut extents = [ExtentDescriptor::default(); 8];
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

fn parse_hfs_plus(buf: &[u8; 512], is_hfsx: bool) -> Result<VolumeHeader> {
    let mut cursor = Cursor::new(&buf[..]);
    let _signature = cursor.read_u16::<BigEndian>()?;
    let version = cursor.read_u16::<BigEndian>()?;
    match version {
        HFS_PLUS_VERSION | HFSX_VERSION => {}
        other => {
            return Err(HfsError::InvalidFormat(format!(
                "unsupported HFS+ volume header version {other}"
            )))
        }
    }

    let _attributes = cursor.read_u32::<BigEndian>()?;
    let _last_mounted_version = cursor.read_u32::<BigEndian>()?;
    let _journal_info_block = cursor.read_u32::<BigEndian>()?;
    let create_date = cursor.read_u32::<BigEndian>()?;
    let modify_date = cursor.read_u32::<BigEndian>()?;
    let backup_date = cursor.read_u32::<BigEndian>()?;
    let _checked_date = cursor.read_u32::<BigEndian>()?;
    let file_count = cursor.read_u32::<BigEndian>()?;
    let folder_count = cursor.read_u32::<BigEndian>()?;
    let block_size = cursor.read_u32::<BigEndian>()?;
    let total_blocks = cursor.read_u32::<BigEndian>()?;
    let free_blocks = cursor.read_u32::<BigEndian>()?;
    let _next_allocation = cursor.read_u32::<BigEndian>()?;
    let _rsrc_clump_size = cursor.read_u32::<BigEndian>()?;
    let _data_clump_size = cursor.read_u32::<BigEndian>()?;
    let next_catalog_id = cursor.read_u32::<BigEndian>()?;
    let _write_count = cursor.read_u32::<BigEndian>()?;
    let _encoding_bitmap = cursor.read_u64::<BigEndian>()?;

    let mut finder_info = [0u32; 8];
    for fi in &mut finder_info {
        *fi = cursor.read_u32::<BigEndian>()?;
    }

    if !(block_size.is_power_of_two() && block_size >= 512) {
        return Err(HfsError::InvalidFormat(format!(
            "allocation block size {block_size} is not a power of two >= 512"
        )));
    }

    let allocation_file = read_fork_data_hfs_plus(&mut cursor)?;
    let extents_file = read_fork_data_hfs_plus(&mut cursor)?;
    let catalog_file = read_fork_data_hfs_plus(&mut cursor)?;
    let attributes_file = read_fork_data_hfs_plus(&mut cursor)?;
    let startup_file = read_fork_data_hfs_plus(&mut cursor)?;

    Ok(VolumeHeader {
        dialect: if is_hfsx { Dialect::HfsX } else { Dialect::HfsPlus },
        geometry: Geometry {
            block_size,
            sector_base: 0,
        },
        total_blocks,
        free_blocks,
        file_count,
        folder_count,
        create_date,
        modify_date,
        backup_date,
        next_catalog_id,
        finder_info,
        volume_name: None,
        allocation_file,
        extents_file,
        catalog_file,
        attributes_file: is_nonzero_fork(&attributes_file).then_some(attributes_file),
        startup_file: is_nonzero_fork(&startup_file).then_some(startup_file),
    })
}

fn is_nonzero_fork(fork: &ForkDescriptor) -> bool {
    fork.logical_size != 0 || fork.total_blocks != 0 || fork.extents[0].block_count != 0
}

/// Classic HFS master directory block. Field layout per Inside Macintosh /
/// `fshfs_master_directory_block.h`: everything up to and including the two
/// three-extent records for the extents overflow and catalog files.
fn parse_classic_mdb(buf: &[u8; 512]) -> Result<VolumeHeader> {
    let mut cursor = Cursor::new(&buf[..]);
    let _signature = cursor.read_u16::<BigEndian>()?;
    let create_date = cursor.read_u32::<BigEndian>()?;
    let modify_date = cursor.read_u32::<BigEndian>()?;
    let _attributes = cursor.read_u16::<BigEndian>()?;
    let _root_file_count = cursor.read_u16::<BigEndian>()?;
    let _bitmap_block = cursor.read_u16::<BigEndian>()?;
    let _next_allocation = cursor.read_u16::<BigEndian>()?;
    let total_blocks = cursor.read_u16::<BigEndian>()? as u32;
    let block_size = cursor.read_u32::<BigEndian>()?;
    let _clump_size = cursor.read_u32::<BigEndian>()?;
    let extents_start_block = cursor.read_u16::<BigEndian>()? as u64;
    let next_catalog_id = cursor.read_u32::<BigEndian>()?;
    let free_blocks = cursor.read_u16::<BigEndian>()? as u32;

    let mut name_field = [0u8; 28];
    cursor.read_exact(&mut name_field)?;
    let volume_name = macroman::decode_pascal_string(&name_field);

    let backup_date = cursor.read_u32::<BigEndian>()?;
    let _backup_sequence = cursor.read_u16::<BigEndian>()?;
    let _write_count = cursor.read_u32::<BigEndian>()?;
    let _extents_clump_size = cursor.read_u32::<BigEndian>()?;
    let _catalog_clump_size = cursor.read_u32::<BigEndian>()?;
    let _root_dir_count = cursor.read_u16::<BigEndian>()?;
    let file_count = cursor.read_u32::<BigEndian>()?;
    let folder_count = cursor.read_u32::<BigEndian>()?;

    let mut finder_info = [0u32; 8];
    for fi in &mut finder_info {
        *fi = cursor.read_u32::<BigEndian>()?;
    }

    let _volume_cache_size = cursor.read_u16::<BigEndian>()?;
    let _bitmap_cache_size = cursor.read_u16::<BigEndian>()?;
    let _common_cache_size = cursor.read_u16::<BigEndian>()?;

    if !(block_size.is_power_of_two() && block_size >= 512) {
        return Err(HfsError::InvalidFormat(format!(
            "allocation block size {block_size} is not a power of two >= 512"
        )));
    }

    let extents_file_size = cursor.read_u32::<BigEndian>()? as u64;
    let mut extents_file_extents = [ExtentDescriptor::default(); 8];
    for e in extents_file_extents.iter_mut().take(3) {
        e.start_block = cursor.read_u16::<BigEndian>()? as u32;
        e.block_count = cursor.read_u16::<BigEndian>()? as u32;
    }

    let catalog_file_size = cursor.read_u32::<BigEndian>()? as u64;
    let mut catalog_file_extents = [ExtentDescriptor::default(); 8];
    for e in catalog_file_extents.iter_mut().take(3) {
        e.start_block = cursor.read_u16::<BigEndian>()? as u32;
        e.block_count = cursor.read_u16::<BigEndian>()? as u32;
    }

    let extents_file = ForkDescriptor {
        logical_size: extents_file_size,
        clump_size: 0,
        total_blocks: extents_file_size.div_ceil(block_size as u64) as u32,
        extents: extents_file_extents,
    };
    let catalog_file = ForkDescriptor {
        logical_size: catalog_file_size,
        clump_size: 0,
        total_blocks: catalog_file_size.div_ceil(block_size as u64) as u32,
        extents: catalog_file_extents,
    };

    Ok(VolumeHeader {
        dialect: Dialect::Hfs,
        geometry: Geometry {
            block_size,
            sector_base: extents_start_block * 512,
        },
        total_blocks,
        free_blocks,
        file_count,
        folder_count,
        create_date,
        modify_date,
        backup_date,
        next_catalog_id,
        finder_info,
        volume_name: Some(volume_name),
        allocation_file: ForkDescriptor::default(),
        extents_file,
        catalog_file,
        attributes_file: None,
        startup_file: None,
    })
}

impl VolumeHeader {
    /// Parse the volume header (or master directory block) at byte offset 1024.
    pub fn parse(source: &dyn ByteSource) -> Result<Self> {
        let mut buf = [0u8; 512];
        source.read_exact_at(VOLUME_HEADER_OFFSET, &mut buf)?;

        let signature = u16::from_be_bytes([buf[0], buf[1]]);
        match signature {
            HFS_SIGNATURE => parse_classic_mdb(&buf),
            HFS_PLUS_SIGNATURE => parse_hfs_plus(&buf, false),
            HFSX_SIGNATURE => parse_hfs_plus(&buf, true),
            other => Err(HfsError::InvalidFormat(format!(
                "unrecognized volume signature 0x{other:04X}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileSource;
    use std::io::Write;

    fn hfs_plus_header_bytes(signature: u16) -> Vec<u8> {
        let mut buf = vec![0u8; 1024 + 512];
        let mut w = &mut buf[1024..];
        w.write_all(&signature.to_be_bytes()).unwrap();
        w.write_all(&HFS_PLUS_VERSION.to_be_bytes()).unwrap();
        w.write_all(&[0u8; 4]).unwrap(); // attributes
        w.write_all(&[0u8; 4]).unwrap(); // last mounted version
        w.write_all(&[0u8; 4]).unwrap(); // journal info block
        w.write_all(&[0u8; 4]).unwrap(); // create
        w.write_all(&[0u8; 4]).unwrap(); // modify
        w.write_all(&[0u8; 4]).unwrap(); // backup
        w.write_all(&[0u8; 4]).unwrap(); // checked
        w.write_all(&[0u8; 4]).unwrap(); // file count
        w.write_all(&[0u8; 4]).unwrap(); // folder count
        w.write_all(&4096u32.to_be_bytes()).unwrap(); // block size
        w.write_all(&1000u32.to_be_bytes()).unwrap(); // total blocks
        w.write_all(&[0u8; 4]).unwrap(); // free blocks
        w.write_all(&[0u8; 4]).unwrap(); // next allocation
        w.write_all(&[0u8; 4]).unwrap(); // rsrc clump
        w.write_all(&[0u8; 4]).unwrap(); // data clump
        w.write_all(&16u32.to_be_bytes()).unwrap(); // next catalog id
        w.write_all(&[0u8; 4]).unwrap(); // write count
        w.write_all(&[0u8; 8]).unwrap(); // encoding bitmap
        w.write_all(&[0u8; 32]).unwrap(); // finder info
        for _ in 0..5 {
            w.write_all(&[0u8; 8]).unwrap(); // logical size
            w.write_all(&[0u8; 4]).unwrap(); // clump size
            w.write_all(&[0u8; 4]).unwrap(); // total blocks
            w.write_all(&[0u8; 64]).unwrap(); // 8 extents
        }
        buf
    }

    #[test]
    fn parses_hfs_plus_signature() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&hfs_plus_header_bytes(HFS_PLUS_SIGNATURE)).unwrap();
        let source = FileSource::from_file(tmp.reopen().unwrap()).unwrap();
        let header = VolumeHeader::parse(&source).unwrap();
        assert_eq!(header.dialect, Dialect::HfsPlus);
        assert_eq!(header.geometry.block_size, 4096);
        assert_eq!(header.total_blocks, 1000);
    }

    #[test]
    fn parses_hfsx_signature() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&hfs_plus_header_bytes(HFSX_SIGNATURE)).unwrap();
        let source = FileSource::from_file(tmp.reopen().unwrap()).unwrap();
        let header = VolumeHeader::parse(&source).unwrap();
        assert_eq!(header.dialect, Dialect::HfsX);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&vec![0u8; 1024 + 512]).unwrap();
        let source = FileSource::from_file(tmp.reopen().unwrap()).unwrap();
        assert!(VolumeHeader::parse(&source).is_err());
    }
}
