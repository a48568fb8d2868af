//! `FileEntry`: a catalog record (file or folder) bound to the volume it
//! came from, with metadata getters and lazy access to its data, resource
//! fork, children and extended attributes.

use std::io::{Read, Seek};

use crate::attributes::{AttributeData, AttributeRecord};
use crate::catalog::{BsdInfo, CatalogFile, CatalogFolder, CatalogRecord};
use crate::error::{HfsError, Result};
use crate::extents::{ForkReader, FORK_TYPE_DATA, FORK_TYPE_RESOURCE};
use crate::mode::{self, FileType};
use crate::volume::Volume;

#[derive(Debug, Clone)]
enum EntryKind {
    Folder(CatalogFolder),
    File(CatalogFile),
}

pub struct FileEntry<'a> {
    volume: &'a Volume,
    parent_identifier: u32,
    name: String,
    kind: EntryKind,
}

impl<'a> FileEntry<'a> {
    pub(crate) fn from_record(volume: &'a Volume, parent_identifier: u32, name: String, record: CatalogRecord) -> Self {
        let kind = match record {
            CatalogRecord::Folder(f) => EntryKind::Folder(f),
            CatalogRecord::File(f) => EntryKind::File(f),
            CatalogRecord::FolderThread(_) | CatalogRecord::FileThread(_) => {
                unreachable!("catalog lookups never hand back a bare thread record")
            }
        };
        FileEntry {
            volume,
            parent_identifier,
            name,
            kind,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Folder(_))
    }

    pub fn get_identifier(&self) -> u32 {
        match &self.kind {
            EntryKind::Folder(f) => f.folder_id,
            EntryKind::File(f) => f.file_id,
        }
    }

    pub fn get_parent_identifier(&self) -> u32 {
        self.parent_identifier
    }

    /// `Some(inode_cnid)` if this is a hard-link chain member.
    pub fn get_link_identifier(&self) -> Option<u32> {
        match &self.kind {
            EntryKind::File(f) => f.hard_link_target(),
            EntryKind::Folder(_) => None,
        }
    }

    pub fn get_flags(&self) -> u16 {
        match &self.kind {
            EntryKind::Folder(f) => f.flags,
            EntryKind::File(f) => f.flags,
        }
    }

    pub fn name_utf8(&self) -> &str {
        &self.name
    }

    pub fn name_utf16(&self) -> Vec<u16> {
        crate::unicode::string_to_utf16(&self.name)
    }

    fn permissions(&self) -> Option<&BsdInfo> {
        match &self.kind {
            EntryKind::Folder(f) => f.permissions.as_ref(),
            EntryKind::File(f) => f.permissions.as_ref(),
        }
    }

    pub fn get_file_mode(&self) -> u16 {
        match self.permissions() {
            Some(p) if p.file_mode != 0 => p.file_mode,
            _ => match &self.kind {
                EntryKind::Folder(_) => mode::S_IFDIR | 0o755,
                EntryKind::File(_) => mode::S_IFREG | 0o644,
            },
        }
    }

    pub fn file_type(&self) -> FileType {
        mode::file_type_of(self.get_file_mode())
    }

    pub fn get_owner_id(&self) -> u32 {
        self.permissions().map(|p| p.owner_id).unwrap_or(0)
    }

    pub fn get_group_id(&self) -> u32 {
        self.permissions().map(|p| p.group_id).unwrap_or(0)
    }

    /// The `special` BSD-info field reinterpreted as a device number, valid
    /// only when `file_type()` is a character or block device.
    pub fn get_device_number(&self) -> Option<u32> {
        match self.file_type() {
            FileType::CharDevice | FileType::BlockDevice => self.permissions().map(|p| p.special),
            _ => None,
        }
    }

    fn dates(&self) -> &crate::catalog::CatalogDates {
        match &self.kind {
            EntryKind::Folder(f) => &f.dates,
            EntryKind::File(f) => &f.dates,
        }
    }

    pub fn get_creation_time(&self) -> i64 {
        self.dates().create_date.to_posix_seconds()
    }

    pub fn get_content_modification_time(&self) -> i64 {
        self.dates().content_mod_date.to_posix_seconds()
    }

    pub fn get_attribute_modification_time(&self) -> Option<i64> {
        self.dates().attribute_mod_date.map(|t| t.to_posix_seconds())
    }

    pub fn get_access_time(&self) -> Option<i64> {
        self.dates().access_date.map(|t| t.to_posix_seconds())
    }

    pub fn get_backup_time(&self) -> Option<i64> {
        self.dates().backup_date.map(|t| t.to_posix_seconds())
    }

    pub fn get_added_time(&self) -> Option<i32> {
        self.dates().added_date
    }

    fn data_fork(&self) -> Option<&crate::volume_header::ForkDescriptor> {
        match &self.kind {
            EntryKind::File(f) => Some(&f.data_fork),
            EntryKind::Folder(_) => None,
        }
    }

    fn resource_fork(&self) -> Option<&crate::volume_header::ForkDescriptor> {
        match &self.kind {
            EntryKind::File(f) => Some(&f.resource_fork),
            EntryKind::Folder(_) => None,
        }
    }

    pub fn has_resource_fork(&self) -> bool {
        self.resource_fork().is_some_and(|f| f.logical_size > 0)
    }

    pub fn get_size(&self) -> u64 {
        self.data_fork().map(|f| f.logical_size).unwrap_or(0)
    }

    /// A `Read + Seek` stream over the entry's data fork.
    pub fn open_data_fork(&self) -> Result<ForkReader<'a>> {
        let fork = self
            .data_fork()
            .ok_or_else(|| HfsError::Argument("directories have no data fork".into()))?;
        Ok(ForkReader::new(
            self.volume.catalog_ctx().source,
            Some(self.volume.extents_ctx()),
            fork.clone(),
            self.volume.geometry(),
            FORK_TYPE_DATA,
            self.get_identifier(),
        ))
    }

    /// A `Read + Seek` stream over the entry's resource fork.
    pub fn open_resource_fork(&self) -> Result<ForkReader<'a>> {
        let fork = self
            .resource_fork()
            .ok_or_else(|| HfsError::Argument("directories have no resource fork".into()))?;
        Ok(ForkReader::new(
            self.volume.catalog_ctx().source,
            Some(self.volume.extents_ctx()),
            fork.clone(),
            self.volume.geometry(),
            FORK_TYPE_RESOURCE,
            self.get_identifier(),
        ))
    }

    /// Convenience positioned read over the data fork, for callers that
    /// don't want to hold a `ForkReader` across calls.
    pub fn read_data(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut reader = self.open_data_fork()?;
        reader.seek(std::io::SeekFrom::Start(offset))?;
        Ok(reader.read(buf)?)
    }

    /// If this entry is a symbolic link, its target path (stored as the
    /// data fork's raw contents).
    pub fn symlink_target(&self) -> Result<Option<String>> {
        if self.file_type() != FileType::Symlink {
            return Ok(None);
        }
        let mut reader = self.open_data_fork()?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Resolve a hard-link file entry to the private-data entry it points at.
    /// Returns `self`'s own record unchanged if it isn't a hard link.
    pub fn resolve_link(&self) -> Result<CatalogFile> {
        match self.get_link_identifier() {
            Some(inode) => self.volume.resolve_hard_link(inode),
            None => match &self.kind {
                EntryKind::File(f) => Ok(f.clone()),
                EntryKind::Folder(_) => Err(HfsError::Argument("folders are never hard links".into())),
            },
        }
    }

    pub fn xattr_count(&self) -> Result<usize> {
        Ok(self.volume.list_attributes(self.get_identifier())?.len())
    }

    pub fn xattr_by_index(&self, index: usize) -> Result<AttributeRecord> {
        self.volume
            .list_attributes(self.get_identifier())?
            .into_iter()
            .nth(index)
            .ok_or_else(|| HfsError::OutOfRange(format!("attribute index {index} out of range")))
    }

    pub fn xattr_by_name(&self, name: &str) -> Result<Option<AttributeRecord>> {
        self.volume.lookup_attribute(self.get_identifier(), name)
    }

    /// Read an attribute's full value, following fork/extents sub-kinds to
    /// their backing fork when the value isn't inline.
    pub fn xattr_value(&self, record: &AttributeRecord) -> Result<Vec<u8>> {
        match &record.data {
            AttributeData::Inline(bytes) => Ok(bytes.clone()),
            AttributeData::Fork(fork) => {
                let mut reader = ForkReader::new(
                    self.volume.catalog_ctx().source,
                    Some(self.volume.extents_ctx()),
                    fork.clone(),
                    self.volume.geometry(),
                    FORK_TYPE_DATA,
                    self.get_identifier(),
                );
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
            AttributeData::Extents(_) => Err(HfsError::Unsupported(
                "standalone extents attribute record requires its paired fork record".into(),
            )),
        }
    }

    pub fn sub_entry_count(&self) -> Result<usize> {
        if !self.is_directory() {
            return Err(HfsError::Argument("not a directory".into()));
        }
        Ok(self.volume.list_directory(self.get_identifier())?.len())
    }

    pub fn sub_entry_by_index(&self, index: usize) -> Result<FileEntry<'a>> {
        if !self.is_directory() {
            return Err(HfsError::Argument("not a directory".into()));
        }
        self.volume
            .list_directory(self.get_identifier())?
            .into_iter()
            .nth(index)
            .ok_or_else(|| HfsError::OutOfRange(format!("directory entry index {index} out of range")))
    }

    pub fn sub_entry_by_name(&self, name: &str) -> Result<Option<FileEntry<'a>>> {
        if !self.is_directory() {
            return Err(HfsError::Argument("not a directory".into()));
        }
        match crate::catalog::lookup_by_parent_and_name(&self.volume.catalog_ctx(), self.get_identifier(), name)? {
            Some(record) => Ok(Some(FileEntry::from_record(self.volume, self.get_identifier(), name.to_string(), record))),
            None => Ok(None),
        }
    }
}
