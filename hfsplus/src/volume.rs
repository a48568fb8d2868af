//! The top-level façade: opens a volume, resolves paths and identifiers, and
//! hands out `FileEntry` views. Owns the shared node cache and the
//! cooperative-cancellation flag every B-tree walk checks.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use crate::attributes::{self, AttributesContext};
use crate::btree::{self, BTreeHeaderRecord};
use crate::cache::NodeCache;
use crate::catalog::{self, CatalogContext, CatalogRecord, CNID_ROOT_FOLDER};
use crate::entry::FileEntry;
use crate::error::{HfsError, Result};
use crate::extents::ExtentsContext;
use crate::source::ByteSource;
use crate::unicode::NameComparator;
use crate::volume_header::{Dialect, VolumeHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VolumeState {
    Opening,
    Open,
    Closed,
    Aborting,
}

pub struct Volume {
    source: Box<dyn ByteSource>,
    pub(crate) header: VolumeHeader,
    pub(crate) catalog_header: BTreeHeaderRecord,
    pub(crate) extents_header: BTreeHeaderRecord,
    pub(crate) attributes_header: Option<BTreeHeaderRecord>,
    pub(crate) cache: Mutex<NodeCache>,
    pub(crate) abort: Arc<AtomicBool>,
    pub(crate) comparator: NameComparator,
    state: Mutex<VolumeState>,
}

impl Volume {
    /// Open a volume: parse the header, then both mandatory B-trees and the
    /// optional attributes tree. Moves `Opening` -> `Open` on success; a
    /// parse failure leaves nothing behind to transition.
    pub fn open<S: ByteSource + 'static>(source: S) -> Result<Self> {
        let _opening = VolumeState::Opening;
        let source: Box<dyn ByteSource> = Box::new(source);

        let header = VolumeHeader::parse(source.as_ref())?;

        let catalog_header = btree::read_btree_header(source.as_ref(), &header.catalog_file, header.geometry)?;
        let extents_header = btree::read_btree_header(source.as_ref(), &header.extents_file, header.geometry)?;
        let attributes_header = match &header.attributes_file {
            Some(fork) => Some(btree::read_btree_header(source.as_ref(), fork, header.geometry)?),
            None => None,
        };

        tracing::debug!(
            dialect = ?header.dialect,
            block_size = header.geometry.block_size,
            total_blocks = header.total_blocks,
            "opened volume"
        );

        let comparator = match header.dialect {
            Dialect::Hfs => NameComparator::MacRoman,
            Dialect::HfsPlus => NameComparator::CaseInsensitiveUnicode,
            Dialect::HfsX => {
                if catalog_header.key_compare_type != 0 {
                    NameComparator::BinaryUnicode
                } else {
                    NameComparator::CaseInsensitiveUnicode
                }
            }
        };

        Ok(Volume {
            source,
            header,
            catalog_header,
            extents_header,
            attributes_header,
            cache: Mutex::new(NodeCache::default()),
            abort: Arc::new(AtomicBool::new(false)),
            comparator,
            state: Mutex::new(VolumeState::Open),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.header.dialect
    }

    pub fn header(&self) -> &VolumeHeader {
        &self.header
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.comparator == NameComparator::BinaryUnicode
    }

    /// Signal cooperative cancellation: any in-flight or future B-tree fetch
    /// on this volume returns `HfsError::Aborted`.
    pub fn abort(&self) {
        tracing::debug!("aborting volume, dialect={:?}", self.header.dialect);
        self.abort.store(true, AtomicOrdering::Relaxed);
        *self.state.lock().expect("volume state mutex poisoned") = VolumeState::Aborting;
    }

    pub fn close(&self) {
        *self.state.lock().expect("volume state mutex poisoned") = VolumeState::Closed;
    }

    fn ensure_open(&self) -> Result<()> {
        match *self.state.lock().expect("volume state mutex poisoned") {
            VolumeState::Open => Ok(()),
            VolumeState::Aborting => Err(HfsError::Aborted),
            other => Err(HfsError::NotAvailable(format!("volume is not open ({other:?})"))),
        }
    }

    pub(crate) fn catalog_ctx(&self) -> CatalogContext<'_> {
        CatalogContext {
            source: self.source.as_ref(),
            header: &self.catalog_header,
            dialect: self.header.dialect,
            comparator: self.comparator,
            cache: &self.cache,
            abort: &self.abort,
        }
    }

    pub(crate) fn extents_ctx(&self) -> ExtentsContext<'_> {
        ExtentsContext {
            source: self.source.as_ref(),
            header: &self.extents_header,
            dialect: self.header.dialect,
            cache: &self.cache,
            abort: &self.abort,
        }
    }

    pub(crate) fn attributes_ctx(&self) -> Option<AttributesContext<'_>> {
        self.attributes_header.as_ref().map(|header| AttributesContext {
            source: self.source.as_ref(),
            header,
            cache: &self.cache,
            abort: &self.abort,
        })
    }

    pub(crate) fn geometry(&self) -> crate::volume_header::Geometry {
        self.header.geometry
    }

    /// The volume's name: stored directly in the MDB for classic HFS, or as
    /// the root folder's catalog thread name for HFS+/HFSX.
    pub fn volume_name(&self) -> Result<Option<String>> {
        if let Some(name) = &self.header.volume_name {
            return Ok(Some(name.clone()));
        }
        match catalog::lookup_by_identifier(&self.catalog_ctx(), CNID_ROOT_FOLDER)? {
            Some((_, thread)) => Ok(Some(thread.node_name)),
            None => Ok(None),
        }
    }

    pub fn root(&self) -> Result<FileEntry<'_>> {
        self.open_identifier(CNID_ROOT_FOLDER)
    }

    pub fn open_identifier(&self, identifier: u32) -> Result<FileEntry<'_>> {
        self.ensure_open()?;
        match catalog::lookup_by_identifier(&self.catalog_ctx(), identifier)? {
            Some((record, thread)) => Ok(FileEntry::from_record(self, thread.parent_id, thread.node_name, record)),
            None => Err(HfsError::NotFound(format!("CNID {identifier}"))),
        }
    }

    pub fn open_path(&self, path: &str) -> Result<FileEntry<'_>> {
        self.ensure_open()?;
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return self.root();
        }
        let record = catalog::resolve_path(&self.catalog_ctx(), path)?;
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed).to_string();
        let parent_id = match &record {
            CatalogRecord::Folder(f) => self.parent_of(f.folder_id)?,
            CatalogRecord::File(f) => self.parent_of(f.file_id)?,
            _ => return Err(HfsError::corruption("path resolved to a thread record")),
        };
        Ok(FileEntry::from_record(self, parent_id, name, record))
    }

    fn parent_of(&self, identifier: u32) -> Result<u32> {
        match catalog::lookup_by_identifier(&self.catalog_ctx(), identifier)? {
            Some((_, thread)) => Ok(thread.parent_id),
            None => Err(HfsError::NotFound(format!("CNID {identifier}"))),
        }
    }

    pub fn list_directory(&self, parent_identifier: u32) -> Result<Vec<FileEntry<'_>>> {
        self.ensure_open()?;
        Ok(catalog::list_directory(&self.catalog_ctx(), parent_identifier)?
            .into_iter()
            .map(|entry| FileEntry::from_record(self, parent_identifier, entry.name, entry.record))
            .collect())
    }

    pub(crate) fn list_attributes(&self, identifier: u32) -> Result<Vec<attributes::AttributeRecord>> {
        match self.attributes_ctx() {
            Some(ctx) => attributes::list_attributes(&ctx, identifier),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn lookup_attribute(&self, identifier: u32, name: &str) -> Result<Option<attributes::AttributeRecord>> {
        match self.attributes_ctx() {
            Some(ctx) => attributes::lookup_attribute(&ctx, identifier, name),
            None => Ok(None),
        }
    }

    pub(crate) fn resolve_hard_link(&self, inode: u32) -> Result<crate::catalog::CatalogFile> {
        catalog::resolve_hard_link(&self.catalog_ctx(), inode)
    }
}
