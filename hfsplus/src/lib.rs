//! Read-only HFS / HFS+ / HFSX filesystem parser.
//!
//! Open a [`Volume`] over anything implementing [`ByteSource`] (a plain
//! file, an offset into a disk image, or a custom mapping), then walk it
//! through [`FileEntry`] handles: path/identifier lookup, directory
//! listing, fork streaming, extended attributes, and hard-link resolution.

pub mod attributes;
pub mod btree;
pub mod cache;
pub mod catalog;
pub mod entry;
pub mod error;
pub mod extents;
pub mod macroman;
pub mod mode;
pub mod source;
pub mod timestamp;
pub mod unicode;
pub mod volume;
pub mod volume_header;

pub use error::{HfsError, Result};
pub use source::{ByteSource, FileSource, OffsetSource};
pub use volume::Volume;
pub use volume_header::{Dialect, VolumeHeader};

use entry::FileEntry;

/// One entry discovered during [`walk`], with its full path from the root.
pub struct WalkEntry<'a> {
    pub path: String,
    pub entry: FileEntry<'a>,
}

/// Recursively enumerate every entry reachable from the root folder,
/// depth-first, building full paths as it goes.
pub fn walk(volume: &Volume) -> Result<Vec<WalkEntry<'_>>> {
    let mut entries = Vec::new();
    walk_into(volume, catalog::CNID_ROOT_FOLDER, "", &mut entries)?;
    Ok(entries)
}

fn walk_into<'a>(volume: &'a Volume, parent_id: u32, parent_path: &str, out: &mut Vec<WalkEntry<'a>>) -> Result<()> {
    for entry in volume.list_directory(parent_id)? {
        let full_path = if parent_path.is_empty() {
            format!("/{}", entry.name_utf8())
        } else {
            format!("{parent_path}/{}", entry.name_utf8())
        };
        let is_dir = entry.is_directory();
        let identifier = entry.get_identifier();

        out.push(WalkEntry { path: full_path.clone(), entry });

        if is_dir {
            walk_into(volume, identifier, &full_path, out)?;
        }
    }
    Ok(())
}
