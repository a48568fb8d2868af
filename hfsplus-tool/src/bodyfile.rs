//! `-B`: Sleuthkit-3-compatible bodyfile export.
//!
//! One `|`-separated row per entry: `md5|name|inode|mode_string|uid|gid|size|atime|mtime|ctime|crtime`.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use hfsplus::entry::FileEntry;
use hfsplus::mode::mode_string;
use hfsplus::{Result, Volume};

use crate::style::*;

const ZERO_MD5: &str = "00000000000000000000000000000000";

fn hash_data_fork(entry: &FileEntry<'_>) -> Result<String> {
    let mut reader = entry.open_data_fork()?;
    let mut ctx = md5::Context::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

fn write_row(out: &mut impl Write, entry: &FileEntry<'_>, path: &str, hash: bool) -> Result<()> {
    let md5_hex = if hash && !entry.is_directory() {
        hash_data_fork(entry).unwrap_or_else(|_| ZERO_MD5.to_string())
    } else {
        ZERO_MD5.to_string()
    };

    let atime = entry.get_access_time().unwrap_or(0);
    let mtime = entry.get_content_modification_time();
    let ctime = entry.get_attribute_modification_time().unwrap_or(mtime);
    let crtime = entry.get_creation_time();
    let escaped_path = escape_control_chars(path);

    writeln!(
        out,
        "{md5_hex}|{escaped_path}|{}|{}|{}|{}|{}|{atime}|{mtime}|{ctime}|{crtime}",
        entry.get_identifier(),
        mode_string(entry.get_file_mode()),
        entry.get_owner_id(),
        entry.get_group_id(),
        entry.get_size(),
    )?;
    Ok(())
}

pub(crate) fn write_bodyfile(volume: &Volume, out_path: &Path, hash: bool) -> Result<()> {
    let file = File::create(out_path)?;
    let mut out = BufWriter::new(file);

    let root = volume.root()?;
    write_row(&mut out, &root, "/", hash)?;

    for walked in hfsplus::walk(volume)? {
        if let Err(e) = write_row(&mut out, &walked.entry, &walked.path, hash) {
            tracing::warn!(path = %walked.path, error = %e, "skipping entry in bodyfile");
        }
    }

    out.flush()?;
    Ok(())
}
