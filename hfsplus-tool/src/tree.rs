//! `-H`: print the full catalog hierarchy as an indented tree.

use hfsplus::entry::FileEntry;
use hfsplus::{Result, Volume};

use crate::style::*;

pub(crate) fn print_hierarchy<'a>(volume: &'a Volume) -> Result<()> {
    let root = volume.root()?;
    println!("{BOLD}/{RESET}");
    print_children(volume, &root, "")
}

fn print_children<'a>(volume: &'a Volume, dir: &FileEntry<'a>, prefix: &str) -> Result<()> {
    let mut children: Vec<FileEntry<'a>> = Vec::new();
    for i in 0..dir.sub_entry_count()? {
        children.push(dir.sub_entry_by_index(i)?);
    }
    children.sort_by(|a, b| b.is_directory().cmp(&a.is_directory()).then_with(|| a.name_utf8().cmp(b.name_utf8())));

    for (i, child) in children.iter().enumerate() {
        let is_last = i + 1 == children.len();
        let connector = if is_last { ELBOW } else { TEE };
        let child_prefix = if is_last { format!("{prefix}    ") } else { format!("{prefix}{PIPE}   ") };

        let color = if child.is_directory() { BLUE } else { WHITE };
        let name = escape_control_chars(child.name_utf8());
        let size_suffix = if child.is_directory() {
            String::new()
        } else {
            format!("  {DIM}{}{RESET}", format_size(child.get_size()))
        };
        println!("{prefix}{DIM}{connector}{RESET} {color}{name}{RESET}{size_suffix}");

        if child.is_directory() {
            match print_children(volume, child, &child_prefix) {
                Ok(()) => {}
                Err(e) => {
                    tracing::warn!(name = %child.name_utf8(), error = %e, "failed to descend into directory, continuing");
                    println!("{child_prefix}{DIM}<error: {e}>{RESET}");
                }
            }
        }
    }
    Ok(())
}
