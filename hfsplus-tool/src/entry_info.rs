//! `-E`/`-F`: print one catalog entry's metadata, or every entry for `-E all`.

use hfsplus::entry::FileEntry;
use hfsplus::mode::mode_string;
use hfsplus::Result;

use crate::style::*;

pub(crate) fn print_entry(entry: &FileEntry<'_>, path_hint: Option<&str>) -> Result<()> {
    let name = escape_control_chars(entry.name_utf8());
    let title_name = path_hint.unwrap_or(&name);
    header(&format!("{title_name} ({})", entry.get_identifier()));

    let type_label = if entry.is_directory() {
        "directory".to_string()
    } else {
        format!("{:?}", entry.file_type())
    };

    section("Identity");
    kv("CNID", &entry.get_identifier().to_string());
    kv("Parent CNID", &entry.get_parent_identifier().to_string());
    kv("Name", &name);
    kv("Type", &type_label);
    kv("Mode", &mode_string(entry.get_file_mode()));
    kv("UID/GID", &format!("{}/{}", entry.get_owner_id(), entry.get_group_id()));
    if let Some(link) = entry.get_link_identifier() {
        kv_highlight("Hard link -> CNID", &link.to_string());
    }

    section("Dates (POSIX seconds)");
    kv("Created", &entry.get_creation_time().to_string());
    kv("Content modified", &entry.get_content_modification_time().to_string());
    if let Some(t) = entry.get_attribute_modification_time() {
        kv("Attributes modified", &t.to_string());
    }
    if let Some(t) = entry.get_access_time() {
        kv("Accessed", &t.to_string());
    }
    if let Some(t) = entry.get_backup_time() {
        kv("Backed up", &t.to_string());
    }

    if !entry.is_directory() {
        section("Forks");
        kv("Data fork size", &format_size(entry.get_size()));
        kv("Has resource fork", &entry.has_resource_fork().to_string());
    }

    let xattr_count = entry.xattr_count()?;
    if xattr_count > 0 {
        section("Extended attributes");
        for i in 0..xattr_count {
            let attr = entry.xattr_by_index(i)?;
            kv(&attr.name, &format!("{:?}", attr.data));
        }
    }

    println!();
    Ok(())
}
