//! hfsplus-tool — inspect HFS / HFS+ / HFSX volumes.
//!
//! ```text
//! hfsplus-tool <source> [-o OFFSET] [-H] [-E CNID|all] [-F PATH] [-B PATH] [-d] [-v]
//! ```

mod bodyfile;
mod entry_info;
mod style;
mod tree;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hfsplus::{FileSource, HfsError, OffsetSource, Result, Volume};

use style::*;

#[derive(Parser, Debug)]
#[command(name = "hfsplus-tool", version, about = "Inspect HFS / HFS+ / HFSX volumes")]
struct Args {
    /// Path to an image file or device containing the volume.
    source: PathBuf,

    /// Byte offset at which the volume begins inside `source`.
    #[arg(short = 'o', long = "offset", default_value_t = 0, allow_negative_numbers = true)]
    offset: i64,

    /// Emit a Sleuthkit-3-compatible bodyfile to PATH.
    #[arg(short = 'B', long = "bodyfile")]
    bodyfile: Option<PathBuf>,

    /// Compute an MD5 hash per regular file when writing a bodyfile.
    #[arg(short = 'd', long = "hash")]
    hash: bool,

    /// Print info for one file entry by numeric CNID, or `all`.
    #[arg(short = 'E', long = "entry")]
    entry: Option<String>,

    /// Print info for one file entry by slash-separated path.
    #[arg(short = 'F', long = "file")]
    file: Option<String>,

    /// Print the full hierarchy as an indented tree.
    #[arg(short = 'H', long = "hierarchy")]
    hierarchy: bool,

    /// Verbose logging to stderr.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn open_volume(args: &Args) -> Result<Volume> {
    let source = FileSource::open(&args.source)?;
    if args.offset == 0 {
        return Volume::open(source);
    }
    if args.offset < 0 {
        return Err(HfsError::Argument(format!("offset {} must not be negative", args.offset)));
    }
    let offset_source = OffsetSource::new(source, args.offset as u64)?;
    Volume::open(offset_source)
}

fn print_volume_header(volume: &Volume) -> Result<()> {
    let name = volume.volume_name()?.unwrap_or_else(|| "(unnamed)".to_string());
    header(&name);

    let info = volume.header();
    let dialect_label = match volume.dialect() {
        hfsplus::Dialect::Hfs => "HFS".to_string(),
        hfsplus::Dialect::HfsPlus => "HFS+".to_string(),
        hfsplus::Dialect::HfsX => format!("HFSX {DIM}({}){RESET}", if volume.is_case_sensitive() { "case-sensitive" } else { "case-insensitive" }),
    };

    section("Volume Header");
    kv("Signature", &dialect_label);
    kv("Block size", &format!("{} bytes", info.geometry.block_size));
    kv("Total blocks", &format_commas(info.total_blocks as u64));
    kv("Free blocks", &format_commas(info.free_blocks as u64));
    kv_highlight("Files", &format_commas(info.file_count as u64));
    kv_highlight("Folders", &format_commas(info.folder_count as u64));
    println!();
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let volume = open_volume(&args)?;

    let mut did_something = false;

    if args.hierarchy {
        tree::print_hierarchy(&volume)?;
        did_something = true;
    }

    if let Some(ident) = &args.entry {
        if ident == "all" {
            for walked in hfsplus::walk(&volume)? {
                entry_info::print_entry(&walked.entry, Some(&walked.path))?;
            }
        } else {
            let cnid: u32 = ident
                .parse()
                .map_err(|_| HfsError::Argument(format!("'{ident}' is not a valid CNID or 'all'")))?;
            let entry = volume.open_identifier(cnid)?;
            entry_info::print_entry(&entry, None)?;
        }
        did_something = true;
    }

    if let Some(path) = &args.file {
        let entry = volume.open_path(path)?;
        entry_info::print_entry(&entry, Some(path))?;
        did_something = true;
    }

    if let Some(out_path) = &args.bodyfile {
        bodyfile::write_bodyfile(&volume, out_path, args.hash)?;
        eprintln!("{GREEN}wrote bodyfile to {}{RESET}", out_path.display());
        did_something = true;
    }

    if !did_something {
        print_volume_header(&volume)?;
    }

    volume.close();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{RED}error:{RESET} {e}");
            if let Some(source) = std::error::Error::source(&e) {
                eprintln!("{DIM}caused by: {source}{RESET}");
            }
            ExitCode::FAILURE
        }
    }
}
