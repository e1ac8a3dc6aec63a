//! `archinfo`: pretty-prints the summary [`fsarc_core::archinfo::inspect`]
//! reads off an archive without touching any destination.

use std::process::ExitCode;

use fsarc_codec::{CompressAlgo, EncryptAlgo};
use fsarc_core::ObjectClass;
use fsarc_dtyp::ArchiveType;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::cli::ArchinfoArgs;
use crate::runctx::fatal;

/// Renders a Unix timestamp as a UTC date; falls back to the raw number for
/// the handful of pre-epoch or out-of-range values `time` won't accept.
fn human_time(secs: u64) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    match OffsetDateTime::from_unix_timestamp(secs as i64) {
        Ok(dt) => dt.format(&format).unwrap_or_else(|_| secs.to_string()),
        Err(_) => secs.to_string(),
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

fn compress_name(algo: CompressAlgo) -> &'static str {
    match algo {
        CompressAlgo::None => "none",
        CompressAlgo::Lzo => "lzo",
        CompressAlgo::Gzip => "gzip",
        CompressAlgo::Bzip2 => "bzip2",
        CompressAlgo::Lzma => "lzma",
        CompressAlgo::Zstd => "zstd",
        CompressAlgo::Lz4 => "lz4",
    }
}

fn encrypt_name(algo: EncryptAlgo) -> &'static str {
    match algo {
        EncryptAlgo::None => "none",
        EncryptAlgo::Blowfish => "blowfish",
    }
}

fn print_object_counts(counts: &std::collections::BTreeMap<ObjectClass, u64>) {
    for (class, count) in counts {
        println!("    {class:?}: {count}");
    }
}

pub fn run(args: ArchinfoArgs) -> ExitCode {
    let summary = match fsarc_core::archinfo::inspect(&args.archive, args.detailed) {
        Ok(s) => s,
        Err(e) => return fatal("archinfo", e),
    };

    println!("Archive id:       {:08x}", summary.archive_id);
    println!("Label:            {}", summary.label);
    println!("Created:          {}", human_time(summary.creation_time));
    println!(
        "Type:             {}",
        match summary.archive_type {
            ArchiveType::Filesystems => "filesystems",
            ArchiveType::Directories => "directories",
        }
    );
    println!("Compression:      {} (level {})", compress_name(summary.compress_algo), summary.compress_level);
    println!("Encryption:       {}{}", encrypt_name(summary.encrypt_algo), if summary.encrypted { " (password-protected)" } else { "" });

    if let Some(total_cost) = summary.dirs_total_cost {
        println!("Directories tree, estimated cost: {total_cost}");
        if let Some(counts) = &summary.dirs_object_counts {
            print_object_counts(counts);
        }
    }

    for fs in &summary.filesystems {
        println!("--- filesystem {} ---", fs.fs_id);
        println!("  type:        {}", fs.filesystem);
        println!("  mount path:  {}", fs.mount_path);
        println!("  orig device: {}", fs.orig_device);
        println!("  size:        {} used of {}", human_size(fs.bytes_used), human_size(fs.bytes_total));
        println!("  label/uuid:  {} / {}", fs.fs_label, fs.fs_uuid);
        println!("  total cost:  {}", fs.total_cost);
        if let Some(counts) = &fs.object_counts {
            print_object_counts(counts);
        }
    }

    if summary.corrupt_records > 0 {
        eprintln!("{} corrupt record(s) skipped during read", summary.corrupt_records);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
