//! Argument parsing for the `fsarc` binary: one [`clap::Parser`] root plus
//! one subcommand struct per operation the CLI exposes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::destspec::DestSpec;

#[derive(Parser)]
#[command(name = "fsarc", version, about = "Filesystem archiver", long_about = None)]
pub struct Cli {
    /// Increase verbosity (repeatable).
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Increase debug output (repeatable).
    #[arg(short = 'd', action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Archives one or more mounted block-device filesystems.
    Savefs(SavefsArgs),
    /// Restores one or more filesystems from an archive onto fresh devices.
    Restfs(RestfsArgs),
    /// Archives one or more directory trees.
    Savedir(SavedirArgs),
    /// Restores a directories archive into a destination directory.
    Restdir(RestdirArgs),
    /// Prints the contents of an archive's headers.
    Archinfo(ArchinfoArgs),
    /// Lists filesystems this build knows how to handle, or probes devices.
    Probe(ProbeArgs),
}

#[derive(Parser)]
pub struct SaveCommon {
    /// Overwrite the archive if it already exists.
    #[arg(short = 'o')]
    pub overwrite: bool,
    /// Permit archiving a source already mounted read-write.
    #[arg(short = 'A')]
    pub allow_mounted_rw: bool,
    /// Relax xattr/acl mount-option checks.
    #[arg(short = 'a')]
    pub relax_mount_opt_checks: bool,
    /// Allow selecting an experimental filesystem adapter.
    #[arg(short = 'x')]
    pub experimental_fs: bool,
    /// Exclude files/dirs matching this basename or full path (repeatable).
    #[arg(short = 'e', value_name = "pattern")]
    pub exclude: Vec<String>,
    /// Archive label (max 512 bytes).
    #[arg(short = 'L', default_value = "")]
    pub label: String,
    /// Compression preset, 1 (fast) to 9 (best).
    #[arg(short = 'z', default_value_t = 3)]
    pub level: u8,
    /// Split the archive into volumes of this many MiB (0 = never split).
    #[arg(short = 's', default_value_t = 0)]
    pub split_mib: u64,
    /// Number of compression worker threads, 1..32.
    #[arg(short = 'j', default_value_t = 1)]
    pub jobs: usize,
    /// Encrypt with a password; pass `-` to be prompted (twice).
    #[arg(short = 'c')]
    pub password: Option<String>,
}

#[derive(Parser)]
pub struct SavefsArgs {
    #[command(flatten)]
    pub common: SaveCommon,
    /// Path to the archive to create.
    pub archive: PathBuf,
    /// One or more mounted block devices to archive.
    #[arg(required = true)]
    pub devices: Vec<PathBuf>,
}

#[derive(Parser)]
pub struct SavedirArgs {
    #[command(flatten)]
    pub common: SaveCommon,
    /// Path to the archive to create.
    pub archive: PathBuf,
    /// One or more directory trees to archive.
    #[arg(required = true)]
    pub dirs: Vec<PathBuf>,
}

#[derive(Parser)]
pub struct RestoreCommon {
    /// Permit mounting a destination already mounted read-write elsewhere.
    #[arg(short = 'A')]
    pub allow_mounted_rw: bool,
    /// Relax xattr/acl mount-option checks.
    #[arg(short = 'a')]
    pub relax_mount_opt_checks: bool,
    /// Allow selecting an experimental filesystem adapter.
    #[arg(short = 'x')]
    pub experimental_fs: bool,
    /// Number of decompression worker threads, 1..32.
    #[arg(short = 'j', default_value_t = 1)]
    pub jobs: usize,
    /// Decrypt with a password; pass `-` to be prompted once.
    #[arg(short = 'c')]
    pub password: Option<String>,
}

#[derive(Parser)]
pub struct RestfsArgs {
    #[command(flatten)]
    pub common: RestoreCommon,
    /// Path to the archive to restore from.
    pub archive: PathBuf,
    /// `id=<n>,dest=<dev>[,mkfs=<fs>][,mkfsopt=<str>][,label=<s>][,uuid=<s>]`,
    /// one per filesystem to restore.
    #[arg(required = true, value_parser = DestSpec::parse)]
    pub destinations: Vec<DestSpec>,
}

#[derive(Parser)]
pub struct RestdirArgs {
    #[command(flatten)]
    pub common: RestoreCommon,
    /// Path to the archive to restore from.
    pub archive: PathBuf,
    /// Destination directory to restore into.
    pub dest: PathBuf,
}

#[derive(Parser)]
pub struct ArchinfoArgs {
    /// Path to the archive to inspect.
    pub archive: PathBuf,
    /// Also tally every archived object by kind (requires a full scan).
    #[arg(long)]
    pub detailed: bool,
}

#[derive(Parser)]
pub struct ProbeArgs {
    /// Devices to probe. With none given, lists the registered adapters.
    pub devices: Vec<PathBuf>,
    /// Print each adapter's capabilities alongside its probe result.
    #[arg(long)]
    pub detailed: bool,
}
