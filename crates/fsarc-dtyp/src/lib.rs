//! Common constants, identifiers and checksum/error types shared by every
//! `fsarc-*` crate.

pub mod checksum;
pub mod error;
pub mod ids;
pub mod keys;

pub use checksum::fletcher32;
pub use error::Error;
pub use ids::{ArchiveId, FsId};

/// Upper bound on the size of a single data block, compressed or not.
pub const MAX_BLOCK_SIZE: usize = 921_600;

/// Default (uncompressed) block size used when walking a filesystem.
pub const DEFAULT_BLOCK_SIZE: usize = 262_144;

/// Maximum number of small files coalesced into a single shared data block.
pub const MAX_SMALL_COUNT: usize = 512;

/// Files smaller than this (and with a single hardlink) are coalesced.
pub const SMALL_FILE_THRESHOLD: u64 = 131_072;

/// Fixed per-object cost used to estimate progress-bar totals.
pub const PER_FILE_FIXED_COST: u64 = 16_384;

/// Maximum length, in bytes, of an archive label.
pub const MAX_LABEL_LEN: usize = 512;

/// Password length bounds enforced by `-c`.
pub const MIN_PASS_LEN: usize = 6;
pub const MAX_PASS_LEN: usize = 64;

/// Size of the random buffer used for the encrypted password check.
pub const CHECK_BUF_SIZE: usize = 4096;

/// Sentinel `fs_id` meaning "this record is global, not filesystem-specific".
pub const NULL_FSID: u16 = 0xFFFF;

/// Hard cap on the number of compression/decompression worker threads.
pub const MAX_COMP_JOBS: usize = 32;

/// Default bounded-queue capacity, expressed in data blocks.
pub const DEFAULT_QUEUE_BLOCKS: usize = 32;

/// Smallest split size that can hold one block plus framing overhead; a
/// `-s` smaller than this is rejected at config time rather than producing
/// an unbounded chain of near-empty volumes.
pub const MIN_VOLUME_SIZE: u64 = (MAX_BLOCK_SIZE as u64) + 4096;

/// Bit 0 of the object flags bitset: the regular file is sparse.
pub const FILEFLAGS_SPARSE: u32 = 1 << 0;

/// The 10-byte file-format identifier written into every main header.
///
/// Only format version 2 (`u32` attribute length) is ever produced; version
/// 1 (`u16` length) is accepted for reading only.
pub const FILE_FORMAT_V2: &str = "FsArCh_002";
pub const FILE_FORMAT_V1A: &str = "FsArCh_001";
pub const FILE_FORMAT_V1B: &str = "FsArCh_00Y";

/// Dico ("attribute record") section namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Section {
    /// Standard POSIX attributes (path, mode, uid, gid, size, times, ...).
    StdAttr = 0,
    /// User extended attributes (`user.*`).
    XAttr = 1,
    /// NTFS-origin attributes (`system.ntfs_*`).
    WinAttr = 2,
}

impl Section {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Section::StdAttr),
            1 => Some(Section::XAttr),
            2 => Some(Section::WinAttr),
            _ => None,
        }
    }
}

/// The kind of archive being produced: a set of whole filesystems, or a
/// flat set of directory trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ArchiveType {
    Filesystems = 1,
    Directories = 2,
}

impl ArchiveType {
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(ArchiveType::Filesystems),
            2 => Some(ArchiveType::Directories),
            _ => None,
        }
    }
}

/// Kind of filesystem object emitted once per inode in tree-walk order.
/// 0 is reserved so a zeroed-out record is detectably invalid rather than
/// silently parsing as `Dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ObjectType {
    Dir = 1,
    Symlink = 2,
    Hardlink = 3,
    CharDev = 4,
    BlockDev = 5,
    Fifo = 6,
    Socket = 7,
    RegFileUnique = 8,
    RegFileMulti = 9,
}

impl ObjectType {
    pub const fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => ObjectType::Dir,
            2 => ObjectType::Symlink,
            3 => ObjectType::Hardlink,
            4 => ObjectType::CharDev,
            5 => ObjectType::BlockDev,
            6 => ObjectType::Fifo,
            7 => ObjectType::Socket,
            8 => ObjectType::RegFileUnique,
            9 => ObjectType::RegFileMulti,
            _ => return None,
        })
    }
}
