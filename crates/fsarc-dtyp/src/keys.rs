//! Dico key numbers for the `STDATTR` section of an `ObJt` object header.
//!
//! Centralized here (rather than in `fsarc-core`, which builds and
//! consumes the headers) because [`crate::Section::StdAttr`] and the small
//! file coalescer (`fsarc-queue`) both need to agree on the same numbering
//! without depending on the higher-level crate.

/// Monotonic id assigned to this object in tree-walk order.
pub const OBJECT_ID: u16 = 1;
/// Path relative to the archive root.
pub const PATH: u16 = 2;
/// `u32` [`crate::ObjectType`] discriminant.
pub const OBJECT_TYPE: u16 = 3;
pub const SIZE: u16 = 4;
pub const MODE: u16 = 5;
pub const UID: u16 = 6;
pub const GID: u16 = 7;
pub const ATIME: u16 = 8;
pub const MTIME: u16 = 9;
/// Device node major/minor, packed as `u64`.
pub const RDEV: u16 = 10;
/// Symlink target path.
pub const SYMLINK_TARGET: u16 = 11;
/// Set only when saved from an NTFS source: `1` if the symlink target is a
/// directory, `0` if a file.
pub const LINK_TARGET_TYPE: u16 = 12;
/// Path of the first occurrence of this inode, for `HARDLINK` records.
pub const HARDLINK_TARGET: u16 = 13;
/// Object flags bitset (see [`crate::FILEFLAGS_SPARSE`]).
pub const FLAGS: u16 = 14;
/// Number of small files coalesced into the shared block this header
/// belongs to; only present on coalesced headers.
pub const MULTI_COUNT: u16 = 15;
/// This header's byte offset within the shared coalesced block.
pub const MULTI_OFFSET: u16 = 16;
/// MD5 of a coalesced small file's full contents, stored directly in its
/// `ObJt` header (there's no per-file footer for small files). Also reused,
/// in its own record, for the whole-file MD5 in a regular file's `FiLf`
/// footer.
pub const MD5SUM: u16 = 17;
