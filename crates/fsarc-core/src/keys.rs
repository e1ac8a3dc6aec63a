//! Dico key constants for the headers this crate builds and parses: the
//! main archive header (`ArCh`), one filesystem-info header (`FsIn`) per
//! filesystem, and the directories-info header (`DiRs`). A distinct
//! namespace from [`fsarc_dtyp::keys`], which covers the per-object (`ObJt`)
//! record.

/// `ArCh` main header keys.
pub mod main {
    /// Must stay equal to [`fsarc_wire::FORMAT_ID_KEY`]: that's the key
    /// `FramedReader::open` reads the format identifier string from to
    /// sniff v1 vs. v2 before a real [`AttributeRecord`](fsarc_attr::AttributeRecord)
    /// parse is even possible.
    pub const FILE_FORMAT_VER: u16 = fsarc_wire::FORMAT_ID_KEY;
    pub const PROG_VERSION_CREATED: u16 = 2;
    pub const ARCHIVE_ID: u16 = 3;
    pub const CREATION_TIME: u16 = 4;
    pub const ARCHIVE_LABEL: u16 = 5;
    pub const ARCHIVE_TYPE: u16 = 6;
    pub const FS_COUNT: u16 = 7;
    pub const COMPRESS_ALGO: u16 = 8;
    pub const COMPRESS_LEVEL: u16 = 9;
    pub const ENCRYPT_ALGO: u16 = 10;
    /// Cleartext MD5 of the random check buffer, present only when encrypted.
    pub const CHECK_PASS_CLEAR_MD5: u16 = 11;
    /// Blowfish-encrypted copy of the same buffer.
    pub const CHECK_PASS_CRYPT_BUF: u16 = 12;
}

/// `FsIn` per-filesystem header keys.
pub mod fsinfo {
    pub const FILESYSTEM: u16 = 1;
    pub const MOUNT_PATH: u16 = 2;
    pub const BYTES_TOTAL: u16 = 3;
    pub const BYTES_USED: u16 = 4;
    pub const FS_LABEL: u16 = 5;
    pub const FS_UUID: u16 = 6;
    pub const ORIG_DEVICE: u16 = 7;
    /// Sum of the per-object size estimates, published up front so a
    /// progress bar has a denominator before the first block is written.
    pub const TOTAL_COST: u16 = 8;
}

/// `DiRs` directories-archive header keys.
pub mod dirsinfo {
    pub const TOTAL_COST: u16 = 1;
}

/// `BlKh` data block header keys, carried alongside (never inside) the
/// block's payload bytes.
pub mod blockhead {
    pub const REAL_SIZE: u16 = 1;
    pub const BLOCK_OFFSET: u16 = 2;
    pub const COMPRESS_ALGO: u16 = 3;
    pub const ENCRYPT_ALGO: u16 = 4;
    pub const ARCHIVE_SIZE: u16 = 5;
    pub const ARCHIVE_CHECKSUM: u16 = 6;
}
