//! Archive and filesystem identifiers.

use rand::RngCore;
use rand::rngs::OsRng;

/// Random identity of one archive, generated once at creation time.
///
/// Every record on disk carries this id; a reader rejects any record whose
/// id doesn't match the main header's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveId(pub u32);

impl ArchiveId {
    /// Generates a fresh, random archive id.
    pub fn generate() -> Self {
        ArchiveId(OsRng.next_u32())
    }
}

impl From<u32> for ArchiveId {
    fn from(v: u32) -> Self {
        ArchiveId(v)
    }
}

impl From<ArchiveId> for u32 {
    fn from(v: ArchiveId) -> Self {
        v.0
    }
}

impl std::fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Small index naming one filesystem within a filesystems archive.
///
/// [`fsarc_dtyp::NULL_FSID`][crate::NULL_FSID] marks a global (non
/// filesystem-specific) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FsId(pub u16);

impl FsId {
    pub const NULL: FsId = FsId(crate::NULL_FSID);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl From<u16> for FsId {
    fn from(v: u16) -> Self {
        FsId(v)
    }
}

impl From<FsId> for u16 {
    fn from(v: FsId) -> Self {
        v.0
    }
}
