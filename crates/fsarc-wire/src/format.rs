//! Wire format version detection.

use fsarc_dtyp::{FILE_FORMAT_V1A, FILE_FORMAT_V1B, FILE_FORMAT_V2};

/// Width of the on-disk `attr_len` field, which differs between format
/// generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Legacy: `attr_len` is a u16. Read-only; never produced by this build.
    V1,
    /// Current: `attr_len` is a u32. The only format ever written.
    V2,
}

impl WireFormat {
    /// Identifies the format from the 10-byte identifier string stored in
    /// the main header's attribute record. [`crate::reader::FramedReader::open`]
    /// discovers this by trial parse (v2's wider `attr_len` first, falling
    /// back to v1) rather than a fixed byte offset, since the offset shifts
    /// with the attribute record's own encoding.
    pub fn from_identifier(id: &str) -> Option<Self> {
        match id {
            FILE_FORMAT_V2 => Some(WireFormat::V2),
            FILE_FORMAT_V1A | FILE_FORMAT_V1B => Some(WireFormat::V1),
            _ => None,
        }
    }

    pub const fn identifier(self) -> &'static str {
        match self {
            WireFormat::V1 => FILE_FORMAT_V1A,
            WireFormat::V2 => FILE_FORMAT_V2,
        }
    }
}
