//! Algorithm identifiers, stored verbatim in the main header and mirrored
//! into every block header so a decoder can dispatch per block.

/// Compression algorithm tag, as stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressAlgo {
    None = 0,
    Lzo = 1,
    Gzip = 2,
    Bzip2 = 3,
    Lzma = 4,
    Zstd = 5,
    Lz4 = 6,
}

impl CompressAlgo {
    pub const fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => CompressAlgo::None,
            1 => CompressAlgo::Lzo,
            2 => CompressAlgo::Gzip,
            3 => CompressAlgo::Bzip2,
            4 => CompressAlgo::Lzma,
            5 => CompressAlgo::Zstd,
            6 => CompressAlgo::Lz4,
            _ => return None,
        })
    }
}

/// Encryption algorithm tag, as stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncryptAlgo {
    None = 0,
    Blowfish = 1,
}

impl EncryptAlgo {
    pub const fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => EncryptAlgo::None,
            1 => EncryptAlgo::Blowfish,
            _ => return None,
        })
    }
}
