//! The 4-byte record-kind tags that open every framed record.

/// One of the fixed 4-byte ASCII tags a record can open with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Magic {
    /// `FsA0` — volume header.
    VolumeHeader,
    /// `FsAE` — volume footer.
    VolumeFooter,
    /// `ArCh` — archive main header.
    MainHeader,
    /// `FsIn` — per-filesystem info header (filesystems archive).
    FsInfo,
    /// `FsYs` — filesystem contents begin.
    FsBegin,
    /// `DiRs` — directories-archive info header.
    DirsInfo,
    /// `ObJt` — object header.
    Object,
    /// `BlKh` — data-block header, immediately followed by block bytes.
    BlockHeader,
    /// `FiLf` — file footer (per-file global MD5).
    FileFooter,
    /// `DaEn` — end of contents.
    DataEnd,
}

impl Magic {
    pub const fn bytes(self) -> [u8; 4] {
        match self {
            Magic::VolumeHeader => *b"FsA0",
            Magic::VolumeFooter => *b"FsAE",
            Magic::MainHeader => *b"ArCh",
            Magic::FsInfo => *b"FsIn",
            Magic::FsBegin => *b"FsYs",
            Magic::DirsInfo => *b"DiRs",
            Magic::Object => *b"ObJt",
            Magic::BlockHeader => *b"BlKh",
            Magic::FileFooter => *b"FiLf",
            Magic::DataEnd => *b"DaEn",
        }
    }

    pub const fn from_bytes(b: [u8; 4]) -> Option<Self> {
        Some(match &b {
            b"FsA0" => Magic::VolumeHeader,
            b"FsAE" => Magic::VolumeFooter,
            b"ArCh" => Magic::MainHeader,
            b"FsIn" => Magic::FsInfo,
            b"FsYs" => Magic::FsBegin,
            b"DiRs" => Magic::DirsInfo,
            b"ObJt" => Magic::Object,
            b"BlKh" => Magic::BlockHeader,
            b"FiLf" => Magic::FileFooter,
            b"DaEn" => Magic::DataEnd,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Magic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = self.bytes();
        write!(f, "{}", String::from_utf8_lossy(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_magic_round_trips_through_its_bytes() {
        let all = [
            Magic::VolumeHeader,
            Magic::VolumeFooter,
            Magic::MainHeader,
            Magic::FsInfo,
            Magic::FsBegin,
            Magic::DirsInfo,
            Magic::Object,
            Magic::BlockHeader,
            Magic::FileFooter,
            Magic::DataEnd,
        ];
        for m in all {
            assert_eq!(Magic::from_bytes(m.bytes()), Some(m));
        }
    }

    #[test]
    fn unknown_bytes_are_not_a_magic() {
        assert_eq!(Magic::from_bytes(*b"xxxx"), None);
    }
}
