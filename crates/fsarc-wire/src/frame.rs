//! The fixed-width part of one record's framing: everything around the
//! variable-length attribute record.
//!
//! The magic itself is read separately (see [`crate::reader`]) since magic
//! recognition drives resync and doesn't fit a single eager parse.

use binrw::{BinRead, BinWrite};

/// `archive_id` + `fs_id` + length-prefixed attribute bytes + checksum, v2
/// layout (`u32` length). This is the only layout ever written.
#[derive(BinRead, BinWrite, Debug, Clone)]
#[brw(little)]
pub struct FrameHeaderV2 {
    pub archive_id: u32,
    pub fs_id: u16,
    #[bw(calc = attr_bytes.len() as u32)]
    #[br(temp)]
    attr_len: u32,
    #[br(count = attr_len)]
    pub attr_bytes: Vec<u8>,
    pub checksum: u32,
}

/// Same framing, legacy v1 layout (`u16` length). Read-only: this build
/// never writes v1 records.
#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct FrameHeaderV1 {
    pub archive_id: u32,
    pub fs_id: u16,
    #[br(temp)]
    attr_len: u16,
    #[br(count = attr_len)]
    pub attr_bytes: Vec<u8>,
    pub checksum: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    #[test]
    fn v2_round_trips_through_bytes() {
        let original = FrameHeaderV2 {
            archive_id: 0xdead_beef,
            fs_id: 3,
            attr_bytes: vec![1, 2, 3, 4, 5],
            checksum: 0x1234_5678,
        };
        let mut buf = Cursor::new(Vec::new());
        original.write(&mut buf).unwrap();
        let bytes = buf.into_inner();

        let mut cur = Cursor::new(&bytes);
        let parsed = FrameHeaderV2::read(&mut cur).unwrap();
        assert_eq!(parsed.archive_id, 0xdead_beef);
        assert_eq!(parsed.fs_id, 3);
        assert_eq!(parsed.attr_bytes, vec![1, 2, 3, 4, 5]);
        assert_eq!(parsed.checksum, 0x1234_5678);
    }

    #[test]
    fn v1_reads_u16_length_prefix() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&42u32.to_le_bytes()); // archive_id
        bytes.extend_from_slice(&7u16.to_le_bytes()); // fs_id
        bytes.extend_from_slice(&3u16.to_le_bytes()); // attr_len (u16!)
        bytes.extend_from_slice(&[9, 9, 9]); // attr_bytes
        bytes.extend_from_slice(&0xffu32.to_le_bytes()); // checksum

        let mut cur = Cursor::new(&bytes);
        let parsed = FrameHeaderV1::read(&mut cur).unwrap();
        assert_eq!(parsed.archive_id, 42);
        assert_eq!(parsed.fs_id, 7);
        assert_eq!(parsed.attr_bytes, vec![9, 9, 9]);
        assert_eq!(parsed.checksum, 0xff);
    }
}
