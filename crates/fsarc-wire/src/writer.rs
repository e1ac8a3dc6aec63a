//! The single I/O thread's view of an archive being produced: a sequence
//! of framed, checksummed records written to a rolling set of volume files.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use binrw::BinWrite;
use binrw::io::Cursor;
use fsarc_attr::AttributeRecord;
use fsarc_dtyp::{ArchiveId, Error, FsId, MIN_VOLUME_SIZE, fletcher32};

use crate::frame::FrameHeaderV2;
use crate::magic::Magic;
use crate::volume::{self, volume_path};

/// Appends records to an archive's volume set, splitting to a new volume
/// file whenever the next record would cross the configured split size.
pub struct FramedWriter {
    base_path: PathBuf,
    archive_id: ArchiveId,
    split_size: u64,
    file: File,
    vol_num: u32,
    position: u64,
    created_volumes: Vec<PathBuf>,
}

impl FramedWriter {
    /// Creates volume 0 and writes its volume-header record.
    ///
    /// `split_size` of `0` means "never split". Any nonzero value smaller
    /// than [`MIN_VOLUME_SIZE`] is rejected: it could not hold even one
    /// maximum-size data block plus framing overhead, which would force an
    /// unbounded chain of near-empty volumes.
    pub fn create(
        base_path: impl Into<PathBuf>,
        archive_id: ArchiveId,
        split_size: u64,
        overwrite: bool,
    ) -> Result<Self, Error> {
        if split_size != 0 && split_size < MIN_VOLUME_SIZE {
            return Err(Error::InvalidArg(format!(
                "split size {split_size} is smaller than the minimum of {MIN_VOLUME_SIZE} bytes"
            )));
        }
        let base_path = base_path.into();
        let path = volume_path(&base_path, 0);
        let file = open_new_volume(&path, overwrite)?;

        let mut writer = Self {
            base_path,
            archive_id,
            split_size,
            file,
            vol_num: 0,
            position: 0,
            created_volumes: vec![path],
        };
        writer.write_record_raw(Magic::VolumeHeader, FsId::NULL, &volume::header_attrs(), None)?;
        Ok(writer)
    }

    /// Current byte offset within the volume currently being written.
    pub fn current_position(&self) -> u64 {
        self.position
    }

    pub fn volume_number(&self) -> u32 {
        self.vol_num
    }

    /// Appends a header record (main header, per-filesystem header, object
    /// header, file footer, end marker, ...).
    pub fn append_header(
        &mut self,
        magic: Magic,
        fs_id: FsId,
        attrs: &AttributeRecord,
    ) -> Result<(), Error> {
        self.maybe_split(record_len(attrs, 0))?;
        self.write_record_raw(magic, fs_id, attrs, None)
    }

    /// Appends a `BlKh` data-block header immediately followed by its
    /// compressed/encrypted payload bytes.
    pub fn append_block(
        &mut self,
        fs_id: FsId,
        attrs: &AttributeRecord,
        payload: &[u8],
    ) -> Result<(), Error> {
        self.maybe_split(record_len(attrs, payload.len()))?;
        self.write_record_raw(Magic::BlockHeader, fs_id, attrs, Some(payload))
    }

    /// Rolls to a new volume if the next record would cross the split size.
    /// A record is never split across volumes: if it alone exceeds the
    /// split size it is still written whole, onto whichever volume it
    /// starts on.
    fn maybe_split(&mut self, next_record_len: u64) -> Result<(), Error> {
        if self.split_size == 0 || self.position == 0 {
            return Ok(());
        }
        if self.position + next_record_len > self.split_size {
            self.roll_volume()?;
        }
        Ok(())
    }

    fn roll_volume(&mut self) -> Result<(), Error> {
        self.write_record_raw(Magic::VolumeFooter, FsId::NULL, &volume::footer_attrs(false), None)?;
        self.file.sync_all().map_err(Error::Write)?;

        self.vol_num += 1;
        let path = volume_path(&self.base_path, self.vol_num);
        self.file = open_new_volume(&path, true)?;
        self.position = 0;
        self.created_volumes.push(path);

        self.write_record_raw(Magic::VolumeHeader, FsId::NULL, &volume::header_attrs(), None)
    }

    /// Called once the producer has signaled end-of-queue: writes the final
    /// volume footer with `last_vol = true`, fsyncs, and closes.
    pub fn finish(mut self) -> Result<(), Error> {
        self.write_record_raw(Magic::VolumeFooter, FsId::NULL, &volume::footer_attrs(true), None)?;
        self.file.sync_all().map_err(Error::Write)
    }

    /// Removes every volume file this writer has created. Called during
    /// error teardown so a failed run leaves no partial archive behind.
    pub fn delete_created_volumes(self) -> std::io::Result<()> {
        for path in &self.created_volumes {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn write_record_raw(
        &mut self,
        magic: Magic,
        fs_id: FsId,
        attrs: &AttributeRecord,
        payload: Option<&[u8]>,
    ) -> Result<(), Error> {
        let attr_bytes = attrs.serialize();
        let checksum = fletcher32(&attr_bytes);
        let frame = FrameHeaderV2 {
            archive_id: self.archive_id.into(),
            fs_id: fs_id.into(),
            attr_bytes,
            checksum,
        };

        let mut buf = Cursor::new(Vec::new());
        frame
            .write(&mut buf)
            .expect("writing into an in-memory buffer cannot fail");
        let mut bytes = magic.bytes().to_vec();
        bytes.extend_from_slice(&buf.into_inner());
        if let Some(payload) = payload {
            bytes.extend_from_slice(payload);
        }
        self.write_buffer(&bytes)
    }

    fn write_buffer(&mut self, bytes: &[u8]) -> Result<(), Error> {
        match self.file.write_all(bytes) {
            Ok(()) => {
                self.position += bytes.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::StorageFull => Err(Error::NoSpace {
                needed: bytes.len() as u64,
                free: 0,
            }),
            Err(e) => Err(Error::Write(e)),
        }
    }
}

fn record_len(attrs: &AttributeRecord, payload_len: usize) -> u64 {
    // magic + archive_id + fs_id + attr_len + attr_bytes + checksum + payload
    (4 + 4 + 2 + 4 + attrs.serialize().len() + 4 + payload_len) as u64
}

fn open_new_volume(path: &Path, overwrite: bool) -> Result<File, Error> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .create_new(!overwrite)
        .truncate(overwrite)
        .open(path)
        .map_err(Error::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magic::Magic;
    use crate::reader::FramedReader;
    use fsarc_attr::AttrValue;
    use fsarc_dtyp::Section;

    #[test]
    fn writes_a_header_and_closes_clean() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a.fsa");
        let id = ArchiveId::from(0x1122_3344);
        let mut w = FramedWriter::create(&base, id, 0, true).unwrap();

        let mut attrs = AttributeRecord::new();
        attrs.add(Section::StdAttr, 1, AttrValue::String("hi".into())).unwrap();
        w.append_header(Magic::MainHeader, FsId::NULL, &attrs).unwrap();
        w.finish().unwrap();

        let mut r = FramedReader::open(&base).unwrap();
        let (magic, _fs_id, _attrs) = r.next_header(false).unwrap(); // volume header
        assert_eq!(magic, Magic::VolumeHeader);
        let (magic, _fs_id, attrs) = r.next_header(false).unwrap();
        assert_eq!(magic, Magic::MainHeader);
        assert_eq!(attrs.get_string(Section::StdAttr, 1).unwrap(), "hi");
    }

    #[test]
    fn rejects_a_split_size_below_the_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a.fsa");
        let err = FramedWriter::create(&base, ArchiveId::from(1), 4096, true).unwrap_err();
        assert!(matches!(err, Error::InvalidArg(_)));
    }

    #[test]
    fn splitting_rolls_to_a_second_volume_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a.fsa");
        let mut w = FramedWriter::create(&base, ArchiveId::from(7), MIN_VOLUME_SIZE, true).unwrap();

        let mut attrs = AttributeRecord::new();
        attrs
            .add(Section::StdAttr, 1, AttrValue::Bytes(vec![0u8; 700_000]))
            .unwrap();
        // The first record fits on volume 0; the second alone would cross
        // the split boundary and must roll onto volume 1.
        w.append_header(Magic::Object, FsId::from(0), &attrs).unwrap();
        w.append_header(Magic::Object, FsId::from(0), &attrs).unwrap();
        w.finish().unwrap();

        assert!(dir.path().join("a.fsa.01").exists());
    }
}
