//! The archive/restore side's view of an archive: pulls framed records off
//! a rolling set of volume files, resyncing forward past corruption.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use binrw::BinRead;
use fsarc_attr::AttributeRecord;
use fsarc_dtyp::{Error, FsId, Section, fletcher32};

use crate::format::WireFormat;
use crate::frame::{FrameHeaderV1, FrameHeaderV2};
use crate::magic::Magic;
use crate::volume::{self, volume_path};

/// Reserved key (section [`Section::StdAttr`]) of the first item in every
/// main header's attribute record: the 10-byte format identifier string.
/// Used to confirm the wire format guessed during [`FramedReader::open`].
pub const FORMAT_ID_KEY: u16 = 0;

type MissingVolumeHandler = Box<dyn FnMut(&Path) -> Option<PathBuf>>;

/// Reads framed records back off an archive's volume set.
pub struct FramedReader {
    base_path: PathBuf,
    archive_id: Option<u32>,
    format: WireFormat,
    file: File,
    vol_num: u32,
    missing_volume: Option<MissingVolumeHandler>,
    corrupt_count: u64,
}

impl FramedReader {
    /// Opens volume 0 and determines the wire format by trial parse: tries
    /// v2's wider `attr_len` first and confirms it against the main
    /// header's format identifier, falling back to v1 otherwise.
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, Error> {
        let base_path = base_path.into();
        let path = volume_path(&base_path, 0);
        let mut file = File::open(&path).map_err(Error::Io)?;

        let format = sniff_format(&mut file)?;
        file.rewind().map_err(Error::Seek)?;

        Ok(Self {
            base_path,
            archive_id: None,
            format,
            file,
            vol_num: 0,
            missing_volume: None,
            corrupt_count: 0,
        })
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// The archive id pinned by the first record successfully read, if
    /// any record has been read yet.
    pub fn archive_id(&self) -> Option<u32> {
        self.archive_id
    }

    /// How many records have been silently skipped so far because their
    /// attribute checksum, archive id, or attribute body failed to
    /// validate (spec's `CORRUPT`/`MINOR` case). Each such record is
    /// reported once via `log::warn!` as it is skipped.
    pub fn corrupt_count(&self) -> u64 {
        self.corrupt_count
    }

    /// Installs a callback invoked when the volume expected after a
    /// non-final volume footer can't be opened at its canonical path. The
    /// callback receives the expected path and may return an alternate one
    /// to retry, or `None` to give up.
    pub fn set_missing_volume_handler(
        &mut self,
        handler: impl FnMut(&Path) -> Option<PathBuf> + 'static,
    ) {
        self.missing_volume = Some(Box::new(handler));
    }

    /// Reads the next record.
    ///
    /// If `allow_resync` is set and the next 4 bytes are not a recognized
    /// magic, seeks forward one byte at a time (never backward) until one
    /// is found.
    ///
    /// A checksum mismatch, an archive-id mismatch against the id pinned
    /// by the first record, or a structurally corrupt attribute body is
    /// spec's `MINOR` case: with `allow_resync` set, the bad record is
    /// logged and counted (see [`Self::corrupt_count`]) and the reader
    /// tries again from its current position — which, for a non-block
    /// record, is already the start of the next one, and otherwise is
    /// recovered by the same forward magic scan used for an unrecognized
    /// magic. With `allow_resync` unset (used only for the fixed volume
    /// header / main header at the very start of a read), the mismatch is
    /// fatal.
    ///
    /// When the record read is a non-final volume footer, the reader
    /// transparently closes the current volume and opens the next one
    /// before returning, so the following call resumes on the new volume.
    pub fn next_header(&mut self, allow_resync: bool) -> Result<(Magic, FsId, AttributeRecord), Error> {
        loop {
            let magic = self.find_magic(allow_resync)?;
            let (archive_id, fs_id, attr_bytes, checksum) = self.read_frame()?;

            if fletcher32(&attr_bytes) != checksum {
                if !allow_resync {
                    return Err(Error::Corrupt(format!("{magic} record fails its attribute checksum")));
                }
                self.corrupt_count += 1;
                log::warn!("{magic} record fails its attribute checksum, skipping");
                continue;
            }
            match self.archive_id {
                Some(expected) if expected != archive_id => {
                    if !allow_resync {
                        return Err(Error::Corrupt(format!(
                            "{magic} record has archive id {archive_id:08x}, expected {expected:08x}"
                        )));
                    }
                    self.corrupt_count += 1;
                    log::warn!("{magic} record has archive id {archive_id:08x}, expected {expected:08x}, skipping");
                    continue;
                }
                Some(_) => {}
                None => self.archive_id = Some(archive_id),
            }

            let attrs = match AttributeRecord::parse(&attr_bytes) {
                Ok(attrs) => attrs,
                Err(e) => {
                    if !allow_resync {
                        return Err(e);
                    }
                    self.corrupt_count += 1;
                    log::warn!("{magic} record has a corrupt attribute body: {e}, skipping");
                    continue;
                }
            };

            if magic == Magic::VolumeFooter && !volume::footer_is_last(&attrs)? {
                self.advance_volume()?;
            }

            return Ok((magic, FsId::from(fs_id), attrs));
        }
    }

    /// Reads `len` raw payload bytes immediately following a `BlKh` header.
    pub fn read_payload(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf).map_err(map_eof)?;
        Ok(buf)
    }

    fn find_magic(&mut self, allow_resync: bool) -> Result<Magic, Error> {
        let mut window = [0u8; 4];
        self.file.read_exact(&mut window).map_err(map_eof)?;
        if let Some(magic) = Magic::from_bytes(window) {
            return Ok(magic);
        }
        if !allow_resync {
            return Err(Error::Corrupt("unrecognized record magic".into()));
        }

        log::warn!("resyncing forward after an unrecognized record magic");
        let mut ring: VecDeque<u8> = window.into_iter().collect();
        loop {
            let mut next = [0u8; 1];
            self.file.read_exact(&mut next).map_err(map_eof)?;
            ring.pop_front();
            ring.push_back(next[0]);
            let candidate: [u8; 4] = ring.iter().copied().collect::<Vec<_>>().try_into().unwrap();
            if let Some(magic) = Magic::from_bytes(candidate) {
                return Ok(magic);
            }
        }
    }

    fn read_frame(&mut self) -> Result<(u32, u16, Vec<u8>, u32), Error> {
        match self.format {
            WireFormat::V2 => {
                let f = FrameHeaderV2::read(&mut self.file).map_err(map_binrw)?;
                Ok((f.archive_id, f.fs_id, f.attr_bytes, f.checksum))
            }
            WireFormat::V1 => {
                let f = FrameHeaderV1::read(&mut self.file).map_err(map_binrw)?;
                Ok((f.archive_id, f.fs_id, f.attr_bytes, f.checksum))
            }
        }
    }

    fn advance_volume(&mut self) -> Result<(), Error> {
        self.vol_num += 1;
        let path = volume_path(&self.base_path, self.vol_num);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let alt = self
                    .missing_volume
                    .as_mut()
                    .and_then(|handler| handler(&path));
                match alt {
                    Some(alt_path) => File::open(&alt_path).map_err(Error::Io)?,
                    None => {
                        return Err(Error::Corrupt(format!(
                            "volume {} not found at {}",
                            self.vol_num,
                            path.display()
                        )));
                    }
                }
            }
            Err(e) => return Err(Error::Io(e)),
        };
        self.file = file;
        Ok(())
    }
}

fn map_eof(e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof {
        Error::Corrupt("record truncated before end of file".into())
    } else {
        Error::Read(e)
    }
}

fn map_binrw(e: binrw::Error) -> Error {
    match e {
        binrw::Error::Io(e) => map_eof(e),
        other => Error::Corrupt(other.to_string()),
    }
}

/// Tries v2 first (confirming against the main header's format identifier
/// when present), then falls back to v1.
fn sniff_format(file: &mut File) -> Result<WireFormat, Error> {
    if let Some(id) = try_read_format_identifier(file, WireFormat::V2)? {
        if WireFormat::from_identifier(&id) == Some(WireFormat::V1) {
            return Ok(WireFormat::V1);
        }
        return Ok(WireFormat::V2);
    }
    if try_read_format_identifier(file, WireFormat::V1)?.is_some() {
        return Ok(WireFormat::V1);
    }
    Err(Error::Corrupt(
        "could not determine archive wire format from volume 0".into(),
    ))
}

/// Reads the volume-header record (discarded) followed by the main header
/// record under the given format assumption, returning the format
/// identifier string if that parse succeeds structurally.
fn try_read_format_identifier(file: &mut File, format: WireFormat) -> Result<Option<String>, Error> {
    file.seek(SeekFrom::Start(0)).map_err(Error::Seek)?;

    let Ok(mut window) = read_magic(file) else {
        return Ok(None);
    };
    if Magic::from_bytes(window) != Some(Magic::VolumeHeader) {
        return Ok(None);
    }
    if read_frame_as(file, format).is_err() {
        return Ok(None);
    }

    let Ok(w2) = read_magic(file) else {
        return Ok(None);
    };
    window = w2;
    if Magic::from_bytes(window) != Some(Magic::MainHeader) {
        return Ok(None);
    }
    let Ok((_, _, attr_bytes, checksum)) = read_frame_as(file, format) else {
        return Ok(None);
    };
    if fletcher32(&attr_bytes) != checksum {
        return Ok(None);
    }
    let Ok(attrs) = AttributeRecord::parse(&attr_bytes) else {
        return Ok(None);
    };
    Ok(attrs.get_string(Section::StdAttr, FORMAT_ID_KEY).ok().map(str::to_owned))
}

fn read_magic(file: &mut File) -> std::io::Result<[u8; 4]> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_frame_as(file: &mut File, format: WireFormat) -> Result<(u32, u16, Vec<u8>, u32), Error> {
    match format {
        WireFormat::V2 => {
            let f = FrameHeaderV2::read(file).map_err(map_binrw)?;
            Ok((f.archive_id, f.fs_id, f.attr_bytes, f.checksum))
        }
        WireFormat::V1 => {
            let f = FrameHeaderV1::read(file).map_err(map_binrw)?;
            Ok((f.archive_id, f.fs_id, f.attr_bytes, f.checksum))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::FramedWriter;
    use fsarc_attr::AttrValue;
    use fsarc_dtyp::ArchiveId;

    fn main_header_attrs() -> AttributeRecord {
        let mut attrs = AttributeRecord::new();
        attrs
            .add(Section::StdAttr, FORMAT_ID_KEY, AttrValue::String(fsarc_dtyp::FILE_FORMAT_V2.into()))
            .unwrap();
        attrs
    }

    #[test]
    fn open_detects_v2_from_the_format_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a.fsa");
        let mut w = FramedWriter::create(&base, ArchiveId::from(9), 0, true).unwrap();
        w.append_header(Magic::MainHeader, FsId::NULL, &main_header_attrs())
            .unwrap();
        w.finish().unwrap();

        let r = FramedReader::open(&base).unwrap();
        assert_eq!(r.format(), WireFormat::V2);
    }

    #[test]
    fn resync_skips_garbage_and_finds_the_next_record() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a.fsa");
        let mut w = FramedWriter::create(&base, ArchiveId::from(9), 0, true).unwrap();
        w.append_header(Magic::MainHeader, FsId::NULL, &main_header_attrs())
            .unwrap();
        w.finish().unwrap();

        // Corrupt the volume-footer's magic so the reader must resync past it.
        let mut bytes = std::fs::read(&base).unwrap();
        let footer_pos = bytes.len() - 4 - 4 - 2 - 4 - 1 - 4; // approx: right before the trailing footer record
        let search_start = footer_pos.saturating_sub(32);
        let idx = bytes[search_start..]
            .windows(4)
            .position(|w| w == Magic::VolumeFooter.bytes())
            .map(|p| p + search_start)
            .expect("volume footer magic must be present");
        bytes[idx] = b'X';
        std::fs::write(&base, &bytes).unwrap();

        let mut r = FramedReader::open(&base).unwrap();
        let (magic, ..) = r.next_header(false).unwrap();
        assert_eq!(magic, Magic::VolumeHeader);
        let (magic, ..) = r.next_header(false).unwrap();
        assert_eq!(magic, Magic::MainHeader);
        // The footer's magic is corrupted; recovering it requires resync.
        let (magic, ..) = r.next_header(true).unwrap();
        assert_eq!(magic, Magic::VolumeFooter);
    }

    #[test]
    fn checksum_mismatch_is_skipped_without_losing_later_records() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a.fsa");
        let mut w = FramedWriter::create(&base, ArchiveId::from(9), 0, true).unwrap();
        w.append_header(Magic::MainHeader, FsId::NULL, &main_header_attrs())
            .unwrap();
        let mut doomed = AttributeRecord::new();
        doomed.add(Section::StdAttr, 2, AttrValue::String("will be corrupted".into())).unwrap();
        w.append_header(Magic::Object, FsId::from(0), &doomed).unwrap();
        let mut trailer = AttributeRecord::new();
        trailer.add(Section::StdAttr, 1, AttrValue::String("end".into())).unwrap();
        w.append_header(Magic::DataEnd, FsId::NULL, &trailer).unwrap();
        w.finish().unwrap();

        // Flip a byte inside the `ObJt` record's serialized attribute bytes
        // (not the main header, which `FramedReader::open` must still parse
        // cleanly to sniff the wire format) so its Fletcher-32 checksum
        // fails but the frame's own length fields stay intact: the next
        // record's magic sits at a known position right after.
        let mut bytes = std::fs::read(&base).unwrap();
        let magic_pos = bytes
            .windows(4)
            .position(|w| w == Magic::Object.bytes())
            .expect("ObJt magic must be present");
        let attr_len_pos = magic_pos + 4 + 4 + 2;
        let attr_len = u32::from_le_bytes(bytes[attr_len_pos..attr_len_pos + 4].try_into().unwrap());
        assert!(attr_len > 0, "doomed record's attrs must be non-empty for this test");
        let attr_bytes_start = attr_len_pos + 4;
        bytes[attr_bytes_start] ^= 0xFF;
        std::fs::write(&base, &bytes).unwrap();

        let mut r = FramedReader::open(&base).unwrap();
        let (magic, ..) = r.next_header(true).unwrap(); // volume header
        assert_eq!(magic, Magic::VolumeHeader);
        let (magic, ..) = r.next_header(true).unwrap();
        assert_eq!(magic, Magic::MainHeader);
        // The corrupted ObJt is skipped silently; DataEnd is next.
        let (magic, _, attrs) = r.next_header(true).unwrap();
        assert_eq!(magic, Magic::DataEnd);
        assert_eq!(attrs.get_string(Section::StdAttr, 1).unwrap(), "end");
        assert_eq!(r.corrupt_count(), 1);
    }
}
