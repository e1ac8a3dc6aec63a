//! Read-only archive inspection: parses the main header and every
//! filesystem/directories info header without touching a worker pool or a
//! destination filesystem. Shares its header-level parsing with
//! [`crate::consumer`] but never applies anything.

use std::collections::BTreeMap;
use std::path::Path;

use fsarc_attr::AttributeRecord;
use fsarc_codec::{CompressAlgo, EncryptAlgo};
use fsarc_dtyp::{ArchiveType, Section};
use fsarc_wire::{FramedReader, Magic};

use crate::error::{Error, Result};
use crate::keys;
use crate::stats::ObjectClass;

#[derive(Debug, Clone)]
pub struct FsSummary {
    pub fs_id: u16,
    pub filesystem: String,
    pub mount_path: String,
    pub bytes_total: u64,
    pub bytes_used: u64,
    pub fs_label: String,
    pub fs_uuid: String,
    pub orig_device: String,
    pub total_cost: u64,
    /// Populated only when `inspect` was asked for a detailed report.
    pub object_counts: Option<BTreeMap<ObjectClass, u64>>,
}

#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub archive_id: u32,
    pub label: String,
    pub creation_time: u64,
    pub archive_type: ArchiveType,
    pub compress_algo: CompressAlgo,
    pub compress_level: u32,
    pub encrypt_algo: EncryptAlgo,
    pub encrypted: bool,
    pub filesystems: Vec<FsSummary>,
    /// Set for a directories archive; `total_cost` from its lone `DiRs` header.
    pub dirs_total_cost: Option<u64>,
    pub dirs_object_counts: Option<BTreeMap<ObjectClass, u64>>,
    /// How many records were skipped because their checksum, archive id, or
    /// attribute body failed to validate (spec §8 property 5 / E5: a single
    /// corrupted record must not stop the rest of the archive from being
    /// read).
    pub corrupt_records: u64,
}

fn empty_fs_summary(fs_id: u16) -> FsSummary {
    FsSummary {
        fs_id,
        filesystem: String::new(),
        mount_path: String::new(),
        bytes_total: 0,
        bytes_used: 0,
        fs_label: String::new(),
        fs_uuid: String::new(),
        orig_device: String::new(),
        total_cost: 0,
        object_counts: None,
    }
}

fn fill_fs_summary(summary: &mut FsSummary, attrs: &AttributeRecord) {
    summary.filesystem = attrs.get_string(Section::StdAttr, keys::fsinfo::FILESYSTEM).unwrap_or_default().to_string();
    summary.mount_path = attrs.get_string(Section::StdAttr, keys::fsinfo::MOUNT_PATH).unwrap_or_default().to_string();
    summary.bytes_total = attrs.get_u64(Section::StdAttr, keys::fsinfo::BYTES_TOTAL).unwrap_or(0);
    summary.bytes_used = attrs.get_u64(Section::StdAttr, keys::fsinfo::BYTES_USED).unwrap_or(0);
    summary.fs_label = attrs.get_string(Section::StdAttr, keys::fsinfo::FS_LABEL).unwrap_or_default().to_string();
    summary.fs_uuid = attrs.get_string(Section::StdAttr, keys::fsinfo::FS_UUID).unwrap_or_default().to_string();
    summary.orig_device = attrs.get_string(Section::StdAttr, keys::fsinfo::ORIG_DEVICE).unwrap_or_default().to_string();
    summary.total_cost = attrs.get_u64(Section::StdAttr, keys::fsinfo::TOTAL_COST).unwrap_or(0);
}

fn object_class_of(attrs: &AttributeRecord) -> Option<ObjectClass> {
    let raw = attrs.get_u32(Section::StdAttr, fsarc_dtyp::keys::OBJECT_TYPE).ok()?;
    let object_type = fsarc_dtyp::ObjectType::from_u32(raw)?;
    Some(match object_type {
        fsarc_dtyp::ObjectType::Dir => ObjectClass::Directory,
        fsarc_dtyp::ObjectType::Symlink => ObjectClass::Symlink,
        fsarc_dtyp::ObjectType::Hardlink => ObjectClass::Hardlink,
        fsarc_dtyp::ObjectType::CharDev
        | fsarc_dtyp::ObjectType::BlockDev
        | fsarc_dtyp::ObjectType::Fifo
        | fsarc_dtyp::ObjectType::Socket => ObjectClass::Special,
        fsarc_dtyp::ObjectType::RegFileUnique | fsarc_dtyp::ObjectType::RegFileMulti => ObjectClass::RegularFile,
    })
}

/// Reads an archive's main header and every per-filesystem (or
/// per-directories-tree) info header, skipping over data blocks without
/// decompressing them. With `detailed`, also tallies each archived object by
/// kind.
pub fn inspect(archive_path: impl AsRef<Path>, detailed: bool) -> Result<ArchiveSummary> {
    let mut reader = FramedReader::open(archive_path.as_ref()).map_err(Error::Core)?;

    let (magic, _, _) = reader.next_header(false).map_err(Error::Core)?;
    if magic != Magic::VolumeHeader {
        return Err(Error::Fs("archive does not start with a volume header".into()));
    }
    let (magic, _, main_attrs) = reader.next_header(false).map_err(Error::Core)?;
    if magic != Magic::MainHeader {
        return Err(Error::Fs("archive's second record is not the main header".into()));
    }

    let archive_id = main_attrs.get_u32(Section::StdAttr, keys::main::ARCHIVE_ID).map_err(Error::Core)?;
    let label = main_attrs.get_string(Section::StdAttr, keys::main::ARCHIVE_LABEL).unwrap_or_default().to_string();
    let creation_time = main_attrs.get_u64(Section::StdAttr, keys::main::CREATION_TIME).unwrap_or(0);
    let archive_type_raw = main_attrs.get_u32(Section::StdAttr, keys::main::ARCHIVE_TYPE).map_err(Error::Core)?;
    let archive_type = ArchiveType::from_u32(archive_type_raw)
        .ok_or_else(|| Error::Fs(format!("unknown archive type {archive_type_raw}")))?;
    let compress_algo = CompressAlgo::from_u8(main_attrs.get_u32(Section::StdAttr, keys::main::COMPRESS_ALGO).unwrap_or(0) as u8)
        .unwrap_or(CompressAlgo::None);
    let compress_level = main_attrs.get_u32(Section::StdAttr, keys::main::COMPRESS_LEVEL).unwrap_or(0);
    let encrypt_algo = EncryptAlgo::from_u8(main_attrs.get_u32(Section::StdAttr, keys::main::ENCRYPT_ALGO).unwrap_or(0) as u8)
        .unwrap_or(EncryptAlgo::None);
    let encrypted = main_attrs.get_bytes(Section::StdAttr, keys::main::CHECK_PASS_CLEAR_MD5).is_ok();

    let mut summary = ArchiveSummary {
        archive_id,
        label,
        creation_time,
        archive_type,
        compress_algo,
        compress_level,
        encrypt_algo,
        encrypted,
        filesystems: Vec::new(),
        dirs_total_cost: None,
        dirs_object_counts: None,
        corrupt_records: 0,
    };

    let mut pending_fs: Option<FsSummary> = None;
    let mut current_counts: Option<BTreeMap<ObjectClass, u64>> = None;

    loop {
        let (magic, fs_id, attrs) = reader.next_header(true).map_err(Error::Core)?;
        match magic {
            Magic::VolumeHeader => continue,
            Magic::VolumeFooter => break,
            Magic::BlockHeader => {
                let archive_size = attrs.get_u64(Section::StdAttr, keys::blockhead::ARCHIVE_SIZE).unwrap_or(0);
                let _ = reader.read_payload(archive_size as usize).map_err(Error::Core)?;
            }
            Magic::FsInfo => {
                let mut fs = empty_fs_summary(0);
                fill_fs_summary(&mut fs, &attrs);
                pending_fs = Some(fs);
            }
            Magic::FsBegin => {
                if let Some(mut fs) = pending_fs.take() {
                    fs.fs_id = fs_id.0;
                    if detailed {
                        current_counts = Some(BTreeMap::new());
                    }
                    summary.filesystems.push(fs);
                }
            }
            Magic::DirsInfo => {
                summary.dirs_total_cost = Some(attrs.get_u64(Section::StdAttr, keys::dirsinfo::TOTAL_COST).unwrap_or(0));
                if detailed {
                    current_counts = Some(BTreeMap::new());
                }
            }
            Magic::Object => {
                if detailed {
                    if let (Some(counts), Some(class)) = (current_counts.as_mut(), object_class_of(&attrs)) {
                        *counts.entry(class).or_insert(0) += 1;
                    }
                }
            }
            Magic::DataEnd => {
                if let Some(counts) = current_counts.take() {
                    match archive_type {
                        ArchiveType::Filesystems => {
                            if let Some(last) = summary.filesystems.last_mut() {
                                last.object_counts = Some(counts);
                            }
                        }
                        ArchiveType::Directories => {
                            summary.dirs_object_counts = Some(counts);
                        }
                    }
                }
            }
            Magic::MainHeader | Magic::FileFooter => {}
        }
    }

    summary.corrupt_records = reader.corrupt_count();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mainhead::{self, MainHeadInfo};
    use fsarc_attr::AttrValue;
    use fsarc_dtyp::{ArchiveId, FsId};
    use fsarc_wire::FramedWriter;

    fn write_minimal_dirs_archive(base: &Path, corrupt_one_object: bool) {
        let id = ArchiveId::from(0x42);
        let mut w = FramedWriter::create(base, id, 0, true).unwrap();

        let main_info = MainHeadInfo {
            archive_id: id,
            creation_time: 1_700_000_000,
            label: "t".into(),
            archive_type: ArchiveType::Directories,
            compress_algo: CompressAlgo::None,
            compress_level: 0,
            encrypt_algo: EncryptAlgo::None,
            fsa_comp_level: 1,
            fs_count: None,
        };
        let main_header = mainhead::build_main_header(&main_info, None).unwrap();
        w.append_header(Magic::MainHeader, FsId::NULL, &main_header).unwrap();

        let mut dirsinfo = AttributeRecord::new();
        dirsinfo.add_u64(Section::StdAttr, keys::dirsinfo::TOTAL_COST, 2).unwrap();
        w.append_header(Magic::DirsInfo, FsId::NULL, &dirsinfo).unwrap();

        let mut obj = AttributeRecord::new();
        obj.add(Section::StdAttr, fsarc_dtyp::keys::OBJECT_TYPE, AttrValue::U32(fsarc_dtyp::ObjectType::Dir as u32))
            .unwrap();
        w.append_header(Magic::Object, FsId::NULL, &obj).unwrap();

        w.append_header(Magic::DataEnd, FsId::NULL, &AttributeRecord::new()).unwrap();
        w.finish().unwrap();

        if corrupt_one_object {
            let mut bytes = std::fs::read(base).unwrap();
            let magic_pos = bytes
                .windows(4)
                .position(|w| w == Magic::Object.bytes())
                .expect("ObJt magic must be present");
            let attr_bytes_start = magic_pos + 4 + 4 + 2 + 4;
            bytes[attr_bytes_start] ^= 0xFF;
            std::fs::write(base, &bytes).unwrap();
        }
    }

    #[test]
    fn inspect_reads_a_clean_directories_archive() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a.fsa");
        write_minimal_dirs_archive(&base, false);

        let summary = inspect(&base, false).unwrap();
        assert_eq!(summary.archive_type, ArchiveType::Directories);
        assert_eq!(summary.dirs_total_cost, Some(2));
        assert_eq!(summary.corrupt_records, 0);
    }

    #[test]
    fn inspect_skips_a_corrupted_object_and_keeps_reading() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a.fsa");
        write_minimal_dirs_archive(&base, true);

        let summary = inspect(&base, false).unwrap();
        assert_eq!(summary.dirs_total_cost, Some(2));
        assert_eq!(summary.corrupt_records, 1);
    }
}
