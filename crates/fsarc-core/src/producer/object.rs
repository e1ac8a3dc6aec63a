//! Building one object's `ObJt` attribute record from its on-disk metadata:
//! the standard POSIX attributes every object carries, plus the
//! conditional keys that depend on its type, plus user xattrs and (when
//! the source adapter says the filesystem carries them) NTFS winattrs.

use std::fs::Metadata;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use fsarc_attr::AttributeRecord;
use fsarc_dtyp::{keys, ObjectType, Section, FILEFLAGS_SPARSE};
use fsarc_queue::HardlinkMap;

use crate::error::Result;

/// Maximum size of one extended attribute value. Larger values are
/// rejected with a warning and skipped, not a fatal error.
const MAX_XATTR_VALUE: usize = 64 * 1024;

/// The fixed list of NTFS-origin attributes read into the `WINATTR`
/// section, when the source adapter reports it carries them.
const WINATTR_NAMES: &[&str] = &[
    "system.ntfs_attrib",
    "system.ntfs_acl",
    "system.ntfs_times",
];

/// Everything [`build_object`] derived from one `lstat` that the caller
/// (the tree walker) needs to decide what happens next: which bucket the
/// stats counter goes in, whether this is a directory to recurse into,
/// and whether its content still needs to be enqueued.
pub struct BuiltObject {
    pub attrs: AttributeRecord,
    pub object_type: ObjectType,
}

/// Builds the `STDATTR` section of one object's header and classifies it.
///
/// `relpath` is the path stored in the archive (relative to the archive
/// root); `full_path` is used for `readlink`/xattr syscalls. `object_id` is
/// this build's monotonic counter, assigned in tree-walk order.
pub fn build_object(
    relpath: &str,
    full_path: &Path,
    meta: &Metadata,
    object_id: u64,
    hardlinks: &mut HardlinkMap,
    winattr_capable: bool,
) -> Result<BuiltObject> {
    let mut d = AttributeRecord::new();
    d.add_u64(Section::StdAttr, keys::OBJECT_ID, object_id)?;
    d.add_string(Section::StdAttr, keys::PATH, relpath)?;
    d.add_u64(Section::StdAttr, keys::SIZE, meta.size())?;
    d.add_u32(Section::StdAttr, keys::MODE, meta.mode())?;
    d.add_u32(Section::StdAttr, keys::UID, meta.uid())?;
    d.add_u32(Section::StdAttr, keys::GID, meta.gid())?;
    d.add_u64(Section::StdAttr, keys::ATIME, meta.atime() as u64)?;
    d.add_u64(Section::StdAttr, keys::MTIME, meta.mtime() as u64)?;

    let file_type = meta.file_type();
    let object_type = if file_type.is_dir() {
        ObjectType::Dir
    } else if file_type.is_symlink() {
        let target = std::fs::read_link(full_path).map_err(crate::error::Error::Io)?;
        d.add_bytes(Section::StdAttr, keys::SYMLINK_TARGET, target.as_os_str().as_bytes().to_vec())?;
        if winattr_capable {
            if let Some(parent) = full_path.parent() {
                let resolved = parent.join(&target);
                if let Ok(target_meta) = std::fs::metadata(&resolved) {
                    let link_target_type = if target_meta.is_dir() {
                        ObjectType::Dir
                    } else {
                        ObjectType::RegFileUnique
                    };
                    d.add_u64(Section::StdAttr, keys::LINK_TARGET_TYPE, link_target_type as u64)?;
                }
            }
        }
        ObjectType::Symlink
    } else if file_type.is_block_device() || file_type.is_char_device() || file_type.is_fifo() || file_type.is_socket() {
        d.add_u64(Section::StdAttr, keys::RDEV, meta.rdev())?;
        if file_type.is_char_device() {
            ObjectType::CharDev
        } else if file_type.is_block_device() {
            ObjectType::BlockDev
        } else if file_type.is_fifo() {
            ObjectType::Fifo
        } else {
            ObjectType::Socket
        }
    } else {
        // Regular file: a second link to an already-seen (dev, ino) is a
        // hardlink; otherwise classify by size for small-file coalescing.
        if meta.nlink() > 1 {
            if let Some(first_path) = hardlinks.get(meta.dev(), meta.ino()) {
                d.add_string(Section::StdAttr, keys::HARDLINK_TARGET, first_path)?;
                ObjectType::Hardlink
            } else {
                hardlinks.insert(meta.dev(), meta.ino(), relpath.to_string())?;
                ObjectType::RegFileUnique
            }
        } else if meta.size() > 0 && meta.size() < fsarc_dtyp::SMALL_FILE_THRESHOLD {
            ObjectType::RegFileMulti
        } else {
            ObjectType::RegFileUnique
        }
    };

    if object_type == ObjectType::RegFileUnique && is_sparse(meta) {
        d.add_u32(Section::StdAttr, keys::FLAGS, FILEFLAGS_SPARSE)?;
    }

    d.add_u32(Section::StdAttr, keys::OBJECT_TYPE, object_type as u32)?;

    collect_xattrs(full_path, &mut d)?;
    if winattr_capable {
        collect_winattrs(full_path, &mut d)?;
    }

    Ok(BuiltObject { attrs: d, object_type })
}

/// A sparse file's allocated blocks cover less than its logical size.
/// `FILEFLAGS_SPARSE` tells the walker to skip all-zero data blocks for
/// this file and the consumer to punch the skipped ranges as real holes.
fn is_sparse(meta: &Metadata) -> bool {
    meta.blocks() * 512 < meta.size()
}

fn collect_xattrs(full_path: &Path, d: &mut AttributeRecord) -> Result<()> {
    let names = match xattr::list(full_path) {
        Ok(names) => names,
        Err(e) => {
            log::warn!("cannot list xattrs on {}: {e}", full_path.display());
            return Ok(());
        }
    };
    for name in names {
        let Some(name_str) = name.to_str() else { continue };
        if !name_str.starts_with("user.") {
            continue;
        }
        match xattr::get(full_path, &name) {
            Ok(Some(value)) if value.len() > MAX_XATTR_VALUE => {
                log::warn!(
                    "xattr {name_str} on {} is {} bytes, over the {MAX_XATTR_VALUE} byte limit: skipped",
                    full_path.display(),
                    value.len()
                );
            }
            Ok(Some(value)) => {
                d.add_bytes(Section::XAttr, xattr_key(name_str), encode_xattr(name_str, &value))?;
            }
            Ok(None) => {}
            Err(e) => log::warn!("cannot read xattr {name_str} on {}: {e}", full_path.display()),
        }
    }
    Ok(())
}

fn collect_winattrs(full_path: &Path, d: &mut AttributeRecord) -> Result<()> {
    for (idx, name) in WINATTR_NAMES.iter().enumerate() {
        match xattr::get(full_path, name) {
            Ok(Some(value)) if value.len() <= MAX_XATTR_VALUE => {
                d.add_bytes(Section::WinAttr, idx as u16 + 1, encode_xattr(name, &value))?;
            }
            Ok(Some(_)) => log::warn!("winattr {name} on {} over size limit: skipped", full_path.display()),
            Ok(None) | Err(_) => {}
        }
    }
    Ok(())
}

/// A stable per-record key for a variable xattr name: the attribute value
/// written to the archive is `name\0value`, so lookups on restore only
/// need the key to be unique within the record, not meaningful on its own.
fn xattr_key(name: &str) -> u16 {
    let mut h: u32 = 2166136261;
    for b in name.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(16777619);
    }
    (h as u16) | 0x8000
}

fn encode_xattr(name: &str, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 1 + value.len());
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out.extend_from_slice(value);
    out
}

/// Splits an encoded xattr value (`name\0value`) back apart. Used by the
/// consumer when replaying the `XATTR`/`WINATTR` sections.
pub fn decode_xattr(bytes: &[u8]) -> Option<(&str, &[u8])> {
    let nul = bytes.iter().position(|&b| b == 0)?;
    let name = std::str::from_utf8(&bytes[..nul]).ok()?;
    Some((name, &bytes[nul + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xattr_encoding_round_trips() {
        let encoded = encode_xattr("user.comment", b"hello");
        let (name, value) = decode_xattr(&encoded).unwrap();
        assert_eq!(name, "user.comment");
        assert_eq!(value, b"hello");
    }

    #[test]
    fn xattr_key_is_stable_for_the_same_name() {
        assert_eq!(xattr_key("user.comment"), xattr_key("user.comment"));
    }
}
