//! Applying one object's parsed attribute record to the filesystem: the
//! restore-side counterpart to `producer::object::build_object`. Ownership,
//! permissions and xattrs are applied right after an object is created;
//! directory `atime`/`mtime` is deferred by the caller (restoring a child
//! would otherwise bump its parent's mtime right back).

use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use fsarc_attr::AttributeRecord;
use fsarc_dtyp::{keys, ObjectType, Section};

use crate::error::{Error, Result};
use crate::producer::object::decode_xattr;

/// Resolves a stored archive path (always `/`-rooted) to a path under the
/// restore destination.
pub fn dest_path(dest_root: &Path, relpath: &str) -> PathBuf {
    let trimmed = relpath.trim_start_matches('/');
    if trimmed.is_empty() {
        dest_root.to_path_buf()
    } else {
        dest_root.join(trimmed)
    }
}

pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(Error::Io)
}

pub fn create_symlink(path: &Path, attrs: &AttributeRecord) -> Result<()> {
    let target_bytes = attrs.get_bytes(Section::StdAttr, keys::SYMLINK_TARGET)?;
    let target = std::ffi::OsStr::from_bytes(target_bytes);
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path).map_err(Error::Io)?;
    }
    symlink(target, path).map_err(Error::Io)
}

pub fn create_hardlink(dest_root: &Path, path: &Path, attrs: &AttributeRecord) -> Result<()> {
    let target_rel = attrs.get_string(Section::StdAttr, keys::HARDLINK_TARGET)?;
    let original = dest_path(dest_root, target_rel);
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path).map_err(Error::Io)?;
    }
    fs::hard_link(&original, path).map_err(Error::Io)
}

/// Creates a char/block device, fifo or socket node via `mknod(2)`.
pub fn create_special(path: &Path, attrs: &AttributeRecord, object_type: ObjectType) -> Result<()> {
    use nix::sys::stat::{mknod, Mode, SFlag};

    let mode_bits = attrs.get_u32(Section::StdAttr, keys::MODE)?;
    let perm = Mode::from_bits_truncate(mode_bits & 0o7777);
    let kind = match object_type {
        ObjectType::CharDev => SFlag::S_IFCHR,
        ObjectType::BlockDev => SFlag::S_IFBLK,
        ObjectType::Fifo => SFlag::S_IFIFO,
        ObjectType::Socket => SFlag::S_IFSOCK,
        _ => return Err(Error::Fs("create_special called on a non-device object".into())),
    };
    let rdev = attrs.get_u64(Section::StdAttr, keys::RDEV)? as nix::sys::stat::dev_t;

    if path.symlink_metadata().is_ok() {
        fs::remove_file(path).map_err(Error::Io)?;
    }
    mknod(path, kind, perm, rdev).map_err(|e| Error::Fs(format!("mknod {}: {e}", path.display())))
}

/// Writes `data` out as `path`'s whole content in one shot, for coalesced
/// small files.
pub fn write_whole_file(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).map_err(Error::Io)
}

/// Applies `mode`/`uid`/`gid` and restores xattrs/winattrs. Does not touch
/// `atime`/`mtime` — the caller applies those (directly for files, deferred
/// for directories).
pub fn apply_standard_attrs(path: &Path, attrs: &AttributeRecord, follow_symlinks: bool) -> Result<()> {
    let mode = attrs.get_u32(Section::StdAttr, keys::MODE)?;
    let uid = attrs.get_u32(Section::StdAttr, keys::UID).ok();
    let gid = attrs.get_u32(Section::StdAttr, keys::GID).ok();

    if follow_symlinks {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)).map_err(Error::Io)?;
        if uid.is_some() || gid.is_some() {
            std::os::unix::fs::chown(path, uid, gid).map_err(Error::Io)?;
        }
    } else if uid.is_some() || gid.is_some() {
        std::os::unix::fs::lchown(path, uid, gid).map_err(Error::Io)?;
    }

    apply_xattr_section(path, attrs, Section::XAttr)?;
    apply_xattr_section(path, attrs, Section::WinAttr)?;
    Ok(())
}

fn apply_xattr_section(path: &Path, attrs: &AttributeRecord, section: Section) -> Result<()> {
    let section_u8 = section.as_u8();
    for (s, _key, value) in attrs.iter() {
        if s != section_u8 {
            continue;
        }
        let Some(bytes) = value.as_bytes() else { continue };
        let Some((name, data)) = decode_xattr(bytes) else { continue };
        if let Err(e) = xattr::set(path, name, data) {
            log::warn!("cannot restore xattr {name} on {}: {e}", path.display());
        }
    }
    Ok(())
}

/// Sets `atime`/`mtime` on a plain file or symlink immediately.
pub fn apply_times(path: &Path, attrs: &AttributeRecord, follow_symlinks: bool) -> Result<()> {
    let atime = FileTime::from_unix_time(attrs.get_u64(Section::StdAttr, keys::ATIME)? as i64, 0);
    let mtime = FileTime::from_unix_time(attrs.get_u64(Section::StdAttr, keys::MTIME)? as i64, 0);
    let result = if follow_symlinks {
        filetime::set_file_times(path, atime, mtime)
    } else {
        filetime::set_symlink_file_times(path, atime, mtime)
    };
    result.map_err(Error::Io)
}

/// One directory whose `atime`/`mtime` restoration is deferred until every
/// object under it has been restored (applying a child would otherwise bump
/// the parent's mtime right back to "now").
pub struct PendingDirTime {
    pub path: PathBuf,
    pub relpath: String,
    pub atime: FileTime,
    pub mtime: FileTime,
}

/// `true` if `relpath` is `base` itself or lives somewhere under it.
pub fn is_descendant(base: &str, relpath: &str) -> bool {
    if base == "/" {
        return true;
    }
    relpath == base || relpath.starts_with(&format!("{base}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dest_path_strips_leading_slash_and_joins() {
        let root = Path::new("/mnt/restore");
        assert_eq!(dest_path(root, "/etc/passwd"), root.join("etc/passwd"));
        assert_eq!(dest_path(root, "etc/passwd"), root.join("etc/passwd"));
    }

    #[test]
    fn dest_path_of_the_root_itself_is_the_restore_root() {
        let root = Path::new("/mnt/restore");
        assert_eq!(dest_path(root, "/"), root);
        assert_eq!(dest_path(root, ""), root);
    }

    #[test]
    fn is_descendant_matches_self_and_children_but_not_siblings() {
        assert!(is_descendant("/", "/anything"));
        assert!(is_descendant("/home/user", "/home/user"));
        assert!(is_descendant("/home/user", "/home/user/docs/a.txt"));
        assert!(!is_descendant("/home/user", "/home/user2"));
        assert!(!is_descendant("/home/user", "/home/other"));
    }
}
