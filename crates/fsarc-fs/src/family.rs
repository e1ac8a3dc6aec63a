//! The filesystem families named on the wire (`mkfs=` values on `restfs`,
//! and the `FsFamily` recorded in each `FsIn` header).

use std::fmt;

/// A filesystem family. Only [`FsFamily::Ext2`], [`FsFamily::Ext3`] and
/// [`FsFamily::Ext4`] have a built-in [`crate::Adapter`] registered by
/// default; the rest exist so archives produced against those filesystems
/// stay nameable on the wire even though this build has no adapter for
/// them (selecting one without `-x` is a config-time error, handled by the
/// caller of [`crate::Registry::by_family`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsFamily {
    Ext2,
    Ext3,
    Ext4,
    Xfs,
    Btrfs,
    ReiserFs,
    Reiser4,
    Jfs,
    Ntfs,
    VFat,
    /// Not a block-device filesystem: a plain directory tree, used by
    /// `savedir`/`restdir`.
    PlainDir,
}

impl FsFamily {
    pub const fn as_str(self) -> &'static str {
        match self {
            FsFamily::Ext2 => "ext2",
            FsFamily::Ext3 => "ext3",
            FsFamily::Ext4 => "ext4",
            FsFamily::Xfs => "xfs",
            FsFamily::Btrfs => "btrfs",
            FsFamily::ReiserFs => "reiserfs",
            FsFamily::Reiser4 => "reiser4",
            FsFamily::Jfs => "jfs",
            FsFamily::Ntfs => "ntfs",
            FsFamily::VFat => "vfat",
            FsFamily::PlainDir => "dir",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "ext2" => FsFamily::Ext2,
            "ext3" => FsFamily::Ext3,
            "ext4" => FsFamily::Ext4,
            "xfs" => FsFamily::Xfs,
            "btrfs" => FsFamily::Btrfs,
            "reiserfs" => FsFamily::ReiserFs,
            "reiser4" => FsFamily::Reiser4,
            "jfs" => FsFamily::Jfs,
            "ntfs" => FsFamily::Ntfs,
            "vfat" | "fat32" | "fat" => FsFamily::VFat,
            "dir" => FsFamily::PlainDir,
            _ => return None,
        })
    }

    /// Whether this build ships an adapter for this family without
    /// requiring `-x`.
    pub const fn is_stable_in_this_build(self) -> bool {
        matches!(self, FsFamily::Ext2 | FsFamily::Ext3 | FsFamily::Ext4 | FsFamily::PlainDir)
    }
}

impl fmt::Display for FsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_family_round_trips_through_its_name() {
        let all = [
            FsFamily::Ext2,
            FsFamily::Ext3,
            FsFamily::Ext4,
            FsFamily::Xfs,
            FsFamily::Btrfs,
            FsFamily::ReiserFs,
            FsFamily::Reiser4,
            FsFamily::Jfs,
            FsFamily::Ntfs,
            FsFamily::VFat,
            FsFamily::PlainDir,
        ];
        for family in all {
            assert_eq!(FsFamily::from_str_opt(family.as_str()), Some(family));
        }
    }

    #[test]
    fn only_ext_family_and_plaindir_are_stable() {
        assert!(FsFamily::Ext4.is_stable_in_this_build());
        assert!(!FsFamily::Xfs.is_stable_in_this_build());
        assert!(!FsFamily::Ntfs.is_stable_in_this_build());
    }
}
