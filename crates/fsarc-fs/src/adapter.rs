//! The per-filesystem adapter interface consumed by `fsarc-core`'s producer
//! and consumer: exactly the table external collaborators implement for
//! `savefs`/`restfs`.

use std::path::Path;

use fsarc_attr::AttributeRecord;
use fsarc_dtyp::Error;

use crate::family::FsFamily;

/// Static capability booleans an adapter declares about the filesystem it
/// drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub xattr: bool,
    pub acl: bool,
    /// Stores NTFS-style `system.ntfs_*` attributes.
    pub winattr: bool,
    pub symlink_target_type: bool,
    /// `false` marks the adapter experimental (`-x` required to select it).
    pub stable: bool,
}

/// Flags threaded through [`Adapter::mount`] controlling how strict the
/// mount-time checks are.
#[derive(Debug, Clone, Copy, Default)]
pub struct MountFlags {
    /// The mode this mount should end up in: read-only for a `savefs`
    /// source, read-write once `restfs` is ready to write into it.
    pub read_write: bool,
    /// `-A`: permit mounting a source that's already mounted read-write
    /// elsewhere, instead of aborting.
    pub allow_mounted_rw: bool,
    /// `-a`: don't reject mount options incompatible with xattr/acl
    /// support.
    pub relax_mount_opt_checks: bool,
}

/// One filesystem family's probe/mkfs/mount/unmount implementation.
///
/// One entry point per lifecycle stage: `probe`, `getinfo`, `mkfs`, `mount`,
/// `umount`, `required_mount_opts`, plus the capability booleans above.
pub trait Adapter: Send + Sync {
    fn family(&self) -> FsFamily;

    fn capabilities(&self) -> Capabilities;

    /// `true` if `devpath` holds a filesystem of this adapter's family.
    fn probe(&self, devpath: &Path) -> bool;

    /// Fills `attrs` with label/uuid/block size/feature information read
    /// from `devpath`.
    fn getinfo(&self, attrs: &mut AttributeRecord, devpath: &Path) -> Result<(), Error>;

    /// Formats `devpath` with this family, applying `label`/`uuid`
    /// overrides and a raw `opts` string passed on to the formatting tool
    /// verbatim. `archived` is the attribute record saved at archive time,
    /// consulted for defaults the overrides didn't set.
    fn mkfs(
        &self,
        archived: &AttributeRecord,
        devpath: &Path,
        opts: Option<&str>,
        label: Option<&str>,
        uuid: Option<&str>,
    ) -> Result<(), Error>;

    /// Mounts `devpath` at `mountpoint`. `stored` is the mount-relevant
    /// attribute subset read back from the archive (e.g. the fs type
    /// string saved at archive time).
    fn mount(
        &self,
        devpath: &Path,
        mountpoint: &Path,
        stored: &AttributeRecord,
        flags: MountFlags,
    ) -> Result<(), Error>;

    fn umount(&self, devpath: &Path, mountpoint: &Path) -> Result<(), Error>;

    /// Mount options this family's xattr/acl support requires to be
    /// present, and ones that must be absent, when reading `devpath` as a
    /// save source.
    fn required_mount_opts(&self, devpath: &Path) -> (Vec<String>, Vec<String>);
}
