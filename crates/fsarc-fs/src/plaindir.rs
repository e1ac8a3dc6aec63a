//! Adapter used for `savedir`/`restdir`: the "device" is a plain directory,
//! there's nothing to mount, and `mkfs` just ensures the destination
//! directory exists.

use std::fs;
use std::path::Path;

use fsarc_attr::AttributeRecord;
use fsarc_dtyp::Error;

use crate::adapter::{Adapter, Capabilities, MountFlags};
use crate::family::FsFamily;

pub struct PlainDirAdapter;

impl Adapter for PlainDirAdapter {
    fn family(&self) -> FsFamily {
        FsFamily::PlainDir
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            xattr: true,
            acl: true,
            winattr: false,
            symlink_target_type: false,
            stable: true,
        }
    }

    fn probe(&self, devpath: &Path) -> bool {
        devpath.is_dir()
    }

    fn getinfo(&self, _attrs: &mut AttributeRecord, _devpath: &Path) -> Result<(), Error> {
        Ok(())
    }

    fn mkfs(
        &self,
        _archived: &AttributeRecord,
        devpath: &Path,
        _opts: Option<&str>,
        _label: Option<&str>,
        _uuid: Option<&str>,
    ) -> Result<(), Error> {
        fs::create_dir_all(devpath)?;
        Ok(())
    }

    fn mount(
        &self,
        _devpath: &Path,
        _mountpoint: &Path,
        _stored: &AttributeRecord,
        _flags: MountFlags,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn umount(&self, _devpath: &Path, _mountpoint: &Path) -> Result<(), Error> {
        Ok(())
    }

    fn required_mount_opts(&self, _devpath: &Path) -> (Vec<String>, Vec<String>) {
        (Vec::new(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn probes_true_only_for_existing_directories() {
        let dir = tempdir().unwrap();
        let adapter = PlainDirAdapter;
        assert!(adapter.probe(dir.path()));
        assert!(!adapter.probe(&dir.path().join("does-not-exist")));
    }

    #[test]
    fn mkfs_creates_the_destination_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested/dest");
        let adapter = PlainDirAdapter;
        adapter
            .mkfs(&AttributeRecord::new(), &target, None, None, None)
            .unwrap();
        assert!(target.is_dir());
    }
}
