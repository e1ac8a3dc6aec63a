//! Adapter covering ext2, ext3 and ext4 by shelling out to the e2fsprogs
//! and util-linux command-line tools (`mkfs.ext{2,3,4}`, `tune2fs`,
//! `blkid`, `mount`, `umount`) rather than linking `libext2fs` directly.

use std::fs;
use std::path::Path;
use std::process::Command;

use fsarc_attr::AttributeRecord;
use fsarc_dtyp::{Error, Section};

use crate::adapter::{Adapter, Capabilities, MountFlags};
use crate::family::FsFamily;
use crate::keys;

pub struct Ext2FamilyAdapter {
    family: FsFamily,
}

impl Ext2FamilyAdapter {
    pub fn new(family: FsFamily) -> Self {
        debug_assert!(matches!(family, FsFamily::Ext2 | FsFamily::Ext3 | FsFamily::Ext4));
        Self { family }
    }

    fn run(&self, mut cmd: Command) -> Result<std::process::Output, Error> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let output = cmd
            .output()
            .map_err(|e| Error::InvalidArg(format!("failed to run {program}: {e}")))?;
        if !output.status.success() {
            return Err(Error::InvalidArg(format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

impl Adapter for Ext2FamilyAdapter {
    fn family(&self) -> FsFamily {
        self.family
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

    /// Shells out to `blkid -o value -s TYPE` and compares against this
    /// adapter's family name. A missing `blkid`, or a device `blkid`
    /// doesn't recognize, both probe as `false` rather than erroring —
    /// probing is expected to fail quietly so the registry can move on to
    /// the next adapter.
    fn probe(&self, devpath: &Path) -> bool {
        let output = match Command::new("blkid")
            .args(["-o", "value", "-s", "TYPE"])
            .arg(devpath)
            .output()
        {
            Ok(o) if o.status.success() => o,
            _ => return false,
        };
        String::from_utf8_lossy(&output.stdout).trim() == self.family.as_str()
    }

    fn getinfo(&self, attrs: &mut AttributeRecord, devpath: &Path) -> Result<(), Error> {
        let output = self.run({
            let mut c = Command::new("tune2fs");
            c.arg("-l").arg(devpath);
            c
        })?;
        let text = String::from_utf8_lossy(&output.stdout);

        if let Some(label) = tune2fs_field(&text, "Filesystem volume name") {
            if label != "<none>" {
                attrs.add_string(Section::StdAttr, keys::LABEL, label)?;
            }
        }
        if let Some(uuid) = tune2fs_field(&text, "Filesystem UUID") {
            attrs.add_string(Section::StdAttr, keys::UUID, uuid)?;
        }
        if let Some(bs) = tune2fs_field(&text, "Block size").and_then(|s| s.parse::<u32>().ok()) {
            attrs.add_u32(Section::StdAttr, keys::BLOCK_SIZE, bs)?;
        }
        if let Some(features) = tune2fs_field(&text, "Filesystem features") {
            attrs.add_string(Section::StdAttr, keys::FEATURES, features)?;
        }
        attrs.add_string(Section::StdAttr, keys::FSTYPE, self.family.as_str())?;
        Ok(())
    }

    fn mkfs(
        &self,
        _archived: &AttributeRecord,
        devpath: &Path,
        opts: Option<&str>,
        label: Option<&str>,
        uuid: Option<&str>,
    ) -> Result<(), Error> {
        let mut c = Command::new(format!("mkfs.{}", self.family.as_str()));
        c.arg("-F");
        if let Some(label) = label {
            c.arg("-L").arg(label);
        }
        if let Some(uuid) = uuid {
            c.arg("-U").arg(uuid);
        }
        if let Some(opts) = opts {
            c.args(opts.split_whitespace());
        }
        c.arg(devpath);
        self.run(c)?;
        Ok(())
    }

    fn mount(
        &self,
        devpath: &Path,
        mountpoint: &Path,
        stored: &AttributeRecord,
        flags: MountFlags,
    ) -> Result<(), Error> {
        if let Some((existing_mp, existing_rw)) = find_existing_mount(devpath)? {
            if existing_rw && !flags.allow_mounted_rw {
                return Err(Error::InvalidArg(format!(
                    "{} is already mounted read-write at {}; pass the override flag to proceed",
                    devpath.display(),
                    existing_mp.display()
                )));
            }
            fs::create_dir_all(mountpoint)?;
            self.run({
                let mut c = Command::new("mount");
                c.arg("--bind").arg(&existing_mp).arg(mountpoint);
                c
            })?;
            return Ok(());
        }

        let fstype = stored
            .get_string(Section::StdAttr, keys::FSTYPE)
            .unwrap_or(self.family.as_str());
        fs::create_dir_all(mountpoint)?;
        let mode = if flags.read_write { "rw" } else { "ro" };
        self.run({
            let mut c = Command::new("mount");
            c.args(["-t", fstype, "-o", mode]).arg(devpath).arg(mountpoint);
            c
        })?;
        Ok(())
    }

    fn umount(&self, _devpath: &Path, mountpoint: &Path) -> Result<(), Error> {
        self.run({
            let mut c = Command::new("umount");
            c.arg(mountpoint);
            c
        })?;
        Ok(())
    }

    fn required_mount_opts(&self, _devpath: &Path) -> (Vec<String>, Vec<String>) {
        (
            vec!["user_xattr".into(), "acl".into()],
            vec!["noacl".into(), "nouser_xattr".into()],
        )
    }
}

fn tune2fs_field<'a>(text: &'a str, field: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name.trim() == field).then(|| value.trim())
    })
}

/// Scans `/proc/mounts` for `devpath`, returning its mount point and
/// whether it's currently mounted read-write.
fn find_existing_mount(devpath: &Path) -> Result<Option<(std::path::PathBuf, bool)>, Error> {
    let text = match fs::read_to_string("/proc/mounts") {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    let target = fs::canonicalize(devpath).unwrap_or_else(|_| devpath.to_path_buf());
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let dev = match fields.next() {
            Some(d) => d,
            None => continue,
        };
        let mountpoint = match fields.next() {
            Some(m) => m,
            None => continue,
        };
        let opts = fields.nth(1).unwrap_or("");
        if Path::new(dev) == target || Path::new(dev) == devpath {
            let rw = opts.split(',').next() == Some("rw");
            return Ok(Some((std::path::PathBuf::from(mountpoint), rw)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tune2fs_field_extracts_trimmed_value() {
        let text = "Filesystem volume name:   myroot\nBlock size:               4096\n";
        assert_eq!(tune2fs_field(text, "Filesystem volume name"), Some("myroot"));
        assert_eq!(tune2fs_field(text, "Block size"), Some("4096"));
        assert_eq!(tune2fs_field(text, "missing"), None);
    }

    #[test]
    fn required_mount_opts_name_xattr_and_acl() {
        let adapter = Ext2FamilyAdapter::new(FsFamily::Ext4);
        let (required, forbidden) = adapter.required_mount_opts(Path::new("/dev/null"));
        assert!(required.contains(&"acl".to_string()));
        assert!(forbidden.contains(&"noacl".to_string()));
    }
}
