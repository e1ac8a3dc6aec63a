//! Typed configuration built by a CLI (or any other embedder) and passed by
//! value into the entry points of this crate.

use std::path::PathBuf;

use fsarc_dtyp::{MAX_LABEL_LEN, MAX_PASS_LEN, MIN_PASS_LEN, MIN_VOLUME_SIZE};

use crate::error::{Error, Result};

/// An exclusion pattern (`-e`), matched against either a path's basename or
/// its full relative path.
#[derive(Debug, Clone)]
pub struct ExcludePattern(String);

impl ExcludePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// `true` if `pattern` matches `full_path`'s basename or the full path
    /// itself. Patterns are plain strings, not globs.
    pub fn matches(&self, full_path: &str, basename: &str) -> bool {
        basename == self.0.as_str() || full_path == self.0.as_str()
    }
}

/// Options shared by `savefs` and `savedir`.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub overwrite: bool,
    pub compression_level: u8,
    pub split_size: u64,
    pub worker_count: usize,
    pub password: Option<String>,
    pub label: String,
    pub excludes: Vec<ExcludePattern>,
    /// `-A`: permit archiving a source already mounted read-write.
    pub allow_mounted_rw: bool,
    /// `-a`: relax xattr/acl mount-option checks.
    pub relax_mount_opt_checks: bool,
    /// `-x`: allow selecting an experimental filesystem adapter.
    pub experimental_fs: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            compression_level: 3,
            split_size: 0,
            worker_count: 1,
            password: None,
            label: String::new(),
            excludes: Vec::new(),
            allow_mounted_rw: false,
            relax_mount_opt_checks: false,
            experimental_fs: false,
        }
    }
}

impl SaveOptions {
    /// Validates the cross-field constraints `-z`/`-s`/`-j`/`-c`/`-L` are
    /// each individually responsible for, once all of them are known.
    pub fn validate(&self) -> Result<()> {
        if !(1..=9).contains(&self.compression_level) {
            return Err(Error::Fs(format!(
                "compression level {} is out of range 1..9",
                self.compression_level
            )));
        }
        if self.split_size != 0 && self.split_size < MIN_VOLUME_SIZE {
            return Err(Error::Fs(format!(
                "split size {} is smaller than the minimum of {MIN_VOLUME_SIZE} bytes",
                self.split_size
            )));
        }
        if self.worker_count == 0 || self.worker_count > fsarc_dtyp::MAX_COMP_JOBS {
            return Err(Error::Fs(format!(
                "worker count {} is out of range 1..{}",
                self.worker_count,
                fsarc_dtyp::MAX_COMP_JOBS
            )));
        }
        if let Some(pass) = &self.password {
            if !(MIN_PASS_LEN..=MAX_PASS_LEN).contains(&pass.len()) {
                return Err(Error::Fs(format!(
                    "password length {} is out of range {MIN_PASS_LEN}..{MAX_PASS_LEN}",
                    pass.len()
                )));
            }
        }
        if self.label.len() > MAX_LABEL_LEN {
            return Err(Error::Fs(format!(
                "label is {} bytes, longer than the {MAX_LABEL_LEN} byte maximum",
                self.label.len()
            )));
        }
        Ok(())
    }

    pub fn is_excluded(&self, full_path: &str, basename: &str) -> bool {
        self.excludes.iter().any(|p| p.matches(full_path, basename))
    }
}

/// One `restfs id=<n>,dest=<dev>[,mkfs=<fs>][,mkfsopt=<str>][,label=<s>][,uuid=<s>]`
/// destination mapping.
#[derive(Debug, Clone)]
pub struct FsDestination {
    pub fs_id: u16,
    pub dest: PathBuf,
    pub mkfs: Option<String>,
    pub mkfs_opts: Option<String>,
    pub label: Option<String>,
    pub uuid: Option<String>,
}

/// Options shared by `restfs` and `restdir`.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub password: Option<String>,
    pub destinations: Vec<FsDestination>,
    /// `restdir`'s single target directory; unused for `restfs`.
    pub dest_dir: Option<PathBuf>,
    pub worker_count: usize,
    pub allow_mounted_rw: bool,
    pub relax_mount_opt_checks: bool,
    pub experimental_fs: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            password: None,
            destinations: Vec::new(),
            dest_dir: None,
            worker_count: 1,
            allow_mounted_rw: false,
            relax_mount_opt_checks: false,
            experimental_fs: false,
        }
    }
}

impl RestoreOptions {
    pub fn destination_for(&self, fs_id: u16) -> Option<&FsDestination> {
        self.destinations.iter().find(|d| d.fs_id == fs_id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 || self.worker_count > fsarc_dtyp::MAX_COMP_JOBS {
            return Err(Error::Fs(format!(
                "worker count {} is out of range 1..{}",
                self.worker_count,
                fsarc_dtyp::MAX_COMP_JOBS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_pattern_matches_basename_or_full_path() {
        let p = ExcludePattern::new("lost+found");
        assert!(p.matches("/mnt/lost+found", "lost+found"));
        assert!(p.matches("/mnt/data/lost+found", "lost+found"));
        assert!(!p.matches("/mnt/data", "data"));
    }

    #[test]
    fn save_options_rejects_out_of_range_compression_level() {
        let mut opts = SaveOptions::default();
        opts.compression_level = 0;
        assert!(opts.validate().is_err());
        opts.compression_level = 10;
        assert!(opts.validate().is_err());
        opts.compression_level = 9;
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn save_options_rejects_undersized_split() {
        let mut opts = SaveOptions::default();
        opts.split_size = MIN_VOLUME_SIZE - 1;
        assert!(opts.validate().is_err());
        opts.split_size = MIN_VOLUME_SIZE;
        assert!(opts.validate().is_ok());
        opts.split_size = 0;
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn save_options_rejects_password_outside_length_range() {
        let mut opts = SaveOptions::default();
        opts.password = Some("a".repeat(MIN_PASS_LEN - 1));
        assert!(opts.validate().is_err());
        opts.password = Some("a".repeat(MIN_PASS_LEN));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn restore_options_rejects_zero_workers() {
        let mut opts = RestoreOptions::default();
        opts.worker_count = 0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn destination_for_looks_up_by_fs_id() {
        let mut opts = RestoreOptions::default();
        opts.destinations.push(FsDestination {
            fs_id: 2,
            dest: PathBuf::from("/dev/sdb1"),
            mkfs: None,
            mkfs_opts: None,
            label: None,
            uuid: None,
        });
        assert!(opts.destination_for(2).is_some());
        assert!(opts.destination_for(3).is_none());
    }
}
