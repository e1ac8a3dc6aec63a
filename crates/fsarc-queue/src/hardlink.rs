//! Tracks which inode each regular file with more than one link belongs to,
//! so only the first occurrence is archived in full.

use std::collections::HashMap;

use fsarc_dtyp::Error;

/// Key identifying one inode: `(device, inode number)`.
pub type InodeKey = (u64, u64);

/// Maps an inode to the first relative path the producer saved it under.
/// Scoped per filesystem during `savefs` and per whole run during
/// `savedir`.
#[derive(Debug, Default)]
pub struct HardlinkMap {
    paths: HashMap<InodeKey, String>,
}

impl HardlinkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The path this inode was first archived under, if any.
    pub fn get(&self, dev: u64, ino: u64) -> Option<&str> {
        self.paths.get(&(dev, ino)).map(String::as_str)
    }

    /// Records the first path for an inode. Fails with [`Error::Duplicate`]
    /// if this inode has already been recorded — callers should `get`
    /// first and only `insert` on a miss.
    pub fn insert(&mut self, dev: u64, ino: u64, path: impl Into<String>) -> Result<(), Error> {
        let key = (dev, ino);
        if self.paths.contains_key(&key) {
            return Err(Error::Duplicate {
                section: 0,
                key: 0,
            });
        }
        self.paths.insert(key, path.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_is_recorded_and_later_ones_are_found() {
        let mut map = HardlinkMap::new();
        assert!(map.get(1, 42).is_none());
        map.insert(1, 42, "a/f1").unwrap();
        assert_eq!(map.get(1, 42), Some("a/f1"));
    }

    #[test]
    fn reinserting_the_same_inode_is_rejected() {
        let mut map = HardlinkMap::new();
        map.insert(1, 42, "a/f1").unwrap();
        let err = map.insert(1, 42, "a/f2").unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
    }

    #[test]
    fn different_devices_with_the_same_inode_number_are_distinct() {
        let mut map = HardlinkMap::new();
        map.insert(1, 42, "a/f1").unwrap();
        map.insert(2, 42, "b/f1").unwrap();
        assert_eq!(map.len(), 2);
    }
}
