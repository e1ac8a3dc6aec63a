//! Dispatches to the first registered [`Adapter`] whose `probe` matches.

use std::path::Path;

use crate::adapter::Adapter;
use crate::family::FsFamily;

#[derive(Default)]
pub struct Registry {
    adapters: Vec<Box<dyn Adapter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapters are tried in the order they're registered; register more
    /// specific/cheaper probes first.
    pub fn register(&mut self, adapter: Box<dyn Adapter>) {
        self.adapters.push(adapter);
    }

    /// Registers [`crate::PlainDirAdapter`] and [`crate::Ext2FamilyAdapter`]
    /// for ext2, ext3 and ext4, in that order.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(crate::PlainDirAdapter));
        reg.register(Box::new(crate::Ext2FamilyAdapter::new(FsFamily::Ext4)));
        reg.register(Box::new(crate::Ext2FamilyAdapter::new(FsFamily::Ext3)));
        reg.register(Box::new(crate::Ext2FamilyAdapter::new(FsFamily::Ext2)));
        reg
    }

    /// First registered adapter whose `probe(devpath)` returns `true`.
    pub fn probe(&self, devpath: &Path) -> Option<&dyn Adapter> {
        self.adapters
            .iter()
            .map(|a| a.as_ref())
            .find(|a| a.probe(devpath))
    }

    /// First adapter registered for `family`, regardless of probing.
    pub fn by_family(&self, family: FsFamily) -> Option<&dyn Adapter> {
        self.adapters.iter().map(|a| a.as_ref()).find(|a| a.family() == family)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Adapter> {
        self.adapters.iter().map(|a| a.as_ref())
    }
}
