//! Filesystem-specific adapters: probing, `mkfs`, mount/unmount, and the
//! registry the core dispatches through. Every external tool invocation
//! (`mkfs.ext4`, `tune2fs`, `blkid`, `mount`) lives here so `fsarc-core`
//! never shells out directly.

pub mod adapter;
pub mod ext2family;
pub mod family;
pub mod keys;
pub mod plaindir;
pub mod registry;

pub use adapter::{Adapter, Capabilities, MountFlags};
pub use ext2family::Ext2FamilyAdapter;
pub use family::FsFamily;
pub use plaindir::PlainDirAdapter;
pub use registry::Registry;
