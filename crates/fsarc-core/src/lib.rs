//! The archive pipeline: producer/consumer, the compression worker pool,
//! main-header framing, and read-only archive inspection, wired together
//! into the entry points a CLI calls directly.

pub mod archinfo;
pub mod config;
pub mod consumer;
pub mod context;
pub mod error;
pub mod keys;
pub mod mainhead;
pub mod producer;
pub mod stats;
pub mod worker;

pub use config::{ExcludePattern, FsDestination, RestoreOptions, SaveOptions};
pub use context::Context;
pub use error::{Error, Result};
pub use producer::{save_directories, save_filesystems};
pub use consumer::{restore_directories, restore_filesystems};
pub use stats::{ObjectClass, Stats};
