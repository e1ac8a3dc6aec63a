//! The bounded producer/consumer queue that connects a filesystem walk (or
//! restore pass) to the compression worker pool and the single writer/
//! reader thread, plus the two pieces of per-run bookkeeping that ride
//! alongside it: the hardlink map and the small-file coalescer.

pub mod coalescer;
pub mod hardlink;
pub mod item;
pub mod queue;

pub use coalescer::Coalescer;
pub use hardlink::{HardlinkMap, InodeKey};
pub use item::{BlockInfo, ItemStatus, QueueEntry, QueueItem};
pub use queue::{ItemQueue, PeekedKind};
