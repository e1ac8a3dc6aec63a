//! Run-wide state shared between the producer, the worker pool and the
//! writer/consumer threads: the abort flag a `ctrlc` handler flips, and the
//! archive id/wire format pinned for the duration of one run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fsarc_dtyp::ArchiveId;
use fsarc_wire::WireFormat;

/// Cloned into every thread of a run. Checked between items, never inside a
/// tight loop body, so abort latency is bounded by one item's processing
/// time rather than instant.
#[derive(Clone)]
pub struct Context {
    archive_id: ArchiveId,
    format: WireFormat,
    abort: Arc<AtomicBool>,
}

impl Context {
    pub fn new(archive_id: ArchiveId, format: WireFormat) -> Self {
        Self {
            archive_id,
            format,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn archive_id(&self) -> ArchiveId {
        self.archive_id
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// Handle to wire into a `ctrlc::set_handler` closure without moving the
    /// whole `Context` across the signal boundary.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }
}
