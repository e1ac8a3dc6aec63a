//! Batches small files into one shared data block instead of enqueuing a
//! dedicated block per file.

use fsarc_attr::AttributeRecord;
use fsarc_dtyp::{FsId, Section, keys};
use fsarc_wire::Magic;

use crate::item::{BlockInfo, ItemStatus};
use crate::queue::ItemQueue;
use fsarc_codec::{CompressAlgo, EncryptAlgo};

/// Accumulates small-file headers and their bytes until either limit would
/// be exceeded, then flushes them as a batch of headers followed by one
/// shared data block.
pub struct Coalescer {
    max_items: usize,
    max_bytes: usize,
    pending_headers: Vec<AttributeRecord>,
    buffer: Vec<u8>,
}

impl Coalescer {
    pub fn new(max_items: usize, max_bytes: usize) -> Self {
        Self {
            max_items,
            max_bytes,
            pending_headers: Vec::new(),
            buffer: Vec::new(),
        }
    }

    /// `true` iff a file of `size` bytes can be added without exceeding
    /// either limit.
    pub fn can_fit(&self, size: usize) -> bool {
        self.pending_headers.len() < self.max_items && self.buffer.len() + size <= self.max_bytes
    }

    /// Appends one small file's header and bytes. The header's
    /// `STDATTR`/`MULTI_OFFSET` key is set to the buffer's used size
    /// before the bytes are appended; `MULTI_COUNT` is filled in for every
    /// pending header at [`Self::flush`] time, once the final count is
    /// known.
    pub fn add(&mut self, mut header: AttributeRecord, bytes: &[u8]) {
        let offset = self.buffer.len() as u64;
        header
            .add_u64(Section::StdAttr, keys::MULTI_OFFSET, offset)
            .expect("coalescer headers never set MULTI_OFFSET twice");
        self.buffer.extend_from_slice(bytes);
        self.pending_headers.push(header);
    }

    pub fn is_empty(&self) -> bool {
        self.pending_headers.is_empty()
    }

    /// Enqueues every pending header in order, then one data block
    /// carrying the concatenated payload, and resets state. A no-op if
    /// nothing is pending.
    pub fn flush(&mut self, queue: &ItemQueue, fs_id: FsId) {
        if self.pending_headers.is_empty() {
            return;
        }
        let count = self.pending_headers.len() as u64;
        for mut header in self.pending_headers.drain(..) {
            header
                .add_u64(Section::StdAttr, keys::MULTI_COUNT, count)
                .expect("coalescer headers never set MULTI_COUNT twice");
            queue.enqueue_header(header, Magic::Object, fs_id);
        }

        let real_size = self.buffer.len() as u64;
        let block = BlockInfo {
            fs_id,
            offset: 0,
            real_size,
            data: std::mem::take(&mut self.buffer),
            compress_algo: CompressAlgo::None,
            encrypt_algo: EncryptAlgo::None,
            archive_bytes: Vec::new(),
            archive_checksum: 0,
            corrupt: false,
        };
        queue.enqueue_block(block, ItemStatus::Todo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with_size(size: usize) -> AttributeRecord {
        let mut attrs = AttributeRecord::new();
        attrs.add_u64(Section::StdAttr, keys::SIZE, size as u64).unwrap();
        attrs
    }

    #[test]
    fn fits_until_either_limit_is_exceeded() {
        let c = Coalescer::new(2, 100);
        assert!(c.can_fit(50));
        assert!(!c.can_fit(101));
    }

    #[test]
    fn item_count_limit_is_enforced() {
        let mut c = Coalescer::new(1, 1_000_000);
        assert!(c.can_fit(10));
        c.add(header_with_size(10), &[0u8; 10]);
        assert!(!c.can_fit(1));
    }

    #[test]
    fn flush_enqueues_headers_then_one_shared_block() {
        let queue = ItemQueue::new(8);
        let mut c = Coalescer::new(512, 900_000);
        c.add(header_with_size(3), &[1, 2, 3]);
        c.add(header_with_size(2), &[4, 5]);
        c.flush(&queue, FsId::from(0));

        assert_eq!(queue.count(), 3);
        let h1 = queue.dequeue_first().unwrap();
        let h1_attrs = match h1.item {
            crate::item::QueueItem::Header { attrs, .. } => attrs,
            _ => panic!("expected header"),
        };
        assert_eq!(h1_attrs.get_u64(Section::StdAttr, keys::MULTI_OFFSET).unwrap(), 0);
        assert_eq!(h1_attrs.get_u64(Section::StdAttr, keys::MULTI_COUNT).unwrap(), 2);

        let h2 = queue.dequeue_first().unwrap();
        let h2_attrs = match h2.item {
            crate::item::QueueItem::Header { attrs, .. } => attrs,
            _ => panic!("expected header"),
        };
        assert_eq!(h2_attrs.get_u64(Section::StdAttr, keys::MULTI_OFFSET).unwrap(), 3);

        let block = queue.dequeue_first().unwrap();
        match block.item {
            crate::item::QueueItem::Block(b) => assert_eq!(b.data, vec![1, 2, 3, 4, 5]),
            _ => panic!("expected block"),
        }
        assert!(c.is_empty());
    }
}
