//! Thread-safe bounded FIFO connecting the scanning/restore thread, the
//! compression worker pool, and the single writer/reader thread.
//!
//! Headers are born [`ItemStatus::Done`] (there's nothing to transform);
//! data blocks are born [`ItemStatus::Todo`] and a worker flips them to
//! `Done` once it has compressed/decompressed them in place. The drain
//! thread always consumes in enqueue order: it blocks until the *head* of
//! the queue is `Done`, regardless of which later items workers finish
//! first.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use fsarc_attr::AttributeRecord;
use fsarc_dtyp::{Error, FsId};
use fsarc_wire::Magic;

use crate::item::{BlockInfo, ItemStatus, QueueEntry, QueueItem};

/// What [`ItemQueue::peek_first`] reports about the head item, without
/// removing it.
#[derive(Debug, Clone, Copy)]
pub enum PeekedKind {
    Header(Magic),
    Block,
}

struct State {
    items: VecDeque<QueueEntry>,
    next_item_num: u64,
    end_of_queue: bool,
    block_count: usize,
}

/// A bounded FIFO of [`QueueEntry`] items. Capacity is expressed in data
/// blocks only; headers never count against it since they're small and
/// infrequent relative to block traffic.
pub struct ItemQueue {
    state: Mutex<State>,
    cv: Condvar,
    capacity_blocks: usize,
}

impl ItemQueue {
    pub fn new(capacity_blocks: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                next_item_num: 0,
                end_of_queue: false,
                block_count: 0,
            }),
            cv: Condvar::new(),
            capacity_blocks,
        }
    }

    /// Appends a header, already `Done`, and wakes any waiter.
    pub fn enqueue_header(&self, attrs: AttributeRecord, magic: Magic, fs_id: FsId) -> u64 {
        let mut state = self.state.lock().unwrap();
        let item_num = state.next_item_num;
        state.next_item_num += 1;
        state.items.push_back(QueueEntry {
            item_num,
            status: ItemStatus::Done,
            item: QueueItem::Header { attrs, magic, fs_id },
        });
        self.cv.notify_all();
        item_num
    }

    /// Appends a data block with the given initial status, blocking while
    /// the queue already holds `capacity` blocks.
    pub fn enqueue_block(&self, block: BlockInfo, status: ItemStatus) -> u64 {
        let mut state = self.state.lock().unwrap();
        while state.block_count >= self.capacity_blocks {
            state = self.cv.wait(state).unwrap();
        }
        let item_num = state.next_item_num;
        state.next_item_num += 1;
        state.block_count += 1;
        state.items.push_back(QueueEntry {
            item_num,
            status,
            item: QueueItem::Block(block),
        });
        self.cv.notify_all();
        item_num
    }

    /// Blocks until the head item is `Done`, or returns
    /// [`Error::EndOfQueue`] once the producer has signalled end-of-queue
    /// and the queue has drained empty.
    fn wait_for_head_done<'a>(&'a self, mut state: MutexGuard<'a, State>) -> Result<MutexGuard<'a, State>, Error> {
        loop {
            match state.items.front() {
                Some(entry) if entry.status == ItemStatus::Done => return Ok(state),
                Some(_) => state = self.cv.wait(state).unwrap(),
                None if state.end_of_queue => return Err(Error::EndOfQueue),
                None => state = self.cv.wait(state).unwrap(),
            }
        }
    }

    /// Pops and returns the head item once it is `Done`, whatever its
    /// kind. Used by readers that don't care (archinfo) or that dispatch
    /// on the returned item themselves.
    pub fn dequeue_first(&self) -> Result<QueueEntry, Error> {
        let state = self.state.lock().unwrap();
        let mut state = self.wait_for_head_done(state)?;
        let entry = state.items.pop_front().expect("checked Some above");
        if entry.item.is_block() {
            state.block_count -= 1;
        }
        self.cv.notify_all();
        Ok(entry)
    }

    /// Waits until the head item is ready, and if it's a header, pops and
    /// returns it. If the ready head is a block instead, the item is left
    /// in place and an error is returned — the caller decides whether to
    /// [`Self::destroy_first_item`] it (this is how resync skips garbage).
    pub fn dequeue_header_blocking(&self) -> Result<(AttributeRecord, Magic, FsId), Error> {
        let state = self.state.lock().unwrap();
        let mut state = self.wait_for_head_done(state)?;
        match &state.items.front().unwrap().item {
            QueueItem::Header { .. } => {
                let entry = state.items.pop_front().unwrap();
                self.cv.notify_all();
                match entry.item {
                    QueueItem::Header { attrs, magic, fs_id } => Ok((attrs, magic, fs_id)),
                    QueueItem::Block(_) => unreachable!(),
                }
            }
            QueueItem::Block(_) => Err(Error::InvalidArg(
                "head of queue is a data block, not a header".into(),
            )),
        }
    }

    /// Symmetric to [`Self::dequeue_header_blocking`] for data blocks.
    pub fn dequeue_block_blocking(&self) -> Result<BlockInfo, Error> {
        let state = self.state.lock().unwrap();
        let mut state = self.wait_for_head_done(state)?;
        match &state.items.front().unwrap().item {
            QueueItem::Block(_) => {
                let entry = state.items.pop_front().unwrap();
                state.block_count -= 1;
                self.cv.notify_all();
                match entry.item {
                    QueueItem::Block(b) => Ok(b),
                    QueueItem::Header { .. } => unreachable!(),
                }
            }
            QueueItem::Header { .. } => Err(Error::InvalidArg(
                "head of queue is a header, not a data block".into(),
            )),
        }
    }

    /// Inspects the head item without removing it. Returns `None` if the
    /// queue is currently empty.
    pub fn peek_first(&self) -> Option<PeekedKind> {
        let state = self.state.lock().unwrap();
        match &state.items.front()?.item {
            QueueItem::Header { magic, .. } => Some(PeekedKind::Header(*magic)),
            QueueItem::Block(_) => Some(PeekedKind::Block),
        }
    }

    /// Pops the head item regardless of its status. Used for error
    /// teardown and, during resync, to discard a record that turned out
    /// to be the wrong kind.
    pub fn destroy_first_item(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.items.pop_front() {
            if entry.item.is_block() {
                state.block_count -= 1;
            }
            self.cv.notify_all();
        }
    }

    /// Scans for the earliest `Todo` block, atomically marks it
    /// `InProgress`, and hands a copy to the caller. Returns `None` if no
    /// `Todo` block is present yet; the worker is expected to sleep
    /// briefly and retry.
    pub fn find_first_block_todo(&self) -> Option<(u64, BlockInfo)> {
        let mut state = self.state.lock().unwrap();
        for entry in state.items.iter_mut() {
            if entry.status == ItemStatus::Todo {
                if let QueueItem::Block(block) = &entry.item {
                    let item_num = entry.item_num;
                    let block = block.clone();
                    entry.status = ItemStatus::InProgress;
                    return Some((item_num, block));
                }
            }
        }
        None
    }

    /// A worker puts transformed bytes back. Only permitted while the item
    /// is still `InProgress` and `item_num` matches (guards against a
    /// stale handle from a queue that has moved on).
    pub fn replace_block(&self, item_num: u64, block: BlockInfo, new_status: ItemStatus) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .items
            .iter_mut()
            .find(|e| e.item_num == item_num)
            .ok_or_else(|| Error::InvalidArg(format!("no queue item with item_num {item_num}")))?;
        if entry.status != ItemStatus::InProgress {
            return Err(Error::InvalidArg(format!(
                "item {item_num} is not in progress (status is {:?})",
                entry.status
            )));
        }
        entry.item = QueueItem::Block(block);
        entry.status = new_status;
        drop(state);
        self.cv.notify_all();
        Ok(())
    }

    pub fn set_end_of_queue(&self, flag: bool) {
        let mut state = self.state.lock().unwrap();
        state.end_of_queue = flag;
        self.cv.notify_all();
    }

    pub fn get_end_of_queue(&self) -> bool {
        self.state.lock().unwrap().end_of_queue
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn count_todo(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .items
            .iter()
            .filter(|e| e.status == ItemStatus::Todo)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsarc_codec::{CompressAlgo, EncryptAlgo};

    fn sample_block(offset: u64) -> BlockInfo {
        BlockInfo {
            fs_id: FsId::from(0),
            offset,
            real_size: 4,
            data: vec![1, 2, 3, 4],
            compress_algo: CompressAlgo::None,
            encrypt_algo: EncryptAlgo::None,
            archive_bytes: vec![1, 2, 3, 4],
            archive_checksum: 0,
            corrupt: false,
        }
    }

    #[test]
    fn headers_and_blocks_drain_in_enqueue_order() {
        let q = ItemQueue::new(8);
        q.enqueue_header(AttributeRecord::new(), Magic::Object, FsId::from(0));
        q.enqueue_block(sample_block(0), ItemStatus::Done);
        q.enqueue_header(AttributeRecord::new(), Magic::DataEnd, FsId::from(0));

        let first = q.dequeue_first().unwrap();
        assert!(matches!(first.item, QueueItem::Header { magic: Magic::Object, .. }));
        let second = q.dequeue_first().unwrap();
        assert!(second.item.is_block());
        let third = q.dequeue_first().unwrap();
        assert!(matches!(third.item, QueueItem::Header { magic: Magic::DataEnd, .. }));
    }

    #[test]
    fn dequeue_first_blocks_on_a_todo_block_at_the_head() {
        let q = ItemQueue::new(8);
        let item_num = q.enqueue_block(sample_block(0), ItemStatus::Todo);
        q.enqueue_header(AttributeRecord::new(), Magic::DataEnd, FsId::from(0));

        assert_eq!(q.count(), 2);
        let (found_num, mut block) = q.find_first_block_todo().unwrap();
        assert_eq!(found_num, item_num);
        block.archive_bytes = vec![9, 9];
        q.replace_block(item_num, block, ItemStatus::Done).unwrap();

        let first = q.dequeue_first().unwrap();
        assert!(first.item.is_block());
    }

    #[test]
    fn end_of_queue_surfaces_once_drained() {
        let q = ItemQueue::new(8);
        q.enqueue_header(AttributeRecord::new(), Magic::DataEnd, FsId::from(0));
        q.set_end_of_queue(true);
        q.dequeue_first().unwrap();
        let err = q.dequeue_first().unwrap_err();
        assert!(matches!(err, Error::EndOfQueue));
    }

    #[test]
    fn dequeue_header_blocking_rejects_a_block_head_without_removing_it() {
        let q = ItemQueue::new(8);
        q.enqueue_block(sample_block(0), ItemStatus::Done);
        let err = q.dequeue_header_blocking().unwrap_err();
        assert!(matches!(err, Error::InvalidArg(_)));
        assert_eq!(q.count(), 1);
        q.destroy_first_item();
        assert_eq!(q.count(), 0);
    }

    #[test]
    fn capacity_blocks_further_block_enqueues() {
        use std::sync::Arc;
        use std::thread;
        use std::time::Duration;

        let q = Arc::new(ItemQueue::new(1));
        q.enqueue_block(sample_block(0), ItemStatus::Done);

        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || {
            q2.enqueue_block(sample_block(1), ItemStatus::Done);
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(q.count(), 1, "second enqueue should still be blocked");

        q.dequeue_first().unwrap();
        handle.join().unwrap();
        assert_eq!(q.count(), 1);
    }
}
