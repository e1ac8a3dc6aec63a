//! The compression/decompression worker pool: a fixed number of OS
//! threads, each looping `find_first_block_todo` -> transform ->
//! `replace_block`, sleeping briefly when nothing is ready rather than
//! spinning the CPU.
//!
//! Whether a worker compresses or decompresses is a property of the run
//! ([`WorkerMode`]), not of an individual block: a save run's workers all
//! compress, a restore run's workers all decompress.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fsarc_codec::{codec_for, decode_block, encode_block, CompressAlgo, EncryptAlgo, EncryptionAlgo};
use fsarc_queue::{ItemQueue, ItemStatus};

use crate::context::Context;

/// How long a worker sleeps after finding no `Todo` block, before retrying.
/// A short poll is used rather than a pure wake channel because a block
/// can become ready by the *queue* draining (capacity freed by the writer
/// thread), not just by a fresh enqueue.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WorkerMode {
    Compress { algo: CompressAlgo, level: u8 },
    Decompress,
}

/// Spawns `count` worker threads against `queue`, returning their join
/// handles. `encrypt` is `None` when the archive isn't encrypted.
pub fn spawn_workers(
    count: usize,
    queue: Arc<ItemQueue>,
    mode: WorkerMode,
    encrypt: Option<Box<dyn EncryptionAlgo>>,
    ctx: Context,
) -> Vec<thread::JoinHandle<()>> {
    let encrypt: Option<Arc<dyn EncryptionAlgo>> = encrypt.map(Arc::from);
    (0..count)
        .map(|idx| {
            let queue = Arc::clone(&queue);
            let encrypt = encrypt.clone();
            let ctx = ctx.clone();
            thread::Builder::new()
                .name(format!("fsarc-worker-{idx}"))
                .spawn(move || worker_loop(&queue, mode, encrypt.as_deref(), &ctx))
                .expect("failed to spawn worker thread")
        })
        .collect()
}

fn worker_loop(queue: &ItemQueue, mode: WorkerMode, encrypt: Option<&dyn EncryptionAlgo>, ctx: &Context) {
    loop {
        if ctx.is_aborted() {
            return;
        }
        let Some((item_num, mut block)) = queue.find_first_block_todo() else {
            if queue.get_end_of_queue() && queue.count_todo() == 0 {
                return;
            }
            thread::sleep(POLL_INTERVAL);
            continue;
        };

        match mode {
            WorkerMode::Compress { algo, level } => {
                let codec = match codec_for(algo) {
                    Ok(c) => c,
                    Err(e) => {
                        log::error!("block {item_num}: no codec for {algo:?}: {e}");
                        block.corrupt = true;
                        let _ = queue.replace_block(item_num, block, ItemStatus::Done);
                        continue;
                    }
                };
                let raw = std::mem::take(&mut block.data);
                match encode_block(&raw, codec.as_ref(), level, encrypt) {
                    Ok(encoded) => {
                        block.compress_algo = encoded.compress_algo;
                        block.encrypt_algo = encoded.encrypt_algo;
                        block.archive_bytes = encoded.archive_bytes;
                        block.archive_checksum = encoded.archive_checksum;
                        block.corrupt = false;
                    }
                    Err(e) => {
                        log::error!("block {item_num}: compression failed: {e}");
                        block.corrupt = true;
                    }
                }
            }
            WorkerMode::Decompress => {
                let archive_bytes = std::mem::take(&mut block.archive_bytes);
                match decode_block(
                    &archive_bytes,
                    block.archive_checksum,
                    block.compress_algo,
                    block.encrypt_algo,
                    encrypt,
                ) {
                    Ok(decoded) => {
                        block.data = decoded.data;
                        block.corrupt = decoded.corrupt;
                    }
                    Err(e) => {
                        log::error!("block {item_num}: decompression failed: {e}");
                        block.data.clear();
                        block.corrupt = true;
                    }
                }
                block.archive_bytes = archive_bytes;
            }
        }

        if let Err(e) = queue.replace_block(item_num, block, ItemStatus::Done) {
            log::error!("block {item_num}: failed to put back into queue: {e}");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fsarc_dtyp::{ArchiveId, FsId};
    use fsarc_queue::{BlockInfo, ItemStatus};
    use fsarc_wire::WireFormat;

    use super::*;

    fn todo_block(data: Vec<u8>) -> BlockInfo {
        BlockInfo {
            fs_id: FsId::NULL,
            offset: 0,
            real_size: data.len() as u64,
            data,
            compress_algo: CompressAlgo::None,
            encrypt_algo: EncryptAlgo::None,
            archive_bytes: Vec::new(),
            archive_checksum: 0,
            corrupt: false,
        }
    }

    #[test]
    fn compress_then_decompress_round_trips_through_two_pools() {
        let queue = Arc::new(ItemQueue::new(8));
        let payload = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec();
        queue.enqueue_block(todo_block(payload.clone()), ItemStatus::Todo);
        queue.set_end_of_queue(true);

        let ctx = Context::new(ArchiveId::generate(), WireFormat::V2);
        let handles = spawn_workers(
            2,
            Arc::clone(&queue),
            WorkerMode::Compress {
                algo: CompressAlgo::Gzip,
                level: 6,
            },
            None,
            ctx,
        );
        for h in handles {
            h.join().unwrap();
        }

        let entry = queue.dequeue_first().unwrap();
        let compressed = entry.item.as_block().unwrap().clone();
        assert!(!compressed.corrupt);
        assert_eq!(compressed.compress_algo, CompressAlgo::Gzip);

        let queue2 = Arc::new(ItemQueue::new(8));
        queue2.enqueue_block(compressed, ItemStatus::Todo);
        queue2.set_end_of_queue(true);
        let ctx2 = Context::new(ArchiveId::generate(), WireFormat::V2);
        let handles = spawn_workers(1, Arc::clone(&queue2), WorkerMode::Decompress, None, ctx2);
        for h in handles {
            h.join().unwrap();
        }
        let entry2 = queue2.dequeue_first().unwrap();
        let decoded = entry2.item.as_block().unwrap();
        assert!(!decoded.corrupt);
        assert_eq!(decoded.data, payload);
    }

    #[test]
    fn pool_exits_once_queue_is_empty_and_ended() {
        let queue = Arc::new(ItemQueue::new(4));
        queue.set_end_of_queue(true);
        let ctx = Context::new(ArchiveId::generate(), WireFormat::V2);
        let handles = spawn_workers(
            3,
            Arc::clone(&queue),
            WorkerMode::Compress {
                algo: CompressAlgo::None,
                level: 1,
            },
            None,
            ctx,
        );
        for h in handles {
            h.join().unwrap();
        }
    }
}
