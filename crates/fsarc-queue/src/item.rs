//! The tagged item that flows through the queue: either a header record or
//! a data block.

use fsarc_attr::AttributeRecord;
use fsarc_codec::{CompressAlgo, EncryptAlgo};
use fsarc_dtyp::FsId;
use fsarc_wire::Magic;

/// Lifecycle of one queue item. Headers are born `Done`; blocks are born
/// `Todo` and transition to `Done` once a worker has transformed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Todo,
    InProgress,
    Done,
}

/// One data block, in whichever state its bytes currently are: `data` is
/// the real (decompressed, decrypted) bytes before a save-side worker runs
/// or after a restore-side worker has run; `archive_bytes` is what's
/// actually read from / written to disk.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub fs_id: FsId,
    pub offset: u64,
    pub real_size: u64,
    pub data: Vec<u8>,
    pub compress_algo: CompressAlgo,
    pub encrypt_algo: EncryptAlgo,
    pub archive_bytes: Vec<u8>,
    pub archive_checksum: u32,
    /// Set by a restore-side decompression worker when the block fails its
    /// checksum; the consumer counts an error and skips this block's data
    /// rather than trusting it.
    pub corrupt: bool,
}

impl BlockInfo {
    pub fn archive_size(&self) -> u64 {
        self.archive_bytes.len() as u64
    }
}

/// Either a header (dico + magic + fs_id) or a data block.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Header {
        attrs: AttributeRecord,
        magic: Magic,
        fs_id: FsId,
    },
    Block(BlockInfo),
}

impl QueueItem {
    pub fn is_block(&self) -> bool {
        matches!(self, QueueItem::Block(_))
    }

    pub fn as_block(&self) -> Option<&BlockInfo> {
        match self {
            QueueItem::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut BlockInfo> {
        match self {
            QueueItem::Block(b) => Some(b),
            _ => None,
        }
    }
}

/// One slot in the queue: the item, its status and its monotonic enqueue
/// sequence number.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub item_num: u64,
    pub status: ItemStatus,
    pub item: QueueItem,
}
