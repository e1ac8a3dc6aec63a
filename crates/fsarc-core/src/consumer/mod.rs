//! Orchestrates one restore run end to end: `restfs` (one or more saved
//! filesystems, remounted onto freshly formatted destinations) and `restdir`
//! (a flat set of directory trees restored under one destination directory)
//! both run the pipeline in reverse of `producer` — a reader thread pulls
//! framed records off the volume set while a decompression worker pool
//! catches up on data blocks, and the calling thread drains the queue and
//! applies each object to the filesystem.

pub mod apply;

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use filetime::FileTime;
use md5::{Digest, Md5};

use fsarc_attr::AttributeRecord;
use fsarc_codec::{algo_for, CompressAlgo, EncryptAlgo, EncryptionAlgo};
use fsarc_dtyp::{keys as okeys, ArchiveType, FsId, ObjectType, Section, DEFAULT_QUEUE_BLOCKS};
use fsarc_fs::{Adapter, FsFamily, MountFlags, Registry};
use fsarc_queue::{BlockInfo, ItemQueue, ItemStatus, PeekedKind, QueueItem};
use fsarc_wire::{FramedReader, Magic};

use crate::config::{FsDestination, RestoreOptions};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::keys;
use crate::mainhead;
use crate::stats::{ObjectClass, Stats};
use crate::worker::{spawn_workers, WorkerMode};

use apply::{
    apply_standard_attrs, apply_times, create_dir, create_hardlink, create_special,
    create_symlink, dest_path, is_descendant, write_whole_file, PendingDirTime,
};

struct RestoreRun {
    queue: Arc<ItemQueue>,
    stats: Stats,
    worker_handles: Vec<thread::JoinHandle<()>>,
    reader_handle: thread::JoinHandle<(Result<()>, u64)>,
    ctx: Context,
}

impl RestoreRun {
    fn start(archive_path: &Path, options: &RestoreOptions, ctx: &Context) -> Result<(Self, AttributeRecord)> {
        options.validate()?;
        let mut reader = FramedReader::open(archive_path).map_err(Error::Core)?;

        let (magic, _, _) = reader.next_header(false).map_err(Error::Core)?;
        if magic != Magic::VolumeHeader {
            return Err(Error::Fs("archive does not start with a volume header".into()));
        }
        let (magic, _, main_attrs) = reader.next_header(false).map_err(Error::Core)?;
        if magic != Magic::MainHeader {
            return Err(Error::Fs("archive's second record is not the main header".into()));
        }
        mainhead::validate_format(&main_attrs)?;
        mainhead::verify_password(&main_attrs, options.password.as_deref())?;

        let encrypt_raw = main_attrs.get_u32(Section::StdAttr, keys::main::ENCRYPT_ALGO).map_err(Error::Core)?;
        let encrypt_algo = EncryptAlgo::from_u8(encrypt_raw as u8)
            .ok_or_else(|| Error::Fs("unknown encryption algorithm in main header".into()))?;
        let decrypt: Option<Box<dyn EncryptionAlgo>> = match encrypt_algo {
            EncryptAlgo::None => None,
            EncryptAlgo::Blowfish => {
                let pass = options.password.as_deref().ok_or(fsarc_dtyp::Error::Password)?;
                Some(algo_for(EncryptAlgo::Blowfish, pass.as_bytes()).map_err(Error::Core)?)
            }
        };

        let queue = Arc::new(ItemQueue::new(DEFAULT_QUEUE_BLOCKS));
        let worker_handles = spawn_workers(options.worker_count, Arc::clone(&queue), WorkerMode::Decompress, decrypt, ctx.clone());
        let reader_handle = spawn_reader_thread(Arc::clone(&queue), reader, ctx.clone());
        let _ = &mut reader; // reader moved into the thread above

        let run = Self {
            queue,
            stats: Stats::new(),
            worker_handles,
            reader_handle,
            ctx: ctx.clone(),
        };
        Ok((run, main_attrs))
    }

    fn finish(self, drain_result: Result<()>) -> Result<Stats> {
        if drain_result.is_err() {
            self.ctx.abort();
        }
        for handle in self.worker_handles {
            let _ = handle.join();
        }
        let (reader_result, corrupt_count) = self
            .reader_handle
            .join()
            .unwrap_or_else(|_| (Err(Error::Fs("reader thread panicked".into())), 0));
        self.stats.record_corrupt_records(corrupt_count);

        drain_result?;
        reader_result?;
        Ok(self.stats)
    }
}

fn spawn_reader_thread(queue: Arc<ItemQueue>, mut reader: FramedReader, ctx: Context) -> thread::JoinHandle<(Result<()>, u64)> {
    thread::Builder::new()
        .name("fsarc-reader".into())
        .spawn(move || -> (Result<()>, u64) {
            let result = pump_records(&queue, &mut reader, &ctx);
            queue.set_end_of_queue(true);
            (result, reader.corrupt_count())
        })
        .expect("failed to spawn reader thread")
}

/// Reads records off the volume set and feeds them into the queue: headers
/// verbatim, data blocks split into their attribute header and payload
/// bytes. Returns once the final (non-rolling) volume footer is read.
fn pump_records(queue: &ItemQueue, reader: &mut FramedReader, ctx: &Context) -> Result<()> {
    loop {
        if ctx.is_aborted() {
            return Err(Error::Aborted);
        }
        let (magic, fs_id, attrs) = reader.next_header(true).map_err(Error::Core)?;
        match magic {
            Magic::VolumeHeader => continue,
            Magic::VolumeFooter => return Ok(()),
            Magic::BlockHeader => {
                let block = parse_block_header(reader, fs_id, &attrs)?;
                queue.enqueue_block(block, ItemStatus::Todo);
            }
            _ => {
                queue.enqueue_header(attrs, magic, fs_id);
            }
        }
    }
}

fn parse_block_header(reader: &mut FramedReader, fs_id: FsId, attrs: &AttributeRecord) -> Result<BlockInfo> {
    let real_size = attrs.get_u64(Section::StdAttr, keys::blockhead::REAL_SIZE).map_err(Error::Core)?;
    let offset = attrs.get_u64(Section::StdAttr, keys::blockhead::BLOCK_OFFSET).map_err(Error::Core)?;
    let compress_algo = CompressAlgo::from_u8(attrs.get_u32(Section::StdAttr, keys::blockhead::COMPRESS_ALGO).map_err(Error::Core)? as u8)
        .ok_or_else(|| Error::Fs("unknown block compression algorithm".into()))?;
    let encrypt_algo = EncryptAlgo::from_u8(attrs.get_u32(Section::StdAttr, keys::blockhead::ENCRYPT_ALGO).map_err(Error::Core)? as u8)
        .ok_or_else(|| Error::Fs("unknown block encryption algorithm".into()))?;
    let archive_size = attrs.get_u64(Section::StdAttr, keys::blockhead::ARCHIVE_SIZE).map_err(Error::Core)?;
    let archive_checksum = attrs.get_u32(Section::StdAttr, keys::blockhead::ARCHIVE_CHECKSUM).map_err(Error::Core)?;
    let archive_bytes = reader.read_payload(archive_size as usize).map_err(Error::Core)?;

    Ok(BlockInfo {
        fs_id,
        offset,
        real_size,
        data: Vec::new(),
        compress_algo,
        encrypt_algo,
        archive_bytes,
        archive_checksum,
        corrupt: false,
    })
}

/// Pops the next header, failing unless its magic is exactly `expected`.
fn expect_header(queue: &ItemQueue, expected: Magic) -> Result<(AttributeRecord, FsId)> {
    let (attrs, magic, fs_id) = queue.dequeue_header_blocking().map_err(Error::Core)?;
    if magic != expected {
        return Err(Error::Fs(format!("expected a {expected} record, found {magic}")));
    }
    Ok((attrs, fs_id))
}

pub fn restore_directories(archive_path: impl AsRef<Path>, options: &RestoreOptions, ctx: &Context) -> Result<Stats> {
    let (run, main_attrs) = RestoreRun::start(archive_path.as_ref(), options, ctx)?;
    let archive_type = main_attrs.get_u32(Section::StdAttr, keys::main::ARCHIVE_TYPE).map_err(Error::Core)?;
    if archive_type != ArchiveType::Directories as u32 {
        return run.finish(Err(Error::Fs("archive does not contain directory trees".into())));
    }

    let drain_result = (|| -> Result<()> {
        let dest_root = options
            .dest_dir
            .clone()
            .ok_or_else(|| Error::Fs("restdir requires a destination directory".into()))?;
        std::fs::create_dir_all(&dest_root).map_err(Error::Io)?;

        expect_header(&run.queue, Magic::DirsInfo)?;
        drain_objects(&run.queue, &run.stats, &dest_root, &run.ctx)
    })();

    run.finish(drain_result)
}

pub fn restore_filesystems(
    archive_path: impl AsRef<Path>,
    options: &RestoreOptions,
    registry: &Registry,
    ctx: &Context,
) -> Result<Stats> {
    let (run, main_attrs) = RestoreRun::start(archive_path.as_ref(), options, ctx)?;
    let archive_type = main_attrs.get_u32(Section::StdAttr, keys::main::ARCHIVE_TYPE).map_err(Error::Core)?;
    if archive_type != ArchiveType::Filesystems as u32 {
        return run.finish(Err(Error::Fs("archive does not contain filesystems".into())));
    }

    let mut mounted: Vec<(PathBuf, PathBuf, &dyn Adapter)> = Vec::new();
    let drain_result = (|| -> Result<()> {
        loop {
            if run.ctx.is_aborted() {
                return Err(Error::Aborted);
            }
            let entry = match run.queue.dequeue_first() {
                Ok(e) => e,
                Err(fsarc_dtyp::Error::EndOfQueue) => return Ok(()),
                Err(e) => return Err(Error::Core(e)),
            };
            let QueueItem::Header { attrs: fsinfo, magic, .. } = entry.item else {
                return Err(Error::Fs("expected a filesystem-info record".into()));
            };
            if magic != Magic::FsInfo {
                return Err(Error::Fs(format!("expected a FsIn record, found {magic}")));
            }

            let (_, this_fs_id) = expect_header(&run.queue, Magic::FsBegin)?;

            let family_name = fsinfo
                .get_string(Section::StdAttr, keys::fsinfo::FILESYSTEM)
                .ok()
                .map(str::to_owned);
            let dest = options
                .destination_for(this_fs_id.0)
                .ok_or_else(|| Error::Fs(format!("no restfs destination given for filesystem {}", this_fs_id.0)))?;

            let adapter = resolve_adapter(registry, family_name.as_deref(), dest, options)?;
            adapter
                .mkfs(&fsinfo, &dest.dest, dest.mkfs_opts.as_deref(), dest.label.as_deref(), dest.uuid.as_deref())
                .map_err(Error::Core)?;

            let mountpoint = scratch_mountpoint(this_fs_id);
            std::fs::create_dir_all(&mountpoint).map_err(Error::Io)?;
            let flags = MountFlags {
                read_write: true,
                allow_mounted_rw: options.allow_mounted_rw,
                relax_mount_opt_checks: options.relax_mount_opt_checks,
            };
            adapter.mount(&dest.dest, &mountpoint, &fsinfo, flags).map_err(Error::Core)?;
            mounted.push((dest.dest.clone(), mountpoint.clone(), adapter));

            drain_objects(&run.queue, &run.stats, &mountpoint, &run.ctx)?;
        }
    })();

    for (devpath, mountpoint, adapter) in mounted.into_iter().rev() {
        if let Err(e) = adapter.umount(&devpath, &mountpoint) {
            log::error!("failed to unmount {}: {e}", mountpoint.display());
        }
        let _ = std::fs::remove_dir(&mountpoint);
    }

    run.finish(drain_result)
}

fn resolve_adapter<'a>(
    registry: &'a Registry,
    saved_family: Option<&str>,
    dest: &FsDestination,
    options: &RestoreOptions,
) -> Result<&'a dyn Adapter> {
    let family_str = dest
        .mkfs
        .as_deref()
        .or(saved_family)
        .ok_or_else(|| Error::Fs("cannot determine destination filesystem family".into()))?;
    let family = FsFamily::from_str_opt(family_str).ok_or_else(|| Error::Fs(format!("unknown filesystem family {family_str}")))?;
    let adapter = registry.by_family(family).ok_or(Error::NoAdapter(family))?;
    if !adapter.capabilities().stable && !options.experimental_fs {
        return Err(Error::NoAdapter(family));
    }
    Ok(adapter)
}

fn scratch_mountpoint(fs_id: FsId) -> PathBuf {
    std::env::temp_dir().join(format!("fsarc-restore-{}-{}", std::process::id(), fs_id.0))
}

/// Drains and applies every object under one filesystem-info or
/// directories-info section, stopping at the terminating `DaEn` record (or
/// at end-of-queue, which only happens if the stream was truncated).
fn drain_objects(queue: &ItemQueue, stats: &Stats, dest_root: &Path, ctx: &Context) -> Result<()> {
    let mut pending_multi: Vec<AttributeRecord> = Vec::new();
    let mut dir_stack: Vec<PendingDirTime> = Vec::new();

    loop {
        if ctx.is_aborted() {
            return Err(Error::Aborted);
        }
        let entry = match queue.dequeue_first() {
            Ok(e) => e,
            Err(fsarc_dtyp::Error::EndOfQueue) => {
                flush_dir_stack(&mut dir_stack);
                return Ok(());
            }
            Err(e) => return Err(Error::Core(e)),
        };

        match entry.item {
            QueueItem::Header { magic: Magic::DataEnd, .. } => {
                flush_dir_stack(&mut dir_stack);
                return Ok(());
            }
            QueueItem::Header { attrs, magic: Magic::Object, .. } => {
                apply_one_object(queue, stats, dest_root, attrs, &mut pending_multi, &mut dir_stack)?;
            }
            QueueItem::Header { magic, .. } => {
                // Spec's object-stream resync: a record that is neither
                // `ObJt` nor `DaEn` here means something got lost upstream
                // (the producer and reader each keep their own framing
                // intact, so this is either a reader desync or a bug); warn
                // and drop it rather than aborting the whole restore.
                log::warn!("unexpected {magic} record in an object stream, skipping");
            }
            QueueItem::Block(_) => {
                log::warn!("unexpected data block outside a regular file's stream, skipping");
            }
        }
    }
}

fn apply_one_object(
    queue: &ItemQueue,
    stats: &Stats,
    dest_root: &Path,
    attrs: AttributeRecord,
    pending_multi: &mut Vec<AttributeRecord>,
    dir_stack: &mut Vec<PendingDirTime>,
) -> Result<()> {
    let relpath = attrs.get_string(Section::StdAttr, okeys::PATH).map_err(Error::Core)?.to_string();
    let object_type_raw = attrs.get_u32(Section::StdAttr, okeys::OBJECT_TYPE).map_err(Error::Core)?;
    let object_type = ObjectType::from_u32(object_type_raw)
        .ok_or_else(|| Error::Fs(format!("unknown object type {object_type_raw} for {relpath}")))?;

    // Leaving one or more directories: apply deferred times for every
    // ancestor this object is no longer under.
    while let Some(top) = dir_stack.last() {
        if is_descendant(&top.relpath, &relpath) {
            break;
        }
        let top = dir_stack.pop().unwrap();
        if let Err(e) = apply_deferred_dir_time(&top) {
            log::error!("cannot restore directory times for {}: {e}", top.path.display());
        }
    }

    if object_type == ObjectType::RegFileMulti {
        pending_multi.push(attrs);
        if matches!(queue.peek_first(), Some(PeekedKind::Block)) {
            flush_pending_multi(queue, dest_root, pending_multi, stats)?;
        }
        return Ok(());
    }

    let path = dest_path(dest_root, &relpath);
    let class = object_class(object_type);
    let result = apply_single(queue, dest_root, &path, object_type, &attrs, dir_stack, &relpath);
    match &result {
        Ok(()) => stats.record(class, true),
        Err(e) => {
            log::error!("cannot restore {relpath}: {e}");
            stats.record(class, false);
        }
    }
    result
}

fn apply_single(
    queue: &ItemQueue,
    dest_root: &Path,
    path: &Path,
    object_type: ObjectType,
    attrs: &AttributeRecord,
    dir_stack: &mut Vec<PendingDirTime>,
    relpath: &str,
) -> Result<()> {
    match object_type {
        ObjectType::Dir => {
            create_dir(path)?;
            apply_standard_attrs(path, attrs, true)?;
            let atime = FileTime::from_unix_time(attrs.get_u64(Section::StdAttr, okeys::ATIME).map_err(Error::Core)? as i64, 0);
            let mtime = FileTime::from_unix_time(attrs.get_u64(Section::StdAttr, okeys::MTIME).map_err(Error::Core)? as i64, 0);
            dir_stack.push(PendingDirTime {
                path: path.to_path_buf(),
                relpath: relpath.to_string(),
                atime,
                mtime,
            });
            Ok(())
        }
        ObjectType::Symlink => {
            create_symlink(path, attrs)?;
            apply_standard_attrs(path, attrs, false)?;
            apply_times(path, attrs, false)
        }
        ObjectType::Hardlink => create_hardlink(dest_root, path, attrs),
        ObjectType::CharDev | ObjectType::BlockDev | ObjectType::Fifo | ObjectType::Socket => {
            create_special(path, attrs, object_type)?;
            apply_standard_attrs(path, attrs, true)?;
            apply_times(path, attrs, true)
        }
        ObjectType::RegFileUnique => {
            restore_regfile_unique(queue, path, attrs)?;
            apply_standard_attrs(path, attrs, true)?;
            apply_times(path, attrs, true)
        }
        ObjectType::RegFileMulti => unreachable!("handled by apply_one_object before this point"),
    }
}

/// Hashes `len` logical zero bytes without allocating a buffer anywhere
/// near that size: a sparse file's holes read back as zeros, so the
/// producer's whole-file MD5 includes them even though no block carries
/// them on the wire.
fn hash_zero_gap(hasher: &mut Md5, mut len: u64) {
    const CHUNK: usize = 64 * 1024;
    let zeros = [0u8; CHUNK];
    while len > 0 {
        let n = len.min(CHUNK as u64) as usize;
        hasher.update(&zeros[..n]);
        len -= n as u64;
    }
}

/// Streams an object's data blocks straight into its destination file,
/// hashing as it goes, then consumes and checks the optional `FiLf` footer.
/// A sparse source file's all-zero blocks never reach the wire (see
/// `producer::walk::save_regfile_unique`), so a gap between the offset
/// this loop is at and the next block's `offset` is a hole: it's hashed as
/// zeros but never written, and the trailing `set_len` leaves it
/// unallocated rather than zero-filled.
fn restore_regfile_unique(queue: &ItemQueue, path: &Path, attrs: &AttributeRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    let mut file = File::create(path).map_err(Error::Io)?;
    let mut hasher = Md5::new();
    let mut any_corrupt = false;
    let mut pos = 0u64;

    while let Some(PeekedKind::Block) = queue.peek_first() {
        let block = queue.dequeue_block_blocking().map_err(Error::Core)?;
        if block.offset > pos {
            hash_zero_gap(&mut hasher, block.offset - pos);
        }
        if block.corrupt {
            any_corrupt = true;
            log::error!("corrupt data block for {}: writing zeros", path.display());
            let zeros = vec![0u8; block.real_size as usize];
            file.seek(SeekFrom::Start(block.offset)).map_err(Error::Io)?;
            file.write_all(&zeros).map_err(Error::Io)?;
            hasher.update(&zeros);
        } else {
            file.seek(SeekFrom::Start(block.offset)).map_err(Error::Io)?;
            file.write_all(&block.data).map_err(Error::Io)?;
            hasher.update(&block.data);
        }
        pos = block.offset + block.real_size;
    }

    let filesize = attrs.get_u64(Section::StdAttr, okeys::SIZE).unwrap_or(0);
    if filesize > pos {
        hash_zero_gap(&mut hasher, filesize - pos);
    }
    file.set_len(filesize).map_err(Error::Io)?;

    if filesize > 0 && matches!(queue.peek_first(), Some(PeekedKind::Header(Magic::FileFooter))) {
        let (footer, _) = expect_header(queue, Magic::FileFooter)?;
        if let Ok(expected) = footer.get_bytes(Section::StdAttr, okeys::MD5SUM) {
            if hasher.finalize().as_slice() != expected {
                log::error!("MD5 mismatch restoring {}", path.display());
                any_corrupt = true;
            }
        }
    }

    if any_corrupt {
        return Err(Error::Fs(format!("{} restored with corrupt or mismatched data", path.display())));
    }
    Ok(())
}

/// Pulls the shared coalesced block and scatters each pending small file's
/// slice out to its own destination path.
fn flush_pending_multi(queue: &ItemQueue, dest_root: &Path, pending_multi: &mut Vec<AttributeRecord>, stats: &Stats) -> Result<()> {
    let block = queue.dequeue_block_blocking().map_err(Error::Core)?;

    for attrs in pending_multi.drain(..) {
        let relpath = match attrs.get_string(Section::StdAttr, okeys::PATH) {
            Ok(p) => p.to_string(),
            Err(e) => {
                log::error!("coalesced file header missing its path: {e}");
                stats.record(ObjectClass::RegularFile, false);
                continue;
            }
        };
        let path = dest_path(dest_root, &relpath);
        let result = restore_one_coalesced(&block, dest_root, &path, &attrs);
        match result {
            Ok(()) => stats.record(ObjectClass::RegularFile, true),
            Err(e) => {
                log::error!("cannot restore {relpath}: {e}");
                stats.record(ObjectClass::RegularFile, false);
            }
        }
    }
    Ok(())
}

fn restore_one_coalesced(block: &BlockInfo, _dest_root: &Path, path: &Path, attrs: &AttributeRecord) -> Result<()> {
    if block.corrupt {
        return Err(Error::Fs("shared coalesced block is corrupt".into()));
    }
    let offset = attrs.get_u64(Section::StdAttr, okeys::MULTI_OFFSET).map_err(Error::Core)? as usize;
    let size = attrs.get_u64(Section::StdAttr, okeys::SIZE).map_err(Error::Core)? as usize;
    let end = offset
        .checked_add(size)
        .filter(|&e| e <= block.data.len())
        .ok_or_else(|| Error::Fs("coalesced file offset/size overflows the shared block".into()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    let slice = &block.data[offset..end];
    write_whole_file(path, slice)?;

    if let Ok(expected) = attrs.get_bytes(Section::StdAttr, okeys::MD5SUM) {
        let mut hasher = Md5::new();
        hasher.update(slice);
        if hasher.finalize().as_slice() != expected {
            return Err(Error::Fs("MD5 mismatch restoring coalesced file".into()));
        }
    }

    apply_standard_attrs(path, attrs, true)?;
    apply_times(path, attrs, true)
}

fn apply_deferred_dir_time(pending: &PendingDirTime) -> Result<()> {
    filetime::set_file_times(&pending.path, pending.atime, pending.mtime).map_err(Error::Io)
}

fn flush_dir_stack(dir_stack: &mut Vec<PendingDirTime>) {
    while let Some(top) = dir_stack.pop() {
        if let Err(e) = apply_deferred_dir_time(&top) {
            log::error!("cannot restore directory times for {}: {e}", top.path.display());
        }
    }
}

fn object_class(object_type: ObjectType) -> ObjectClass {
    match object_type {
        ObjectType::Dir => ObjectClass::Directory,
        ObjectType::Symlink => ObjectClass::Symlink,
        ObjectType::Hardlink => ObjectClass::Hardlink,
        ObjectType::CharDev | ObjectType::BlockDev | ObjectType::Fifo | ObjectType::Socket => ObjectClass::Special,
        ObjectType::RegFileUnique | ObjectType::RegFileMulti => ObjectClass::RegularFile,
    }
}
