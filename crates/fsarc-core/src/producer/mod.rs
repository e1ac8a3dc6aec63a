//! Orchestrates one save run end to end: `savefs` (one or more mounted
//! block devices) and `savedir` (a flat set of directory trees) both build
//! on the same pipeline — a main header, then per-source headers and a
//! tree walk, with the compression worker pool and the framed writer each
//! running on their own thread while the walk itself runs on the caller's.
//! One compression thread pool and one writer thread are shared across the
//! whole run; a fresh hardlink map and small-file coalescer are kept per
//! top-level source.

pub mod object;
pub mod walk;

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use fsarc_attr::AttributeRecord;
use fsarc_codec::{algo_for, preset_for_level, EncryptAlgo, EncryptionAlgo};
use fsarc_dtyp::{ArchiveId, ArchiveType, FsId, Section, DEFAULT_QUEUE_BLOCKS, MAX_SMALL_COUNT, PER_FILE_FIXED_COST, SMALL_FILE_THRESHOLD};
use fsarc_fs::{Adapter, MountFlags, Registry};
use fsarc_queue::{Coalescer, HardlinkMap, ItemQueue, QueueItem};
use fsarc_wire::{FramedWriter, Magic};

use crate::config::SaveOptions;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::keys;
use crate::mainhead::{self, MainHeadInfo};
use crate::producer::walk::{walk_directory, WalkCtx};
use crate::stats::Stats;
use crate::worker::{spawn_workers, WorkerMode};

/// The shared half of a run: the queue, the worker pool and writer thread
/// already spawned, the main header already enqueued. Built once per run by
/// [`SaveRun::start`] and torn down by [`SaveRun::finish`].
struct SaveRun {
    queue: Arc<ItemQueue>,
    stats: Stats,
    worker_handles: Vec<thread::JoinHandle<()>>,
    writer_handle: thread::JoinHandle<Result<()>>,
    ctx: Context,
}

impl SaveRun {
    fn start(
        archive_path: &Path,
        options: &SaveOptions,
        ctx: &Context,
        archive_type: ArchiveType,
        fs_count: Option<u64>,
    ) -> Result<(Self, usize)> {
        options.validate()?;
        let preset = preset_for_level(options.compression_level)?;
        let writer = FramedWriter::create(archive_path, ctx.archive_id(), options.split_size, options.overwrite)?;
        let queue = Arc::new(ItemQueue::new(DEFAULT_QUEUE_BLOCKS));

        let encrypt_algo = if options.password.is_some() {
            EncryptAlgo::Blowfish
        } else {
            EncryptAlgo::None
        };
        let encrypt_for_workers: Option<Box<dyn EncryptionAlgo>> = match &options.password {
            Some(pass) => Some(algo_for(encrypt_algo, pass.as_bytes())?),
            None => None,
        };

        let creation_time = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let main_info = MainHeadInfo {
            archive_id: ctx.archive_id(),
            creation_time,
            label: options.label.clone(),
            archive_type,
            compress_algo: preset.algo,
            compress_level: preset.algo_level as u32,
            encrypt_algo,
            fsa_comp_level: options.compression_level as u32,
            fs_count,
        };
        let main_header = mainhead::build_main_header(&main_info, options.password.as_deref())?;
        queue.enqueue_header(main_header, Magic::MainHeader, FsId::NULL);

        let worker_handles = spawn_workers(
            options.worker_count,
            Arc::clone(&queue),
            WorkerMode::Compress {
                algo: preset.algo,
                level: preset.algo_level,
            },
            encrypt_for_workers,
            ctx.clone(),
        );
        let writer_handle = spawn_writer_thread(Arc::clone(&queue), writer, ctx.clone());

        let run = Self {
            queue,
            stats: Stats::new(),
            worker_handles,
            writer_handle,
            ctx: ctx.clone(),
        };
        Ok((run, preset.preferred_block_size))
    }

    /// Signals end-of-queue, joins the worker pool and the writer thread,
    /// and surfaces whichever of the walk's own result or the writer's
    /// result failed first. A failed walk aborts the run so the writer
    /// thread deletes its volumes instead of finishing a truncated archive.
    fn finish(self, walk_result: Result<()>) -> Result<Stats> {
        if walk_result.is_err() {
            self.ctx.abort();
        }
        self.queue.set_end_of_queue(true);
        for handle in self.worker_handles {
            let _ = handle.join();
        }
        let writer_result = self
            .writer_handle
            .join()
            .unwrap_or_else(|_| Err(Error::Fs("writer thread panicked".into())));

        walk_result?;
        writer_result?;
        Ok(self.stats)
    }
}

/// The single I/O thread: drains the queue in enqueue order, turning
/// headers into `append_header` calls and blocks into `append_block` calls
/// (after rebuilding the `BlKh` header from the block's fields), until the
/// queue reports end-of-queue.
fn spawn_writer_thread(queue: Arc<ItemQueue>, mut writer: FramedWriter, ctx: Context) -> thread::JoinHandle<Result<()>> {
    thread::Builder::new()
        .name("fsarc-writer".into())
        .spawn(move || -> Result<()> {
            loop {
                match queue.dequeue_first() {
                    Ok(entry) => match entry.item {
                        QueueItem::Header { attrs, magic, fs_id } => {
                            writer.append_header(magic, fs_id, &attrs)?;
                        }
                        QueueItem::Block(block) => {
                            let blockhead = build_blockhead_attrs(&block)?;
                            writer.append_block(block.fs_id, &blockhead, &block.archive_bytes)?;
                        }
                    },
                    Err(fsarc_dtyp::Error::EndOfQueue) => break,
                    Err(e) => return Err(Error::Core(e)),
                }
            }
            if ctx.is_aborted() {
                writer.delete_created_volumes()?;
            } else {
                writer.finish()?;
            }
            Ok(())
        })
        .expect("failed to spawn writer thread")
}

fn build_blockhead_attrs(block: &fsarc_queue::BlockInfo) -> Result<AttributeRecord> {
    let mut d = AttributeRecord::new();
    d.add_u64(Section::StdAttr, keys::blockhead::REAL_SIZE, block.real_size)?;
    d.add_u64(Section::StdAttr, keys::blockhead::BLOCK_OFFSET, block.offset)?;
    d.add_u32(Section::StdAttr, keys::blockhead::COMPRESS_ALGO, block.compress_algo as u32)?;
    d.add_u32(Section::StdAttr, keys::blockhead::ENCRYPT_ALGO, block.encrypt_algo as u32)?;
    d.add_u64(Section::StdAttr, keys::blockhead::ARCHIVE_SIZE, block.archive_size())?;
    d.add_u32(Section::StdAttr, keys::blockhead::ARCHIVE_CHECKSUM, block.archive_checksum)?;
    Ok(d)
}

/// Archives one or more whole filesystems: mounts each device read-only,
/// emits its `FsIn`/`FsYs` pair, walks it, emits `DaEn`, and unmounts in
/// reverse order whether the run succeeded or not.
pub fn save_filesystems(
    archive_path: impl AsRef<Path>,
    devices: &[PathBuf],
    options: &SaveOptions,
    registry: &Registry,
    ctx: &Context,
) -> Result<Stats> {
    let (run, block_size) = SaveRun::start(archive_path.as_ref(), options, ctx, ArchiveType::Filesystems, Some(devices.len() as u64))?;

    let mut mounted: Vec<(PathBuf, PathBuf, &dyn Adapter)> = Vec::new();
    let walk_result = (|| -> Result<()> {
        for (idx, devpath) in devices.iter().enumerate() {
            if ctx.is_aborted() {
                return Err(Error::Aborted);
            }

            let adapter = registry
                .probe(devpath)
                .ok_or_else(|| Error::Fs(format!("no filesystem recognized on {}", devpath.display())))?;
            if !adapter.capabilities().stable && !options.experimental_fs {
                return Err(Error::NoAdapter(adapter.family()));
            }

            let mountpoint = scratch_mountpoint(ctx.archive_id(), idx);
            fs::create_dir_all(&mountpoint).map_err(Error::Io)?;
            let flags = MountFlags {
                read_write: false,
                allow_mounted_rw: options.allow_mounted_rw,
                relax_mount_opt_checks: options.relax_mount_opt_checks,
            };
            adapter.mount(devpath, &mountpoint, &AttributeRecord::new(), flags)?;
            mounted.push((devpath.clone(), mountpoint.clone(), adapter));

            let mut fsinfo = AttributeRecord::new();
            fsinfo.add_string(Section::StdAttr, keys::fsinfo::FILESYSTEM, adapter.family().as_str())?;
            fsinfo.add_string(Section::StdAttr, keys::fsinfo::MOUNT_PATH, mountpoint.to_string_lossy())?;
            fsinfo.add_string(Section::StdAttr, keys::fsinfo::ORIG_DEVICE, devpath.to_string_lossy())?;
            adapter.getinfo(&mut fsinfo, devpath)?;
            let total_cost = estimate_cost(&mountpoint);
            fsinfo.add_u64(Section::StdAttr, keys::fsinfo::TOTAL_COST, total_cost)?;

            let fs_id = FsId::from(idx as u16);
            run.queue.enqueue_header(fsinfo, Magic::FsInfo, FsId::NULL);
            run.queue.enqueue_header(AttributeRecord::new(), Magic::FsBegin, fs_id);

            let dev_filter = fs::metadata(&mountpoint).map(|m| m.dev()).ok();
            let mut hardlinks = HardlinkMap::new();
            let mut coalescer = Coalescer::new(MAX_SMALL_COUNT, SMALL_FILE_THRESHOLD as usize);
            let mut walk_ctx = WalkCtx::new(
                &run.queue,
                &run.stats,
                &mut hardlinks,
                &mut coalescer,
                fs_id,
                block_size,
                options,
                ctx,
                adapter.capabilities().winattr,
            );
            walk_directory(&mountpoint, "", dev_filter, &mut walk_ctx)?;
            coalescer.flush(&run.queue, fs_id);
            run.queue.enqueue_header(AttributeRecord::new(), Magic::DataEnd, fs_id);
        }
        Ok(())
    })();

    for (devpath, mountpoint, adapter) in mounted.into_iter().rev() {
        if let Err(e) = adapter.umount(&devpath, &mountpoint) {
            log::error!("failed to unmount {}: {e}", mountpoint.display());
        }
        let _ = fs::remove_dir(&mountpoint);
    }

    run.finish(walk_result)
}

/// Archives a flat set of directory trees. Paths are stored in the archive
/// exactly as given (made absolute first if relative) rather than
/// stripping each tree to its own basename.
pub fn save_directories(archive_path: impl AsRef<Path>, dirs: &[PathBuf], options: &SaveOptions, ctx: &Context) -> Result<Stats> {
    let (run, block_size) = SaveRun::start(archive_path.as_ref(), options, ctx, ArchiveType::Directories, None)?;

    let walk_result = (|| -> Result<()> {
        let total_cost: u64 = dirs.iter().map(|d| estimate_cost(d)).sum();
        let mut dirsinfo = AttributeRecord::new();
        dirsinfo.add_u64(Section::StdAttr, keys::dirsinfo::TOTAL_COST, total_cost)?;
        run.queue.enqueue_header(dirsinfo, Magic::DirsInfo, FsId::NULL);

        for dir in dirs {
            if ctx.is_aborted() {
                return Err(Error::Aborted);
            }

            let abs = if dir.is_absolute() {
                dir.clone()
            } else {
                std::env::current_dir().map_err(Error::Io)?.join(dir)
            };
            let rel = abs.to_string_lossy().into_owned();

            let mut hardlinks = HardlinkMap::new();
            let mut coalescer = Coalescer::new(MAX_SMALL_COUNT, SMALL_FILE_THRESHOLD as usize);
            let mut walk_ctx = WalkCtx::new(
                &run.queue,
                &run.stats,
                &mut hardlinks,
                &mut coalescer,
                FsId::NULL,
                block_size,
                options,
                ctx,
                false,
            );
            walk_directory(Path::new("/"), &rel, None, &mut walk_ctx)?;
            coalescer.flush(&run.queue, FsId::NULL);
        }

        run.queue.enqueue_header(AttributeRecord::new(), Magic::DataEnd, FsId::NULL);
        Ok(())
    })();

    run.finish(walk_result)
}

fn scratch_mountpoint(archive_id: ArchiveId, idx: usize) -> PathBuf {
    std::env::temp_dir().join(format!("fsarc-mnt-{archive_id}-{idx}"))
}

/// A recursive pre-pass over the tree, computed before the real walk so a
/// progress bar has a denominator before the first block is written:
/// spec.md §4.8b's `sum(PER_FILE_FIXED_COST + file_size)` over every
/// object, directories included. Crosses mountpoints freely, unlike the
/// walk itself, which is an acceptable overestimate for a progress hint.
fn estimate_cost(path: &Path) -> u64 {
    let mut cost = match fs::symlink_metadata(path) {
        Ok(meta) => PER_FILE_FIXED_COST + meta.size(),
        Err(_) => PER_FILE_FIXED_COST,
    };
    let Ok(entries) = fs::read_dir(path) else {
        return cost;
    };
    for entry in entries.flatten() {
        let entry_path = entry.path();
        match fs::symlink_metadata(&entry_path) {
            Ok(meta) if meta.is_dir() => cost += estimate_cost(&entry_path),
            Ok(meta) => cost += PER_FILE_FIXED_COST + meta.size(),
            Err(_) => {}
        }
    }
    cost
}
