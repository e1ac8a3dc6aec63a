//! The recursive directory walk that drives `savefs`/`savedir`: for every
//! entry, build its `ObJt` header (preorder — a directory's own header is
//! emitted before its children), then either recurse, enqueue a
//! footer-terminated stream of data blocks, or hand the file's bytes to
//! the small-file coalescer.
//!
//! Cross-device handling: when walking a single filesystem (`dev_filter`
//! is `Some`), a directory entry whose
//! `st_dev` differs is archived as an empty mountpoint placeholder and not
//! recursed into, except `/dev` under `-A` (live backup) so device nodes
//! created by the running kernel aren't lost. `savedir` passes
//! `dev_filter: None` and happily crosses filesystem boundaries.

use std::fs;
use std::io::Read;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use fsarc_attr::AttributeRecord;
use fsarc_dtyp::{keys, FsId, ObjectType, Section, FILEFLAGS_SPARSE};
use fsarc_queue::{BlockInfo, Coalescer, HardlinkMap, ItemQueue, ItemStatus};
use fsarc_wire::Magic;

use crate::config::SaveOptions;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::producer::object::build_object;
use crate::stats::{ObjectClass, Stats};

pub struct WalkCtx<'a> {
    pub queue: &'a ItemQueue,
    pub stats: &'a Stats,
    pub hardlinks: &'a mut HardlinkMap,
    pub coalescer: &'a mut Coalescer,
    pub fs_id: FsId,
    pub block_size: usize,
    pub options: &'a SaveOptions,
    pub run: &'a Context,
    pub winattr_capable: bool,
    next_object_id: u64,
}

impl<'a> WalkCtx<'a> {
    pub fn new(
        queue: &'a ItemQueue,
        stats: &'a Stats,
        hardlinks: &'a mut HardlinkMap,
        coalescer: &'a mut Coalescer,
        fs_id: FsId,
        block_size: usize,
        options: &'a SaveOptions,
        run: &'a Context,
        winattr_capable: bool,
    ) -> Self {
        Self {
            queue,
            stats,
            hardlinks,
            coalescer,
            fs_id,
            block_size,
            options,
            run,
            winattr_capable,
            next_object_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }
}

/// Walks `root` (archive root, used to compute relative paths) starting at
/// `rel` ("" for the root itself), recursing into `dev_filter`-matching
/// subdirectories (or everywhere, when `dev_filter` is `None`).
pub fn walk_directory(root: &Path, rel: &str, dev_filter: Option<u64>, ctx: &mut WalkCtx) -> Result<()> {
    if ctx.run.is_aborted() {
        return Err(Error::Aborted);
    }

    let full_dir = join_rel(root, rel);
    let entries = match fs::read_dir(&full_dir) {
        Ok(it) => it,
        Err(e) => {
            log::warn!("cannot open directory {}: {e}", full_dir.display());
            return Ok(());
        }
    };

    // The directory's own header, emitted on entry.
    emit_object(rel, &full_dir, ctx)?;

    let mut names: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    names.sort();

    for entry_path in names {
        if ctx.run.is_aborted() {
            return Err(Error::Aborted);
        }
        let name = entry_path.file_name().unwrap().to_string_lossy().into_owned();
        let child_rel = if rel.is_empty() {
            format!("/{name}")
        } else {
            format!("{rel}/{name}")
        };

        if ctx.options.is_excluded(&child_rel, &name) {
            continue;
        }

        let meta = match fs::symlink_metadata(&entry_path) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("cannot stat {}: {e}", entry_path.display());
                continue;
            }
        };

        let crosses_device = dev_filter.is_some_and(|dev| meta.dev() != dev);

        if meta.is_dir() && crosses_device {
            // Mountpoint boundary: archive the directory itself (so e.g.
            // /dev exists as a mount target) but don't descend, unless
            // this is a live backup of /dev specifically.
            emit_object(&child_rel, &entry_path, ctx)?;
            if ctx.options.allow_mounted_rw && child_rel == "/dev" {
                walk_directory(root, &child_rel, Some(meta.dev()), ctx)?;
            }
            continue;
        }

        if meta.is_dir() {
            walk_directory(root, &child_rel, dev_filter, ctx)?;
        } else {
            emit_object(&child_rel, &entry_path, ctx)?;
        }
    }

    Ok(())
}

fn join_rel(root: &Path, rel: &str) -> PathBuf {
    if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel.trim_start_matches('/'))
    }
}

/// Builds and dispatches one object's header (and, for regular files, its
/// data). `rel` is `""` only for the archive root itself.
fn emit_object(rel: &str, full_path: &Path, ctx: &mut WalkCtx) -> Result<()> {
    let meta = match fs::symlink_metadata(full_path) {
        Ok(m) => m,
        Err(e) => {
            log::warn!("cannot stat {}: {e}", full_path.display());
            return Ok(());
        }
    };
    let display_rel = if rel.is_empty() { "/" } else { rel };

    let object_id = ctx.next_id();
    let built = match build_object(
        display_rel,
        full_path,
        &meta,
        object_id,
        ctx.hardlinks,
        ctx.winattr_capable,
    ) {
        Ok(b) => b,
        Err(e) => {
            log::error!("cannot build header for {display_rel}: {e}");
            ctx.stats.record(ObjectClass::RegularFile, false);
            return Ok(());
        }
    };

    match built.object_type {
        ObjectType::Dir => {
            ctx.queue.enqueue_header(built.attrs, Magic::Object, ctx.fs_id);
            ctx.stats.record(ObjectClass::Directory, true);
        }
        ObjectType::Symlink => {
            ctx.queue.enqueue_header(built.attrs, Magic::Object, ctx.fs_id);
            ctx.stats.record(ObjectClass::Symlink, true);
        }
        ObjectType::Hardlink => {
            ctx.queue.enqueue_header(built.attrs, Magic::Object, ctx.fs_id);
            ctx.stats.record(ObjectClass::Hardlink, true);
        }
        ObjectType::CharDev | ObjectType::BlockDev | ObjectType::Fifo | ObjectType::Socket => {
            ctx.queue.enqueue_header(built.attrs, Magic::Object, ctx.fs_id);
            ctx.stats.record(ObjectClass::Special, true);
        }
        ObjectType::RegFileUnique => {
            let sparse = built
                .attrs
                .get_u32(Section::StdAttr, keys::FLAGS)
                .is_ok_and(|flags| flags & FILEFLAGS_SPARSE != 0);
            match save_regfile_unique(full_path, meta.len(), built.attrs, sparse, ctx) {
                Ok(()) => ctx.stats.record(ObjectClass::RegularFile, true),
                Err(e) => {
                    log::error!("cannot save {display_rel}: {e}");
                    ctx.stats.record(ObjectClass::RegularFile, false);
                }
            }
        }
        ObjectType::RegFileMulti => match save_regfile_multi(full_path, meta.len(), built.attrs, ctx) {
            Ok(()) => ctx.stats.record(ObjectClass::RegularFile, true),
            Err(e) => {
                log::error!("cannot save {display_rel}: {e}");
                ctx.stats.record(ObjectClass::RegularFile, false);
            }
        },
    }
    Ok(())
}

/// Streams a regular file's content as one header, N data blocks, and an
/// MD5 footer. When `sparse` is set, all-zero blocks are not enqueued at
/// all: the consumer seeks each written block to its recorded `offset` and
/// `set_len`s the file to its declared size at the end, so a skipped block
/// becomes a real hole instead of stored zeros.
fn save_regfile_unique(full_path: &Path, filesize: u64, attrs: AttributeRecord, sparse: bool, ctx: &mut WalkCtx) -> Result<()> {
    let mut file = fs::File::open(full_path).map_err(Error::Io)?;
    ctx.queue.enqueue_header(attrs, Magic::Object, ctx.fs_id);

    let mut hasher = Md5::new();
    let mut filepos = 0u64;
    let mut buf = vec![0u8; ctx.block_size];
    while filepos < filesize {
        let remaining = filesize - filepos;
        let curblocksize = remaining.min(ctx.block_size as u64) as usize;
        buf.resize(curblocksize, 0);

        let mut read_so_far = 0usize;
        while read_so_far < curblocksize {
            match file.read(&mut buf[read_so_far..]) {
                Ok(0) => break,
                Ok(n) => read_so_far += n,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        if read_so_far < curblocksize {
            log::warn!(
                "{} has been truncated since it was stat'd: padding the rest with zeros",
                full_path.display()
            );
            buf[read_so_far..].fill(0);
        }
        hasher.update(&buf);

        if sparse && buf.iter().all(|&b| b == 0) {
            filepos += curblocksize as u64;
            continue;
        }

        let block = BlockInfo {
            fs_id: ctx.fs_id,
            offset: filepos,
            real_size: curblocksize as u64,
            data: buf.clone(),
            compress_algo: fsarc_codec::CompressAlgo::None,
            encrypt_algo: fsarc_codec::EncryptAlgo::None,
            archive_bytes: Vec::new(),
            archive_checksum: 0,
            corrupt: false,
        };
        ctx.queue.enqueue_block(block, ItemStatus::Todo);
        filepos += curblocksize as u64;
    }

    if filesize > 0 {
        let digest = hasher.finalize();
        let mut footer = AttributeRecord::new();
        footer.add_bytes(Section::StdAttr, keys::MD5SUM, digest.to_vec())?;
        ctx.queue.enqueue_header(footer, Magic::FileFooter, ctx.fs_id);
    }

    Ok(())
}

/// Reads a small file's content fully into memory and hands it to the
/// coalescer, flushing first if it wouldn't fit.
fn save_regfile_multi(full_path: &Path, filesize: u64, mut attrs: AttributeRecord, ctx: &mut WalkCtx) -> Result<()> {
    let mut data = vec![0u8; filesize as usize];
    let mut file = fs::File::open(full_path).map_err(Error::Io)?;
    if let Err(e) = file.read_exact(&mut data) {
        log::warn!("{} truncated while reading small file: {e}", full_path.display());
    }

    let digest = {
        let mut hasher = Md5::new();
        hasher.update(&data);
        hasher.finalize()
    };
    attrs.add_bytes(Section::StdAttr, keys::MD5SUM, digest.to_vec())?;

    if !ctx.coalescer.can_fit(data.len()) {
        ctx.coalescer.flush(ctx.queue, ctx.fs_id);
    }
    ctx.coalescer.add(attrs, &data);
    Ok(())
}
