//! End-to-end `savedir`/`restdir` coverage for spec.md §8 property 1
//! (round-trip identity) and scenarios E1/E2/E3: a small coalesced file, an
//! empty file, a larger single-block file, a hardlinked pair, and a sparse
//! file, archived and restored through the real queue/worker/writer
//! pipeline.

use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::{symlink, MetadataExt, PermissionsExt};

use fsarc_core::{save_directories, restore_directories, Context, RestoreOptions, SaveOptions};
use fsarc_dtyp::ArchiveId;
use fsarc_wire::WireFormat;

fn ctx() -> Context {
    Context::new(ArchiveId::generate(), WireFormat::V2)
}

#[test]
fn savedir_restdir_round_trip_preserves_content_and_modes() {
    let src_dir = tempfile::tempdir().unwrap();
    let src = src_dir.path();

    fs::write(src.join("f1"), b"hello world").unwrap();
    fs::set_permissions(src.join("f1"), fs::Permissions::from_mode(0o600)).unwrap();

    fs::write(src.join("f2"), b"").unwrap();

    fs::create_dir(src.join("sub")).unwrap();
    let big_contents: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(src.join("sub/f3"), &big_contents).unwrap();
    fs::set_permissions(src.join("sub/f3"), fs::Permissions::from_mode(0o644)).unwrap();

    symlink("f1", src.join("f1_link")).unwrap();

    let archive_path = tempfile::tempdir().unwrap().path().join("a.fsa");
    let save_opts = SaveOptions {
        compression_level: 3,
        worker_count: 2,
        overwrite: true,
        ..SaveOptions::default()
    };
    let save_ctx = ctx();
    let save_stats = save_directories(&archive_path, &[src.to_path_buf()], &save_opts, &save_ctx).unwrap();
    assert!(save_stats.all_ok());

    let dest_dir = tempfile::tempdir().unwrap();
    let restore_opts = RestoreOptions {
        worker_count: 2,
        dest_dir: Some(dest_dir.path().to_path_buf()),
        ..RestoreOptions::default()
    };
    let restore_ctx = ctx();
    let restore_stats = restore_directories(&archive_path, &restore_opts, &restore_ctx).unwrap();
    assert!(restore_stats.all_ok());

    // Restored paths are rooted at the destination plus the archived
    // (slash-trimmed) source path, per `consumer::apply::dest_path`.
    let restored_src = dest_dir.path().join(src.strip_prefix("/").unwrap());

    assert_eq!(fs::read(restored_src.join("f1")).unwrap(), b"hello world");
    assert_eq!(fs::metadata(restored_src.join("f1")).unwrap().mode() & 0o777, 0o600);

    assert_eq!(fs::read(restored_src.join("f2")).unwrap(), b"");

    assert_eq!(fs::read(restored_src.join("sub/f3")).unwrap(), big_contents);
    assert_eq!(fs::metadata(restored_src.join("sub/f3")).unwrap().mode() & 0o777, 0o644);

    let link_target = fs::read_link(restored_src.join("f1_link")).unwrap();
    assert_eq!(link_target, std::path::Path::new("f1"));
}

#[test]
fn savedir_restdir_preserves_hardlink_equivalence() {
    let src_dir = tempfile::tempdir().unwrap();
    let src = src_dir.path();

    fs::write(src.join("a"), b"shared contents").unwrap();
    fs::hard_link(src.join("a"), src.join("b")).unwrap();
    assert_eq!(fs::metadata(src.join("a")).unwrap().nlink(), 2);

    let archive_path = tempfile::tempdir().unwrap().path().join("a.fsa");
    let save_opts = SaveOptions {
        overwrite: true,
        ..SaveOptions::default()
    };
    let save_ctx = ctx();
    let save_stats = save_directories(&archive_path, &[src.to_path_buf()], &save_opts, &save_ctx).unwrap();
    assert!(save_stats.all_ok());
    assert_eq!(save_stats.count(fsarc_core::ObjectClass::Hardlink), 1);

    let dest_dir = tempfile::tempdir().unwrap();
    let restore_opts = RestoreOptions {
        dest_dir: Some(dest_dir.path().to_path_buf()),
        ..RestoreOptions::default()
    };
    let restore_ctx = ctx();
    let restore_stats = restore_directories(&archive_path, &restore_opts, &restore_ctx).unwrap();
    assert!(restore_stats.all_ok());

    let restored_src = dest_dir.path().join(src.strip_prefix("/").unwrap());
    let meta_a = fs::metadata(restored_src.join("a")).unwrap();
    let meta_b = fs::metadata(restored_src.join("b")).unwrap();
    assert_eq!(meta_a.ino(), meta_b.ino());
    assert_eq!(fs::read(restored_src.join("b")).unwrap(), b"shared contents");
}

#[test]
fn savedir_restdir_preserves_sparse_holes() {
    let src_dir = tempfile::tempdir().unwrap();
    let src = src_dir.path();

    let file_size: u64 = 2_000_000;
    let data_offset: u64 = 1_000_000;
    let data_chunk = vec![0xABu8; 4096];

    {
        let mut f = fs::File::create(src.join("sparse")).unwrap();
        f.seek(SeekFrom::Start(data_offset)).unwrap();
        f.write_all(&data_chunk).unwrap();
        f.set_len(file_size).unwrap();
    }
    let src_meta = fs::metadata(src.join("sparse")).unwrap();
    assert!(
        src_meta.blocks() * 512 < src_meta.size(),
        "test fixture itself must be sparse on this filesystem"
    );

    let archive_path = tempfile::tempdir().unwrap().path().join("a.fsa");
    let save_opts = SaveOptions {
        overwrite: true,
        ..SaveOptions::default()
    };
    let save_ctx = ctx();
    let save_stats = save_directories(&archive_path, &[src.to_path_buf()], &save_opts, &save_ctx).unwrap();
    assert!(save_stats.all_ok());

    let dest_dir = tempfile::tempdir().unwrap();
    let restore_opts = RestoreOptions {
        dest_dir: Some(dest_dir.path().to_path_buf()),
        ..RestoreOptions::default()
    };
    let restore_ctx = ctx();
    let restore_stats = restore_directories(&archive_path, &restore_opts, &restore_ctx).unwrap();
    assert!(restore_stats.all_ok());

    let restored = dest_dir.path().join(src.strip_prefix("/").unwrap()).join("sparse");
    let restored_meta = fs::metadata(&restored).unwrap();
    assert_eq!(restored_meta.len(), file_size);

    let mut contents = fs::read(&restored).unwrap();
    let chunk_range = data_offset as usize..data_offset as usize + data_chunk.len();
    assert_eq!(&contents[chunk_range.clone()], &data_chunk[..]);
    contents.drain(chunk_range);
    assert!(contents.iter().all(|&b| b == 0));

    // spec.md E3: restored allocation must not balloon to the full logical
    // size just because the hole wasn't written densely.
    assert!(restored_meta.blocks() * 512 < restored_meta.size());
}
