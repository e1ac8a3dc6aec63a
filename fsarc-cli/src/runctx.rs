//! Shared plumbing every subcommand needs: a [`Context`] wired to Ctrl-C,
//! and the final statistics summary/exit-code mapping.

use std::process::ExitCode;

use fsarc_core::{Context, ObjectClass, Stats};
use fsarc_dtyp::ArchiveId;
use fsarc_wire::WireFormat;

/// Builds a run [`Context`] and installs a `ctrlc` handler that flips its
/// abort flag. One process installs at most one such handler; subsequent
/// calls within the same run would panic, but the CLI only ever runs one
/// subcommand per process.
pub fn new_context(archive_id: ArchiveId) -> Context {
    let ctx = Context::new(archive_id, WireFormat::V2);
    let abort = ctx.abort_handle();
    let _ = ctrlc::set_handler(move || {
        log::warn!("received interrupt, winding down");
        abort.store(true, std::sync::atomic::Ordering::Relaxed);
    });
    ctx
}

/// Prints the `cnt_*`/`err_*` summary per object class, then maps to an
/// exit code: zero only if every counter's error half is zero.
pub fn finish(label: &str, stats: &Stats) -> ExitCode {
    eprintln!("--- {label} summary ---");
    for class in [
        ObjectClass::RegularFile,
        ObjectClass::Directory,
        ObjectClass::Symlink,
        ObjectClass::Hardlink,
        ObjectClass::Special,
    ] {
        eprintln!(
            "{:<14} {:>8} ok, {:>6} failed",
            format!("{class:?}"),
            stats.count(class) - stats.errors(class),
            stats.errors(class)
        );
    }
    if stats.corrupt_records() > 0 {
        eprintln!("{} corrupt record(s) skipped while reading the archive", stats.corrupt_records());
    }
    if stats.all_ok() {
        ExitCode::SUCCESS
    } else {
        eprintln!("{} error(s) encountered", stats.total_errors());
        ExitCode::FAILURE
    }
}

/// Reports a fatal (pipeline-level) error and always exits non-zero.
pub fn fatal(context: &str, err: impl std::fmt::Display) -> ExitCode {
    eprintln!("fsarc: {context}: {err}");
    ExitCode::FAILURE
}
