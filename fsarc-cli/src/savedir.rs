use std::process::ExitCode;

use fsarc_core::{ExcludePattern, SaveOptions};
use fsarc_dtyp::ArchiveId;

use crate::cli::SavedirArgs;
use crate::password::resolve_save_password;
use crate::runctx::{fatal, finish, new_context};

pub fn run(args: SavedirArgs) -> ExitCode {
    let password = match resolve_save_password(args.common.password.as_deref()) {
        Ok(p) => p,
        Err(e) => return fatal("password", e),
    };

    let options = SaveOptions {
        overwrite: args.common.overwrite,
        compression_level: args.common.level,
        split_size: args.common.split_mib.saturating_mul(1024 * 1024),
        worker_count: args.common.jobs,
        password,
        label: args.common.label,
        excludes: args.common.exclude.into_iter().map(ExcludePattern::new).collect(),
        allow_mounted_rw: args.common.allow_mounted_rw,
        relax_mount_opt_checks: args.common.relax_mount_opt_checks,
        experimental_fs: args.common.experimental_fs,
    };
    if let Err(e) = options.validate() {
        return fatal("savedir", e);
    }

    let ctx = new_context(ArchiveId::generate());

    let pb = crate::progress::spinner("archiving directories");
    let result = fsarc_core::save_directories(&args.archive, &args.dirs, &options, &ctx);
    pb.finish_and_clear();

    match result {
        Ok(stats) => finish("savedir", &stats),
        Err(e) => fatal("savedir", e),
    }
}
