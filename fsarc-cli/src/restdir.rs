use std::process::ExitCode;

use fsarc_core::RestoreOptions;
use fsarc_dtyp::ArchiveId;

use crate::cli::RestdirArgs;
use crate::password::resolve_restore_password;
use crate::runctx::{fatal, finish, new_context};

pub fn run(args: RestdirArgs) -> ExitCode {
    let password = match resolve_restore_password(args.common.password.as_deref()) {
        Ok(p) => p,
        Err(e) => return fatal("password", e),
    };

    let options = RestoreOptions {
        password,
        destinations: Vec::new(),
        dest_dir: Some(args.dest),
        worker_count: args.common.jobs,
        allow_mounted_rw: args.common.allow_mounted_rw,
        relax_mount_opt_checks: args.common.relax_mount_opt_checks,
        experimental_fs: args.common.experimental_fs,
    };
    if let Err(e) = options.validate() {
        return fatal("restdir", e);
    }

    let ctx = new_context(ArchiveId::from(0));

    let pb = crate::progress::spinner("restoring directory tree");
    let result = fsarc_core::restore_directories(&args.archive, &options, &ctx);
    pb.finish_and_clear();

    match result {
        Ok(stats) => finish("restdir", &stats),
        Err(e) => fatal("restdir", e),
    }
}
