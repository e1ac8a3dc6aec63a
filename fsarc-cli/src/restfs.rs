use std::process::ExitCode;

use fsarc_core::RestoreOptions;
use fsarc_dtyp::ArchiveId;
use fsarc_fs::Registry;

use crate::cli::RestfsArgs;
use crate::password::resolve_restore_password;
use crate::runctx::{fatal, finish, new_context};

pub fn run(args: RestfsArgs) -> ExitCode {
    let password = match resolve_restore_password(args.common.password.as_deref()) {
        Ok(p) => p,
        Err(e) => return fatal("password", e),
    };

    let options = RestoreOptions {
        password,
        destinations: args.destinations.into_iter().map(|d| d.into_inner()).collect(),
        dest_dir: None,
        worker_count: args.common.jobs,
        allow_mounted_rw: args.common.allow_mounted_rw,
        relax_mount_opt_checks: args.common.relax_mount_opt_checks,
        experimental_fs: args.common.experimental_fs,
    };
    if let Err(e) = options.validate() {
        return fatal("restfs", e);
    }

    let registry = Registry::with_defaults();
    let ctx = new_context(ArchiveId::from(0));

    let pb = crate::progress::spinner("restoring filesystems");
    let result = fsarc_core::restore_filesystems(&args.archive, &options, &registry, &ctx);
    pb.finish_and_clear();

    match result {
        Ok(stats) => finish("restfs", &stats),
        Err(e) => fatal("restfs", e),
    }
}
