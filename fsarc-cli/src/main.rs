//! `fsarc`: the command-line front end over `fsarc-core`'s archive
//! pipeline. Parses arguments, resolves passwords, and dispatches to one
//! of the six operations: savefs, restfs, savedir, restdir, archinfo,
//! probe.

mod cli;
mod destspec;
mod info;
mod logging;
mod password;
mod probe;
mod progress;
mod restdir;
mod restfs;
mod runctx;
mod savedir;
mod savefs;

use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.debug);

    match cli.command {
        Commands::Savefs(args) => savefs::run(args),
        Commands::Restfs(args) => restfs::run(args),
        Commands::Savedir(args) => savedir::run(args),
        Commands::Restdir(args) => restdir::run(args),
        Commands::Archinfo(args) => info::run(args),
        Commands::Probe(args) => probe::run(args),
    }
}
