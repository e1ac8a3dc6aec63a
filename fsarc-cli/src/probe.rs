//! `probe [detailed]`: without devices, lists the adapters this build
//! registers and their capabilities; with devices, reports which
//! registered adapter (if any) claims each one.

use std::process::ExitCode;

use fsarc_fs::Registry;

use crate::cli::ProbeArgs;

fn print_capabilities(adapter: &dyn fsarc_fs::Adapter) {
    let caps = adapter.capabilities();
    println!(
        "  {:<10} stable={:<5} xattr={:<5} acl={:<5} winattr={:<5}",
        adapter.family().as_str(),
        caps.stable,
        caps.xattr,
        caps.acl,
        caps.winattr,
    );
}

pub fn run(args: ProbeArgs) -> ExitCode {
    let registry = Registry::with_defaults();

    if args.devices.is_empty() {
        println!("registered filesystem adapters:");
        for adapter in registry.iter() {
            if args.detailed {
                print_capabilities(adapter);
            } else {
                println!("  {}", adapter.family().as_str());
            }
        }
        return ExitCode::SUCCESS;
    }

    for dev in &args.devices {
        match registry.probe(dev) {
            Some(adapter) => println!("{}: {}", dev.display(), adapter.family()),
            None => println!("{}: no registered adapter recognizes this device", dev.display()),
        }
    }
    ExitCode::SUCCESS
}
