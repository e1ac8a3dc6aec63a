//! Maps repeated `-v`/`-d` into an `env_logger` filter level. `-v` raises
//! the level of user-facing progress messages (info/warn/error); `-d`
//! additionally unlocks `debug`/`trace` output from the library crates.

use log::LevelFilter;

pub fn init(verbose: u8, debug: u8) {
    let level = match (verbose, debug) {
        (_, d) if d >= 2 => LevelFilter::Trace,
        (_, 1) => LevelFilter::Debug,
        (0, 0) => LevelFilter::Warn,
        (1, 0) => LevelFilter::Info,
        _ => LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}
