//! A spinner shown while a save/restore run is in progress. The pipeline
//! exposes no incremental progress hook (each entry point blocks until the
//! whole run finishes), so this can only report liveness, not completion
//! percentage.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
