//! Logging setup and stage timing.

use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install a colored `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks the level
/// (0 = info, 1 = debug, 2+ = trace).
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("comment_removal={default_level},{default_level}")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(true)
        .try_init();
}

/// Run `f`, logging how long the named stage took.
pub fn timed<T>(stage: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    info!("{} took {:.2}s", stage, start.elapsed().as_secs_f64());
    out
}
