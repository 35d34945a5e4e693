//! Shared helpers for the batspec binaries

pub mod output;

/// Route `log` output to stderr. Off by default so stdout stays clean JSON.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env().filter_level(level).init();
}
