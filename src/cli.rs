//! Shared setup for the command-line tools.

/// Default log filter for a `-v` count. `RUST_LOG` still overrides it.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

pub fn init_logging(verbose: u8) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(verbose))).init();
}
