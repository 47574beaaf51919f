//! Tracing initialization — same shape as the teacher's
//! `oxibot-cli::main::init_logging`: `warn` by default, more verbose under
//! a debug flag, `RUST_LOG`-style env filter honored either way.

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_new("solar_router=debug,info").unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
