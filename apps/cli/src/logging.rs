//! Tracing subscriber setup for the `seek` binary.
//!
//! Filter priority: `SEEK_LOG`, then `RUST_LOG`, then `-v` (debug), then the
//! configured `log_filter`. Logs go to stderr so listings on stdout stay clean.

use seekcore_config::ENV_LOG;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub(crate) fn init(verbose: bool, configured: &str) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time();

    tracing_subscriber::registry()
        .with(build_filter(verbose, configured))
        .with(fmt_layer)
        .init();
}

fn build_filter(verbose: bool, configured: &str) -> EnvFilter {
    if let Some(filter) = std::env::var(ENV_LOG)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("warn"))
}
