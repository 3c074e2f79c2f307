use tracing_subscriber::EnvFilter;

/// Send log output to stderr, leaving stdout for results.
///
/// The level is `warn`, or `debug` when `verbose` is set. `RUST_LOG`
/// overrides both.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed, e.g. by a test harness
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
