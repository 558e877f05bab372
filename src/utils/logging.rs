use tracing_subscriber::EnvFilter;

/// Logs go to stderr so JSON on stdout stays parseable. `RUST_LOG` wins
/// over `--debug`.
pub(crate) fn init_logging(debug: bool) {
    let default = if debug { "warn,cropcare=debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
