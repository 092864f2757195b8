use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins; otherwise crate logs at `level` and dependencies at warn.
fn crate_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nutrition_lookup={},warn", level)))
}

/// Human-readable logs on stderr, leaving stdout for the JSON results.
pub fn init_cli_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(crate_filter(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// One JSON object per event, for log shippers.
pub fn init_json_logger() {
    tracing_subscriber::registry()
        .with(crate_filter("info"))
        .with(fmt::layer().with_writer(std::io::stderr).json())
        .init();
}
