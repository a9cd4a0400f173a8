use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Installs the global tracing subscriber shared by every binary.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. File, line
/// and target are included so queue/consumer logs stay attributable.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
