use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

	let builder = tracing_subscriber::FmtSubscriber::builder()
		.with_env_filter(env_filter)
		.with_span_events(FmtSpan::CLOSE)
		.with_writer(std::io::stderr);

	if json {
		builder.json().try_init()
	} else {
		builder.try_init()
	}
	.map_err(|e| anyhow::anyhow!("Failed to set the default tracing subscriber: {e}"))
}
