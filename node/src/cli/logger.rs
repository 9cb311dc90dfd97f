use std::env;

use anyhow::Context;
use tracing::Level;
use tracing_subscriber::{fmt::time::UtcTime, prelude::*, EnvFilter};

/// Seeds the tracing `EnvFilter` from `RUST_LOG`, falling back to a
/// crate-scoped default at `level` when unset (§4.G "Structured
/// logging/tracing").
pub fn setup_logging_and_tracing(level: Level) -> anyhow::Result<()> {
	let env_filter = env::var("RUST_LOG")
		.map(|_| EnvFilter::from_default_env())
		.or_else(|_| EnvFilter::try_new(format!("adapter_service={level}")))
		.context("failed to set up the tracing env filter")?;

	let event_format = tracing_subscriber::fmt::format().with_target(true).with_timer(UtcTime::new(
		time::format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z")
			.expect("time format is valid"),
	));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer().event_format(event_format))
		.try_init()
		.context("failed to install the tracing subscriber")?;

	Ok(())
}
