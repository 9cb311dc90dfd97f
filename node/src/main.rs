use node::cli::{build_cli, setup_logging_and_tracing, CliCommand};
use once_cell::sync::OnceCell;
use tokio::runtime::{Builder, Runtime};

/// The main runtime takes one thread per core by default, overridable via
/// `ADAPTER_SERVICE_RUNTIME_NUM_THREADS` (§4.G "Process bootstrap").
fn main_runtime_num_threads() -> usize {
	std::env::var("ADAPTER_SERVICE_RUNTIME_NUM_THREADS")
		.ok()
		.and_then(|value| value.parse().ok())
		.unwrap_or_else(|| num_cpus::get().max(1))
}

fn tokio_runtime() -> Result<&'static Runtime, anyhow::Error> {
	static RUNTIME: OnceCell<Runtime> = OnceCell::new();
	RUNTIME.get_or_try_init(|| {
		Builder::new_multi_thread()
			.enable_all()
			.worker_threads(main_runtime_num_threads())
			.build()
			.map_err(|err| anyhow::anyhow!("failed to create tokio runtime: {err}"))
	})
}

fn main() -> anyhow::Result<()> {
	rustls::crypto::ring::default_provider()
		.install_default()
		.expect("failed to install ring as the default crypto provider");

	let runtime = tokio_runtime()?;
	runtime.block_on(main_impl())
}

async fn main_impl() -> anyhow::Result<()> {
	let app = build_cli();
	let matches = app.get_matches();
	let command = match CliCommand::parse_cli_args(matches) {
		Ok(command) => command,
		Err(err) => {
			eprintln!("failed to parse command arguments: {err:?}");
			std::process::exit(1);
		},
	};

	setup_logging_and_tracing(command.default_log_level())?;

	if let Err(err) = command.execute().await {
		eprintln!("command failed: {err:?}");
		std::process::exit(1);
	}
	Ok(())
}
