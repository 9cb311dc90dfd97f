use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use common::config::{load_node_config, DEFAULT_CONFIG_PATH};
use engine::GetPageService;

use crate::serve::grpc::start_grpc_server;
use crate::GrpcAdapterService;

pub fn build_serve_command() -> Command {
	Command::new("serve").about("Starts the adapter-service gRPC server").arg(
		Arg::new("config")
			.long("config")
			.help("Path to the YAML config file")
			.env("ADAPTER_SERVICE_CONFIG")
			.default_value(DEFAULT_CONFIG_PATH),
	)
}

#[derive(Debug, PartialEq)]
pub struct Serve {
	pub config_path: String,
}

impl Serve {
	pub fn parse_cli_args(matches: ArgMatches) -> anyhow::Result<Self> {
		let config_path = matches.get_one::<String>("config").expect("has a default_value").clone();
		Ok(Serve { config_path })
	}

	pub async fn execute(self) -> anyhow::Result<()> {
		let config = load_node_config(&self.config_path).await.context("failed to load node config")?;

		let listen_addr: SocketAddr = format!("{}:{}", config.listen_address, config.grpc_listen_port)
			.parse()
			.context("invalid listen address/port in config")?;

		let engine = GetPageService::with_transport_defaults(config.transport.clone());
		let service = Arc::new(GrpcAdapterService::new(engine));

		let shutdown_signal = Box::pin(async {
			let _ = tokio::signal::ctrl_c().await;
			tracing::info!("received shutdown signal");
		});

		start_grpc_server(listen_addr, config.max_message_size_bytes, service, shutdown_signal).await
	}
}
