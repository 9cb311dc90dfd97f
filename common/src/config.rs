use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/adapter-service.config.yaml";

/// Default ceiling on outbound HTTP request duration, per §4.E.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of retries (not attempts) for `RETRYABLE` classified responses.
pub const DEFAULT_MAX_RETRIES: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
	pub listen_address: String,
	pub grpc_listen_port: u16,
	#[serde(default = "default_max_message_size_bytes")]
	pub max_message_size_bytes: usize,
	#[serde(default)]
	pub transport: TransportConfig,
}

fn default_max_message_size_bytes() -> usize {
	16 * 1024 * 1024
}

impl Default for NodeConfig {
	fn default() -> Self {
		Self {
			listen_address: "0.0.0.0".to_string(),
			grpc_listen_port: 7280,
			max_message_size_bytes: default_max_message_size_bytes(),
			transport: TransportConfig::default(),
		}
	}
}

/// Process-wide defaults for the HTTP transport wrapper (§4.E). Individual
/// calls may override `request_timeout_secs` via `Datasource.Config`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
	pub request_timeout_secs: u64,
	pub max_retries: usize,
}

impl Default for TransportConfig {
	fn default() -> Self {
		Self {
			request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
			max_retries: DEFAULT_MAX_RETRIES,
		}
	}
}

/// Loads and deserializes a [`NodeConfig`] from a local YAML file.
pub async fn load_node_config(config_path: &str) -> anyhow::Result<NodeConfig> {
	let config_content = tokio::fs::read_to_string(config_path)
		.await
		.map_err(|error| anyhow::anyhow!("failed to read config file `{config_path}`: {error}"))?;
	let config: NodeConfig = serde_yaml::from_str(&config_content)
		.map_err(|error| anyhow::anyhow!("failed to parse config file `{config_path}`: {error}"))?;
	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_has_sane_timeouts() {
		let config = NodeConfig::default();
		assert_eq!(config.transport.request_timeout_secs, 30);
		assert_eq!(config.transport.max_retries, 3);
	}
}
