//! Ties the validator (§4.A), per-SoR adapters (§4.B), cursor codec (§4.C)
//! and response builder (§4.F) into the single `GetPage` operation.

mod error;
mod validator;

pub use error::GetPageError;

use std::time::Duration;

use adapters::{AdapterRegistry, AdapterRequest};
use common::config::TransportConfig;
use common::retry::RetryParams;
use proto::{datasource, GetPageRequest, GetPageResponse};
use serde_json::Value;
use transport::{AuthMethod, TransportClient};

/// Process-wide collaborators the `GetPage` operation is built from (§5
/// "Shared resources"): the adapter registry and the HTTP client are
/// immutable after construction and safely shared across concurrent calls.
/// `transport_defaults` carries the process-wide timeout/retry configuration
/// (§4.G); a single `GetPageRequest` may still override the timeout via
/// `Datasource.Config.requestTimeoutSeconds`.
pub struct GetPageService {
	registry: AdapterRegistry,
	transport: TransportClient,
	transport_defaults: TransportConfig,
}

impl GetPageService {
	pub fn new() -> Self {
		Self::with_transport_defaults(TransportConfig::default())
	}

	pub fn with_transport_defaults(transport_defaults: TransportConfig) -> Self {
		Self { registry: AdapterRegistry::new(), transport: TransportClient::new(), transport_defaults }
	}

	/// Runs one `GetPage` call end to end. Never returns `Err` for anything
	/// that can be expressed as a structured `Error` response (§7
	/// "Propagation policy") — callers should treat the returned
	/// `GetPageResponse` as the full result and reserve transport-level gRPC
	/// errors for cancellation/overload.
	#[tracing::instrument(skip(self, req), fields(entity = req.entity.as_ref().map(|e| e.external_id.as_str())))]
	pub async fn get_page(&self, req: GetPageRequest) -> GetPageResponse {
		match self.try_get_page(&req).await {
			Ok(response) => response,
			Err(error) => {
				tracing::warn!(code = error.wire_code(), %error, "GetPage failed");
				GetPageResponse::error(error.wire_code(), error.to_string(), error.retryable())
			},
		}
	}

	async fn try_get_page(&self, req: &GetPageRequest) -> Result<GetPageResponse, GetPageError> {
		let validated = validator::validate(req, &self.registry)?;
		let datasource = validated.request.datasource.as_ref().expect("validated by validate()");
		let entity = validated.request.entity.as_ref().expect("validated by validate()");

		let config: Value = if datasource.config.is_empty() {
			Value::Object(Default::default())
		} else {
			serde_json::from_slice(&datasource.config)
				.map_err(|e| GetPageError::InvalidDatasourceConfig(format!("config is not valid JSON: {e}")))?
		};

		let auth = match &datasource.auth {
			Some(datasource::Auth::Bearer(bearer)) => AuthMethod::Bearer(bearer.token.clone()),
			Some(datasource::Auth::Basic(basic)) => {
				AuthMethod::Basic { username: basic.username.clone(), password: basic.password.clone() }
			},
			None => return Err(GetPageError::InvalidDatasourceConfig("datasource.auth is required".to_string())),
		};

		let cursor = cursor::decode_opt(&validated.request.cursor)
			.map_err(|e| GetPageError::InvalidCursor(e.to_string()))?;

		let timeout_secs = config
			.get("requestTimeoutSeconds")
			.and_then(Value::as_u64)
			.unwrap_or(self.transport_defaults.request_timeout_secs);
		let retry_params = RetryParams::with_max_retries(self.transport_defaults.max_retries);

		let adapter_request = AdapterRequest {
			datasource_id: &datasource.id,
			address: &datasource.address,
			auth,
			config,
			entity,
			page_size: validated.request.page_size,
			cursor,
			timeout: Duration::from_secs(timeout_secs),
			retry_params,
		};

		let adapter = self.registry.resolve(&validated.sor_type).expect("validated by validate()");
		let page = adapter.get_page(&self.transport, &adapter_request).await?;

		let next_cursor = cursor::encode_opt(page.next_cursor.as_ref());
		Ok(GetPageResponse::success(page.objects, next_cursor))
	}
}

impl Default for GetPageService {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proto::{get_page_response, Datasource, Entity};

	fn request(sor_type: &str, entity_external_id: &str, page_size: u32) -> GetPageRequest {
		GetPageRequest {
			datasource: Some(Datasource {
				id: "ds-1".to_string(),
				r#type: sor_type.to_string(),
				address: "example.com".to_string(),
				auth: Some(datasource::Auth::Bearer(proto::BearerAuth { token: "t".to_string() })),
				config: Vec::new(),
			}),
			entity: Some(Entity {
				id: "e".to_string(),
				external_id: entity_external_id.to_string(),
				ordered: false,
				attributes: vec![],
				child_entities: vec![],
			}),
			page_size,
			cursor: String::new(),
		}
	}

	#[tokio::test]
	async fn invalid_request_never_makes_a_network_call() {
		let service = GetPageService::new();
		let response = service.get_page(request("AzureAD-1.0.1", "User", 0)).await;
		match response.result {
			Some(get_page_response::Result::Error(error)) => assert_eq!(error.code, "INVALID_ENTITY_CONFIG"),
			other => panic!("expected an Error result, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn unsupported_datasource_type_surfaces_as_invalid_datasource_config() {
		let service = GetPageService::new();
		let response = service.get_page(request("NotReal-1.0", "User", 50)).await;
		match response.result {
			Some(get_page_response::Result::Error(error)) => assert_eq!(error.code, "INVALID_DATASOURCE_CONFIG"),
			other => panic!("expected an Error result, got {other:?}"),
		}
	}
}
