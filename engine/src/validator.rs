//! Request Validator & Dispatcher (§4.A). Runs before any outbound call is
//! made; a failure here never touches the network.

use adapters::{AdapterRegistry, AuthKind};
use proto::{datasource, AttributeType, GetPageRequest};

use crate::error::GetPageError;

/// Per-entity page-size ceilings observed across the SoRs this service
/// targets (§4.A); a request above its SoR's ceiling is rejected rather than
/// silently clamped, since clamping would make the cursor chain's page
/// boundaries diverge from what the caller asked for.
fn page_size_ceiling(sor_type: &str) -> u32 {
	match sor_type {
		"AzureAD-1.0.1" => 999,
		"GitHub-1.0.0" => 100,
		"Workday-1.0.0" => 100,
		_ => 1000,
	}
}

pub struct ValidatedRequest<'a> {
	pub request: &'a GetPageRequest,
	pub sor_type: String,
}

/// Validates `req` and, on success, resolves which adapter will serve it.
pub fn validate<'a>(req: &'a GetPageRequest, registry: &AdapterRegistry) -> Result<ValidatedRequest<'a>, GetPageError> {
	let datasource = req
		.datasource
		.as_ref()
		.ok_or_else(|| GetPageError::InvalidDatasourceConfig("datasource is required".to_string()))?;

	if datasource.id.is_empty() {
		return Err(GetPageError::InvalidDatasourceConfig("datasource.id must not be empty".to_string()));
	}
	if datasource.r#type.is_empty() {
		return Err(GetPageError::InvalidDatasourceConfig("datasource.type must not be empty".to_string()));
	}
	if datasource.address.is_empty() {
		return Err(GetPageError::InvalidDatasourceConfig("datasource.address must not be empty".to_string()));
	}

	let adapter = registry
		.resolve(&datasource.r#type)
		.ok_or_else(|| GetPageError::InvalidDatasourceConfig(format!("unsupported datasource type `{}`", datasource.r#type)))?;

	let auth_kind = match &datasource.auth {
		Some(datasource::Auth::Bearer(bearer)) if bearer.token.is_empty() => {
			return Err(GetPageError::InvalidDatasourceConfig("bearer auth requires a non-empty token".to_string()));
		},
		Some(datasource::Auth::Bearer(_)) => AuthKind::Bearer,
		Some(datasource::Auth::Basic(basic)) if basic.username.is_empty() => {
			return Err(GetPageError::InvalidDatasourceConfig("basic auth requires a non-empty username".to_string()));
		},
		Some(datasource::Auth::Basic(_)) => AuthKind::Basic,
		None => return Err(GetPageError::InvalidDatasourceConfig("datasource.auth is required".to_string())),
	};
	if !adapter.accepted_auth().contains(&auth_kind) {
		return Err(GetPageError::InvalidDatasourceConfig(format!(
			"datasource type `{}` does not accept {auth_kind:?} auth",
			datasource.r#type
		)));
	}

	if !datasource.config.is_empty() {
		serde_json::from_slice::<serde_json::Value>(&datasource.config)
			.map_err(|e| GetPageError::InvalidDatasourceConfig(format!("config is not valid JSON: {e}")))?;
	}

	if req.page_size == 0 {
		return Err(GetPageError::InvalidEntityConfig("page_size must be greater than zero".to_string()));
	}
	let ceiling = page_size_ceiling(&datasource.r#type);
	if req.page_size > ceiling {
		return Err(GetPageError::InvalidEntityConfig(format!(
			"page_size {} exceeds the {} ceiling of {ceiling}",
			req.page_size, datasource.r#type
		)));
	}

	let entity = req
		.entity
		.as_ref()
		.ok_or_else(|| GetPageError::InvalidEntityConfig("entity is required".to_string()))?;
	if !adapter.entities().contains(&entity.external_id.as_str()) {
		return Err(GetPageError::InvalidEntityConfig(format!(
			"entity `{}` is not registered for datasource type `{}`",
			entity.external_id, datasource.r#type
		)));
	}
	for attribute in &entity.attributes {
		let declared = AttributeType::try_from(attribute.r#type).map_err(|_| {
			GetPageError::InvalidEntityConfig(format!("attribute `{}` declares an unrecognized type", attribute.id))
		})?;
		if let Some(required) = adapter.known_attribute_type(&entity.external_id, &attribute.external_id) {
			if declared != required {
				return Err(GetPageError::InvalidEntityConfig(format!(
					"attribute `{}` must be declared as {required:?} for `{}.{}`, got {declared:?}",
					attribute.id, entity.external_id, attribute.external_id
				)));
			}
		}
	}

	Ok(ValidatedRequest { request: req, sor_type: datasource.r#type.clone() })
}
