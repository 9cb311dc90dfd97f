use adapters::AdapterError;
use common::{ServiceError, ServiceErrorCode};
use thiserror::Error;

/// The full error taxonomy from §7, covering both the validator (§4.A) and
/// everything an adapter can fail with (§4.B/§4.C/§4.D).
#[derive(Debug, Error)]
pub enum GetPageError {
	#[error("invalid datasource configuration: {0}")]
	InvalidDatasourceConfig(String),
	#[error("invalid entity configuration: {0}")]
	InvalidEntityConfig(String),
	#[error("invalid cursor: {0}")]
	InvalidCursor(String),
	#[error("datasource authentication failed: {0}")]
	DatasourceAuthFailed(String),
	#[error("datasource rate-limited the request: {0}")]
	DatasourceRateLimited(String),
	#[error("transient datasource failure: {0}")]
	DatasourceTransient(String),
	#[error("datasource rejected the request: {0}")]
	DatasourcePermanent(String),
	#[error("could not parse the datasource response: {0}")]
	ResponseParseError(String),
	#[error("the call was cancelled")]
	Cancelled,
}

impl GetPageError {
	pub fn wire_code(&self) -> &'static str {
		match self {
			GetPageError::InvalidDatasourceConfig(_) => "INVALID_DATASOURCE_CONFIG",
			GetPageError::InvalidEntityConfig(_) => "INVALID_ENTITY_CONFIG",
			GetPageError::InvalidCursor(_) => "INVALID_CURSOR",
			GetPageError::DatasourceAuthFailed(_) => "DATASOURCE_AUTH_FAILED",
			GetPageError::DatasourceRateLimited(_) => "DATASOURCE_RATE_LIMITED",
			GetPageError::DatasourceTransient(_) => "DATASOURCE_TRANSIENT",
			GetPageError::DatasourcePermanent(_) => "DATASOURCE_PERMANENT",
			GetPageError::ResponseParseError(_) => "RESPONSE_PARSE_ERROR",
			GetPageError::Cancelled => "CANCELLED",
		}
	}

	pub fn retryable(&self) -> bool {
		matches!(self, GetPageError::DatasourceRateLimited(_) | GetPageError::DatasourceTransient(_))
	}
}

impl ServiceError for GetPageError {
	fn error_code(&self) -> ServiceErrorCode {
		match self {
			GetPageError::InvalidDatasourceConfig(_)
			| GetPageError::InvalidEntityConfig(_)
			| GetPageError::InvalidCursor(_)
			| GetPageError::DatasourcePermanent(_) => ServiceErrorCode::BadRequest,
			GetPageError::DatasourceAuthFailed(_) => ServiceErrorCode::PermissionDenied,
			GetPageError::DatasourceRateLimited(_) => ServiceErrorCode::RateLimited,
			GetPageError::DatasourceTransient(_) => ServiceErrorCode::Unavailable,
			GetPageError::ResponseParseError(_) => ServiceErrorCode::Internal,
			GetPageError::Cancelled => ServiceErrorCode::Cancelled,
		}
	}

	fn is_retryable(&self) -> bool {
		self.retryable()
	}
}

impl From<AdapterError> for GetPageError {
	fn from(err: AdapterError) -> Self {
		match err {
			AdapterError::InvalidEntityConfig(m) => GetPageError::InvalidEntityConfig(m),
			AdapterError::InvalidCursor(m) => GetPageError::InvalidCursor(m),
			AdapterError::AuthFailed(m) => GetPageError::DatasourceAuthFailed(m),
			AdapterError::RateLimited(m) => GetPageError::DatasourceRateLimited(m),
			AdapterError::Transient(m) => GetPageError::DatasourceTransient(m),
			AdapterError::Permanent(m) => GetPageError::DatasourcePermanent(m),
			AdapterError::ResponseParseError(m) => GetPageError::ResponseParseError(m),
		}
	}
}
