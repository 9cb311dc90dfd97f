use common::{ServiceError, ServiceErrorCode};
use cursor::CursorError;
use projector::ProjectionError;
use thiserror::Error;
use transport::TransportError;

/// Everything a per-SoR adapter can fail with (§7, minus the two kinds owned
/// by the request validator: `INVALID_DATASOURCE_CONFIG` and `CANCELLED`).
#[derive(Debug, Error)]
pub enum AdapterError {
	#[error("unknown or misconfigured entity: {0}")]
	InvalidEntityConfig(String),
	#[error("cursor is invalid for this entity: {0}")]
	InvalidCursor(String),
	#[error("datasource rejected credentials: {0}")]
	AuthFailed(String),
	#[error("datasource rate-limited the request: {0}")]
	RateLimited(String),
	#[error("transient datasource failure: {0}")]
	Transient(String),
	#[error("datasource rejected the request: {0}")]
	Permanent(String),
	#[error("could not parse datasource response: {0}")]
	ResponseParseError(String),
}

impl ServiceError for AdapterError {
	fn error_code(&self) -> ServiceErrorCode {
		match self {
			AdapterError::InvalidEntityConfig(_) => ServiceErrorCode::BadRequest,
			AdapterError::InvalidCursor(_) => ServiceErrorCode::BadRequest,
			AdapterError::AuthFailed(_) => ServiceErrorCode::PermissionDenied,
			AdapterError::RateLimited(_) => ServiceErrorCode::RateLimited,
			AdapterError::Transient(_) => ServiceErrorCode::Unavailable,
			AdapterError::Permanent(_) => ServiceErrorCode::BadRequest,
			AdapterError::ResponseParseError(_) => ServiceErrorCode::Internal,
		}
	}
}

impl AdapterError {
	/// The wire error kind from §7's taxonomy.
	pub fn wire_code(&self) -> &'static str {
		match self {
			AdapterError::InvalidEntityConfig(_) => "INVALID_ENTITY_CONFIG",
			AdapterError::InvalidCursor(_) => "INVALID_CURSOR",
			AdapterError::AuthFailed(_) => "DATASOURCE_AUTH_FAILED",
			AdapterError::RateLimited(_) => "DATASOURCE_RATE_LIMITED",
			AdapterError::Transient(_) => "DATASOURCE_TRANSIENT",
			AdapterError::Permanent(_) => "DATASOURCE_PERMANENT",
			AdapterError::ResponseParseError(_) => "RESPONSE_PARSE_ERROR",
		}
	}

	pub fn retryable(&self) -> bool {
		matches!(self, AdapterError::RateLimited(_) | AdapterError::Transient(_))
	}
}

impl From<CursorError> for AdapterError {
	fn from(err: CursorError) -> Self {
		AdapterError::InvalidCursor(err.to_string())
	}
}

impl From<ProjectionError> for AdapterError {
	fn from(err: ProjectionError) -> Self {
		AdapterError::ResponseParseError(err.to_string())
	}
}

impl From<TransportError> for AdapterError {
	fn from(err: TransportError) -> Self {
		match err {
			TransportError::Auth { .. } => AdapterError::AuthFailed(err.to_string()),
			TransportError::Retryable { status: 429, .. } => AdapterError::RateLimited(err.to_string()),
			TransportError::Retryable { .. } | TransportError::Timeout(_) | TransportError::Network(_) => {
				AdapterError::Transient(err.to_string())
			},
			TransportError::Client { .. } | TransportError::UnexpectedStatus { .. } => {
				AdapterError::Permanent(err.to_string())
			},
		}
	}
}

impl From<serde_json::Error> for AdapterError {
	fn from(err: serde_json::Error) -> Self {
		AdapterError::ResponseParseError(err.to_string())
	}
}
