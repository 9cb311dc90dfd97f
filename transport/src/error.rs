use std::time::Duration;

use common::retry::Retryable;
use thiserror::Error;

/// Status-code classification performed by [`crate::execute`] (§4.E):
/// 2xx success; 429/5xx retryable; 401/403 auth; 400/404/422 client;
/// network/TLS failures transport.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("datasource returned {status}: {body}")]
	Retryable { status: u16, body: String, retry_after: Option<Duration> },
	#[error("datasource rejected credentials ({status}): {body}")]
	Auth { status: u16, body: String },
	#[error("datasource rejected the request ({status}): {body}")]
	Client { status: u16, body: String },
	#[error("datasource returned an unclassified status {status}: {body}")]
	UnexpectedStatus { status: u16, body: String },
	#[error("network or TLS error calling datasource: {0}")]
	Network(String),
	#[error("request timed out after {0:?}")]
	Timeout(Duration),
}

impl Retryable for TransportError {
	fn is_retryable(&self) -> bool {
		matches!(self, TransportError::Retryable { .. } | TransportError::Timeout(_))
	}
}

impl TransportError {
	/// The `Retry-After` duration to honor for the next attempt, if the SoR
	/// supplied one; `None` falls back to the exponential-backoff schedule.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			TransportError::Retryable { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}
