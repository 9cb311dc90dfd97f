//! HTTP transport wrapper shared by every SoR adapter (§4.E): auth injection,
//! per-request timeout, status-code classification and retry-with-backoff.

mod error;
mod request;

pub use error::TransportError;
pub use request::{AuthMethod, HttpMethod, HttpRequest};

use std::time::Duration;

use common::retry::{retry, RetryParams};
use reqwest::Client;
use tracing::instrument;

/// Process-wide, connection-pooled HTTP client. One instance is built at
/// startup and shared across every in-flight call (§5 "Shared resources").
#[derive(Clone)]
pub struct TransportClient {
	client: Client,
}

impl TransportClient {
	pub fn new() -> Self {
		Self { client: Client::new() }
	}

	/// Executes `request` with `auth` injected, classifying the response and
	/// retrying per `retry_params` (honoring `Retry-After` when the SoR sends
	/// one). Returns the raw response body on success.
	#[instrument(skip(self, request, auth), fields(url = %request.url))]
	pub async fn execute(
		&self,
		request: &HttpRequest,
		auth: &AuthMethod,
		timeout: Duration,
		retry_params: &RetryParams,
	) -> Result<Vec<u8>, TransportError> {
		retry(retry_params, |_attempt| self.execute_once(request, auth, timeout))
			.await
			.map_err(|(error, _retry_after)| error)
	}

	async fn execute_once(
		&self,
		request: &HttpRequest,
		auth: &AuthMethod,
		timeout: Duration,
	) -> Result<Vec<u8>, (TransportError, Option<Duration>)> {
		let mut builder = match request.method {
			HttpMethod::Get => self.client.get(&request.url),
			HttpMethod::Post => self.client.post(&request.url),
		}
		.timeout(timeout);

		builder = inject_auth(builder, auth);

		for (name, value) in &request.headers {
			builder = builder.header(name, value);
		}
		if let Some(body) = &request.body {
			builder = builder.body(body.clone());
		}

		let response = builder.send().await.map_err(|e| {
			let error = if e.is_timeout() {
				TransportError::Timeout(timeout)
			} else {
				TransportError::Network(e.to_string())
			};
			(error, None)
		})?;

		let status = response.status();
		let retry_after = parse_retry_after(response.headers());
		let body = response.bytes().await.map_err(|e| (TransportError::Network(e.to_string()), None))?;
		let body_text = || String::from_utf8_lossy(&body).into_owned();

		if status.is_success() {
			return Ok(body.to_vec());
		}

		let code = status.as_u16();
		let error = match code {
			429 | 500..=599 => TransportError::Retryable { status: code, body: body_text(), retry_after },
			401 | 403 => TransportError::Auth { status: code, body: body_text() },
			400 | 404 | 422 => TransportError::Client { status: code, body: body_text() },
			_ => TransportError::UnexpectedStatus { status: code, body: body_text() },
		};
		let retry_after = error.retry_after();
		Err((error, retry_after))
	}
}

impl Default for TransportClient {
	fn default() -> Self {
		Self::new()
	}
}

fn inject_auth(builder: reqwest::RequestBuilder, auth: &AuthMethod) -> reqwest::RequestBuilder {
	match auth {
		AuthMethod::Bearer(token) => builder.bearer_auth(token),
		AuthMethod::Basic { username, password } => builder.basic_auth(username, Some(password)),
	}
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
	let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
	raw.parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn fast_retry_params() -> RetryParams {
		RetryParams { max_attempts: 3, ..RetryParams::for_test() }
	}

	#[tokio::test]
	async fn success_response_returns_the_body() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/users"))
			.respond_with(ResponseTemplate::new(200).set_body_string("{\"value\":[]}"))
			.mount(&server)
			.await;

		let client = TransportClient::new();
		let request = HttpRequest::get(format!("{}/users", server.uri()));
		let body = client
			.execute(&request, &AuthMethod::Bearer("token".to_string()), Duration::from_secs(5), &fast_retry_params())
			.await
			.unwrap();
		assert_eq!(body, b"{\"value\":[]}");
	}

	#[tokio::test]
	async fn rate_limited_response_retries_until_success() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/users"))
			.respond_with(ResponseTemplate::new(429))
			.up_to_n_times(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/users"))
			.respond_with(ResponseTemplate::new(200).set_body_string("ok"))
			.mount(&server)
			.await;

		let client = TransportClient::new();
		let request = HttpRequest::get(format!("{}/users", server.uri()));
		let body = client
			.execute(&request, &AuthMethod::Bearer("token".to_string()), Duration::from_secs(5), &fast_retry_params())
			.await
			.unwrap();
		assert_eq!(body, b"ok");
	}

	#[tokio::test]
	async fn auth_failure_is_never_retried() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/users"))
			.respond_with(ResponseTemplate::new(401))
			.expect(1)
			.mount(&server)
			.await;

		let client = TransportClient::new();
		let request = HttpRequest::get(format!("{}/users", server.uri()));
		let result = client
			.execute(&request, &AuthMethod::Bearer("token".to_string()), Duration::from_secs(5), &fast_retry_params())
			.await;
		assert!(matches!(result, Err(TransportError::Auth { status: 401, .. })));
	}

	#[tokio::test]
	async fn client_error_is_never_retried() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/users"))
			.respond_with(ResponseTemplate::new(404))
			.expect(1)
			.mount(&server)
			.await;

		let client = TransportClient::new();
		let request = HttpRequest::get(format!("{}/users", server.uri()));
		let result = client
			.execute(&request, &AuthMethod::Bearer("token".to_string()), Duration::from_secs(5), &fast_retry_params())
			.await;
		assert!(matches!(result, Err(TransportError::Client { status: 404, .. })));
	}

	#[tokio::test]
	async fn retry_after_header_is_honored() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/users"))
			.respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
			.up_to_n_times(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/users"))
			.respond_with(ResponseTemplate::new(200).set_body_string("ok"))
			.mount(&server)
			.await;

		let client = TransportClient::new();
		let request = HttpRequest::get(format!("{}/users", server.uri()));
		let body = client
			.execute(&request, &AuthMethod::Bearer("token".to_string()), Duration::from_secs(5), &fast_retry_params())
			.await
			.unwrap();
		assert_eq!(body, b"ok");
	}
}
