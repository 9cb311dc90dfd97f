use std::time::Duration;

use engine::GetPageService;
use proto::adapter_service_server::AdapterService;
use proto::{GetPageRequest, GetPageResponse};
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};

/// Adapts [`engine::GetPageService`] to the generated `tonic` service trait.
/// `GetPage` never fails the RPC itself (§7 "Propagation policy") — every
/// validation or datasource failure is carried in the `Error` leg of the
/// response, not a gRPC status. The one exception is the caller's own
/// deadline (§5 "Cancellation"): when it elapses before the engine produces a
/// response, the in-flight call is abandoned and a `CANCELLED` error is
/// returned instead of waiting on a response no caller is still listening for.
pub struct GrpcAdapterService {
	engine: GetPageService,
}

impl GrpcAdapterService {
	pub fn new(engine: GetPageService) -> Self {
		Self { engine }
	}
}

#[tonic::async_trait]
impl AdapterService for GrpcAdapterService {
	async fn get_page(&self, request: Request<GetPageRequest>) -> Result<Response<GetPageResponse>, Status> {
		let deadline = grpc_timeout(request.metadata());
		let call = self.engine.get_page(request.into_inner());

		let response = match deadline {
			Some(deadline) => match tokio::time::timeout(deadline, call).await {
				Ok(response) => response,
				Err(_elapsed) => GetPageResponse::error("CANCELLED", "deadline exceeded", false),
			},
			None => call.await,
		};
		Ok(Response::new(response))
	}
}

/// Parses gRPC-over-HTTP/2's `grpc-timeout` request header
/// (`TimeoutValue TimeoutUnit`, e.g. `"5000m"` for 5000 milliseconds) into a
/// [`Duration`]. Absent or malformed headers mean "no deadline": the call
/// runs to completion, exactly as if no timeout had been set.
fn grpc_timeout(metadata: &MetadataMap) -> Option<Duration> {
	let raw = metadata.get("grpc-timeout")?.to_str().ok()?;
	let (value, unit) = raw.split_at(raw.len().checked_sub(1)?);
	let value: u64 = value.parse().ok()?;
	match unit {
		"H" => Some(Duration::from_secs(value * 3600)),
		"M" => Some(Duration::from_secs(value * 60)),
		"S" => Some(Duration::from_secs(value)),
		"m" => Some(Duration::from_millis(value)),
		"u" => Some(Duration::from_micros(value)),
		"n" => Some(Duration::from_nanos(value)),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn metadata_with_timeout(value: &str) -> MetadataMap {
		let mut metadata = MetadataMap::new();
		metadata.insert("grpc-timeout", value.parse().unwrap());
		metadata
	}

	#[test]
	fn parses_milliseconds() {
		assert_eq!(grpc_timeout(&metadata_with_timeout("5000m")), Some(Duration::from_millis(5000)));
	}

	#[test]
	fn parses_seconds() {
		assert_eq!(grpc_timeout(&metadata_with_timeout("10S")), Some(Duration::from_secs(10)));
	}

	#[test]
	fn absent_header_means_no_deadline() {
		assert_eq!(grpc_timeout(&MetadataMap::new()), None);
	}

	#[test]
	fn malformed_header_means_no_deadline() {
		assert_eq!(grpc_timeout(&metadata_with_timeout("not-a-timeout")), None);
	}
}
