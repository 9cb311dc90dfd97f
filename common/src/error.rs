/// This enum serves as a Rosetta Stone of gRPC and HTTP status codes.
///
/// It is voluntarily a restricted subset, matching only the handful of
/// outcomes the adapter service ever needs to report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceErrorCode {
	BadRequest,
	Cancelled,
	DeadlineExceeded,
	Internal,
	NotFound,
	PermissionDenied,
	RateLimited,
	Unavailable,
}

impl ServiceErrorCode {
	pub fn to_grpc_status_code(self) -> tonic::Code {
		match self {
			ServiceErrorCode::BadRequest => tonic::Code::InvalidArgument,
			ServiceErrorCode::Cancelled => tonic::Code::Cancelled,
			ServiceErrorCode::DeadlineExceeded => tonic::Code::DeadlineExceeded,
			ServiceErrorCode::Internal => tonic::Code::Internal,
			ServiceErrorCode::NotFound => tonic::Code::NotFound,
			ServiceErrorCode::PermissionDenied => tonic::Code::PermissionDenied,
			ServiceErrorCode::RateLimited => tonic::Code::ResourceExhausted,
			ServiceErrorCode::Unavailable => tonic::Code::Unavailable,
		}
	}
}

/// Implemented by every crate-local error enum that can be surfaced to a caller.
///
/// Unlike a typical web service, this server never lets one of these reach the
/// gRPC transport as a non-OK status: `GetPage` always returns `Ok(Response)`
/// with a structured `Error` payload on the oneof (see the `engine` crate).
/// `grpc_error` exists for the rare case (panics aside) where a caller wants to
/// map an adapter error onto a transport-level status directly, e.g. in tests.
pub trait ServiceError: ToString {
	fn error_code(&self) -> ServiceErrorCode;

	fn grpc_error(&self) -> tonic::Status {
		tonic::Status::new(self.error_code().to_grpc_status_code(), self.to_string())
	}

	/// Whether a caller may retry the request unmodified.
	fn is_retryable(&self) -> bool {
		matches!(
			self.error_code(),
			ServiceErrorCode::RateLimited | ServiceErrorCode::Unavailable
		)
	}
}

pub fn convert_to_grpc_result<T, E: ServiceError>(
	res: Result<T, E>,
) -> Result<tonic::Response<T>, tonic::Status> {
	res.map(tonic::Response::new).map_err(|error| error.grpc_error())
}
