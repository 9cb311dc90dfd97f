//! Generated and hand-written wire types for the `AdapterService.GetPage` RPC.
//!
//! The message shapes are generated by `tonic-build`/`prost-build` from
//! `protos/adapter/v1/adapter.proto` at compile time (see `build.rs`); this
//! module just `include!`s the generated code and layers convenience
//! constructors on top, the way `querent.cluster.rs`/`querent.semantics.rs`
//! are `include!`d by their hand-written sibling modules in the reference
//! codebase.

pub mod adapter {
	pub mod v1 {
		include!(concat!(env!("OUT_DIR"), "/adapter.v1.rs"));
	}
}

pub use adapter::v1::*;

impl GetPageResponse {
	pub fn success(objects: Vec<PageObject>, next_cursor: String) -> Self {
		GetPageResponse {
			result: Some(get_page_response::Result::Success(Success { objects, next_cursor })),
		}
	}

	pub fn error(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
		GetPageResponse {
			result: Some(get_page_response::Result::Error(Error {
				code: code.into(),
				message: message.into(),
				retryable,
			})),
		}
	}
}

impl ScalarValue {
	pub fn string(value: impl Into<String>) -> Self {
		ScalarValue { kind: Some(scalar_value::Kind::StringValue(value.into())) }
	}

	pub fn int64(value: i64) -> Self {
		ScalarValue { kind: Some(scalar_value::Kind::Int64Value(value)) }
	}

	pub fn bool(value: bool) -> Self {
		ScalarValue { kind: Some(scalar_value::Kind::BoolValue(value)) }
	}

	pub fn double(value: f64) -> Self {
		ScalarValue { kind: Some(scalar_value::Kind::DoubleValue(value)) }
	}

	pub fn datetime(timestamp: impl Into<String>, timezone_offset_seconds: i32) -> Self {
		ScalarValue {
			kind: Some(scalar_value::Kind::DatetimeValue(DatetimeValue {
				timestamp: timestamp.into(),
				timezone_offset_seconds,
			})),
		}
	}

	pub fn duration(value: impl Into<String>) -> Self {
		ScalarValue { kind: Some(scalar_value::Kind::DurationValue(value.into())) }
	}
}

impl AttributeValue {
	pub fn new(attribute_id: impl Into<String>, values: Vec<ScalarValue>) -> Self {
		AttributeValue { attribute_id: attribute_id.into(), values }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn success_response_round_trips_through_the_oneof() {
		let resp = GetPageResponse::success(vec![], "next".to_string());
		match resp.result {
			Some(get_page_response::Result::Success(success)) => {
				assert_eq!(success.next_cursor, "next");
			},
			_ => panic!("expected Success variant"),
		}
	}

	#[test]
	fn error_response_carries_the_retryable_flag() {
		let resp = GetPageResponse::error("DATASOURCE_RATE_LIMITED", "too many requests", true);
		match resp.result {
			Some(get_page_response::Result::Error(error)) => {
				assert!(error.retryable);
				assert_eq!(error.code, "DATASOURCE_RATE_LIMITED");
			},
			_ => panic!("expected Error variant"),
		}
	}
}
