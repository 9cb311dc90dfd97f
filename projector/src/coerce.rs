//! Type coercion from a raw JSON scalar into a [`proto::ScalarValue`] (§4.D).

use chrono::{DateTime, NaiveDate};
use proto::ScalarValue;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CoercionError {
	#[error("expected a string, got {0}")]
	NotAString(&'static str),
	#[error("expected a number or numeric string, got {0}")]
	NotANumber(&'static str),
	#[error("expected a boolean, got {0}")]
	NotABool(&'static str),
	#[error("`{0}` is not a valid RFC 3339 / ISO 8601 datetime")]
	InvalidDatetime(String),
}

fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

pub fn coerce_string(value: &Value) -> Result<ScalarValue, CoercionError> {
	match value {
		Value::String(s) => Ok(ScalarValue::string(s.clone())),
		other => Err(CoercionError::NotAString(type_name(other))),
	}
}

pub fn coerce_int64(value: &Value) -> Result<ScalarValue, CoercionError> {
	match value {
		Value::Number(n) if n.is_i64() => Ok(ScalarValue::int64(n.as_i64().unwrap())),
		Value::Number(n) if n.is_u64() => Ok(ScalarValue::int64(n.as_u64().unwrap() as i64)),
		Value::String(s) => s
			.parse::<i64>()
			.map(ScalarValue::int64)
			.map_err(|_| CoercionError::NotANumber("non-numeric string")),
		other => Err(CoercionError::NotANumber(type_name(other))),
	}
}

pub fn coerce_double(value: &Value) -> Result<ScalarValue, CoercionError> {
	match value {
		Value::Number(n) => n
			.as_f64()
			.map(ScalarValue::double)
			.ok_or(CoercionError::NotANumber("non-finite number")),
		Value::String(s) => s
			.parse::<f64>()
			.map(ScalarValue::double)
			.map_err(|_| CoercionError::NotANumber("non-numeric string")),
		other => Err(CoercionError::NotANumber(type_name(other))),
	}
}

pub fn coerce_bool(value: &Value) -> Result<ScalarValue, CoercionError> {
	match value {
		Value::Bool(b) => Ok(ScalarValue::bool(*b)),
		other => Err(CoercionError::NotABool(type_name(other))),
	}
}

/// Parses an RFC 3339 / ISO 8601 datetime string, re-emitting the timestamp
/// in RFC 3339 form plus the source's UTC offset in seconds.
pub fn coerce_datetime(value: &Value) -> Result<ScalarValue, CoercionError> {
	let raw = match value {
		Value::String(s) => s.as_str(),
		other => return Err(CoercionError::NotAString(type_name(other))),
	};
	if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
		return Ok(ScalarValue::datetime(parsed.to_rfc3339(), parsed.offset().local_minus_utc()));
	}
	// A bare date (no time component, e.g. Workday's `hireDate`) is midnight UTC.
	if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
		let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is always a valid time");
		return Ok(ScalarValue::datetime(format!("{}Z", midnight.format("%Y-%m-%dT%H:%M:%S")), 0));
	}
	Err(CoercionError::InvalidDatetime(raw.to_string()))
}

/// ISO 8601 durations (`PT1H30M`, `P3D`, ...) are passed through verbatim:
/// the wire type carries the original string, and interpretation is left to
/// the caller, mirroring how SoRs themselves never interpret these values.
pub fn coerce_duration(value: &Value) -> Result<ScalarValue, CoercionError> {
	match value {
		Value::String(s) => Ok(ScalarValue::duration(s.clone())),
		other => Err(CoercionError::NotAString(type_name(other))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proto::scalar_value::Kind;
	use serde_json::json;

	#[test]
	fn numeric_string_coerces_to_int64() {
		let scalar = coerce_int64(&json!("42")).unwrap();
		assert_eq!(scalar.kind, Some(Kind::Int64Value(42)));
	}

	#[test]
	fn non_numeric_string_fails_int64_coercion() {
		assert!(coerce_int64(&json!("not-a-number")).is_err());
	}

	#[test]
	fn double_accepts_numeric_string() {
		let scalar = coerce_double(&json!("3.14")).unwrap();
		assert_eq!(scalar.kind, Some(Kind::DoubleValue(3.14)));
	}

	#[test]
	fn datetime_round_trips_offset_seconds() {
		let scalar = coerce_datetime(&json!("2024-01-15T10:30:00-05:00")).unwrap();
		match scalar.kind {
			Some(Kind::DatetimeValue(dt)) => assert_eq!(dt.timezone_offset_seconds, -5 * 3600),
			other => panic!("expected DatetimeValue, got {other:?}"),
		}
	}

	#[test]
	fn bare_date_coerces_to_midnight_utc() {
		let scalar = coerce_datetime(&json!("2020-03-15")).unwrap();
		match scalar.kind {
			Some(Kind::DatetimeValue(dt)) => {
				assert_eq!(dt.timestamp, "2020-03-15T00:00:00Z");
				assert_eq!(dt.timezone_offset_seconds, 0);
			},
			other => panic!("expected DatetimeValue, got {other:?}"),
		}
	}

	#[test]
	fn malformed_datetime_is_rejected() {
		assert!(matches!(coerce_datetime(&json!("not-a-date")), Err(CoercionError::InvalidDatetime(_))));
	}

	#[test]
	fn duration_passes_through_verbatim() {
		let scalar = coerce_duration(&json!("PT1H30M")).unwrap();
		assert_eq!(scalar.kind, Some(Kind::DurationValue("PT1H30M".to_string())));
	}

	#[test]
	fn bool_rejects_truthy_strings() {
		assert!(coerce_bool(&json!("true")).is_err());
	}
}
