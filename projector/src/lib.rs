//! Attribute resolution: turns a JSON document plus an entity's attribute
//! descriptors into the ordered `(attribute-id, values[])` pairs of a page
//! record (§3 "Page record", §4.D).

mod coerce;
mod path;

pub use coerce::CoercionError;
pub use path::{Path, PathError};

use proto::{Attribute, AttributeType, AttributeValue};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
	#[error(transparent)]
	Path(#[from] PathError),
	#[error("attribute `{attribute_id}`: {source}")]
	Coercion { attribute_id: String, #[source] source: CoercionError },
	#[error("attribute `{0}` declares `list=true` but the source value is not a JSON array")]
	NotAList(String),
}

/// Resolves one attribute against `node`. Returns `Ok(None)` when the source
/// path is absent or null — callers must omit the attribute entirely rather
/// than emit a null-filled value (§3 invariant on page records), except for
/// `list` attributes, where a missing source resolves to an attribute with
/// zero values rather than being omitted.
pub fn resolve_attribute(node: &Value, attribute: &Attribute) -> Result<Option<AttributeValue>, ProjectionError> {
	let path = Path::parse(&attribute.external_id)?;
	let resolved = path.resolve(node).filter(|v| !v.is_null());

	if attribute.list {
		let values = match resolved {
			None => Vec::new(),
			Some(Value::Array(items)) => items
				.iter()
				.filter(|item| !item.is_null())
				.map(|item| coerce_one(item, attribute))
				.collect::<Result<Vec<_>, _>>()?,
			Some(_) => return Err(ProjectionError::NotAList(attribute.id.clone())),
		};
		return Ok(Some(AttributeValue::new(attribute.id.clone(), values)));
	}

	match resolved {
		None => Ok(None),
		Some(value) => {
			let scalar = coerce_one(value, attribute)?;
			Ok(Some(AttributeValue::new(attribute.id.clone(), vec![scalar])))
		},
	}
}

fn coerce_one(value: &Value, attribute: &Attribute) -> Result<proto::ScalarValue, ProjectionError> {
	let attribute_type = AttributeType::try_from(attribute.r#type).unwrap_or(AttributeType::Unspecified);
	let result = match attribute_type {
		AttributeType::String => coerce::coerce_string(value),
		AttributeType::Int64 => coerce::coerce_int64(value),
		AttributeType::Bool => coerce::coerce_bool(value),
		AttributeType::Double => coerce::coerce_double(value),
		AttributeType::Datetime => coerce::coerce_datetime(value),
		AttributeType::Duration => coerce::coerce_duration(value),
		AttributeType::Unspecified => coerce::coerce_string(value),
	};
	result.map_err(|source| ProjectionError::Coercion { attribute_id: attribute.id.clone(), source })
}

/// Resolves every attribute of `entity` against `node` in declaration order,
/// producing the ordered `AttributeValue` list for one page record.
///
/// A coercion failure on a `uniqueId` attribute is fatal (the record cannot
/// be identified without it) and propagates. A coercion failure on any other
/// attribute is logged and the attribute is dropped so the rest of the
/// record — and the page it belongs to — still comes back (§7 "Propagation
/// policy").
pub fn resolve_entity_attributes(
	node: &Value,
	attributes: &[Attribute],
) -> Result<Vec<AttributeValue>, ProjectionError> {
	let mut values = Vec::with_capacity(attributes.len());
	for attribute in attributes {
		match resolve_attribute(node, attribute) {
			Ok(Some(value)) => values.push(value),
			Ok(None) => {},
			Err(ProjectionError::Coercion { attribute_id, source }) if !attribute.unique_id => {
				tracing::warn!(attribute_id, %source, "dropping attribute: coercion failed");
			},
			Err(error) => return Err(error),
		}
	}
	Ok(values)
}

/// Checks the `uniqueId`-flagged attributes among `values` are all present
/// and non-empty (§3 invariant 4). Records failing this check must be
/// omitted from the page and logged, never returned with a blank id.
pub fn has_required_unique_ids(attributes: &[Attribute], values: &[AttributeValue]) -> bool {
	attributes
		.iter()
		.filter(|a| a.unique_id)
		.all(|required| {
			values
				.iter()
				.find(|v| v.attribute_id == required.id)
				.map(|v| !v.values.is_empty())
				.unwrap_or(false)
		})
}
