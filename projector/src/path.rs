//! A deliberately small JSONPath subset: `$`, `.name`, `["name"]`, `[index]`.
//! No wildcards, no filters, no recursive descent — §4.D draws this boundary
//! explicitly, and the parser below enforces it by construction rather than
//! by convention.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
	#[error("path `{0}` is not valid: {1}")]
	Malformed(String, &'static str),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
	Field(String),
	Index(usize),
}

/// A parsed, reusable path. Adapters parse each attribute's `external_id`
/// once per request and reuse the `Path` across every record on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
	segments: Vec<Segment>,
}

impl Path {
	/// Parses `external_id` as a path if it starts with `$`, otherwise treats
	/// the whole string as a single field-name lookup at the current node.
	pub fn parse(external_id: &str) -> Result<Path, PathError> {
		if !external_id.starts_with('$') {
			return Ok(Path { segments: vec![Segment::Field(external_id.to_string())] });
		}
		let mut segments = Vec::new();
		let mut rest = &external_id[1..];
		while !rest.is_empty() {
			if let Some(after_dot) = rest.strip_prefix('.') {
				let end = after_dot
					.find(|c| c == '.' || c == '[')
					.unwrap_or(after_dot.len());
				let (name, remainder) = after_dot.split_at(end);
				if name.is_empty() {
					return Err(PathError::Malformed(external_id.to_string(), "empty field name after `.`"));
				}
				segments.push(Segment::Field(name.to_string()));
				rest = remainder;
			} else if let Some(after_bracket) = rest.strip_prefix('[') {
				let end = after_bracket
					.find(']')
					.ok_or(PathError::Malformed(external_id.to_string(), "unterminated `[`"))?;
				let (inner, remainder) = after_bracket.split_at(end);
				let remainder = &remainder[1..]; // drop the `]`
				let trimmed = inner.trim();
				if let Some(quoted) = trimmed
					.strip_prefix('"')
					.and_then(|s| s.strip_suffix('"'))
					.or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
				{
					segments.push(Segment::Field(quoted.to_string()));
				} else {
					let index: usize = trimmed
						.parse()
						.map_err(|_| PathError::Malformed(external_id.to_string(), "bracket index must be a non-negative integer or quoted field name"))?;
					segments.push(Segment::Index(index));
				}
				rest = remainder;
			} else {
				return Err(PathError::Malformed(external_id.to_string(), "expected `.` or `[` after root"));
			}
		}
		Ok(Path { segments })
	}

	/// Navigates `root` by this path. A missing field or out-of-range index
	/// resolves to `None` (spec: "missing source ⇒ empty list" / omitted
	/// attribute), never an error — only a malformed path string is an error,
	/// and that is caught at [`Path::parse`] time.
	pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
		let mut current = root;
		for segment in &self.segments {
			current = match (segment, current) {
				(Segment::Field(name), Value::Object(map)) => map.get(name)?,
				(Segment::Index(i), Value::Array(items)) => items.get(*i)?,
				_ => return None,
			};
		}
		Some(current)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn bare_field_name_is_a_single_field_lookup() {
		let path = Path::parse("displayName").unwrap();
		let root = json!({ "displayName": "Alice" });
		assert_eq!(path.resolve(&root), Some(&json!("Alice")));
	}

	#[test]
	fn dotted_path_walks_nested_objects() {
		let path = Path::parse("$.manager.id").unwrap();
		let root = json!({ "manager": { "id": "u-1" } });
		assert_eq!(path.resolve(&root), Some(&json!("u-1")));
	}

	#[test]
	fn bracket_index_walks_into_an_array() {
		let path = Path::parse("$.collaborators.edges[0].node.login").unwrap();
		let root = json!({
			"collaborators": { "edges": [{ "node": { "login": "octocat" } }] }
		});
		assert_eq!(path.resolve(&root), Some(&json!("octocat")));
	}

	#[test]
	fn quoted_bracket_segment_is_a_field_name() {
		let path = Path::parse(r#"$["management-level"]["id"]"#).unwrap();
		let root = json!({ "management-level": { "id": "L5" } });
		assert_eq!(path.resolve(&root), Some(&json!("L5")));
	}

	#[test]
	fn missing_field_resolves_to_none_not_an_error() {
		let path = Path::parse("$.manager.id").unwrap();
		let root = json!({ "displayName": "Alice" });
		assert_eq!(path.resolve(&root), None);
	}

	#[test]
	fn out_of_range_index_resolves_to_none() {
		let path = Path::parse("$.items[5]").unwrap();
		let root = json!({ "items": [1, 2] });
		assert_eq!(path.resolve(&root), None);
	}

	#[test]
	fn unterminated_bracket_is_malformed() {
		assert!(matches!(Path::parse("$.items[0"), Err(PathError::Malformed(_, _))));
	}

	#[test]
	fn non_numeric_unquoted_bracket_contents_is_malformed() {
		assert!(matches!(Path::parse("$.items[abc]"), Err(PathError::Malformed(_, _))));
	}
}
