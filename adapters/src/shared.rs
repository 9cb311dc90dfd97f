use std::time::Duration;

use async_trait::async_trait;
use common::retry::RetryParams;
use cursor::{Cursor, CursorToken};
use proto::{AttributeValue, ChildObjectGroup, Entity, PageObject};
use projector::Path;
use serde_json::Value;
use transport::AuthMethod;

use crate::error::AdapterError;

/// Everything an adapter needs to build a request and parse the resulting
/// page, gathered by the engine from the inbound `GetPageRequest` (§4.B).
pub struct AdapterRequest<'a> {
	pub datasource_id: &'a str,
	pub address: &'a str,
	pub auth: AuthMethod,
	pub config: Value,
	pub entity: &'a Entity,
	pub page_size: u32,
	pub cursor: Option<Cursor>,
	pub timeout: Duration,
	pub retry_params: RetryParams,
}

pub struct AdapterPage {
	pub objects: Vec<PageObject>,
	pub next_cursor: Option<Cursor>,
}

/// Reads a recognized SoR-config key, ignoring (but not erroring on) unknown
/// keys per §6 — "unknown keys ignored with a warning".
pub fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
	config.get(key).and_then(Value::as_str)
}

pub fn config_u64(config: &Value, key: &str) -> Option<u64> {
	config.get(key).and_then(Value::as_u64)
}

/// Step 3 of the shared response pipeline (§4.B.5): resolves one entity's
/// attributes plus child entities against `record`, rejecting the record if
/// a required `uniqueId` attribute is missing, and sorting attributes
/// lexicographically by id for deterministic output.
pub fn resolve_record(entity: &Entity, record: &Value) -> Result<Option<PageObject>, AdapterError> {
	let mut values = projector::resolve_entity_attributes(record, &entity.attributes)?;
	if !projector::has_required_unique_ids(&entity.attributes, &values) {
		tracing::warn!(entity = %entity.external_id, "dropping record missing a required uniqueId attribute");
		return Ok(None);
	}
	values.sort_by(|a, b| a.attribute_id.cmp(&b.attribute_id));

	let mut child_objects = Vec::with_capacity(entity.child_entities.len());
	for child in &entity.child_entities {
		let objects = resolve_child_entity(child, record)?;
		child_objects.push(ChildObjectGroup { child_entity_id: child.id.clone(), objects });
	}

	Ok(Some(PageObject { attributes: values, child_objects }))
}

fn resolve_child_entity(child: &Entity, parent_record: &Value) -> Result<Vec<PageObject>, AdapterError> {
	let path = Path::parse(&child.external_id).map_err(|e| AdapterError::ResponseParseError(e.to_string()))?;
	let root = match path.resolve(parent_record) {
		None => return Ok(Vec::new()),
		Some(value) => value,
	};
	let items = root
		.as_array()
		.ok_or_else(|| AdapterError::ResponseParseError(format!("child entity `{}` root is not an array", child.id)))?;

	let mut objects = Vec::with_capacity(items.len());
	for item in items {
		if let Some(object) = resolve_record(child, item)? {
			objects.push(object);
		}
	}
	Ok(objects)
}

#[allow(dead_code)]
pub fn attribute_value_len(values: &[AttributeValue]) -> usize {
	values.len()
}

/// Sets fields on a parent-child relationship record before it reaches the
/// projector, e.g. the `groupId` and composite `id` a `GroupMember` record
/// needs alongside the member fields the SoR itself returned (§3 "synthesizes
/// derived fields", §4.B.2 "Composite unique IDs"). Overwrites any field of
/// the same name the SoR response already carried.
pub fn with_synthetic_fields(record: &Value, fields: &[(&str, String)]) -> Value {
	let mut record = record.clone();
	if let Value::Object(map) = &mut record {
		for (key, value) in fields {
			map.insert((*key).to_string(), Value::String(value.clone()));
		}
	}
	record
}

/// Capability a SoR adapter implements to plug into [`walk_collection`]: how
/// to fetch one page of the parent list, and how to fetch one page of a
/// given parent's children.
#[async_trait]
pub trait CollectionSource {
	/// Fetches one page of parent ids, resuming at `page_url` (the adapter's
	/// own opaque continuation token for the parent list) or starting fresh
	/// when `page_url` is `None`. Returns parent ids in SoR order plus the
	/// continuation token for the next page of parents, if any.
	async fn fetch_parent_page(&self, page_url: Option<&str>) -> Result<(Vec<String>, Option<String>), AdapterError>;

	/// Fetches one page of `parent_id`'s children, resuming at `child_cursor`
	/// or starting fresh when it is `None`. Returns the resolved page records
	/// plus the continuation token for the next page of children, if any.
	async fn fetch_child_page(
		&self,
		parent_id: &str,
		child_cursor: Option<&CursorToken>,
	) -> Result<(Vec<PageObject>, Option<CursorToken>), AdapterError>;
}

/// A hard ceiling on how many parents one call will skip past looking for a
/// non-empty child page, so a pathological SoR response (parents that all
/// legitimately have zero children) can't spin forever within one RPC.
const MAX_EMPTY_PARENTS_PER_CALL: usize = 10_000;

/// Sentinel stored in a `Collection` cursor's `collectionCursor` field when
/// the active parent's children are fully exhausted and the walk must
/// advance to whichever parent follows it on the next call (§3 "collectionCursor:
/// <simple-cursor-or-int>" names only the current parent and its child
/// cursor — there is no field to also carry "and then move on"). Distinct
/// from any real SoR pagination token (those are non-negative integers or
/// opaque strings the SoR itself hands back) and interpreted by this module
/// alone; a `CollectionSource::fetch_child_page` implementation never sees it.
const PARENT_EXHAUSTED: &str = "\u{0}parent-exhausted";

/// Re-walks the parent list from the beginning looking for the parent that
/// follows `after` in SoR-returned order, or the first parent when `after`
/// is `None`. The documented `Collection` cursor shape has no field for a
/// parent-list page position, so rather than persist one across calls this
/// re-derives the position every time it's needed, bounded by
/// [`MAX_EMPTY_PARENTS_PER_CALL`] pages of the parent list.
async fn next_parent(source: &dyn CollectionSource, after: Option<&str>) -> Result<Option<String>, AdapterError> {
	let mut page_url = None;
	let mut found = after.is_none();
	for _ in 0..MAX_EMPTY_PARENTS_PER_CALL {
		let (parents, next_page) = source.fetch_parent_page(page_url.as_deref()).await?;
		for parent in parents {
			if found {
				return Ok(Some(parent));
			}
			if Some(parent.as_str()) == after {
				found = true;
			}
		}
		match next_page {
			Some(next) => page_url = Some(next),
			None => return Ok(None),
		}
	}
	Err(AdapterError::ResponseParseError("parent list scan did not converge within this call".to_string()))
}

/// Drives the generic two-level "collection walk" (§4.C): pages through a
/// parent list and, for the current parent, pages through its children.
///
/// Per §8 ("Child-collection entity whose first parent has zero children ⇒
/// advances to next parent without emitting records"), a parent with an
/// empty child page does not end the walk or surface a page boundary — the
/// walk keeps fetching subsequent parents, within the same call, until it
/// finds one with at least one child record or the parent list itself is
/// exhausted.
pub async fn walk_collection(
	cursor: Option<&Cursor>,
	source: &dyn CollectionSource,
) -> Result<AdapterPage, AdapterError> {
	let (mut parent_id, mut child_cursor) = match cursor {
		None => (None, None),
		Some(Cursor::Collection { collection_id, collection_cursor }) => {
			if collection_cursor.as_str() == PARENT_EXHAUSTED {
				(next_parent(source, Some(collection_id)).await?, None)
			} else {
				(Some(collection_id.clone()), Some(collection_cursor.clone()))
			}
		},
		_ => return Err(AdapterError::InvalidCursor("expected a Collection cursor for this entity".to_string())),
	};

	for _ in 0..MAX_EMPTY_PARENTS_PER_CALL {
		let active_parent = match parent_id.take() {
			Some(id) => id,
			None => match next_parent(source, None).await? {
				Some(id) => id,
				None => return Ok(AdapterPage { objects: Vec::new(), next_cursor: None }),
			},
		};

		let (objects, next_child_cursor) = source.fetch_child_page(&active_parent, child_cursor.as_ref()).await?;
		child_cursor = None;

		if !objects.is_empty() {
			let next_cursor = match next_child_cursor {
				Some(token) => Cursor::collection(active_parent, token),
				None => Cursor::collection(active_parent, CursorToken::Str(PARENT_EXHAUSTED.to_string())),
			};
			return Ok(AdapterPage { objects, next_cursor: Some(next_cursor) });
		}

		// This parent's children are exhausted (or never had any); advance to
		// the next parent and keep looking within the same call.
		parent_id = next_parent(source, Some(&active_parent)).await?;
		if parent_id.is_none() {
			return Ok(AdapterPage { objects: Vec::new(), next_cursor: None });
		}
	}

	Err(AdapterError::ResponseParseError(
		"collection walk did not converge within this call (too many empty parents)".to_string(),
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proto::{Attribute, AttributeType};
	use serde_json::json;

	fn attr(id: &str, external_id: &str, unique_id: bool) -> Attribute {
		Attribute {
			id: id.to_string(),
			external_id: external_id.to_string(),
			r#type: AttributeType::String as i32,
			list: false,
			unique_id,
		}
	}

	#[test]
	fn record_missing_required_unique_id_is_dropped() {
		let entity = Entity {
			id: "user".to_string(),
			external_id: "User".to_string(),
			ordered: false,
			attributes: vec![attr("id", "id", true)],
			child_entities: vec![],
		};
		let record = json!({ "displayName": "Alice" });
		assert!(resolve_record(&entity, &record).unwrap().is_none());
	}

	#[test]
	fn child_entities_are_resolved_from_a_nested_array() {
		let child = Entity {
			id: "emails".to_string(),
			external_id: "$.email_Work".to_string(),
			ordered: false,
			attributes: vec![attr("address", "address", true)],
			child_entities: vec![],
		};
		let entity = Entity {
			id: "worker".to_string(),
			external_id: "Worker".to_string(),
			ordered: false,
			attributes: vec![attr("id", "id", true)],
			child_entities: vec![child],
		};
		let record = json!({ "id": "w-1", "email_Work": [{ "address": "a@example.com" }] });
		let object = resolve_record(&entity, &record).unwrap().unwrap();
		assert_eq!(object.child_objects.len(), 1);
		assert_eq!(object.child_objects[0].objects.len(), 1);
	}

	/// A [`CollectionSource`] over in-memory parent/child pages, for exercising
	/// [`walk_collection`] without any transport.
	struct FakeSource {
		parent_pages: Vec<Vec<&'static str>>,
		children: std::collections::HashMap<&'static str, Vec<Vec<&'static str>>>,
	}

	fn page_object(id: &str) -> PageObject {
		PageObject { attributes: vec![AttributeValue::new("id", vec![proto::ScalarValue::string(id)])], child_objects: vec![] }
	}

	#[async_trait]
	impl CollectionSource for FakeSource {
		async fn fetch_parent_page(&self, page_url: Option<&str>) -> Result<(Vec<String>, Option<String>), AdapterError> {
			let index: usize = page_url.map(|s| s.parse().unwrap()).unwrap_or(0);
			let parents = self.parent_pages[index].iter().map(|s| s.to_string()).collect();
			let next = if index + 1 < self.parent_pages.len() { Some((index + 1).to_string()) } else { None };
			Ok((parents, next))
		}

		async fn fetch_child_page(
			&self,
			parent_id: &str,
			child_cursor: Option<&CursorToken>,
		) -> Result<(Vec<PageObject>, Option<CursorToken>), AdapterError> {
			let pages = self.children.get(parent_id).cloned().unwrap_or_default();
			let index: usize = match child_cursor {
				Some(token) => token.as_str().parse().map_err(|_| AdapterError::InvalidCursor("bad child cursor".to_string()))?,
				None => 0,
			};
			let objects = pages.get(index).into_iter().flatten().map(|id| page_object(id)).collect::<Vec<_>>();
			let next = if index + 1 < pages.len() { Some(CursorToken::Str((index + 1).to_string())) } else { None };
			Ok((objects, next))
		}
	}

	#[tokio::test]
	async fn walk_collection_advances_past_a_parent_with_zero_children_in_one_call() {
		let source = FakeSource {
			parent_pages: vec![vec!["empty-parent", "full-parent"]],
			children: std::collections::HashMap::from([("full-parent", vec![vec!["child-1"]])]),
		};
		let page = walk_collection(None, &source).await.unwrap();
		assert_eq!(page.objects.len(), 1);
		assert!(page.next_cursor.is_some());
	}

	#[tokio::test]
	async fn walk_collection_pages_across_a_multi_page_parent_list() {
		let source = FakeSource {
			parent_pages: vec![vec!["empty-1"], vec!["full-1"]],
			children: std::collections::HashMap::from([("full-1", vec![vec!["child-1"]])]),
		};
		let page = walk_collection(None, &source).await.unwrap();
		assert_eq!(page.objects.len(), 1);
	}

	#[tokio::test]
	async fn walk_collection_resumes_a_partially_walked_child_page() {
		let source = FakeSource {
			parent_pages: vec![vec!["parent-1"]],
			children: std::collections::HashMap::from([("parent-1", vec![vec!["child-1"], vec!["child-2"]])]),
		};
		let first = walk_collection(None, &source).await.unwrap();
		assert_eq!(first.objects.len(), 1);
		let second = walk_collection(first.next_cursor.as_ref(), &source).await.unwrap();
		assert_eq!(second.objects.len(), 1);
		assert_ne!(first.objects[0].attributes[0].values[0], second.objects[0].attributes[0].values[0]);
	}

	#[tokio::test]
	async fn next_cursor_carries_the_documented_plain_offset_not_an_opaque_blob() {
		let source = FakeSource {
			parent_pages: vec![vec!["jira-administrators"]],
			children: std::collections::HashMap::from([("jira-administrators", vec![vec!["u-1"], vec!["u-2"]])]),
		};
		let page = walk_collection(None, &source).await.unwrap();
		match page.next_cursor {
			Some(Cursor::Collection { collection_id, collection_cursor }) => {
				assert_eq!(collection_id, "jira-administrators");
				assert_eq!(collection_cursor, CursorToken::Str("1".to_string()));
			},
			other => panic!("expected a plain Collection cursor, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn resuming_once_a_parent_is_exhausted_advances_to_the_next_parent() {
		let source = FakeSource {
			parent_pages: vec![vec!["parent-1", "parent-2"]],
			children: std::collections::HashMap::from([
				("parent-1", vec![vec!["child-1"]]),
				("parent-2", vec![vec!["child-2"]]),
			]),
		};
		let first = walk_collection(None, &source).await.unwrap();
		assert_eq!(first.objects.len(), 1);
		let second = walk_collection(first.next_cursor.as_ref(), &source).await.unwrap();
		assert_eq!(second.objects.len(), 1);
		assert_ne!(first.objects[0].attributes[0].values[0], second.objects[0].attributes[0].values[0]);
	}

	#[tokio::test]
	async fn walk_collection_ends_when_every_parent_has_zero_children() {
		let source = FakeSource {
			parent_pages: vec![vec!["empty-1", "empty-2"]],
			children: std::collections::HashMap::new(),
		};
		let page = walk_collection(None, &source).await.unwrap();
		assert!(page.objects.is_empty());
		assert!(page.next_cursor.is_none());
	}

	#[test]
	fn attributes_are_sorted_lexicographically_by_id() {
		let entity = Entity {
			id: "user".to_string(),
			external_id: "User".to_string(),
			ordered: false,
			attributes: vec![attr("zzz", "zzz", false), attr("aaa", "aaa", false)],
			child_entities: vec![],
		};
		let record = json!({ "zzz": "z", "aaa": "a" });
		let object = resolve_record(&entity, &record).unwrap().unwrap();
		assert_eq!(object.attributes[0].attribute_id, "aaa");
		assert_eq!(object.attributes[1].attribute_id, "zzz");
	}
}
