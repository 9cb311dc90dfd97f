//! Jira Data Center adapter (§4.B.3): REST v2, `startAt`/`maxResults`/`isLast`.

use async_trait::async_trait;
use cursor::{Cursor, CursorToken};
use proto::PageObject;
use serde_json::Value;
use transport::{HttpRequest, TransportClient};

use crate::error::AdapterError;
use crate::shared::{resolve_record, walk_collection, with_synthetic_fields, AdapterPage, AdapterRequest, CollectionSource};
use crate::{Adapter, AuthKind};

const ACCEPTED_AUTH: &[AuthKind] = &[AuthKind::Basic];

const ENTITIES: &[&str] = &["User", "Group", "GroupMember", "Issue"];

pub struct JiraDcAdapter;

impl JiraDcAdapter {
	pub fn new() -> Self {
		Self
	}

	fn walks_groups(entity: &str) -> bool {
		matches!(entity, "User" | "GroupMember")
	}

	async fn list_groups(
		&self,
		transport: &TransportClient,
		request: &AdapterRequest<'_>,
	) -> Result<Vec<String>, AdapterError> {
		let url = format!("https://{}/rest/api/2/groups/picker", request.address);
		let body = transport.execute(&HttpRequest::get(url), &request.auth, request.timeout, &request.retry_params).await?;
		let parsed: Value = serde_json::from_slice(&body)?;
		Ok(parsed
			.get("groups")
			.and_then(Value::as_array)
			.map(|groups| groups.iter().filter_map(|g| g.get("name").and_then(Value::as_str).map(str::to_string)).collect())
			.unwrap_or_default())
	}

	fn build_group_member_url(&self, request: &AdapterRequest<'_>, group_name: &str, start_at: i64) -> String {
		format!(
			"https://{}/rest/api/2/group/member?groupname={}&startAt={}&maxResults={}",
			request.address,
			urlencoding_lite(group_name),
			start_at,
			request.page_size
		)
	}

	fn parse_page(
		&self,
		entity: &proto::Entity,
		body: &[u8],
		records_key: &str,
	) -> Result<(Vec<PageObject>, bool, i64), AdapterError> {
		let (records, is_last, next_start_at) = Self::extract_page(body, records_key)?;
		let mut objects = Vec::with_capacity(records.len());
		for record in &records {
			if let Some(object) = resolve_record(entity, record)? {
				objects.push(object);
			}
		}
		Ok((objects, is_last, next_start_at))
	}

	/// Pulls the raw `records_key` array plus the `isLast`/next-`startAt`
	/// paging fields out of a `startAt`/`maxResults`/`isLast` REST response,
	/// without projecting the records — used by [`JiraGroupSource`], which
	/// needs to synthesize a composite id onto each record first.
	fn extract_page(body: &[u8], records_key: &str) -> Result<(Vec<Value>, bool, i64), AdapterError> {
		let parsed: Value = serde_json::from_slice(body)?;
		let records = parsed
			.get(records_key)
			.and_then(Value::as_array)
			.cloned()
			.ok_or_else(|| AdapterError::ResponseParseError(format!("response is missing `{records_key}`")))?;
		let is_last = parsed.get("isLast").and_then(Value::as_bool).unwrap_or(true);
		let start_at = parsed.get("startAt").and_then(Value::as_i64).unwrap_or(0);
		let max_results = parsed.get("maxResults").and_then(Value::as_i64).unwrap_or(records.len() as i64);
		Ok((records, is_last, start_at + max_results))
	}
}

/// [`CollectionSource`] for `GroupMember` (§4.C "Collection"): pages the
/// group list once (Jira's `groups/picker` response is not itself paginated
/// by this adapter), then for the current group pages its members,
/// synthesizing the composite unique id each emitted record needs. Note the
/// field order is reversed from Azure AD's `GroupMember`: Jira's is
/// `"<groupName>-<userKey>"`.
struct JiraGroupSource<'a> {
	adapter: &'a JiraDcAdapter,
	transport: &'a TransportClient,
	request: &'a AdapterRequest<'a>,
}

#[async_trait]
impl CollectionSource for JiraGroupSource<'_> {
	async fn fetch_parent_page(&self, page_url: Option<&str>) -> Result<(Vec<String>, Option<String>), AdapterError> {
		if page_url.is_some() {
			return Ok((Vec::new(), None));
		}
		let groups = self.adapter.list_groups(self.transport, self.request).await?;
		Ok((groups, None))
	}

	async fn fetch_child_page(
		&self,
		parent_id: &str,
		child_cursor: Option<&CursorToken>,
	) -> Result<(Vec<PageObject>, Option<CursorToken>), AdapterError> {
		let start_at = match child_cursor {
			Some(token) => token.as_int().unwrap_or(0),
			None => 0,
		};
		let url = self.adapter.build_group_member_url(self.request, parent_id, start_at);
		let body = self.transport.execute(&HttpRequest::get(url), &self.request.auth, self.request.timeout, &self.request.retry_params).await?;
		let (records, is_last, next_start_at) = JiraDcAdapter::extract_page(&body, "values")?;

		let mut objects = Vec::with_capacity(records.len());
		for record in &records {
			let user_key = record.get("key").and_then(Value::as_str).unwrap_or_default().to_string();
			let composite = with_synthetic_fields(
				record,
				&[("groupName", parent_id.to_string()), ("userKey", user_key.clone()), ("id", format!("{parent_id}-{user_key}"))],
			);
			if let Some(object) = resolve_record(self.request.entity, &composite)? {
				objects.push(object);
			}
		}
		let next_cursor = if is_last { None } else { Some(CursorToken::Int(next_start_at)) };
		Ok((objects, next_cursor))
	}
}

/// Jira group names can contain spaces; a small hand-rolled percent-encoder
/// avoids pulling in a query-building crate for this single call site.
fn urlencoding_lite(value: &str) -> String {
	value.replace(' ', "%20")
}

#[async_trait]
impl Adapter for JiraDcAdapter {
	fn sor_type(&self) -> &'static str {
		"JiraDataCenter-1.0.0"
	}

	fn entities(&self) -> &'static [&'static str] {
		ENTITIES
	}

	fn accepted_auth(&self) -> &'static [AuthKind] {
		ACCEPTED_AUTH
	}

	/// `GroupMember`'s synthesized `groupName`/`userKey`/composite `id`
	/// fields are always strings (§4.B.2).
	fn known_attribute_type(&self, entity_external_id: &str, attribute_external_id: &str) -> Option<proto::AttributeType> {
		if entity_external_id == "GroupMember" && matches!(attribute_external_id, "groupName" | "userKey" | "id") {
			Some(proto::AttributeType::String)
		} else {
			None
		}
	}

	async fn get_page(&self, transport: &TransportClient, request: &AdapterRequest<'_>) -> Result<AdapterPage, AdapterError> {
		if Self::walks_groups(&request.entity.external_id) {
			let source = JiraGroupSource { adapter: self, transport, request };
			return walk_collection(request.cursor.as_ref(), &source).await;
		}

		if request.entity.external_id == "Group" {
			let start_at = match &request.cursor {
				Some(Cursor::Simple { cursor }) => cursor.as_int().unwrap_or(0),
				None => 0,
				_ => return Err(AdapterError::InvalidCursor("expected a Simple cursor for this entity".to_string())),
			};
			let url = format!(
				"https://{}/rest/api/2/groups/picker?startAt={}&maxResults={}",
				request.address, start_at, request.page_size
			);
			let body = transport.execute(&HttpRequest::get(url), &request.auth, request.timeout, &request.retry_params).await?;
			let (objects, is_last, next_start_at) = self.parse_page(request.entity, &body, "groups")?;
			let next_cursor = if is_last { None } else { Some(Cursor::simple(next_start_at)) };
			return Ok(AdapterPage { objects, next_cursor });
		}

		// Issue
		let start_at = match &request.cursor {
			Some(Cursor::Simple { cursor }) => cursor.as_int().unwrap_or(0),
			None => 0,
			_ => return Err(AdapterError::InvalidCursor("expected a Simple cursor for this entity".to_string())),
		};
		let jql = request.config.get("jql").and_then(Value::as_str).unwrap_or("");
		let url = format!(
			"https://{}/rest/api/2/search?jql={}&startAt={}&maxResults={}",
			request.address,
			urlencoding_lite(jql),
			start_at,
			request.page_size
		);
		let body = transport.execute(&HttpRequest::get(url), &request.auth, request.timeout, &request.retry_params).await?;
		let (objects, is_last, next_start_at) = self.parse_page(request.entity, &body, "issues")?;
		let next_cursor = if is_last { None } else { Some(Cursor::simple(next_start_at)) };
		Ok(AdapterPage { objects, next_cursor })
	}
}
