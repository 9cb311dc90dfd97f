//! Microsoft Graph (Azure AD) adapter (§4.B.1).

use async_trait::async_trait;
use cursor::{Cursor, CursorToken, FilterMatrixState};
use proto::PageObject;
use serde_json::Value;
use transport::{HttpRequest, TransportClient};

use crate::error::AdapterError;
use crate::shared::{
	config_str, resolve_record, walk_collection, with_synthetic_fields, AdapterPage, AdapterRequest, CollectionSource,
};
use crate::{Adapter, AuthKind};

const ACCEPTED_AUTH: &[AuthKind] = &[AuthKind::Bearer];

const ENTITIES: &[&str] = &[
	"User",
	"Group",
	"Role",
	"Application",
	"Device",
	"GroupMember",
	"RoleMember",
	"RoleAssignment",
	"RoleAssignmentScheduleRequest",
	"GroupAssignmentScheduleRequest",
];

/// Maps a child-collection entity to the parent collection it walks, the
/// Graph relation segment used to list its members, and the synthetic
/// `<parentField>`/`memberId` names the composite unique id is built from
/// (§4.B.2 "Composite unique IDs").
fn parent_collection(entity: &str) -> Option<(&'static str, &'static str, &'static str)> {
	match entity {
		"GroupMember" => Some(("groups", "members", "groupId")),
		"RoleMember" => Some(("directoryRoles", "members", "roleId")),
		_ => None,
	}
}

pub struct AzureAdAdapter;

impl AzureAdAdapter {
	pub fn new() -> Self {
		Self
	}

	fn api_version(config: &Value) -> &str {
		config_str(config, "apiVersion").unwrap_or("v1.0")
	}

	/// An attribute's `externalId` of the form `<nav>__<field>` (e.g.
	/// `manager__id`) names a field reached through a navigation property
	/// rather than a direct property of the collection itself, and is
	/// projected via `$expand=<nav>($select=<field>,...)` instead of `$select`
	/// (§4.B.1 "URL construction").
	fn derived_field(external_id: &str) -> Option<(&str, &str)> {
		let trimmed = external_id.trim_start_matches('$').trim_start_matches('.');
		trimmed.split_once("__")
	}

	fn select_clause(request: &AdapterRequest<'_>) -> String {
		request
			.entity
			.attributes
			.iter()
			.map(|a| a.external_id.trim_start_matches('$').trim_start_matches('.'))
			.filter(|id| Self::derived_field(id).is_none())
			.collect::<Vec<_>>()
			.join(",")
	}

	/// Groups derived attributes by navigation property into a single
	/// `$expand` value, e.g. `manager__id` + `manager__displayName` become
	/// `manager($select=id,displayName)`.
	fn expand_clause(request: &AdapterRequest<'_>) -> Option<String> {
		let mut navs: Vec<(&str, Vec<&str>)> = Vec::new();
		for attribute in &request.entity.attributes {
			let id = attribute.external_id.trim_start_matches('$').trim_start_matches('.');
			if let Some((nav, field)) = Self::derived_field(id) {
				match navs.iter_mut().find(|(n, _)| *n == nav) {
					Some((_, fields)) => fields.push(field),
					None => navs.push((nav, vec![field])),
				}
			}
		}
		if navs.is_empty() {
			return None;
		}
		Some(navs.into_iter().map(|(nav, fields)| format!("{nav}($select={})", fields.join(","))).collect::<Vec<_>>().join(","))
	}

	fn apply_select_and_expand(url: &mut url::Url, request: &AdapterRequest<'_>) {
		url.query_pairs_mut().append_pair("$select", &Self::select_clause(request));
		if let Some(expand) = Self::expand_clause(request) {
			url.query_pairs_mut().append_pair("$expand", &expand);
		}
	}

	fn build_collection_url(&self, request: &AdapterRequest<'_>, collection: &str) -> String {
		let api_version = Self::api_version(&request.config);
		let mut url = url::Url::parse(&format!("https://{}/{}/{}", request.address, api_version, collection))
			.expect("address + static segments form a valid URL");
		Self::apply_select_and_expand(&mut url, request);
		url.query_pairs_mut().append_pair("$top", &request.page_size.to_string());
		if let Some(filter) = request
			.config
			.get("filters")
			.and_then(|f| f.get(&request.entity.external_id))
			.and_then(Value::as_str)
		{
			url.query_pairs_mut().append_pair("$filter", filter);
		}
		url.to_string()
	}

	/// Builds a request for a primary (non-child) entity: first call builds a
	/// fresh `$select`/`$top`/`$filter` URL, later calls reissue the opaque
	/// `@odata.nextLink` verbatim (§4.B.1 "Cursor").
	fn build_primary_request(&self, request: &AdapterRequest<'_>) -> HttpRequest {
		match &request.cursor {
			Some(Cursor::Simple { cursor }) => HttpRequest::get(cursor.as_str().into_owned()),
			_ => HttpRequest::get(self.build_collection_url(request, &request.entity.external_id)),
		}
	}

	fn parse_page(&self, entity: &proto::Entity, body: &[u8]) -> Result<(Vec<PageObject>, Option<String>), AdapterError> {
		let parsed: Value = serde_json::from_slice(body)?;
		let records = parsed
			.get("value")
			.and_then(Value::as_array)
			.ok_or_else(|| AdapterError::ResponseParseError("response is missing a `value` array".to_string()))?;

		let mut objects = Vec::with_capacity(records.len());
		for record in records {
			if let Some(object) = resolve_record(entity, record)? {
				objects.push(object);
			}
		}
		let next_link = parsed.get("@odata.nextLink").and_then(Value::as_str).map(str::to_string);
		Ok((objects, next_link))
	}
}

#[async_trait]
impl Adapter for AzureAdAdapter {
	fn sor_type(&self) -> &'static str {
		"AzureAD-1.0.1"
	}

	fn entities(&self) -> &'static [&'static str] {
		ENTITIES
	}

	fn accepted_auth(&self) -> &'static [AuthKind] {
		ACCEPTED_AUTH
	}

	/// `GroupMember`/`RoleMember`'s synthesized composite-id fields are
	/// always strings (§4.B.2): the parent-id field, `memberId`, and the
	/// composite `id` itself are all built with `format!`, never a number.
	fn known_attribute_type(&self, entity_external_id: &str, attribute_external_id: &str) -> Option<proto::AttributeType> {
		let (_, _, parent_field) = parent_collection(entity_external_id)?;
		if attribute_external_id == parent_field || attribute_external_id == "memberId" || attribute_external_id == "id" {
			Some(proto::AttributeType::String)
		} else {
			None
		}
	}

	async fn get_page(&self, transport: &TransportClient, request: &AdapterRequest<'_>) -> Result<AdapterPage, AdapterError> {
		let filter_config = request
			.config
			.get("advancedFilters")
			.and_then(|f| f.get("getObjectsByScope"))
			.and_then(|m| m.get(&request.entity.external_id));

		if let Some(filters) = filter_config.and_then(Value::as_array) {
			return self.get_advanced_filter_page(transport, request, filters).await;
		}

		if let Some((parent_collection, relation, parent_field)) = parent_collection(&request.entity.external_id) {
			let source = AzureAdCollectionSource { transport, request, parent_collection, relation, parent_field };
			return walk_collection(request.cursor.as_ref(), &source).await;
		}

		let http_request = self.build_primary_request(request);
		let body = transport
			.execute(&http_request, &transport_auth(request), request.timeout, &request.retry_params)
			.await?;
		let (objects, next_link) = self.parse_page(request.entity, &body)?;
		let next_cursor = next_link.map(Cursor::simple);
		Ok(AdapterPage { objects, next_cursor })
	}
}

fn transport_auth(request: &AdapterRequest<'_>) -> transport::AuthMethod {
	request.auth.clone()
}

/// [`CollectionSource`] for `GroupMember`/`RoleMember` (§4.C "Collection"):
/// pages `parent_collection` (groups/directoryRoles), then for the current
/// parent pages its `relation` (members), synthesizing the composite unique
/// id each emitted record needs.
struct AzureAdCollectionSource<'a> {
	transport: &'a TransportClient,
	request: &'a AdapterRequest<'a>,
	parent_collection: &'static str,
	relation: &'static str,
	parent_field: &'static str,
}

#[async_trait]
impl CollectionSource for AzureAdCollectionSource<'_> {
	async fn fetch_parent_page(&self, page_url: Option<&str>) -> Result<(Vec<String>, Option<String>), AdapterError> {
		let url = match page_url {
			Some(url) => url.to_string(),
			None => {
				let api_version = AzureAdAdapter::api_version(&self.request.config);
				format!(
					"https://{}/{}/{}?$select=id&$top={}",
					self.request.address, api_version, self.parent_collection, self.request.page_size
				)
			},
		};
		let body = self
			.transport
			.execute(&HttpRequest::get(url), &transport_auth(self.request), self.request.timeout, &self.request.retry_params)
			.await?;
		let parsed: Value = serde_json::from_slice(&body)?;
		let ids = parsed
			.get("value")
			.and_then(Value::as_array)
			.map(|items| items.iter().filter_map(|item| item.get("id")?.as_str().map(str::to_string)).collect())
			.unwrap_or_default();
		let next_link = parsed.get("@odata.nextLink").and_then(Value::as_str).map(str::to_string);
		Ok((ids, next_link))
	}

	async fn fetch_child_page(
		&self,
		parent_id: &str,
		child_cursor: Option<&CursorToken>,
	) -> Result<(Vec<PageObject>, Option<CursorToken>), AdapterError> {
		let api_version = AzureAdAdapter::api_version(&self.request.config);
		let url = match child_cursor {
			Some(token) => token.as_str().into_owned(),
			None => {
				let mut url = url::Url::parse(&format!(
					"https://{}/{}/{}/{}/{}",
					self.request.address, api_version, self.parent_collection, parent_id, self.relation
				))
				.expect("address + static segments form a valid URL");
				AzureAdAdapter::apply_select_and_expand(&mut url, self.request);
				url.query_pairs_mut().append_pair("$top", &self.request.page_size.to_string());
				url.to_string()
			},
		};
		let body = self
			.transport
			.execute(&HttpRequest::get(url), &transport_auth(self.request), self.request.timeout, &self.request.retry_params)
			.await?;
		let parsed: Value = serde_json::from_slice(&body)?;
		let records = parsed
			.get("value")
			.and_then(Value::as_array)
			.ok_or_else(|| AdapterError::ResponseParseError("response is missing a `value` array".to_string()))?;

		let mut objects = Vec::with_capacity(records.len());
		for record in records {
			let member_id = record.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
			let composite = with_synthetic_fields(
				record,
				&[(self.parent_field, parent_id.to_string()), ("memberId", member_id.clone()), ("id", format!("{member_id}-{parent_id}"))],
			);
			if let Some(object) = resolve_record(self.request.entity, &composite)? {
				objects.push(object);
			}
		}
		let next_link = parsed.get("@odata.nextLink").and_then(Value::as_str).map(|s| CursorToken::Str(s.to_string()));
		Ok((objects, next_link))
	}
}

impl AzureAdAdapter {
	/// Advanced-filter matrix walk (§4.B.1 "Advanced filters", §4.C).
	async fn get_advanced_filter_page(
		&self,
		transport: &TransportClient,
		request: &AdapterRequest<'_>,
		filters: &[Value],
	) -> Result<AdapterPage, AdapterError> {
		let state = FilterMatrixState::from_cursor(request.cursor.as_ref())
			.ok_or_else(|| AdapterError::InvalidCursor("expected an AdvancedFilter cursor for this entity".to_string()))?;

		let entity_filter = filters.get(state.entity_filter_index as usize);
		let entity_filter = match entity_filter {
			None => return Ok(AdapterPage { objects: Vec::new(), next_cursor: None }),
			Some(f) => f,
		};
		let members = entity_filter.get("members").and_then(Value::as_array).cloned().unwrap_or_default();
		let member = members.get(state.member_filter_index as usize);
		let member = match member {
			None => return Ok(AdapterPage { objects: Vec::new(), next_cursor: None }),
			Some(m) => m,
		};

		let scope_filter = entity_filter.get("scopeEntityFilter").and_then(Value::as_str).unwrap_or_default();
		let member_filter = member.get("memberEntityFilter").and_then(Value::as_str);

		let api_version = Self::api_version(&request.config);
		let url_str = match &state.inner_cursor {
			Some(token) => token.as_str().into_owned(),
			None => {
				let mut url = url::Url::parse(&format!(
					"https://{}/{}/{}",
					request.address, api_version, request.entity.external_id
				))
				.expect("address + static segments form a valid URL");
				let mut filter = scope_filter.to_string();
				if let Some(mf) = member_filter {
					if !filter.is_empty() {
						filter.push_str(" and ");
					}
					filter.push_str(mf);
				}
				if !filter.is_empty() {
					url.query_pairs_mut().append_pair("$filter", &filter);
				}
				url.query_pairs_mut().append_pair("$top", &request.page_size.to_string());
				url.to_string()
			},
		};

		let http_request = HttpRequest::get(url_str);
		let body = transport.execute(&http_request, &transport_auth(request), request.timeout, &request.retry_params).await?;
		let (objects, next_link) = self.parse_page(request.entity, &body)?;

		let next_cursor = match next_link {
			Some(link) => Some(Cursor::advanced_filter(
				state.entity_filter_index,
				state.member_filter_index,
				Some(CursorToken::Str(link)),
			)),
			None => state.advance(members.len() as u32).map(|next| next.to_cursor()),
		};
		Ok(AdapterPage { objects, next_cursor })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proto::{Attribute, AttributeType, Entity};
	use std::time::Duration;

	fn entity(external_id: &str) -> Entity {
		Entity {
			id: external_id.to_string(),
			external_id: external_id.to_string(),
			ordered: false,
			attributes: vec![Attribute {
				id: "id".to_string(),
				external_id: "id".to_string(),
				r#type: AttributeType::String as i32,
				list: false,
				unique_id: true,
			}],
			child_entities: vec![],
		}
	}

	fn request<'a>(entity: &'a Entity, cursor: Option<Cursor>, config: Value) -> AdapterRequest<'a> {
		AdapterRequest {
			datasource_id: "ds-1",
			address: "graph.microsoft.com",
			auth: transport::AuthMethod::Bearer("token".to_string()),
			config,
			entity,
			page_size: 50,
			cursor,
			timeout: Duration::from_secs(30),
			retry_params: common::retry::RetryParams::for_test(),
		}
	}

	#[test]
	fn first_page_url_includes_select_top_and_filter() {
		let adapter = AzureAdAdapter::new();
		let entity = entity("User");
		let config = serde_json::json!({ "filters": { "User": "accountEnabled eq true" } });
		let req = request(&entity, None, config);
		let url = adapter.build_collection_url(&req, "User");
		assert!(url.contains("%24select=id"));
		assert!(url.contains("%24top=50"));
		assert!(url.contains("accountEnabled"));
	}

	#[test]
	fn derived_attribute_moves_from_select_into_expand() {
		let adapter = AzureAdAdapter::new();
		let mut entity = entity("User");
		entity.attributes.push(Attribute {
			id: "managerId".to_string(),
			external_id: "manager__id".to_string(),
			r#type: AttributeType::String as i32,
			list: false,
			unique_id: false,
		});
		let req = request(&entity, None, serde_json::json!({}));
		let url = adapter.build_collection_url(&req, "User");
		assert!(url.contains("%24select=id"), "select clause should keep the direct attribute: {url}");
		assert!(!url.contains("manager__id"), "the raw externalId must never leak into the query string: {url}");
		assert!(url.contains("%24expand=manager%28%24select%3Did%29"), "expand clause missing or malformed: {url}");
	}

	#[test]
	fn resumed_page_reissues_the_odata_next_link_verbatim() {
		let adapter = AzureAdAdapter::new();
		let entity = entity("User");
		let next_link = "https://graph.microsoft.com/v1.0/users?$skiptoken=abc";
		let cursor = Some(Cursor::simple(next_link.to_string()));
		let req = request(&entity, cursor, serde_json::json!({}));
		let http_request = adapter.build_primary_request(&req);
		assert_eq!(http_request.url, next_link);
	}

	#[test]
	fn parse_page_extracts_next_link_and_records() {
		let adapter = AzureAdAdapter::new();
		let entity = entity("User");
		let body = serde_json::json!({
			"value": [{ "id": "u-1" }, { "id": "u-2" }],
			"@odata.nextLink": "https://graph.microsoft.com/v1.0/users?$skiptoken=next",
		});
		let (objects, next_link) = adapter.parse_page(&entity, body.to_string().as_bytes()).unwrap();
		assert_eq!(objects.len(), 2);
		assert_eq!(next_link.unwrap(), "https://graph.microsoft.com/v1.0/users?$skiptoken=next");
	}

	#[test]
	fn group_member_composite_id_is_member_then_group() {
		let child_entity = Entity {
			id: "group-member".to_string(),
			external_id: "GroupMember".to_string(),
			ordered: false,
			attributes: vec![
				Attribute { id: "id".to_string(), external_id: "id".to_string(), r#type: AttributeType::String as i32, list: false, unique_id: true },
				Attribute {
					id: "groupId".to_string(),
					external_id: "groupId".to_string(),
					r#type: AttributeType::String as i32,
					list: false,
					unique_id: false,
				},
			],
			child_entities: vec![],
		};
		let record = serde_json::json!({ "id": "P", "displayName": "Alice" });
		let composite = with_synthetic_fields(&record, &[("groupId", "G".to_string()), ("memberId", "P".to_string()), ("id", "P-G".to_string())]);
		let object = resolve_record(&child_entity, &composite).unwrap().unwrap();
		let id_value = object.attributes.iter().find(|a| a.attribute_id == "id").unwrap();
		assert_eq!(id_value.values[0], proto::ScalarValue::string("P-G"));
	}

	#[test]
	fn terminal_page_has_no_next_link() {
		let adapter = AzureAdAdapter::new();
		let entity = entity("User");
		let body = serde_json::json!({ "value": [{ "id": "u-1" }] });
		let (_, next_link) = adapter.parse_page(&entity, body.to_string().as_bytes()).unwrap();
		assert!(next_link.is_none());
	}
}
