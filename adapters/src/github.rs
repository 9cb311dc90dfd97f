//! GitHub adapter (§4.B.2): GraphQL over HTTPS, enterprise-slug vs.
//! organizations mode, two-level nested pagination, composite unique ids.

use async_trait::async_trait;
use cursor::{Cursor, CursorToken};
use proto::PageObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use transport::{HttpRequest, TransportClient};

use crate::error::AdapterError;
use crate::shared::{config_str, resolve_record, with_synthetic_fields, AdapterPage, AdapterRequest};
use crate::{Adapter, AuthKind};

const ACCEPTED_AUTH: &[AuthKind] = &[AuthKind::Bearer];

const ENTITIES: &[&str] = &[
	"Organization",
	"Team",
	"Repository",
	"User",
	"OrganizationUser",
	"RepositoryCollaborator",
	"TeamMember",
	"TeamRepository",
	"Issue",
	"IssueAssignee",
	"IssueLabel",
	"PullRequest",
	"PullRequestLabel",
	"PullRequestCommit",
];

/// Entities realized by walking a connection nested one level inside another
/// (Team -> members, Repository -> collaborators, ...), which is where the
/// composite cursor's `innerPageInfo` comes into play.
fn connection_field(entity: &str) -> &'static str {
	match entity {
		"OrganizationUser" | "TeamMember" | "RepositoryCollaborator" => "members",
		"TeamRepository" => "repositories",
		"IssueAssignee" => "assignees",
		"IssueLabel" | "PullRequestLabel" => "labels",
		"PullRequestCommit" => "commits",
		"Repository" => "repositories",
		"Team" => "teams",
		"Issue" => "issues",
		"PullRequest" => "pullRequests",
		_ => "nodes",
	}
}

/// A GraphQL selection set for a declared child entity, nested directly
/// inside the parent's node selection (§3 "child-entity schemas rooted at a
/// path into the parent document", e.g. `$.collaborators.edges`). The child's
/// root path names the connection field (`members`, `repositories`, ...);
/// its attributes, conventionally rooted at `$.node.<field>` per edge, name
/// the inner `node` selection. This embeds the child connection's first page
/// alongside the parent's own fields rather than issuing it as a separate
/// request — the generic `child_entities` resolution in `shared::resolve_record`
/// then walks `edges`/`node` the same way it walks any other nested array.
fn child_connection_selection(child: &proto::Entity, page_size: u32) -> String {
	let field = child
		.external_id
		.trim_start_matches('$')
		.trim_start_matches('.')
		.split(|c| c == '.' || c == '[')
		.next()
		.unwrap_or_default();
	let inner = child
		.attributes
		.iter()
		.map(|a| {
			a.external_id
				.trim_start_matches('$')
				.trim_start_matches('.')
				.trim_start_matches("node.")
				.to_string()
		})
		.collect::<Vec<_>>()
		.join("\n");
	format!(r#"{field}(first: {page_size}) {{ edges {{ node {{ {inner} }} }} }}"#, field = field, page_size = page_size, inner = inner)
}

/// The root query field for the enumeration: an enterprise- or
/// organization-scoped connection.
fn root_field(entity: &str) -> &'static str {
	match entity {
		"Organization" | "OrganizationUser" => "organizations",
		_ => "repositories",
	}
}

/// Nested pagination state (§4.B.2 "Cursor encoding"), reused recursively
/// for entities requiring a two-level walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubPageInfo {
	#[serde(rename = "hasNextPage")]
	pub has_next_page: bool,
	#[serde(rename = "endCursor", skip_serializing_if = "Option::is_none")]
	pub end_cursor: Option<String>,
	#[serde(rename = "organizationOffset", skip_serializing_if = "Option::is_none")]
	pub organization_offset: Option<u32>,
	#[serde(rename = "innerPageInfo", skip_serializing_if = "Option::is_none")]
	pub inner_page_info: Option<Box<GithubPageInfo>>,
}

impl GithubPageInfo {
	fn start() -> Self {
		Self { has_next_page: true, end_cursor: None, organization_offset: Some(0), inner_page_info: None }
	}

	fn decode(cursor: &Option<Cursor>) -> Result<Self, AdapterError> {
		match cursor {
			None => Ok(Self::start()),
			Some(Cursor::Simple { cursor: token }) => {
				let wire = token.as_str();
				cursor::decode_json(wire.as_ref()).map_err(AdapterError::from)
			},
			_ => Err(AdapterError::InvalidCursor("expected a Simple (composite-JSON) cursor for GitHub".to_string())),
		}
	}

	fn encode(&self) -> Cursor {
		Cursor::simple(CursorToken::Str(cursor::encode_json(self)))
	}
}

pub struct GitHubAdapter;

impl GitHubAdapter {
	pub fn new() -> Self {
		Self
	}

	fn is_enterprise_mode(config: &Value) -> bool {
		!config.get("isEnterpriseCloud").and_then(Value::as_bool).unwrap_or(false)
			&& config_str(config, "enterpriseSlug").is_some()
	}

	fn organizations(config: &Value) -> Vec<String> {
		config
			.get("organizations")
			.and_then(Value::as_array)
			.map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
			.unwrap_or_default()
	}

	fn selection_set(request: &AdapterRequest<'_>) -> String {
		let mut fields: Vec<String> = request
			.entity
			.attributes
			.iter()
			.map(|a| a.external_id.trim_start_matches('$').trim_start_matches('.').to_string())
			.collect();
		for child in &request.entity.child_entities {
			fields.push(child_connection_selection(child, request.page_size));
		}
		fields.join("\n")
	}

	/// Hand-written GraphQL document for the current entity and walk position
	/// (§4.B.2 "Transport"). This is intentionally simple string templating:
	/// the selection set is the caller's attribute list, pruning unused
	/// fields from the response the way a generated client would.
	fn build_query(&self, request: &AdapterRequest<'_>, page_info: &GithubPageInfo) -> String {
		let entity = &request.entity.external_id;
		let connection = connection_field(entity);
		let selection = Self::selection_set(request);
		let after = page_info
			.end_cursor
			.as_ref()
			.map(|c| format!(r#", after: "{c}""#))
			.unwrap_or_default();

		if Self::is_enterprise_mode(&request.config) {
			let slug = config_str(&request.config, "enterpriseSlug").unwrap_or_default();
			format!(
				r#"query {{ enterprise(slug: "{slug}") {{ {root}(first: {first}{after}) {{ pageInfo {{ hasNextPage endCursor }} edges {{ node {{ {connection} {{ edges {{ node {{ {selection} }} }} }} }} }} }} }} }}"#,
				slug = slug,
				root = root_field(entity),
				first = request.page_size,
				after = after,
				connection = connection,
				selection = selection,
			)
		} else {
			let orgs = Self::organizations(&request.config);
			let offset = page_info.organization_offset.unwrap_or(0) as usize;
			let login = orgs.get(offset).cloned().unwrap_or_default();
			format!(
				r#"query {{ organization(login: "{login}") {{ {connection}(first: {first}{after}) {{ pageInfo {{ hasNextPage endCursor }} edges {{ node {{ {selection} }} }} }} }} }}"#,
				login = login,
				connection = connection,
				first = request.page_size,
				after = after,
				selection = selection,
			)
		}
	}

	/// Parses one page of a GraphQL connection. When `composite_parent` is
	/// given, each node is treated as a membership/relationship record and
	/// gets an `<parent>-<login>` unique id synthesized onto it before
	/// projection (§4.B.2 "Composite unique ids") — the GitHub analogue of
	/// Azure AD's `GroupMember`/Jira's `GroupMember` composite ids, keyed on
	/// `login` since that is the field every GitHub node-level entity in this
	/// crate's selection sets carries.
	fn parse_connection(
		&self,
		entity: &proto::Entity,
		connection: &Value,
		composite_parent: Option<&str>,
	) -> Result<(Vec<PageObject>, bool, Option<String>), AdapterError> {
		let edges = connection
			.get("edges")
			.and_then(Value::as_array)
			.ok_or_else(|| AdapterError::ResponseParseError("GraphQL response is missing `edges`".to_string()))?;

		let mut objects = Vec::with_capacity(edges.len());
		for edge in edges {
			let node = edge.get("node").unwrap_or(&Value::Null);
			let resolved = match composite_parent {
				Some(parent) => {
					let login = node.get("login").and_then(Value::as_str).unwrap_or_default().to_string();
					let composite = with_synthetic_fields(node, &[("id", format!("{parent}-{login}"))]);
					resolve_record(entity, &composite)?
				},
				None => resolve_record(entity, node)?,
			};
			if let Some(object) = resolved {
				objects.push(object);
			}
		}
		let has_next_page = connection
			.get("pageInfo")
			.and_then(|p| p.get("hasNextPage"))
			.and_then(Value::as_bool)
			.unwrap_or(false);
		let end_cursor = connection
			.get("pageInfo")
			.and_then(|p| p.get("endCursor"))
			.and_then(Value::as_str)
			.map(str::to_string);
		Ok((objects, has_next_page, end_cursor))
	}
}

#[async_trait]
impl Adapter for GitHubAdapter {
	fn sor_type(&self) -> &'static str {
		"GitHub-1.0.0"
	}

	fn entities(&self) -> &'static [&'static str] {
		ENTITIES
	}

	fn accepted_auth(&self) -> &'static [AuthKind] {
		ACCEPTED_AUTH
	}

	/// `OrganizationUser`'s composite `id` is always synthesized as
	/// `"{org}-{login}"` (§4.B.2), never a raw GraphQL node id.
	fn known_attribute_type(&self, entity_external_id: &str, attribute_external_id: &str) -> Option<proto::AttributeType> {
		if entity_external_id == "OrganizationUser" && attribute_external_id == "id" {
			Some(proto::AttributeType::String)
		} else {
			None
		}
	}

	async fn get_page(&self, transport: &TransportClient, request: &AdapterRequest<'_>) -> Result<AdapterPage, AdapterError> {
		let page_info = GithubPageInfo::decode(&request.cursor)?;
		if !page_info.has_next_page {
			return Ok(AdapterPage { objects: Vec::new(), next_cursor: None });
		}

		let query = self.build_query(request, &page_info);
		let http_request = HttpRequest::post_json(
			format!("https://{}/graphql", request.address),
			serde_json::json!({ "query": query }).to_string().into_bytes(),
		);
		let body = transport.execute(&http_request, &request.auth, request.timeout, &request.retry_params).await?;
		let parsed: Value = serde_json::from_slice(&body)?;

		let connection = locate_connection(&parsed, &request.entity.external_id)
			.ok_or_else(|| AdapterError::ResponseParseError("could not locate a connection in the GraphQL response".to_string()))?;

		let mode_is_org = !Self::is_enterprise_mode(&request.config);
		let orgs_len = Self::organizations(&request.config).len() as u32;
		let composite_parent = if mode_is_org && request.entity.external_id == "OrganizationUser" {
			let offset = page_info.organization_offset.unwrap_or(0) as usize;
			Self::organizations(&request.config).get(offset).cloned()
		} else {
			None
		};
		let (objects, has_next_page, end_cursor) = self.parse_connection(request.entity, connection, composite_parent.as_deref())?;

		let next_cursor = if has_next_page {
			Some(GithubPageInfo {
				has_next_page: true,
				end_cursor,
				organization_offset: page_info.organization_offset,
				inner_page_info: None,
			})
		} else if mode_is_org && page_info.organization_offset.map(|o| o + 1 < orgs_len).unwrap_or(false) {
			Some(GithubPageInfo {
				has_next_page: true,
				end_cursor: None,
				organization_offset: page_info.organization_offset.map(|o| o + 1),
				inner_page_info: None,
			})
		} else {
			None
		};

		Ok(AdapterPage { objects, next_cursor: next_cursor.map(|p| p.encode()) })
	}
}

/// Finds the innermost `edges`/`pageInfo`-shaped connection in a GraphQL
/// response tree, regardless of whether it is nested under `enterprise` or
/// directly under `organization` (mode A vs. mode B).
fn locate_connection<'a>(root: &'a Value, entity: &str) -> Option<&'a Value> {
	let data = root.get("data")?;
	let connection = connection_field(entity);
	fn find<'a>(node: &'a Value, connection: &str) -> Option<&'a Value> {
		if let Value::Object(map) = node {
			if let Some(candidate) = map.get(connection) {
				if candidate.get("edges").is_some() {
					return Some(candidate);
				}
			}
			for value in map.values() {
				if let Some(found) = find(value, connection) {
					return Some(found);
				}
			}
		}
		None
	}
	find(data, connection)
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
				id: "login".to_string(),
				external_id: "login".to_string(),
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
			address: "api.github.com",
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
	fn enterprise_mode_query_embeds_the_slug() {
		let adapter = GitHubAdapter::new();
		let entity = entity("Organization");
		let config = serde_json::json!({ "enterpriseSlug": "acme", "isEnterpriseCloud": false });
		let req = request(&entity, None, config);
		let query = adapter.build_query(&req, &GithubPageInfo::start());
		assert!(query.contains(r#"enterprise(slug: "acme")"#));
	}

	#[test]
	fn organizations_mode_uses_the_offset_to_pick_the_current_org() {
		let adapter = GitHubAdapter::new();
		let entity = entity("OrganizationUser");
		let config = serde_json::json!({ "organizations": ["org-a", "org-b"] });
		let page_info = GithubPageInfo { has_next_page: true, end_cursor: None, organization_offset: Some(1), inner_page_info: None };
		let req = request(&entity, None, config);
		let query = adapter.build_query(&req, &page_info);
		assert!(query.contains(r#"organization(login: "org-b")"#));
	}

	#[test]
	fn page_info_round_trips_through_the_composite_cursor() {
		let info = GithubPageInfo {
			has_next_page: true,
			end_cursor: Some("abc".to_string()),
			organization_offset: Some(2),
			inner_page_info: None,
		};
		let cursor = info.encode();
		let decoded = GithubPageInfo::decode(&Some(cursor)).unwrap();
		assert_eq!(decoded, info);
	}

	#[test]
	fn terminal_page_has_has_next_page_false() {
		let connection = serde_json::json!({
			"edges": [{ "node": { "login": "octocat" } }],
			"pageInfo": { "hasNextPage": false, "endCursor": null },
		});
		let adapter = GitHubAdapter::new();
		let entity = entity("OrganizationUser");
		let (objects, has_next_page, end_cursor) = adapter.parse_connection(&entity, &connection, None).unwrap();
		assert_eq!(objects.len(), 1);
		assert!(!has_next_page);
		assert!(end_cursor.is_none());
	}

	#[test]
	fn composite_parent_synthesizes_an_org_then_login_id() {
		let connection = serde_json::json!({
			"edges": [{ "node": { "login": "octocat" } }],
			"pageInfo": { "hasNextPage": false, "endCursor": null },
		});
		let adapter = GitHubAdapter::new();
		let entity = Entity {
			id: "organization-user".to_string(),
			external_id: "OrganizationUser".to_string(),
			ordered: false,
			attributes: vec![Attribute { id: "id".to_string(), external_id: "id".to_string(), r#type: AttributeType::String as i32, list: false, unique_id: true }],
			child_entities: vec![],
		};
		let (objects, _, _) = adapter.parse_connection(&entity, &connection, Some("org-a")).unwrap();
		let id_value = objects[0].attributes.iter().find(|a| a.attribute_id == "id").unwrap();
		assert_eq!(id_value.values[0], proto::ScalarValue::string("org-a-octocat"));
	}

	fn child_entity(external_id: &str, id: &str) -> Entity {
		Entity {
			id: id.to_string(),
			external_id: external_id.to_string(),
			ordered: false,
			attributes: vec![Attribute {
				id: "login".to_string(),
				external_id: "$.node.login".to_string(),
				r#type: AttributeType::String as i32,
				list: false,
				unique_id: true,
			}],
			child_entities: vec![],
		}
	}

	#[test]
	fn selection_set_embeds_declared_child_entity_connections() {
		let mut team = entity("Team");
		team.child_entities = vec![child_entity("$.members.edges", "team-member"), child_entity("$.repositories.edges", "team-repository")];
		let config = serde_json::json!({ "organizations": ["org-a"] });
		let req = request(&team, None, config);
		let selection = GitHubAdapter::selection_set(&req);
		assert!(selection.contains("members(first: 50)"));
		assert!(selection.contains("repositories(first: 50)"));
		assert!(selection.contains("login"));
	}

	/// Mirrors the `Team` + `TeamMember`/`TeamRepository` end-to-end scenario:
	/// a single GraphQL node carrying nested `members`/`repositories`
	/// connections is resolved into one `PageObject` with two child groups.
	#[test]
	fn team_node_with_nested_connections_resolves_both_child_groups() {
		let mut team = entity("Team");
		team.child_entities = vec![child_entity("$.members.edges", "team-member"), child_entity("$.repositories.edges", "team-repository")];
		let node = serde_json::json!({
			"login": "core-team",
			"members": { "edges": [{ "node": { "login": "alice" } }, { "node": { "login": "bob" } }] },
			"repositories": { "edges": [{ "node": { "login": "widgets" } }] },
		});
		let object = crate::shared::resolve_record(&team, &node).unwrap().unwrap();
		assert_eq!(object.child_objects.len(), 2);
		let members = object.child_objects.iter().find(|g| g.child_entity_id == "team-member").unwrap();
		let repos = object.child_objects.iter().find(|g| g.child_entity_id == "team-repository").unwrap();
		assert_eq!(members.objects.len(), 2);
		assert_eq!(repos.objects.len(), 1);
	}
}
