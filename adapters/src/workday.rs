//! Workday adapter (§4.B.4): REST `offset`/`limit`/`total` pagination.

use async_trait::async_trait;
use cursor::{Cursor, CursorToken};
use serde_json::Value;
use transport::{HttpRequest, TransportClient};

use crate::error::AdapterError;
use crate::shared::{config_str, resolve_record, AdapterPage, AdapterRequest};
use crate::{Adapter, AuthKind};

const ACCEPTED_AUTH: &[AuthKind] = &[AuthKind::Bearer];

const ENTITIES: &[&str] = &["Worker"];

pub struct WorkdayAdapter;

impl WorkdayAdapter {
	pub fn new() -> Self {
		Self
	}

	fn build_url(&self, request: &AdapterRequest<'_>, offset: u64) -> Result<String, AdapterError> {
		let org_id = config_str(&request.config, "organizationId")
			.ok_or_else(|| AdapterError::InvalidEntityConfig("Workday config is missing `organizationId`".to_string()))?;
		Ok(format!(
			"https://{}/ccx/api/staffing/v1/{}/workers?offset={}&limit={}",
			request.address, org_id, offset, request.page_size
		))
	}
}

#[async_trait]
impl Adapter for WorkdayAdapter {
	fn sor_type(&self) -> &'static str {
		"Workday-1.0.0"
	}

	fn entities(&self) -> &'static [&'static str] {
		ENTITIES
	}

	fn accepted_auth(&self) -> &'static [AuthKind] {
		ACCEPTED_AUTH
	}

	async fn get_page(&self, transport: &TransportClient, request: &AdapterRequest<'_>) -> Result<AdapterPage, AdapterError> {
		let offset = match &request.cursor {
			None => 0,
			Some(Cursor::Simple { cursor: CursorToken::Int(offset) }) => *offset as u64,
			Some(Cursor::Simple { cursor: CursorToken::Str(offset) }) => offset
				.parse()
				.map_err(|_| AdapterError::InvalidCursor("Workday offset cursor is not numeric".to_string()))?,
			_ => return Err(AdapterError::InvalidCursor("expected a Simple cursor for Worker".to_string())),
		};

		let url = self.build_url(request, offset)?;
		let body = transport.execute(&HttpRequest::get(url), &request.auth, request.timeout, &request.retry_params).await?;
		let parsed: Value = serde_json::from_slice(&body)?;

		let records = parsed
			.get("data")
			.and_then(Value::as_array)
			.ok_or_else(|| AdapterError::ResponseParseError("response is missing a `data` array".to_string()))?;

		let mut objects = Vec::with_capacity(records.len());
		for record in records {
			if let Some(object) = resolve_record(request.entity, record)? {
				objects.push(object);
			}
		}

		let total = parsed.get("total").and_then(Value::as_u64).unwrap_or(records.len() as u64);
		let next_offset = offset + records.len() as u64;
		let next_cursor = if next_offset >= total || records.is_empty() {
			None
		} else {
			Some(Cursor::simple(next_offset as i64))
		};
		Ok(AdapterPage { objects, next_cursor })
	}
}
