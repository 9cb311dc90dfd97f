//! Per-SoR adapters (§4.B) and the registry that dispatches a `GetPage` call
//! to the one matching the inbound datasource `Type`.

mod error;
mod shared;

pub mod azuread;
pub mod github;
pub mod jiradc;
pub mod workday;

pub use error::AdapterError;
pub use shared::{AdapterPage, AdapterRequest, CollectionSource};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use proto::AttributeType;
use transport::TransportClient;

/// Wire auth mechanisms a `Datasource` can carry (§3 "Datasource descriptor").
/// Distinct from `transport::AuthMethod`: this names the *kind*, not the
/// credential value, so an adapter can declare which kinds it accepts
/// without constructing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
	Bearer,
	Basic,
}

/// The capability set every SoR adapter exposes (§9 "Polymorphism over SoRs").
#[async_trait]
pub trait Adapter: Send + Sync {
	/// The `Datasource.type` string this adapter is registered under, e.g.
	/// `"AzureAD-1.0.1"`.
	fn sor_type(&self) -> &'static str;

	/// The static set of entity `externalId`s this adapter knows how to page.
	fn entities(&self) -> &'static [&'static str];

	/// Auth mechanisms this adapter's outbound protocol accepts (§4.A "auth
	/// mechanism matches what the SoR-adapter declares it accepts").
	fn accepted_auth(&self) -> &'static [AuthKind];

	/// The `AttributeType` a field is legal to declare as, for the handful of
	/// externalIds this adapter synthesizes itself (composite unique ids and
	/// the fields they're built from, §4.B.2) rather than reads verbatim off
	/// the SoR response. `None` means the caller's declared type is not
	/// constrained by this adapter.
	fn known_attribute_type(&self, entity_external_id: &str, attribute_external_id: &str) -> Option<AttributeType> {
		let _ = (entity_external_id, attribute_external_id);
		None
	}

	async fn get_page(&self, transport: &TransportClient, request: &AdapterRequest<'_>) -> Result<AdapterPage, AdapterError>;
}

/// Read-only, process-wide registry of adapters keyed by SoR type (§5
/// "Shared resources" — initialized once, immutable thereafter).
pub struct AdapterRegistry {
	adapters: HashMap<&'static str, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
	pub fn new() -> Self {
		let mut adapters: HashMap<&'static str, Arc<dyn Adapter>> = HashMap::new();
		let azuread = Arc::new(azuread::AzureAdAdapter::new());
		let github = Arc::new(github::GitHubAdapter::new());
		let jiradc = Arc::new(jiradc::JiraDcAdapter::new());
		let workday = Arc::new(workday::WorkdayAdapter::new());
		adapters.insert(azuread.sor_type(), azuread);
		adapters.insert(github.sor_type(), github);
		adapters.insert(jiradc.sor_type(), jiradc);
		adapters.insert(workday.sor_type(), workday);
		Self { adapters }
	}

	pub fn resolve(&self, sor_type: &str) -> Option<Arc<dyn Adapter>> {
		self.adapters.get(sor_type).cloned()
	}
}

impl Default for AdapterRegistry {
	fn default() -> Self {
		Self::new()
	}
}
