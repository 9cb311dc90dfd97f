//! Opaque, base64-url cursor codec and collection/advanced-filter pagination
//! state machine (spec §3 "Cursor", §4.C).
//!
//! The wire representation is always `base64url(canonical_json(Cursor))`.
//! Canonicalization is achieved by round-tripping through [`serde_json::Value`]
//! before serializing: `serde_json::Map` (without the `preserve_order`
//! feature) is backed by a `BTreeMap`, so keys always come out lexicographically
//! sorted, and padding is preserved rather than stripped so the byte-for-byte
//! round-trip invariant holds even when a SoR token itself embeds padding.

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod walk;
pub use walk::FilterMatrixState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
	#[error("cursor is not valid base64url: {0}")]
	InvalidBase64(String),
	#[error("cursor is not valid JSON: {0}")]
	InvalidJson(String),
	#[error("cursor JSON does not match any known cursor shape")]
	AmbiguousOrUnknownShape,
}

/// A pagination token opaque to this service but meaningful to the SoR: most
/// SoRs hand back a string (a URL, an encoded continuation token), a couple
/// (Jira, Workday) hand back an integer offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CursorToken {
	Int(i64),
	Str(String),
}

impl CursorToken {
	pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
		match self {
			CursorToken::Str(s) => std::borrow::Cow::Borrowed(s),
			CursorToken::Int(i) => std::borrow::Cow::Owned(i.to_string()),
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			CursorToken::Int(i) => Some(*i),
			CursorToken::Str(s) => s.parse().ok(),
		}
	}
}

impl From<String> for CursorToken {
	fn from(value: String) -> Self {
		CursorToken::Str(value)
	}
}

impl From<i64> for CursorToken {
	fn from(value: i64) -> Self {
		CursorToken::Int(value)
	}
}

/// The tagged union described in spec §3. Variants are tried most-specific
/// first during decode (each with `deny_unknown_fields`) so that a shape
/// belonging to one variant can never be silently accepted by another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
	#[serde(deny_unknown_fields)]
	AdvancedFilter {
		#[serde(rename = "entityFilterIndex")]
		entity_filter_index: u32,
		#[serde(rename = "memberFilterIndex")]
		member_filter_index: u32,
		#[serde(skip_serializing_if = "Option::is_none")]
		cursor: Option<CursorToken>,
	},
	#[serde(deny_unknown_fields)]
	Collection {
		#[serde(rename = "collectionId")]
		collection_id: String,
		#[serde(rename = "collectionCursor")]
		collection_cursor: CursorToken,
	},
	#[serde(deny_unknown_fields)]
	Simple {
		cursor: CursorToken,
	},
}

impl Cursor {
	pub fn simple(token: impl Into<CursorToken>) -> Self {
		Cursor::Simple { cursor: token.into() }
	}

	pub fn collection(collection_id: impl Into<String>, collection_cursor: impl Into<CursorToken>) -> Self {
		Cursor::Collection {
			collection_id: collection_id.into(),
			collection_cursor: collection_cursor.into(),
		}
	}

	pub fn advanced_filter(
		entity_filter_index: u32,
		member_filter_index: u32,
		cursor: Option<CursorToken>,
	) -> Self {
		Cursor::AdvancedFilter { entity_filter_index, member_filter_index, cursor }
	}

	/// Canonical-JSON-then-base64url encoding. `deny_unknown_fields` on each
	/// variant guarantees `decode(encode(c)) == c` (spec §8 invariant 4).
	pub fn encode(&self) -> String {
		encode_json(self)
	}

	pub fn decode(wire: &str) -> Result<Self, CursorError> {
		decode_json(wire)
	}
}

/// Encodes an empty cursor (no more pages / start of iteration) as the empty
/// wire string, and any other cursor via [`Cursor::encode`].
pub fn encode_opt(cursor: Option<&Cursor>) -> String {
	match cursor {
		Some(cursor) => cursor.encode(),
		None => String::new(),
	}
}

/// Decodes the wire cursor string. An empty string always means "start of
/// iteration" and decodes to `Ok(None)`, never an error.
pub fn decode_opt(wire: &str) -> Result<Option<Cursor>, CursorError> {
	if wire.is_empty() {
		return Ok(None);
	}
	Cursor::decode(wire).map(Some)
}

/// Generic canonical-JSON + base64url encode, used both for [`Cursor`] and
/// for SoR-private composite payloads (e.g. GitHub's nested page-info token).
pub fn encode_json<T: Serialize>(value: &T) -> String {
	// Route through `Value` so object keys always serialize in the BTreeMap's
	// sorted order, regardless of the struct's field declaration order.
	let canonical = serde_json::to_value(value).expect("cursor payloads are always serializable");
	let bytes = serde_json::to_vec(&canonical).expect("canonicalized JSON always serializes");
	base64::engine::general_purpose::URL_SAFE.encode(bytes)
}

pub fn decode_json<T: for<'de> Deserialize<'de>>(wire: &str) -> Result<T, CursorError> {
	let bytes = base64::engine::general_purpose::URL_SAFE
		.decode(wire)
		.map_err(|e| CursorError::InvalidBase64(e.to_string()))?;
	serde_json::from_slice(&bytes).map_err(|e| {
		// A struct mismatch surfaces as a serde error; callers that try several
		// shapes (see `Cursor`'s untagged enum) treat any error as "try next".
		if e.is_data() {
			CursorError::AmbiguousOrUnknownShape
		} else {
			CursorError::InvalidJson(e.to_string())
		}
	})
}
