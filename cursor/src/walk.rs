//! Pure state-transition helper for the advanced-filter pagination state
//! machine in §4.C. Holds no I/O; the adapter drives it by feeding in what
//! the SoR returned for the current page and reading back the next state.
//!
//! The collection-walk state machine (parent list + per-parent child list)
//! lives in `adapters::shared` instead: it needs to re-derive parent-list
//! position from a `CollectionSource` to stay within the documented
//! `Collection` cursor shape (`collectionId` + `collectionCursor` only, no
//! room for a stored page position), which makes it a driver concern rather
//! than a pure value type like this one.

use crate::{Cursor, CursorToken};

/// Row-major walk over the advanced-filter matrix (Azure AD only, §4.B.1/§4.C).
#[derive(Debug, Clone, PartialEq)]
pub struct FilterMatrixState {
	pub entity_filter_index: u32,
	pub member_filter_index: u32,
	pub inner_cursor: Option<CursorToken>,
}

impl FilterMatrixState {
	pub fn start() -> Self {
		Self { entity_filter_index: 0, member_filter_index: 0, inner_cursor: None }
	}

	pub fn from_cursor(cursor: Option<&Cursor>) -> Option<Self> {
		match cursor {
			None => Some(Self::start()),
			Some(Cursor::AdvancedFilter { entity_filter_index, member_filter_index, cursor }) =>
				Some(Self {
					entity_filter_index: *entity_filter_index,
					member_filter_index: *member_filter_index,
					inner_cursor: cursor.clone(),
				}),
			_ => None,
		}
	}

	/// Advances the matrix indices row-major: inner (member) first, then
	/// outer (entity). `member_filter_count` is the number of member filters
	/// for the *current* entity filter.
	pub fn advance(&self, member_filter_count: u32) -> Option<FilterMatrixState> {
		if self.member_filter_index + 1 < member_filter_count {
			Some(FilterMatrixState {
				entity_filter_index: self.entity_filter_index,
				member_filter_index: self.member_filter_index + 1,
				inner_cursor: None,
			})
		} else {
			Some(FilterMatrixState {
				entity_filter_index: self.entity_filter_index + 1,
				member_filter_index: 0,
				inner_cursor: None,
			})
		}
	}

	pub fn to_cursor(&self) -> Cursor {
		Cursor::advanced_filter(self.entity_filter_index, self.member_filter_index, self.inner_cursor.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn filter_matrix_advances_member_before_entity() {
		let start = FilterMatrixState::start();
		let next = start.advance(2).unwrap();
		assert_eq!(next.entity_filter_index, 0);
		assert_eq!(next.member_filter_index, 1);
	}

	#[test]
	fn filter_matrix_advances_entity_once_members_exhausted() {
		let state = FilterMatrixState { entity_filter_index: 0, member_filter_index: 1, inner_cursor: None };
		let next = state.advance(2).unwrap();
		assert_eq!(next.entity_filter_index, 1);
		assert_eq!(next.member_filter_index, 0);
	}
}
