use ropey::Rope;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::range::{CharIdx, Range};
use crate::transform::{Assoc, Mapping};

/// A set of non-overlapping ranges with a designated primary.
///
/// A selection always contains at least one range. The primary range is
/// used for cursor positioning and scroll following.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
	/// The collection of selection ranges (always non-empty).
	ranges: SmallVec<[Range; 1]>,
	/// Index of the primary range within `ranges`.
	primary_index: usize,
}

impl Selection {
	/// Create a new selection with at least one range.
	pub fn new(primary: Range, others: impl IntoIterator<Item = Range>) -> Self {
		let mut ranges: SmallVec<[Range; 1]> = smallvec![primary];
		ranges.extend(others);

		let mut sel = Self { ranges, primary_index: 0 };
		sel.normalize();
		sel
	}

	/// Creates a selection from a vector of ranges.
	///
	/// # Panics
	///
	/// Panics if `ranges` is empty or `primary_index` is out of bounds.
	pub fn from_vec(ranges: Vec<Range>, primary_index: usize) -> Self {
		assert!(!ranges.is_empty(), "Selection cannot be empty");
		assert!(
			primary_index < ranges.len(),
			"primary_index ({primary_index}) out of bounds for {} ranges",
			ranges.len()
		);

		let primary = ranges[primary_index];

		let mut sel = Self {
			ranges: ranges.into_iter().collect(),
			primary_index: 0,
		};
		sel.primary_index = sel.ranges.iter().position(|&r| r == primary).unwrap_or(0);
		sel.normalize();
		sel
	}

	/// Creates a single-range selection.
	pub fn single(anchor: CharIdx, head: CharIdx) -> Self {
		Self {
			ranges: smallvec![Range::new(anchor, head)],
			primary_index: 0,
		}
	}

	/// Creates a point selection (zero-width cursor).
	pub fn point(pos: CharIdx) -> Self {
		Self::single(pos, pos)
	}

	/// Returns the primary range.
	pub fn primary(&self) -> Range {
		self.ranges[self.primary_index]
	}

	/// Returns all ranges as a slice.
	pub fn ranges(&self) -> &[Range] {
		&self.ranges
	}

	/// Iterates over all ranges.
	pub fn iter(&self) -> impl Iterator<Item = &Range> {
		self.ranges.iter()
	}

	/// Transforms all ranges using the given function, returning a new
	/// selection.
	pub fn transform<F>(&self, mut f: F) -> Self
	where
		F: FnMut(&Range) -> Range,
	{
		let primary = f(&self.primary());
		let others = self
			.ranges
			.iter()
			.enumerate()
			.filter(|&(i, _)| i != self.primary_index)
			.map(|(_, r)| f(r));

		Self::new(primary, others)
	}

	/// Maps every range through a position mapping.
	pub fn map(&self, mapping: &Mapping) -> Self {
		self.transform(|r| r.map(|pos| mapping.map(pos, Assoc::After)))
	}

	/// Clamps all ranges to `[0, max_char]`.
	pub fn clamp(&self, max_char: CharIdx) -> Self {
		self.transform(|r| r.clamp(max_char))
	}

	/// A document-independent marker for this selection, suitable for
	/// storing in history items and mapping through later edits.
	pub fn bookmark(&self) -> SelectionBookmark {
		SelectionBookmark {
			ranges: self.ranges.iter().map(|r| (r.anchor, r.head)).collect(),
			primary_index: self.primary_index,
		}
	}

	/// Normalize the selection by sorting ranges and merging overlaps.
	fn normalize(&mut self) {
		if self.ranges.len() <= 1 {
			return;
		}

		let primary = self.ranges[self.primary_index];
		self.ranges.sort_by_key(|r: &Range| r.from());

		let mut merged: SmallVec<[Range; 1]> = SmallVec::new();
		let mut primary_index = 0;

		for range in &self.ranges {
			if let Some(last) = merged.last_mut()
				&& last.overlaps(range)
			{
				let old_last = *last;
				*last = last.merge(range);
				if *range == primary || old_last == primary || last.contains(primary.from()) {
					primary_index = merged.len() - 1;
				}
				continue;
			}

			if *range == primary {
				primary_index = merged.len();
			}
			merged.push(*range);
		}

		self.ranges = merged;
		self.primary_index = primary_index.min(self.ranges.len().saturating_sub(1));
	}
}

impl Default for Selection {
	fn default() -> Self {
		Self::point(0)
	}
}

impl From<Range> for Selection {
	fn from(range: Range) -> Self {
		Self {
			ranges: smallvec![range],
			primary_index: 0,
		}
	}
}

/// A serialised selection marker: anchor/head pairs without any document
/// reference.
///
/// Bookmarks are what the undo history stores. They can be mapped through a
/// [`Mapping`] while the document keeps changing underneath, and resolved
/// against a concrete document when the selection is finally restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionBookmark {
	ranges: Vec<(CharIdx, CharIdx)>,
	primary_index: usize,
}

impl SelectionBookmark {
	/// Maps every endpoint through a mapping pipeline.
	pub fn map(&self, mapping: &Mapping) -> SelectionBookmark {
		SelectionBookmark {
			ranges: self
				.ranges
				.iter()
				.map(|&(anchor, head)| {
					(mapping.map(anchor, Assoc::After), mapping.map(head, Assoc::After))
				})
				.collect(),
			primary_index: self.primary_index,
		}
	}

	/// Resolves this marker against a document, clamping endpoints that no
	/// longer fit.
	pub fn resolve(&self, doc: &Rope) -> Selection {
		let max = doc.len_chars();
		let ranges: Vec<Range> = self
			.ranges
			.iter()
			.map(|&(anchor, head)| Range::new(anchor.min(max), head.min(max)))
			.collect();
		Selection::from_vec(ranges, self.primary_index.min(self.ranges.len().saturating_sub(1)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::transform::Transform;

	#[test]
	fn test_selection_normalizes_overlaps() {
		let sel = Selection::new(Range::new(0, 5), [Range::new(3, 8)]);
		assert_eq!(sel.ranges().len(), 1);
		assert_eq!(sel.primary(), Range::new(0, 8));
	}

	#[test]
	fn test_bookmark_roundtrip() {
		let sel = Selection::single(2, 6);
		let doc = Rope::from("hello world");
		assert_eq!(sel.bookmark().resolve(&doc), sel);
	}

	#[test]
	fn test_bookmark_resolve_clamps() {
		let sel = Selection::single(4, 9);
		let doc = Rope::from("hi");
		let resolved = sel.bookmark().resolve(&doc);
		assert_eq!(resolved.primary(), Range::new(2, 2));
	}

	#[test]
	fn test_bookmark_maps_through_edits() {
		let mut tr = Transform::new(Rope::from("hello"));
		tr.insert_text(0, "say ").unwrap();

		let mark = Selection::point(3).bookmark();
		let mapped = mark.map(tr.mapping());
		assert_eq!(mapped.resolve(tr.doc()).primary(), Range::point(7));
	}

	#[test]
	fn test_bookmark_serializes() {
		let mark = Selection::single(1, 4).bookmark();
		let json = serde_json::to_string(&mark).unwrap();
		let back: SelectionBookmark = serde_json::from_str(&json).unwrap();
		assert_eq!(back, mark);
	}
}
