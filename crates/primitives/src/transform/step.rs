use ropey::Rope;

use crate::range::{CharIdx, CharLen};

use super::map::{Assoc, MapRange, Mapping, StepMap};

/// Error type for step application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
	#[error("step range [{from}, {to}) exceeds document length {len}")]
	OutOfBounds { from: CharIdx, to: CharIdx, len: CharLen },

	#[error("step range start ({from}) exceeds end ({to})")]
	InvertedRange { from: CharIdx, to: CharIdx },
}

/// An atomic document edit: replace the characters in `[from, to)` with
/// `text`.
///
/// Insertions have `from == to`; deletions have empty `text`. Every step has
/// a known inverse ([`Step::invert`]) and a position map ([`Step::get_map`]),
/// which is what makes the undo history able to store edits instead of
/// document snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
	from: CharIdx,
	to: CharIdx,
	text: String,
}

impl Step {
	/// Creates a step replacing `[from, to)` with `text`.
	pub fn replace(from: CharIdx, to: CharIdx, text: impl Into<String>) -> Self {
		Self {
			from,
			to,
			text: text.into(),
		}
	}

	/// Creates a pure insertion at `pos`.
	pub fn insert(pos: CharIdx, text: impl Into<String>) -> Self {
		Self::replace(pos, pos, text)
	}

	/// Creates a pure deletion of `[from, to)`.
	pub fn delete(from: CharIdx, to: CharIdx) -> Self {
		Self::replace(from, to, "")
	}

	/// Start of the replaced range.
	pub fn from(&self) -> CharIdx {
		self.from
	}

	/// End of the replaced range (exclusive).
	pub fn to(&self) -> CharIdx {
		self.to
	}

	/// The replacement text.
	pub fn text(&self) -> &str {
		&self.text
	}

	fn text_len(&self) -> CharLen {
		self.text.chars().count()
	}

	/// Applies this step to a document, returning the new document.
	///
	/// Fails (without modifying anything) when the range is inverted or does
	/// not fit the document.
	pub fn apply(&self, doc: &Rope) -> Result<Rope, StepError> {
		if self.from > self.to {
			return Err(StepError::InvertedRange {
				from: self.from,
				to: self.to,
			});
		}
		let len = doc.len_chars();
		if self.to > len {
			return Err(StepError::OutOfBounds {
				from: self.from,
				to: self.to,
				len,
			});
		}
		let mut out = doc.clone();
		out.remove(self.from..self.to);
		out.insert(self.from, &self.text);
		Ok(out)
	}

	/// Creates the step that undoes this one.
	///
	/// `doc` must be the document this step applied to (the pre-image), so
	/// the replaced characters can be read back out of it.
	pub fn invert(&self, doc: &Rope) -> Step {
		let replaced: String = doc.slice(self.from..self.to).chars().collect();
		Step::replace(self.from, self.from + self.text_len(), replaced)
	}

	/// Maps this step through a mapping pipeline.
	///
	/// The start maps with after-association and the end with
	/// before-association, so surrounding insertions do not get swallowed
	/// into the replaced range. Returns `None` when both endpoints were
	/// deleted across: the content this step targeted is gone.
	pub fn map(&self, mapping: &Mapping) -> Option<Step> {
		let from = mapping.map_result(self.from, Assoc::After);
		let to = mapping.map_result(self.to, Assoc::Before);
		if from.deleted_across() && to.deleted_across() {
			return None;
		}
		Some(Step::replace(from.pos, from.pos.max(to.pos), self.text.clone()))
	}

	/// Merges two steps applied in sequence (`self` then `other`, with
	/// `other` in post-`self` coordinates) into a single equivalent step.
	///
	/// Succeeds when the edits are adjacent: `other` continues right where
	/// `self`'s replacement text ends (typing runs), or ends right where
	/// `self` started (backspace runs). Returns `None` otherwise.
	pub fn merge(&self, other: &Step) -> Option<Step> {
		if self.from + self.text_len() == other.from {
			let mut text = self.text.clone();
			text.push_str(&other.text);
			Some(Step::replace(self.from, self.to + (other.to - other.from), text))
		} else if other.to == self.from {
			let mut text = other.text.clone();
			text.push_str(&self.text);
			Some(Step::replace(other.from, self.to, text))
		} else {
			None
		}
	}

	/// The position map from pre-step to post-step coordinates.
	pub fn get_map(&self) -> StepMap {
		StepMap::new([MapRange {
			start: self.from,
			old_size: self.to - self.from,
			new_size: self.text_len(),
		}])
	}
}
