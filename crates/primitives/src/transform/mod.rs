//! Steps, position maps, and transforms.
//!
//! A [`Step`] is an atomic replacement with a known inverse and a
//! [`StepMap`] translating positions across it. A [`Transform`] strings
//! steps together against a starting document, remembering the pre-image of
//! every step and the composed [`Mapping`], which is what undo history
//! needs to invert, remap, and replay edits later.

/// Position maps and mapping pipelines.
mod map;
/// The atomic edit step.
mod step;

pub use map::{Assoc, DelInfo, MapRange, MapResult, Mapping, StepMap};
pub use step::{Step, StepError};

use ropey::Rope;

/// An ordered sequence of steps applied to a starting document.
///
/// Alongside the current document, a transform keeps the pre-image of every
/// step (`docs`) and the composed position mapping, so any step can later be
/// inverted against the exact document it applied to.
#[derive(Debug, Clone, Default)]
pub struct Transform {
	doc: Rope,
	steps: Vec<Step>,
	docs: Vec<Rope>,
	mapping: Mapping,
}

impl Transform {
	/// Creates an empty transform rooted at `doc`.
	pub fn new(doc: Rope) -> Self {
		Self {
			doc,
			steps: Vec::new(),
			docs: Vec::new(),
			mapping: Mapping::new(),
		}
	}

	/// The current document (after all steps so far).
	pub fn doc(&self) -> &Rope {
		&self.doc
	}

	/// The steps applied so far, in order.
	pub fn steps(&self) -> &[Step] {
		&self.steps
	}

	/// The pre-image of each step: `docs()[i]` is the document
	/// `steps()[i]` applied to.
	pub fn docs(&self) -> &[Rope] {
		&self.docs
	}

	/// The composed position mapping across all steps.
	pub fn mapping(&self) -> &Mapping {
		&self.mapping
	}

	/// Returns true if no steps have been applied.
	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	/// Number of steps applied so far.
	pub fn step_count(&self) -> usize {
		self.steps.len()
	}

	/// Tries to apply a step, extending the transform on success.
	///
	/// On failure the transform is left untouched and the error reported;
	/// callers that treat failure as "this edit no longer applies" can just
	/// discard it.
	pub fn maybe_step(&mut self, step: Step) -> Result<(), StepError> {
		let new_doc = step.apply(&self.doc)?;
		self.mapping.append_map(step.get_map(), None);
		self.docs.push(std::mem::replace(&mut self.doc, new_doc));
		self.steps.push(step);
		Ok(())
	}

	/// Replaces `[from, to)` with `text`.
	pub fn replace(
		&mut self,
		from: crate::CharIdx,
		to: crate::CharIdx,
		text: impl Into<String>,
	) -> Result<(), StepError> {
		self.maybe_step(Step::replace(from, to, text))
	}

	/// Inserts `text` at `pos`.
	pub fn insert_text(&mut self, pos: crate::CharIdx, text: impl Into<String>) -> Result<(), StepError> {
		self.maybe_step(Step::insert(pos, text))
	}

	/// Deletes `[from, to)`.
	pub fn delete(&mut self, from: crate::CharIdx, to: crate::CharIdx) -> Result<(), StepError> {
		self.maybe_step(Step::delete(from, to))
	}

	/// Registers the maps at `a` and `b` as mirrors of each other.
	///
	/// Collaboration hosts use this when building a rebase transform: the
	/// inversion of a local step and its reapplication further on cancel out
	/// for position-mapping purposes.
	pub fn set_mirror(&mut self, a: usize, b: usize) {
		self.mapping.set_mirror(a, b);
	}
}
