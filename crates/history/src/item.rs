use vellum_primitives::{SelectionBookmark, Step, StepMap};

/// One entry in a branch's log.
///
/// An item always carries the position map of the change it records. Items
/// that additionally hold an inverted step are undoable; map-only items
/// record remote or untracked changes that held steps must later be remapped
/// through. An item carrying a selection bookmark marks an event boundary:
/// the bookmark is the selection from before the event began.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Item {
	/// Position map of the change this item records.
	pub(crate) map: StepMap,
	/// The inverted step: applying it rewinds the recorded change.
	pub(crate) step: Option<Step>,
	/// Selection from before the event this item starts, if it starts one.
	pub(crate) selection: Option<SelectionBookmark>,
	/// Distance back to the item whose map this one inverts.
	///
	/// Only set on items created while popping with preserved items, so a
	/// later remapping can collapse the pair to identity.
	pub(crate) mirror_offset: Option<usize>,
}

impl Item {
	pub(crate) fn new(map: StepMap, step: Option<Step>, selection: Option<SelectionBookmark>) -> Self {
		Self {
			map,
			step,
			selection,
			mirror_offset: None,
		}
	}

	/// A pure position record with no step attached.
	pub(crate) fn map_only(map: StepMap) -> Self {
		Self::new(map, None, None)
	}

	pub(crate) fn with_mirror(map: StepMap, mirror_offset: usize) -> Self {
		Self {
			map,
			step: None,
			selection: None,
			mirror_offset: Some(mirror_offset),
		}
	}

	/// Tries to combine this item with the one recorded directly after it.
	///
	/// Both items must hold steps and `other` must not start a new event.
	/// The inverted steps are combined in undo application order (`other`
	/// rewinds first); the merged item's map is the inverse of the combined
	/// step's own map, and the event boundary (if any) stays with `self`.
	pub(crate) fn merge(&self, other: &Item) -> Option<Item> {
		let (Some(step), Some(other_step)) = (&self.step, &other.step) else {
			return None;
		};
		if other.selection.is_some() {
			return None;
		}
		let combined = other_step.merge(step)?;
		Some(Item {
			map: combined.get_map().invert(),
			step: Some(combined),
			selection: self.selection.clone(),
			mirror_offset: None,
		})
	}
}

#[cfg(test)]
mod tests {
	use vellum_primitives::{Rope, Selection, Step};

	use super::*;

	fn step_item(step: Step, doc: &str, selection: Option<SelectionBookmark>) -> Item {
		let doc = Rope::from(doc);
		let inverted = step.invert(&doc);
		Item::new(step.get_map(), Some(inverted), selection)
	}

	#[test]
	fn merge_combines_typing_run() {
		let first = step_item(Step::insert(0, "a"), "", Some(Selection::point(0).bookmark()));
		let second = step_item(Step::insert(1, "b"), "a", None);

		let merged = first.merge(&second).unwrap();
		let step = merged.step.unwrap();
		assert_eq!((step.from(), step.to(), step.text()), (0, 2, ""));
		assert!(merged.selection.is_some());
	}

	#[test]
	fn merge_refuses_event_boundary() {
		let first = step_item(Step::insert(0, "a"), "", None);
		let second = step_item(Step::insert(1, "b"), "a", Some(Selection::point(1).bookmark()));

		assert!(first.merge(&second).is_none());
	}

	#[test]
	fn merge_refuses_map_only_items() {
		let first = step_item(Step::insert(0, "a"), "", None);
		let second = Item::map_only(Step::insert(1, "b").get_map());

		assert!(first.merge(&second).is_none());
		assert!(second.merge(&first).is_none());
	}
}
