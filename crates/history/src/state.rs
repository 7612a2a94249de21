use tracing::trace;
use vellum_primitives::{Assoc, Selection, StepMap, Transform};

use crate::HistoryConfig;
use crate::branch::Branch;
use crate::editor::TransformAction;

/// The full undo/redo state: one branch per direction plus the metadata
/// used to group consecutive edits into events.
///
/// States are immutable values; every dispatched action produces a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryState {
	pub(crate) done: Branch,
	pub(crate) undone: Branch,
	/// Map of the last tracked step committed to `done`, if any.
	pub(crate) prev_map: Option<StepMap>,
	/// Timestamp of the last tracked transform.
	pub(crate) prev_time: u64,
}

impl HistoryState {
	/// A fresh state: both branches empty, no grouping metadata.
	pub fn new() -> Self {
		Self::default()
	}

	/// The branch of events that can be undone.
	pub fn done(&self) -> &Branch {
		&self.done
	}

	/// The branch of events that can be redone.
	pub fn undone(&self) -> &Branch {
		&self.undone
	}

	/// Clears the grouping metadata so the next tracked edit starts a new
	/// event. Branches are untouched, which makes this idempotent.
	pub(crate) fn closed(&self) -> Self {
		Self {
			done: self.done.clone(),
			undone: self.undone.clone(),
			prev_map: None,
			prev_time: 0,
		}
	}

	/// The recorder: folds one transform action into the history.
	///
	/// Decision order: an action carrying a pre-built state replaces the
	/// history outright (the shifter installs its own result this way); an
	/// empty transform changes nothing; a tracked transform is grouped or
	/// appended onto `done` and clears `undone`; a rebase is applied to both
	/// branches; anything else is recorded as bare position maps on both.
	pub(crate) fn record(
		&self,
		selection_before: &Selection,
		action: &TransformAction,
		config: &HistoryConfig,
	) -> HistoryState {
		if let Some(state) = &action.history_state {
			return state.clone();
		}
		if action.transform.is_empty() {
			return self.clone();
		}

		if action.add_to_history {
			let new_group = self.prev_time < action.time.saturating_sub(config.new_group_delay)
				|| !is_adjacent(&action.transform, self.prev_map.as_ref(), &self.done);
			trace!(new_group, time = action.time, "recording tracked transform");

			let bookmark = new_group.then(|| selection_before.bookmark());
			HistoryState {
				done: self.done.add_transform(&action.transform, bookmark, config),
				undone: Branch::empty(),
				prev_map: action.transform.mapping().maps().last().cloned(),
				prev_time: action.time,
			}
		} else if let Some(rebased_count) = action.rebased {
			trace!(rebased_count, "rebasing both branches");
			HistoryState {
				done: self.done.rebased(&action.transform, rebased_count),
				undone: self.undone.rebased(&action.transform, rebased_count),
				prev_map: self
					.prev_map
					.as_ref()
					.and_then(|_| action.transform.mapping().maps().last().cloned()),
				prev_time: self.prev_time,
			}
		} else {
			HistoryState {
				done: self.done.add_maps(action.transform.mapping().maps().iter().cloned()),
				undone: self.undone.add_maps(action.transform.mapping().maps().iter().cloned()),
				prev_map: self.prev_map.clone(),
				prev_time: self.prev_time,
			}
		}
	}
}

/// Whether a tracked transform touches the same region as the previous one.
///
/// Takes the first map's touched ranges and pulls each back through the
/// trailing map-only items of `done` (whose maps sit between the previous
/// tracked step and now), then tests overlap against the previous map's
/// touched output ranges. Edits that touch nothing group trivially; with no
/// previous map there is nothing to be adjacent to.
fn is_adjacent(transform: &Transform, prev_map: Option<&StepMap>, done: &Branch) -> bool {
	let Some(prev_map) = prev_map else {
		return false;
	};
	let Some(first_map) = transform.mapping().maps().front() else {
		return true;
	};

	let mut touched = Vec::new();
	first_map.for_each(|old_start, old_end, _, _| touched.push((old_start, old_end)));
	if touched.is_empty() {
		return true;
	}

	let mut adjacent = false;
	'ranges: for (mut start, mut end) in touched {
		for i in (0..done.items.len()).rev() {
			let item = &done.items[i];
			if item.step.is_some() {
				prev_map.for_each(|_, _, range_start, range_end| {
					if start <= range_end && end >= range_start {
						adjacent = true;
					}
				});
				if adjacent {
					break 'ranges;
				}
				break;
			}
			let inverted = item.map.invert();
			start = inverted.map(start, Assoc::Before);
			end = inverted.map(end, Assoc::After);
		}
	}
	adjacent
}
