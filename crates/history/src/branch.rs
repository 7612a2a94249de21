use im::Vector;
use tracing::trace;
use vellum_primitives::{Mapping, Rope, SelectionBookmark, StepMap, Transform};

use crate::HistoryConfig;
use crate::item::Item;

/// How far `event_count` may exceed the configured depth before the oldest
/// events are evicted.
const DEPTH_OVERFLOW: usize = 20;

/// Step-less items tolerated after a rebase before the branch is compressed.
const MAX_EMPTY_ITEMS: usize = 500;

/// The history log for one direction (undo or redo).
///
/// A branch is a persistent sequence of [`Item`]s in the order their changes
/// happened, plus the number of events (selection-bearing items) recorded in
/// it. Branches are values: every operation returns a new branch sharing
/// structure with the old one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
	pub(crate) items: Vector<Item>,
	pub(crate) event_count: usize,
}

/// The result of popping an event off a branch.
#[derive(Debug)]
pub struct PoppedEvent {
	/// The branch with the popped event removed.
	pub remaining: Branch,
	/// The reconstructed inverse of the event, applied to the given document.
	pub transform: Transform,
	/// The selection to restore, already remapped to the transform's output.
	pub selection: SelectionBookmark,
}

impl Branch {
	/// The empty branch.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Number of undoable events in this branch.
	pub fn event_count(&self) -> usize {
		self.event_count
	}

	/// Records a transform's steps as a new batch of items.
	///
	/// Each step is inverted against its pre-image; the first new item
	/// carries `selection` (marking the start of a new event) when one is
	/// given. Without `preserve_items`, consecutive step items are merged
	/// where the step algebra allows, so a typing run collapses into a
	/// single item. When the event count overflows the configured depth by
	/// more than [`DEPTH_OVERFLOW`], the oldest whole events are dropped.
	pub fn add_transform(
		&self,
		transform: &Transform,
		selection: Option<SelectionBookmark>,
		config: &HistoryConfig,
	) -> Branch {
		let mut new_items: Vec<Item> = Vec::new();
		let mut event_count = self.event_count;
		let mut old_items = self.items.clone();
		let mut selection = selection;
		let mut last_item = if config.preserve_items {
			None
		} else {
			old_items.last().cloned()
		};

		for i in 0..transform.step_count() {
			let inverted = transform.steps()[i].invert(&transform.docs()[i]);
			let had_selection = selection.is_some();
			let mut item = Item::new(transform.mapping().maps()[i].clone(), Some(inverted), selection.take());

			if let Some(last) = &last_item
				&& let Some(merged) = last.merge(&item)
			{
				item = merged;
				if i > 0 {
					new_items.pop();
				} else {
					old_items = prefix(&old_items, old_items.len() - 1);
				}
			}

			new_items.push(item.clone());
			if had_selection {
				event_count += 1;
			}
			if !config.preserve_items {
				last_item = Some(item);
			}
		}

		if event_count > config.depth && event_count - config.depth > DEPTH_OVERFLOW {
			let overflow = event_count - config.depth;
			trace!(overflow, "evicting oldest history events");
			old_items = cut_off_events(&old_items, overflow);
			event_count -= overflow;
		}

		let mut items = old_items;
		items.extend(new_items);
		Branch { items, event_count }
	}

	/// Records position maps for changes below the current history depth.
	///
	/// Untracked and remote edits are not undoable, but the inverted steps
	/// already held must be remapped through them later. An empty branch
	/// holds no steps, so the maps are not worth tracking.
	pub fn add_maps(&self, maps: impl IntoIterator<Item = StepMap>) -> Branch {
		if self.event_count == 0 {
			return self.clone();
		}
		let mut items = self.items.clone();
		items.extend(maps.into_iter().map(Item::map_only));
		Branch {
			items,
			event_count: self.event_count,
		}
	}

	/// Reconstructs the inverse of the most recent event.
	///
	/// Walks backwards from the end of the log to the event's boundary item,
	/// applying each held inverted step (remapped through everything that
	/// happened since it was recorded) to a transform rooted at `doc`. Steps
	/// that no longer map or apply are dropped; the change they recorded
	/// has no target any more, and the event completes as a partial undo.
	///
	/// With `preserve_items`, the consumed items are rebuilt into the
	/// remaining branch as position history (original maps before, outgoing
	/// maps after, linked by mirror offsets) so arbitrary remote edits can
	/// still be interleaved afterwards.
	///
	/// Returns `None` when the branch holds no events.
	pub fn pop_event(&self, doc: &Rope, preserve_items: bool) -> Option<PoppedEvent> {
		if self.event_count == 0 {
			return None;
		}

		let mut end = self.items.len();
		loop {
			if self.items[end - 1].selection.is_some() {
				end -= 1;
				break;
			}
			end -= 1;
		}

		let mut remap;
		let mut map_from;
		if preserve_items {
			let built = self.remapping(end, self.items.len());
			map_from = built.len();
			remap = Some(built);
		} else {
			remap = None;
			map_from = 0;
		}

		let mut transform = Transform::new(doc.clone());
		let mut add_after: Vec<Item> = Vec::new();
		let mut add_before: Vec<Item> = Vec::new();

		for i in (0..self.items.len()).rev() {
			let item = &self.items[i];

			let Some(step) = &item.step else {
				if remap.is_none() {
					let built = self.remapping(end, i + 1);
					map_from = built.len();
					remap = Some(built);
				}
				map_from -= 1;
				add_before.push(item.clone());
				continue;
			};

			match remap.as_mut() {
				Some(remap) => {
					add_before.push(Item::map_only(item.map.clone()));
					let mapped = step.map(&remap.slice_from(map_from));
					let mut outgoing = None;
					if let Some(mapped) = mapped
						&& transform.maybe_step(mapped).is_ok()
						&& let Some(map) = transform.mapping().maps().last()
					{
						let map = map.clone();
						add_after.push(Item::with_mirror(map.clone(), add_after.len() + add_before.len()));
						outgoing = Some(map);
					} else {
						trace!("dropping inverted step with no remaining target");
					}
					map_from -= 1;
					if let Some(map) = outgoing {
						remap.append_map(map, Some(map_from));
					}
				}
				None => {
					if transform.maybe_step(step.clone()).is_err() {
						trace!("dropping inverted step that no longer applies");
					}
				}
			}

			if let Some(selection) = &item.selection {
				let selection = match &remap {
					Some(remap) => selection.map(&remap.slice_from(map_from)),
					None => selection.clone(),
				};

				let mut items = prefix(&self.items, end);
				add_before.reverse();
				items.extend(add_before);
				items.extend(add_after);
				let remaining = Branch {
					items,
					event_count: self.event_count - 1,
				};

				return Some(PoppedEvent {
					remaining,
					transform,
					selection,
				});
			}
		}

		None
	}

	/// Builds a remapping over the items in `[from, to)`.
	///
	/// Mirror offsets are registered only when the partner item also falls
	/// inside the window; a mirror pointing out of the window has nothing
	/// to cancel against.
	pub(crate) fn remapping(&self, from: usize, to: usize) -> Mapping {
		let mut maps = Mapping::new();
		for i in from..to {
			let item = &self.items[i];
			let mirror = item
				.mirror_offset
				.and_then(|offset| (i >= offset && i - offset >= from).then(|| maps.len() - offset));
			maps.append_map(item.map.clone(), mirror);
		}
		maps
	}

	/// Rewrites the trailing items after the collaboration layer replaced
	/// the last `rebased_count` local steps with a rebased sequence.
	///
	/// `transform` is expected to invert those local steps, apply the remote
	/// steps, and reapply the local steps remapped, with mirrors registered
	/// between each inversion and its reapplication. Items whose step
	/// survived the rebase are rebuilt from the rebased step's inverse and
	/// map; the pure-remote prefix is recorded as map-only items.
	pub fn rebased(&self, transform: &Transform, rebased_count: usize) -> Branch {
		if self.event_count == 0 {
			return self.clone();
		}

		let mut rebased_items: Vec<Item> = Vec::new();
		let start = self.items.len().saturating_sub(rebased_count);

		let mapping = transform.mapping();
		let mut new_until = transform.step_count();
		let mut i_rebased = rebased_count;

		for i in start..self.items.len() {
			let item = &self.items[i];
			i_rebased -= 1;
			let Some(pos) = mapping.get_mirror(i_rebased) else {
				continue;
			};
			new_until = new_until.min(pos);

			let map = mapping.maps()[pos].clone();
			if item.step.is_some() {
				let step = transform.steps()[pos].invert(&transform.docs()[pos]);
				let selection = item
					.selection
					.as_ref()
					.map(|s| s.map(&mapping.slice(i_rebased + 1, pos)));
				rebased_items.push(Item::new(map, Some(step), selection));
			} else {
				rebased_items.push(Item::map_only(map));
			}
		}

		let rebased_len = rebased_items.len();
		let mut items = prefix(&self.items, start);
		for i in rebased_count..new_until {
			items.push_back(Item::map_only(mapping.maps()[i].clone()));
		}
		items.extend(rebased_items);

		// Deliberately unchanged across a rebase; see the design notes.
		let branch = Branch {
			items,
			event_count: self.event_count,
		};

		if branch.empty_item_count() > MAX_EMPTY_ITEMS {
			return branch.compress(self.items.len() - rebased_len);
		}
		branch
	}

	/// Squeezes out map-only items that no held step needs any more.
	///
	/// Walks the log backwards through a cumulative remapping: every held
	/// step is re-expressed in pop order (so the maps of dropped items fold
	/// into it), offered to the previously emitted item for merging, and
	/// kept; bare map items inside the window vanish. Items at or above
	/// `upto` are copied verbatim, since a freshly rebased tail must stay
	/// untouched for a later rebase to identify it.
	pub fn compress(&self, upto: usize) -> Branch {
		let mut remap = self.remapping(0, upto);
		let mut map_from = remap.len();
		let mut items: Vec<Item> = Vec::new();
		let mut events = 0;

		for i in (0..self.items.len()).rev() {
			let item = &self.items[i];
			if i >= upto {
				items.push(item.clone());
				if item.selection.is_some() {
					events += 1;
				}
			} else if let Some(step) = &item.step {
				let mapped = step.map(&remap.slice_from(map_from));
				map_from -= 1;
				if let Some(mapped) = mapped {
					let map = mapped.get_map();
					remap.append_map(map.clone(), Some(map_from));
					let selection = item
						.selection
						.as_ref()
						.map(|s| s.map(&remap.slice_from(map_from)));
					if selection.is_some() {
						events += 1;
					}
					let new_item = Item::new(map.invert(), Some(mapped), selection);
					if let Some(last) = items.last()
						&& let Some(merged) = new_item.merge(last)
					{
						let end = items.len() - 1;
						items[end] = merged;
					} else {
						items.push(new_item);
					}
				}
			} else {
				map_from -= 1;
			}
		}

		trace!(
			before = self.items.len(),
			after = items.len(),
			"compressed branch"
		);
		items.reverse();
		Branch {
			items: items.into_iter().collect(),
			event_count: events,
		}
	}

	/// Compresses the whole branch.
	pub fn compress_all(&self) -> Branch {
		self.compress(self.items.len())
	}

	/// Number of items that hold no step.
	pub fn empty_item_count(&self) -> usize {
		self.items.iter().filter(|item| item.step.is_none()).count()
	}
}

/// The first `len` items of a persistent sequence, sharing structure.
fn prefix(items: &Vector<Item>, len: usize) -> Vector<Item> {
	let mut head = items.clone();
	let _ = head.split_off(len);
	head
}

/// Drops the oldest `n` whole events by slicing the log just before the
/// first event boundary that survives.
fn cut_off_events(items: &Vector<Item>, mut n: usize) -> Vector<Item> {
	let mut cut = items.len();
	for (i, item) in items.iter().enumerate() {
		if item.selection.is_some() {
			if n == 0 {
				cut = i;
				break;
			}
			n -= 1;
		}
	}
	items.clone().split_off(cut)
}

#[cfg(test)]
mod tests {
	use vellum_primitives::{Rope, Selection};

	use super::*;

	fn config() -> HistoryConfig {
		HistoryConfig::default()
	}

	/// One single-step tracked event appended to `branch`.
	fn add_event(branch: &Branch, doc: &str, pos: usize, text: &str) -> (Branch, Rope) {
		let mut tr = Transform::new(Rope::from(doc));
		tr.insert_text(pos, text).unwrap();
		let next_doc = tr.doc().clone();
		let branch = branch.add_transform(&tr, Some(Selection::point(pos).bookmark()), &config());
		(branch, next_doc)
	}

	#[test]
	fn pop_event_on_empty_branch_is_none() {
		assert!(Branch::empty().pop_event(&Rope::new(), false).is_none());
	}

	#[test]
	fn add_maps_on_empty_branch_is_noop() {
		let branch = Branch::empty().add_maps([StepMap::identity()]);
		assert_eq!(branch, Branch::empty());
	}

	#[test]
	fn rebased_on_empty_branch_is_unchanged() {
		let tr = Transform::new(Rope::from("x"));
		assert_eq!(Branch::empty().rebased(&tr, 1), Branch::empty());
	}

	#[test]
	fn add_transform_counts_events() {
		let (branch, doc) = add_event(&Branch::empty(), "", 0, "a");
		assert_eq!(branch.event_count(), 1);

		// No selection marker: same event continues.
		let mut tr = Transform::new(doc);
		tr.insert_text(1, "b").unwrap();
		let branch = branch.add_transform(&tr, None, &config());
		assert_eq!(branch.event_count(), 1);
	}

	#[test]
	fn add_transform_merges_typing_run_into_one_item() {
		let (branch, doc) = add_event(&Branch::empty(), "", 0, "a");
		let mut tr = Transform::new(doc);
		tr.insert_text(1, "b").unwrap();
		let branch = branch.add_transform(&tr, None, &config());

		assert_eq!(branch.items.len(), 1);
		let step = branch.items[0].step.clone().unwrap();
		assert_eq!((step.from(), step.to()), (0, 2));
	}

	#[test]
	fn preserve_items_keeps_steps_separate() {
		let preserving = HistoryConfig {
			preserve_items: true,
			..HistoryConfig::default()
		};
		let mut tr = Transform::new(Rope::new());
		tr.insert_text(0, "a").unwrap();
		tr.insert_text(1, "b").unwrap();
		let branch =
			Branch::empty().add_transform(&tr, Some(Selection::point(0).bookmark()), &preserving);

		assert_eq!(branch.items.len(), 2);
	}

	#[test]
	fn depth_overflow_evicts_oldest_events() {
		let config = HistoryConfig {
			depth: 1,
			..HistoryConfig::default()
		};
		let mut branch = Branch::empty();
		let mut doc = String::new();
		for i in 0..25 {
			let mut tr = Transform::new(Rope::from(doc.as_str()));
			tr.insert_text(i, "x").unwrap();
			doc = tr.doc().to_string();
			branch = branch.add_transform(&tr, Some(Selection::point(i).bookmark()), &config);
			assert!(branch.event_count() <= config.depth + DEPTH_OVERFLOW + 1);
		}
		// The 22nd event overflows depth 1 by 21 and triggers eviction.
		assert!(branch.event_count() < 25);
		let boundaries = branch.items.iter().filter(|i| i.selection.is_some()).count();
		assert_eq!(boundaries, branch.event_count());
	}

	#[test]
	fn empty_item_count_counts_stepless_items() {
		let (branch, _) = add_event(&Branch::empty(), "", 0, "a");
		let mut tr = Transform::new(Rope::from("a"));
		tr.insert_text(1, "b").unwrap();
		let branch = branch.add_maps(tr.mapping().maps().iter().cloned());
		assert_eq!(branch.empty_item_count(), 1);
	}

	#[test]
	fn pop_event_returns_truncated_branch() {
		let (branch, doc) = add_event(&Branch::empty(), "", 0, "hi");
		let popped = branch.pop_event(&doc, false).unwrap();
		assert_eq!(popped.remaining.event_count(), 0);
		assert_eq!(popped.transform.doc().to_string(), "");
	}

	#[test]
	fn compress_drops_bare_map_items() {
		let (branch, doc) = add_event(&Branch::empty(), "", 0, "hi");
		let mut untracked = Transform::new(doc.clone());
		untracked.insert_text(0, "zz").unwrap();
		let branch = branch.add_maps(untracked.mapping().maps().iter().cloned());
		assert_eq!(branch.empty_item_count(), 1);

		let compressed = branch.compress_all();
		assert_eq!(compressed.empty_item_count(), 0);
		assert_eq!(compressed.event_count(), 1);

		// The held step absorbed the untracked map: popping still removes
		// "hi" from the post-untracked document.
		let popped = compressed.pop_event(untracked.doc(), false).unwrap();
		assert_eq!(popped.transform.doc().to_string(), "zz");
	}
}
