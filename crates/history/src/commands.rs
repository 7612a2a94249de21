use tracing::debug;

use crate::editor::{Action, EditorState, TransformAction};
use crate::state::HistoryState;

/// Builds the transform action for one undo or redo, or `None` when the
/// source branch has nothing to pop.
///
/// Popping reconstructs the inverse of the most recent event; the popped
/// transform is then recorded onto the *opposite* branch with the current
/// selection, so an undo always produces a redo entry and vice versa. The
/// resulting action carries the replacement history state inline (the
/// recorder installs it verbatim) and is sealed against further changes.
fn shift(state: &EditorState, redo: bool) -> Option<Action> {
	let history = state.history();
	let config = state.config();

	let source = if redo { history.undone() } else { history.done() };
	let pop = source.pop_event(state.doc(), config.preserve_items)?;
	debug!(redo, steps = pop.transform.step_count(), "popped history event");

	let selection = pop.selection.resolve(pop.transform.doc());
	let other = if redo { history.done() } else { history.undone() };
	let added = other.add_transform(&pop.transform, Some(state.selection().bookmark()), config);

	let (done, undone) = if redo {
		(added, pop.remaining)
	} else {
		(pop.remaining, added)
	};
	let new_state = HistoryState {
		done,
		undone,
		prev_map: None,
		prev_time: 0,
	};

	Some(
		TransformAction::new(pop.transform)
			.with_selection(selection)
			.with_history_state(new_state)
			.scroll_into_view()
			.sealed()
			.into_action(),
	)
}

/// Undoes the most recent event. Returns false when there is nothing to
/// undo; dispatches the inverse transform otherwise.
pub fn undo(state: &EditorState, dispatch: Option<&mut dyn FnMut(Action)>) -> bool {
	if state.history().done().event_count() == 0 {
		return false;
	}
	if let Some(dispatch) = dispatch {
		match shift(state, false) {
			Some(action) => dispatch(action),
			None => return false,
		}
	}
	true
}

/// Redoes the most recently undone event. Returns false when there is
/// nothing to redo.
pub fn redo(state: &EditorState, dispatch: Option<&mut dyn FnMut(Action)>) -> bool {
	if state.history().undone().event_count() == 0 {
		return false;
	}
	if let Some(dispatch) = dispatch {
		match shift(state, true) {
			Some(action) => dispatch(action),
			None => return false,
		}
	}
	true
}

/// Number of undoable events.
pub fn undo_depth(state: &EditorState) -> usize {
	state.history().done().event_count()
}

/// Number of redoable events.
pub fn redo_depth(state: &EditorState) -> usize {
	state.history().undone().event_count()
}

/// The action that closes the current event group: the next tracked edit
/// starts a new undo event regardless of timing or adjacency. Applying it
/// twice is the same as applying it once.
pub fn close_history() -> Action {
	Action::HistoryClose
}
