use vellum_primitives::{Rope, Selection, Transform};

use crate::HistoryConfig;
use crate::state::HistoryState;

/// An action dispatched against an [`EditorState`].
#[derive(Debug, Clone)]
pub enum Action {
	/// A document transform plus the flags the history recorder consults.
	Transform(Box<TransformAction>),
	/// Reset event grouping so the next tracked edit starts a new event.
	HistoryClose,
}

/// A transform together with the metadata the history recorder reads.
#[derive(Debug, Clone)]
pub struct TransformAction {
	/// The document transform to apply.
	pub transform: Transform,
	/// Selection to install afterwards; when absent, the current selection
	/// is mapped through the transform instead.
	pub selection: Option<Selection>,
	/// Host-supplied timestamp, in the same unit as the new-group delay.
	/// Hosts without reliable timestamps supply 0.
	pub time: u64,
	/// When false, the edit is recorded as bare position maps instead of an
	/// undoable event.
	pub add_to_history: bool,
	/// Set by the collaboration layer when this transform rebases the last
	/// N local steps over remote ones.
	pub rebased: Option<usize>,
	/// A pre-built history state that replaces the recorder's own logic.
	/// The shifter uses this to install its result.
	pub history_state: Option<HistoryState>,
	/// Ask the view to scroll the selection into view.
	pub scroll_into_view: bool,
	/// Other plugins may not append further changes to this action.
	pub sealed: bool,
}

impl TransformAction {
	/// Wraps a transform with default flags: tracked, untimed, unsealed.
	pub fn new(transform: Transform) -> Self {
		Self {
			transform,
			selection: None,
			time: 0,
			add_to_history: true,
			rebased: None,
			history_state: None,
			scroll_into_view: false,
			sealed: false,
		}
	}

	/// Attaches the host's timestamp.
	pub fn at_time(mut self, time: u64) -> Self {
		self.time = time;
		self
	}

	/// Excludes this edit from undo history (recorded as maps only).
	pub fn without_history(mut self) -> Self {
		self.add_to_history = false;
		self
	}

	/// Marks this transform as rebasing the last `count` local steps.
	pub fn rebased(mut self, count: usize) -> Self {
		self.rebased = Some(count);
		self
	}

	/// Installs an explicit selection.
	pub fn with_selection(mut self, selection: Selection) -> Self {
		self.selection = Some(selection);
		self
	}

	/// Replaces the history state wholesale, bypassing the recorder.
	pub fn with_history_state(mut self, state: HistoryState) -> Self {
		self.history_state = Some(state);
		self
	}

	pub fn scroll_into_view(mut self) -> Self {
		self.scroll_into_view = true;
		self
	}

	pub fn sealed(mut self) -> Self {
		self.sealed = true;
		self
	}

	/// Wraps this action for dispatch.
	pub fn into_action(self) -> Action {
		Action::Transform(Box::new(self))
	}
}

/// The editor's state: document, selection, and undo history.
///
/// Immutable; [`EditorState::apply`] returns the successor state. The
/// editor owns exactly one current state at a time, but old states stay
/// valid (and cheap, thanks to structural sharing) for as long as anyone
/// holds them.
#[derive(Debug, Clone)]
pub struct EditorState {
	doc: Rope,
	selection: Selection,
	history: HistoryState,
	config: HistoryConfig,
}

impl EditorState {
	/// Creates a state with an empty history.
	pub fn new(doc: Rope, selection: Selection, config: HistoryConfig) -> Self {
		Self {
			doc,
			selection,
			history: HistoryState::new(),
			config,
		}
	}

	/// The current document.
	pub fn doc(&self) -> &Rope {
		&self.doc
	}

	/// The current selection.
	pub fn selection(&self) -> &Selection {
		&self.selection
	}

	/// The current history state.
	pub fn history(&self) -> &HistoryState {
		&self.history
	}

	/// The history configuration this state was created with.
	pub fn config(&self) -> &HistoryConfig {
		&self.config
	}

	/// A fresh transform rooted at the current document.
	pub fn transform(&self) -> Transform {
		Transform::new(self.doc.clone())
	}

	/// Applies an action, returning the successor state.
	pub fn apply(&self, action: &Action) -> EditorState {
		match action {
			Action::HistoryClose => Self {
				doc: self.doc.clone(),
				selection: self.selection.clone(),
				history: self.history.closed(),
				config: self.config.clone(),
			},
			Action::Transform(action) => {
				let history = self.history.record(&self.selection, action, &self.config);
				let doc = action.transform.doc().clone();
				let selection = match &action.selection {
					Some(selection) => selection.clone(),
					None => self
						.selection
						.map(action.transform.mapping())
						.clamp(doc.len_chars()),
				};
				Self {
					doc,
					selection,
					history,
					config: self.config.clone(),
				}
			}
		}
	}

	/// Test hatch: replaces the done branch in place.
	///
	/// Violates the immutability contract on purpose so tests can measure a
	/// compressed branch against the original.
	#[cfg(test)]
	pub(crate) fn swap_done(&mut self, done: crate::branch::Branch) {
		self.history.done = done;
	}
}
