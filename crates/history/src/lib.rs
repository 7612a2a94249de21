//! Undo/redo history for transform-based documents.
//!
//! The history is a pair of [`Branch`]es, one compressed append-only log of
//! items per direction. Each item records the position map of one change
//! and, for undoable changes, the inverted step that rewinds it plus an
//! optional selection marker bounding an undo event. Because the log keeps
//! position maps for *every* change (including untracked and remote ones),
//! a held inverted step can be remapped into the present document no matter
//! what happened since it was recorded: undo keeps working across
//! collaborative rebasing and non-undoable edits.
//!
//! Consecutive edits group into user-visible events by time proximity and
//! geometric adjacency; undoing reconstructs one event's inverse as a fresh
//! [`Transform`](vellum_primitives::Transform) and records its own inverse
//! on the opposite branch, so undo and redo feed each other.
//!
//! All state is immutable and structurally shared: [`EditorState::apply`]
//! returns a new state, and old ones remain valid snapshots.

mod branch;
mod commands;
mod editor;
mod item;
mod state;

pub use branch::{Branch, PoppedEvent};
pub use commands::{close_history, redo, redo_depth, undo, undo_depth};
pub use editor::{Action, EditorState, TransformAction};
pub use state::HistoryState;

/// Configuration for the undo history.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
	/// Soft cap on the number of undoable events. The branch evicts the
	/// oldest events once the count overflows this by a batching margin.
	pub depth: usize,
	/// Time gap (in the host's `time` unit) after which the next tracked
	/// edit starts a new event regardless of adjacency.
	pub new_group_delay: u64,
	/// Rebuild items during undo instead of consuming them. Required when
	/// the history must survive arbitrary remote-edit interleaving, at the
	/// cost of a longer log (periodically compressed).
	pub preserve_items: bool,
}

impl Default for HistoryConfig {
	fn default() -> Self {
		Self {
			depth: 100,
			new_group_delay: 500,
			preserve_items: false,
		}
	}
}

impl HistoryConfig {
	/// Configuration for collaborative editing: items are preserved across
	/// pops so remote transforms can still be rebased against them.
	pub fn collaborative() -> Self {
		Self {
			preserve_items: true,
			..Self::default()
		}
	}
}
