//! Core primitives for the vellum editor: positions, selections, and the
//! step/transform algebra that document edits are expressed in.
//!
//! The canonical coordinate space is character indices into a [`Rope`].
//! Edits are [`Step`]s (atomic replacements with a known inverse and a
//! position map), grouped into [`Transform`]s that remember the document
//! each step applied to and the composed [`Mapping`] across all of them.

pub mod range;
pub mod selection;
pub mod transform;

pub use range::{CharIdx, CharLen, Direction, Range};
pub use ropey::{Rope, RopeSlice};
pub use selection::{Selection, SelectionBookmark};
pub use transform::{Assoc, MapResult, Mapping, Step, StepError, StepMap, Transform};
