use bitflags::bitflags;
use smallvec::SmallVec;

use crate::range::{CharIdx, CharLen};

/// Which side a position sticks to when content is inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
	/// Position stays before insertions at the same location.
	Before,
	/// Position moves after insertions at the same location.
	After,
}

bitflags! {
	/// Information about content deleted around a mapped position.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct DelInfo: u8 {
		/// Content immediately before the position was deleted.
		const BEFORE = 1;
		/// Content immediately after the position was deleted.
		const AFTER = 2;
		/// The position itself was inside a deleted range.
		const ACROSS = 4;
		/// The token the position's association pointed at was deleted.
		const SIDE = 8;
	}
}

/// A token that lets a mirror map recover the exact position a replaced
/// range swallowed: which range it was, and the offset into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recover {
	pub(crate) index: usize,
	pub(crate) offset: CharLen,
}

/// The result of mapping a position through a [`StepMap`] or [`Mapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
	/// The mapped position.
	pub pos: CharIdx,
	del_info: DelInfo,
	pub(crate) recover: Option<Recover>,
}

impl MapResult {
	fn new(pos: CharIdx, del_info: DelInfo, recover: Option<Recover>) -> Self {
		Self { pos, del_info, recover }
	}

	/// True when the token the position pointed at (on its association side)
	/// was deleted. This is the "did my character survive" question.
	pub fn deleted(&self) -> bool {
		self.del_info.contains(DelInfo::SIDE)
	}

	/// True when content before the position was deleted.
	pub fn deleted_before(&self) -> bool {
		self.del_info.intersects(DelInfo::BEFORE | DelInfo::ACROSS)
	}

	/// True when content after the position was deleted.
	pub fn deleted_after(&self) -> bool {
		self.del_info.intersects(DelInfo::AFTER | DelInfo::ACROSS)
	}

	/// True when the position was strictly inside a deleted range.
	pub fn deleted_across(&self) -> bool {
		self.del_info.contains(DelInfo::ACROSS)
	}
}

/// One replaced range inside a [`StepMap`], in pre-step coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapRange {
	/// Start of the replaced range (pre-step coordinates).
	pub start: CharIdx,
	/// Number of characters replaced.
	pub old_size: CharLen,
	/// Number of characters that took their place.
	pub new_size: CharLen,
}

/// The position map of a single step: an ordered list of replaced ranges.
///
/// Inversion is O(1): the same ranges are read with old and new sizes
/// swapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMap {
	ranges: SmallVec<[MapRange; 1]>,
	inverted: bool,
}

impl StepMap {
	/// Creates a map from a list of replaced ranges, which must be sorted by
	/// start position and non-overlapping.
	pub fn new(ranges: impl IntoIterator<Item = MapRange>) -> Self {
		Self {
			ranges: ranges.into_iter().collect(),
			inverted: false,
		}
	}

	/// The identity map: no positions move.
	pub fn identity() -> Self {
		Self::new([])
	}

	/// Returns true if no range in this map replaces anything.
	pub fn is_identity(&self) -> bool {
		self.ranges.iter().all(|r| r.old_size == 0 && r.new_size == 0)
	}

	/// Returns a map from post-step to pre-step coordinates. O(1).
	pub fn invert(&self) -> Self {
		Self {
			ranges: self.ranges.clone(),
			inverted: !self.inverted,
		}
	}

	fn sizes(&self, range: &MapRange) -> (CharLen, CharLen) {
		if self.inverted {
			(range.new_size, range.old_size)
		} else {
			(range.old_size, range.new_size)
		}
	}

	/// Maps a position through this map.
	pub fn map(&self, pos: CharIdx, assoc: Assoc) -> CharIdx {
		self.map_inner(pos, assoc).pos
	}

	/// Maps a position, also reporting deletion info and a recovery token.
	pub fn map_result(&self, pos: CharIdx, assoc: Assoc) -> MapResult {
		self.map_inner(pos, assoc)
	}

	fn map_inner(&self, pos: CharIdx, assoc: Assoc) -> MapResult {
		let mut diff: isize = 0;
		for (index, range) in self.ranges.iter().enumerate() {
			let start = range.start as isize - if self.inverted { diff } else { 0 };
			if start > pos as isize {
				break;
			}
			let (old_size, new_size) = self.sizes(range);
			let end = start + old_size as isize;
			if pos as isize <= end {
				let side = if old_size == 0 {
					assoc
				} else if pos as isize == start {
					Assoc::Before
				} else if pos as isize == end {
					Assoc::After
				} else {
					assoc
				};
				let result = start + diff + if side == Assoc::Before { 0 } else { new_size as isize };
				let edge = if assoc == Assoc::Before { start } else { end };
				let recover = (pos as isize != edge).then(|| Recover {
					index,
					offset: (pos as isize - start) as CharLen,
				});
				let mut del = if pos as isize == start {
					DelInfo::AFTER
				} else if pos as isize == end {
					DelInfo::BEFORE
				} else {
					DelInfo::ACROSS
				};
				if pos as isize != edge {
					del |= DelInfo::SIDE;
				}
				return MapResult::new(result as CharIdx, del, recover);
			}
			diff += new_size as isize - old_size as isize;
		}
		MapResult::new((pos as isize + diff) as CharIdx, DelInfo::empty(), None)
	}

	/// The position in this map's output that a recovery token minted by its
	/// mirror corresponds to.
	pub(crate) fn recover(&self, recover: Recover) -> CharIdx {
		let mut diff: isize = 0;
		if !self.inverted {
			for range in self.ranges.iter().take(recover.index) {
				diff += range.new_size as isize - range.old_size as isize;
			}
		}
		(self.ranges[recover.index].start as isize + diff) as CharIdx + recover.offset
	}

	/// Calls `f(old_start, old_end, new_start, new_end)` for every replaced
	/// range, in order.
	pub fn for_each(&self, mut f: impl FnMut(CharIdx, CharIdx, CharIdx, CharIdx)) {
		let mut diff: isize = 0;
		for range in &self.ranges {
			let start = range.start as isize;
			let old_start = start - if self.inverted { diff } else { 0 };
			let new_start = start + if self.inverted { 0 } else { diff };
			let (old_size, new_size) = self.sizes(range);
			f(
				old_start as CharIdx,
				(old_start + old_size as isize) as CharIdx,
				new_start as CharIdx,
				(new_start + new_size as isize) as CharIdx,
			);
			diff += new_size as isize - old_size as isize;
		}
	}
}

/// A composed pipeline of [`StepMap`]s with mirror bookkeeping.
///
/// A map and a later inverse of it can be registered as mirrors; mapping a
/// position that the first map deletes then jumps to the mirror and rejoins
/// through its recovery token, so the pair cancels exactly instead of
/// collapsing the position to an edge.
///
/// Slicing shares the underlying map list; `from`/`to` delimit the active
/// window in absolute indices.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
	maps: im::Vector<StepMap>,
	mirror: im::Vector<(usize, usize)>,
	from: usize,
	to: usize,
}

impl Mapping {
	/// Creates an empty mapping.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a mapping over the given maps, with no mirrors.
	pub fn from_maps(maps: impl IntoIterator<Item = StepMap>) -> Self {
		let maps: im::Vector<StepMap> = maps.into_iter().collect();
		let to = maps.len();
		Self {
			maps,
			mirror: im::Vector::new(),
			from: 0,
			to,
		}
	}

	/// The full list of maps (including any outside the active window).
	pub fn maps(&self) -> &im::Vector<StepMap> {
		&self.maps
	}

	/// Number of maps in the pipeline.
	pub fn len(&self) -> usize {
		self.maps.len()
	}

	/// Returns true if the pipeline holds no maps.
	pub fn is_empty(&self) -> bool {
		self.maps.is_empty()
	}

	/// A sub-pipeline over `[from, to)`, sharing structure with `self`.
	pub fn slice(&self, from: usize, to: usize) -> Mapping {
		Mapping {
			maps: self.maps.clone(),
			mirror: self.mirror.clone(),
			from,
			to,
		}
	}

	/// A sub-pipeline from `from` through the end.
	pub fn slice_from(&self, from: usize) -> Mapping {
		self.slice(from, self.maps.len())
	}

	/// Appends a map, optionally registering it as the mirror of the map at
	/// `mirror_index`.
	pub fn append_map(&mut self, map: StepMap, mirror_index: Option<usize>) {
		self.maps.push_back(map);
		self.to = self.maps.len();
		if let Some(index) = mirror_index {
			self.set_mirror(self.maps.len() - 1, index);
		}
	}

	/// Registers the maps at `a` and `b` as mirrors of each other.
	pub fn set_mirror(&mut self, a: usize, b: usize) {
		self.mirror.push_back((a, b));
	}

	/// Returns the mirror partner of the map at `index`, if any.
	pub fn get_mirror(&self, index: usize) -> Option<usize> {
		self.mirror.iter().find_map(|&(a, b)| {
			if a == index {
				Some(b)
			} else if b == index {
				Some(a)
			} else {
				None
			}
		})
	}

	/// Maps a position through the active window.
	pub fn map(&self, pos: CharIdx, assoc: Assoc) -> CharIdx {
		self.map_inner(pos, assoc).pos
	}

	/// Maps a position, accumulating deletion info across the window.
	pub fn map_result(&self, pos: CharIdx, assoc: Assoc) -> MapResult {
		self.map_inner(pos, assoc)
	}

	fn map_inner(&self, pos: CharIdx, assoc: Assoc) -> MapResult {
		let mut del = DelInfo::empty();
		let mut pos = pos;
		let mut i = self.from;
		while i < self.to {
			let result = self.maps[i].map_result(pos, assoc);
			if let Some(recover) = result.recover
				&& let Some(corr) = self.get_mirror(i)
				&& corr > i && corr < self.to
			{
				pos = self.maps[corr].recover(recover);
				i = corr + 1;
				continue;
			}
			del |= result.del_info;
			pos = result.pos;
			i += 1;
		}
		MapResult::new(pos, del, None)
	}
}
